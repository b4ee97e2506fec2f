use serde::Deserialize;
use serde_json::Value;

/// Body of `POST /login`.
#[derive(Debug, Deserialize)]
pub struct Login {
    #[serde(default)]
    pub email: Option<String>,
    /// Opaque pre-hashed credential supplied by the caller.
    #[serde(default, alias = "passwordHash")]
    pub password_hash: Option<String>,
}

impl Login {
    /// Both fields present and non-empty, or nothing.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.email.as_deref(), self.password_hash.as_deref()) {
            (Some(email), Some(hash)) if !email.is_empty() && !hash.is_empty() => {
                Some((email, hash))
            }
            _ => None,
        }
    }
}

/// Body of `POST /update-login`.
#[derive(Debug, Deserialize)]
pub struct UpdateLogin {
    #[serde(default, alias = "userId")]
    pub user_id: Option<Value>,
}

impl UpdateLogin {
    /// The addressed id, unless it is missing or null.
    pub fn user_id(self) -> Option<Value> {
        self.user_id.filter(|id| !id.is_null())
    }
}
