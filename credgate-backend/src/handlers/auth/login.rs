use std::sync::Arc;

use axum::extract::Extension;
use axum::response::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::{error::ApiError, state::AppState};

pub const MISSING_CREDENTIALS: &str = "Email and passwordHash are required";

/// POST /login
/// Accepts { email, passwordHash } and returns the matching user record.
///
/// Zero matches answer with the same generic 401 whether the email is
/// unknown or the hash is wrong, so the endpoint cannot be used to
/// enumerate accounts.
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let payload = body
        .ok_or_else(|| ApiError::bad_request(MISSING_CREDENTIALS))?
        .0;

    let dto: super::dto::Login = serde_json::from_value(payload)
        .map_err(|_| ApiError::bad_request(MISSING_CREDENTIALS))?;
    let (email, password_hash) = dto
        .credentials()
        .ok_or_else(|| ApiError::bad_request(MISSING_CREDENTIALS))?;

    let rows = state
        .store()
        .find_user_by_credentials(email, password_hash)
        .await?;

    // More than one row for a credential pair violates the store's email
    // uniqueness; proceed with the first rather than failing the login.
    if rows.len() > 1 {
        warn!(
            matches = rows.len(),
            "multiple rows matched one credential pair, using the first"
        );
    }
    let user = rows
        .into_iter()
        .next()
        .ok_or(ApiError::InvalidCredentials)?;

    if state.touch_on_login() {
        // Authentication already succeeded; the timestamp is best-effort.
        if let Err(err) = state.store().touch_last_login(&user.id, Utc::now()).await {
            warn!(error = %err, "failed to update last_login");
        }
    }

    Ok(Json(json!({ "success": true, "user": user })))
}
