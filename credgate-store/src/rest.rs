//! Client for the managed store's PostgREST-style REST dialect.
//!
//! Reads filter rows with `column=eq.value` query parameters; writes patch
//! rows addressed the same way. The service credential is sent as both the
//! `apikey` header and a bearer token, matching the hosted store's API.

use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, info_span, Instrument};
use url::Url;

use crate::{StoreError, UserRecord, UserStore};

pub struct RestStore {
    client: Client,
    endpoint: String,
    service_key: SecretString,
    table: String,
}

impl RestStore {
    /// Build a client from the store endpoint URL and service credential.
    ///
    /// # Errors
    /// Returns an error if the endpoint cannot be parsed, has no host, or
    /// uses a scheme other than http/https.
    pub fn new(
        endpoint: &str,
        service_key: SecretString,
        table: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self, StoreError> {
        let endpoint = normalize_endpoint(endpoint)?;
        let client = Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            client,
            endpoint,
            service_key,
            table: table.into(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.endpoint, self.table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", self.service_key.expose_secret())
            .bearer_auth(self.service_key.expose_secret())
    }
}

#[async_trait::async_trait]
impl UserStore for RestStore {
    async fn find_user_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Vec<UserRecord>, StoreError> {
        let url = self.table_url();
        let filters = [
            ("select", "*".to_owned()),
            ("email", format!("eq.{email}")),
            ("password_hash", format!("eq.{password_hash}")),
        ];

        let span = info_span!("store.find_user", http.method = "GET", url = %url);
        let response = self
            .authorized(self.client.get(&url).query(&filters))
            .send()
            .instrument(span)
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response.json().await?;
        let rows: Vec<UserRecord> = serde_json::from_value(body)?;
        debug!(rows = rows.len(), "credential lookup completed");

        Ok(rows)
    }

    async fn touch_last_login(&self, id: &Value, at: DateTime<Utc>) -> Result<(), StoreError> {
        let url = self.table_url();
        let patch = json!({ "last_login": at.to_rfc3339() });

        let span = info_span!("store.touch_last_login", http.method = "PATCH", url = %url);
        let response = self
            .authorized(
                self.client
                    .patch(&url)
                    .query(&[("id", eq_filter(id))])
                    .header("Prefer", "return=minimal")
                    .json(&patch),
            )
            .send()
            .instrument(span)
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(())
    }
}

/// Validate the endpoint and strip any trailing slash so paths append
/// uniformly.
fn normalize_endpoint(endpoint: &str) -> Result<String, StoreError> {
    let url = Url::parse(endpoint).map_err(|e| StoreError::Endpoint(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(StoreError::Endpoint(format!("unsupported scheme {other}")));
        }
    }

    if url.host().is_none() {
        return Err(StoreError::Endpoint("no host specified".to_owned()));
    }

    Ok(endpoint.trim_end_matches('/').to_owned())
}

/// Render an opaque id as an equality filter. String ids must not carry
/// JSON quoting; numeric ids render as-is.
fn eq_filter(value: &Value) -> String {
    match value {
        Value::String(s) => format!("eq.{s}"),
        other => format!("eq.{other}"),
    }
}

async fn error_from_response(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    StoreError::Status {
        status,
        message: store_error_message(&body).to_owned(),
    }
}

fn store_error_message(body: &Value) -> &str {
    body.get("message")
        .and_then(Value::as_str)
        .unwrap_or("no detail provided")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::TcpListener;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USER_AGENT: &str = "credgate-store-test/0.1";

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn store_for(uri: &str) -> RestStore {
        RestStore::new(
            uri,
            SecretString::from("service-key".to_string()),
            "users",
            USER_AGENT,
        )
        .expect("store")
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = RestStore::new(
            "ftp://example.com",
            SecretString::from("k".to_string()),
            "users",
            USER_AGENT,
        )
        .err()
        .expect("expected error");
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let store = store_for("https://example.com/");
        assert_eq!(store.table_url(), "https://example.com/rest/v1/users");
    }

    #[test]
    fn eq_filter_strips_json_quoting_from_strings() {
        assert_eq!(eq_filter(&serde_json::json!("abc-123")), "eq.abc-123");
        assert_eq!(eq_filter(&serde_json::json!(42)), "eq.42");
    }

    #[tokio::test]
    async fn find_sends_exact_match_filters() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("email", "eq.a@x.com"))
            .and(query_param("password_hash", "eq.h1"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "email": "a@x.com", "password_hash": "h1", "last_login": null}
            ])))
            .mount(&server)
            .await;

        let rows = store_for(&server.uri())
            .find_user_by_credentials("a@x.com", "h1")
            .await
            .expect("find");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, serde_json::json!(1));
        assert_eq!(rows[0].email, "a@x.com");
        assert_eq!(rows[0].password_hash.as_deref(), Some("h1"));
    }

    #[tokio::test]
    async fn find_decodes_empty_result() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let rows = store_for(&server.uri())
            .find_user_by_credentials("nobody@x.com", "h1")
            .await
            .expect("find");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn find_extracts_store_error_message() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "JWT expired"
            })))
            .mount(&server)
            .await;

        let err = store_for(&server.uri())
            .find_user_by_credentials("a@x.com", "h1")
            .await
            .err()
            .expect("expected error");

        match err {
            StoreError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "JWT expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn find_tolerates_non_json_error_body() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream blew up"))
            .mount(&server)
            .await;

        let err = store_for(&server.uri())
            .find_user_by_credentials("a@x.com", "h1")
            .await
            .err()
            .expect("expected error");
        assert!(err.to_string().contains("no detail provided"));
    }

    #[tokio::test]
    async fn touch_patches_by_numeric_id() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", "eq.7"))
            .and(header("prefer", "return=minimal"))
            .and(body_json(serde_json::json!({"last_login": at.to_rfc3339()})))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        store_for(&server.uri())
            .touch_last_login(&serde_json::json!(7), at)
            .await
            .expect("touch");
    }

    #[tokio::test]
    async fn touch_renders_string_ids_unquoted() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", "eq.abc-123"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        store_for(&server.uri())
            .touch_last_login(&serde_json::json!("abc-123"), at)
            .await
            .expect("touch");
    }

    #[tokio::test]
    async fn touch_maps_error_status() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "message": "invalid input syntax"
            })))
            .mount(&server)
            .await;

        let err = store_for(&server.uri())
            .touch_last_login(&serde_json::json!(1), Utc::now())
            .await
            .err()
            .expect("expected error");
        assert!(err.to_string().contains("invalid input syntax"));
    }
}
