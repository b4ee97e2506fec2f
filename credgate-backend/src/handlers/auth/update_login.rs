use std::sync::Arc;

use axum::extract::Extension;
use axum::response::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::{error::ApiError, state::AppState};

pub const MISSING_USER_ID: &str = "userId is required";

/// POST /update-login
/// Stamps `last_login` on the addressed record. Here the write is the
/// primary operation, so store failures surface as a server error.
pub async fn update_login(
    Extension(state): Extension<Arc<AppState>>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let payload = body
        .ok_or_else(|| ApiError::bad_request(MISSING_USER_ID))?
        .0;

    let dto: super::dto::UpdateLogin = serde_json::from_value(payload)
        .map_err(|_| ApiError::bad_request(MISSING_USER_ID))?;
    let user_id = dto
        .user_id()
        .ok_or_else(|| ApiError::bad_request(MISSING_USER_ID))?;

    state.store().touch_last_login(&user_id, Utc::now()).await?;

    Ok(Json(json!({ "success": true })))
}
