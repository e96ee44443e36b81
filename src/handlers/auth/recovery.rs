// handlers/auth/recovery.rs - One-time codes delivered by mail

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Uri},
};

use super::bearer_claims;
use crate::auth::TokenPurpose;
use crate::doc;
use crate::middleware::{ApiResult, ExtJson, ExtJsonBody};
use crate::state::AppState;

/// POST /auth/activation - mail a fresh activation code to the caller
pub async fn request_activation(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> ApiResult<ExtJson> {
    let claims = bearer_claims(&state, &headers, &uri, &[TokenPurpose::Session])?;
    state.auth()?.request_activation(&claims).await?;
    Ok(ExtJson::document(&doc! { "sent" => true }))
}

/// POST /auth/activate - `{code}`
pub async fn activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: ExtJsonBody,
) -> ApiResult<ExtJson> {
    let claims = bearer_claims(&state, &headers, &uri, &[TokenPurpose::Session])?;
    let user = state.auth()?.activate(&claims, &body.document()?).await?;
    Ok(ExtJson::document(&user))
}

/// POST /auth/password_recovery - `{email}`
pub async fn password_recovery(State(state): State<AppState>, body: ExtJsonBody) -> ApiResult<ExtJson> {
    state.auth()?.request_recovery(&body.document()?).await?;
    Ok(ExtJson::document(&doc! { "sent" => true }))
}

/// GET /auth/validate_recovery_hash/:recovery_hash - trade a recovery code for a short-lived token
pub async fn validate_recovery_hash(
    State(state): State<AppState>,
    Path(recovery_hash): Path<String>,
) -> ApiResult<ExtJson> {
    let token = state.auth()?.validate_recovery(&recovery_hash).await?;
    Ok(ExtJson::document(&doc! { "token" => token }))
}
