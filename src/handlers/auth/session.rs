// handlers/auth/session.rs - Password credentials and the session they open

use axum::{
    extract::State,
    http::{HeaderMap, Uri},
};

use super::bearer_claims;
use crate::auth::TokenPurpose;
use crate::middleware::{ApiResult, ExtJson, ExtJsonBody};
use crate::state::AppState;

/// POST /auth/register - `{email, password, ...extra}` → `{token, user}`
pub async fn register(State(state): State<AppState>, body: ExtJsonBody) -> ApiResult<ExtJson> {
    let session = state.auth()?.register(body.document()?).await?;
    Ok(ExtJson::document(&session.into_document()))
}

/// POST /auth/login - `{email, password}` → `{token, user}`
pub async fn login(State(state): State<AppState>, body: ExtJsonBody) -> ApiResult<ExtJson> {
    let session = state.auth()?.login(&body.document()?).await?;
    Ok(ExtJson::document(&session.into_document()))
}

/// GET /auth/session - the user behind the bearer token
pub async fn session(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> ApiResult<ExtJson> {
    let claims = bearer_claims(&state, &headers, &uri, &[TokenPurpose::Session])?;
    let user = state.auth()?.current_user(&claims).await?;
    Ok(ExtJson::document(&user))
}

/// POST /auth/updatePassword - accepts session and recovery tokens
pub async fn update_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: ExtJsonBody,
) -> ApiResult<ExtJson> {
    let claims = bearer_claims(&state, &headers, &uri, &[TokenPurpose::Session, TokenPurpose::Recovery])?;
    let session = state.auth()?.update_password(&claims, &body.document()?).await?;
    Ok(ExtJson::document(&session.into_document()))
}
