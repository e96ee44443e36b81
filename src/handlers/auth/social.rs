// handlers/auth/social.rs - POST /auth/social/google

use axum::extract::State;

use crate::middleware::{ApiResult, ExtJson, ExtJsonBody};
use crate::state::AppState;

/// `{id_token}` from Google Sign-In → `{token, user}`
pub async fn google(State(state): State<AppState>, body: ExtJsonBody) -> ApiResult<ExtJson> {
    let session = state.auth()?.social_google(&body.document()?).await?;
    Ok(ExtJson::document(&session.into_document()))
}
