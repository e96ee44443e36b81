// handlers/auth/mod.rs - Credential lifecycle over the `users` collection
//
// Mounted only when a JWT secret is configured. These routes sit outside the
// request gate; the ones that need a caller read the bearer token themselves.

use axum::http::{HeaderMap, Uri};

use crate::auth::{Claims, TokenPurpose};
use crate::error::ApiError;
use crate::middleware::{extract_bearer_token, ApiResult};
use crate::state::AppState;

pub mod recovery; // activation codes and password recovery
pub mod session; // register, login, session, password change
pub mod social; // third-party sign-in

/// Verifies the caller's bearer token for one of the `accepted` purposes.
fn bearer_claims(state: &AppState, headers: &HeaderMap, uri: &Uri, accepted: &[TokenPurpose]) -> ApiResult<Claims> {
    let token = extract_bearer_token(headers, uri.query()).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
    Ok(state.auth()?.tokens().verify(&token, accepted)?)
}
