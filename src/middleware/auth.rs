use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::auth::{Claims, TokenIssuer, TokenPurpose};
use crate::filter::query::TOKEN_PARAM;
use crate::state::AppState;

/// Paths that never reach the gate's credential check.
const ALWAYS_OPEN: [&str; 2] = ["/file/", "/auth/password_recovery"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassRule {
    Prefix(String),
    Contains(String),
}

impl BypassRule {
    pub fn matches(&self, path_and_query: &str) -> bool {
        match self {
            BypassRule::Prefix(prefix) => path_and_query.starts_with(prefix.as_str()),
            BypassRule::Contains(fragment) => path_and_query.contains(fragment.as_str()),
        }
    }
}

/// Outcome of checking a request's credentials.
#[derive(Debug)]
pub enum GateDecision {
    Bypassed,
    /// The static shared token matched.
    Shared,
    User(Claims),
}

/// Bearer-token gate in front of the data routes.
pub struct RequestGate {
    bypass: Vec<BypassRule>,
    tokens: Option<TokenIssuer>,
    shared_token: Option<String>,
}

impl RequestGate {
    /// `None` when there is nothing to check tokens against.
    pub fn new(exclude: &[String], tokens: Option<TokenIssuer>, shared_token: Option<String>) -> Option<Self> {
        if tokens.is_none() && shared_token.is_none() {
            return None;
        }
        let bypass = ALWAYS_OPEN
            .iter()
            .map(|p| BypassRule::Prefix(p.to_string()))
            .chain(
                exclude
                    .iter()
                    .filter(|e| !e.is_empty())
                    .map(|e| BypassRule::Contains(e.clone())),
            )
            .collect();
        Some(Self {
            bypass,
            tokens,
            shared_token,
        })
    }

    pub fn rules(&self) -> &[BypassRule] {
        &self.bypass
    }

    pub fn check(&self, path_and_query: &str, headers: &HeaderMap, query: Option<&str>) -> Option<GateDecision> {
        if self.bypass.iter().any(|rule| rule.matches(path_and_query)) {
            return Some(GateDecision::Bypassed);
        }

        let header_token = header_token(headers);
        if let (Some(shared), Some(presented)) = (&self.shared_token, header_token.as_deref()) {
            if shared == presented {
                return Some(GateDecision::Shared);
            }
        }

        let issuer = self.tokens.as_ref()?;
        let token = header_token.or_else(|| query_token(query))?;
        issuer
            .verify(&token, &[TokenPurpose::Session])
            .ok()
            .map(GateDecision::User)
    }
}

/// Rejects requests without a valid credential before any handler runs
pub async fn request_gate_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(gate) = state.gate.as_deref() else {
        return next.run(request).await;
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    match gate.check(&path_and_query, request.headers(), request.uri().query()) {
        Some(GateDecision::User(claims)) => {
            tracing::debug!("{} {} by user {}", request.method(), path_and_query, claims.user_id());
            next.run(request).await
        }
        Some(_) => next.run(request).await,
        None => {
            tracing::warn!("Auth failure for {} {}", request.method(), path_and_query);
            auth_failure()
        }
    }
}

pub fn auth_failure() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "status": "failed", "message": "Auth failure" })),
    )
        .into_response()
}

/// Bearer token from the `Authorization` header, falling back to the `token` query parameter
pub fn extract_bearer_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    header_token(headers).or_else(|| query_token(query))
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn query_token(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
