//! In-process fixtures: an app over the memory store driven with `oneshot`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use crate::auth::mailer::{MailError, Mailer, Message};
use crate::auth::provider::{ExternalIdentity, IdentityProvider};
use crate::auth::{AuthError, TokenIssuer, TokenPurpose};
use crate::config::AppConfig;
use crate::database::{DocumentStore, MemoryStore};
use crate::state::AppState;
use crate::value::Value;

pub const TEST_JWT_KEY: &str = "test-secret";

/// Records messages instead of sending them.
#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<Message>>,
}

impl CapturingMailer {
    pub fn last(&self) -> Option<Message> {
        self.sent.lock().ok()?.last().cloned()
    }

    /// Last word of the last message body, which is where codes are placed.
    pub fn last_code(&self) -> Option<String> {
        self.last()?.body.split_whitespace().last().map(str::to_string)
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, message: &Message) -> Result<(), MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}

pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: &Message) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused".to_string()))
    }
}

/// Accepts the id token `good` as `social@example.com`; `down` simulates an outage.
pub struct FixedProvider;

#[async_trait]
impl IdentityProvider for FixedProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, AuthError> {
        match id_token {
            "good" => Ok(ExternalIdentity {
                email: "social@example.com".to_string(),
                name: Some("Social".to_string()),
                picture: None,
            }),
            "down" => Err(AuthError::Provider("key endpoint unreachable".to_string())),
            _ => Err(AuthError::ProviderRejected("bad token".to_string())),
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

pub struct TestContext {
    pub state: AppState,
    pub mailer: Arc<CapturingMailer>,
    router: Router,
}

impl TestContext {
    /// Development defaults plus a JWT secret, so auth routes and the gate are live.
    pub fn config() -> AppConfig {
        let mut config = AppConfig::development();
        config.security.jwt_key = Some(TEST_JWT_KEY.to_string());
        config.api.enable_request_logging = false;
        config
    }

    pub fn new() -> Self {
        Self::with_config(Self::config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let mailer = Arc::new(CapturingMailer::default());
        Self::build(config, mailer.clone(), mailer)
    }

    pub fn with_mailer(config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self::build(config, mailer, Arc::new(CapturingMailer::default()))
    }

    fn build(config: AppConfig, mailer: Arc<dyn Mailer>, captured: Arc<CapturingMailer>) -> Self {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store, mailer, Some(Arc::new(FixedProvider))).expect("test state");
        let router = crate::app(state.clone());
        Self {
            state,
            mailer: captured,
            router,
        }
    }

    pub fn session_token(&self, user_id: &Value) -> String {
        let issuer = TokenIssuer::new(TEST_JWT_KEY, &self.state.config.security);
        issuer.issue(user_id, TokenPurpose::Session).expect("token")
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<&str>, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body").to_vec();
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, token).await
    }

    pub async fn send(&self, method: Method, uri: &str, body: &str, token: Option<&str>) -> TestResponse {
        self.request(method, uri, Some(body), token).await
    }
}
