use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::service::USERS_COLLECTION;
use crate::auth::{AuthError, AuthService, GoogleProvider, IdentityProvider, LogMailer, Mailer, RelayMailer, TokenIssuer};
use crate::config::AppConfig;
use crate::database::{Collection, DocumentStore};
use crate::error::ApiError;
use crate::filter::FilterOptions;
use crate::middleware::RequestGate;

/// Everything a handler needs, passed explicitly through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    /// Present only when a JWT secret is configured.
    pub auth: Option<Arc<AuthService>>,
    /// Absent when neither a JWT secret nor a static token is configured.
    pub gate: Option<Arc<RequestGate>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        mailer: Arc<dyn Mailer>,
        google: Option<Arc<dyn IdentityProvider>>,
    ) -> Result<Self, AuthError> {
        let security = &config.security;
        let tokens = security.jwt_key.as_deref().map(|key| TokenIssuer::new(key, security));

        let auth = match tokens.clone() {
            Some(tokens) => Some(Arc::new(AuthService::new(
                store.clone(),
                tokens,
                mailer,
                google,
                security.activation_code_digits,
            )?)),
            None => None,
        };

        let gate = RequestGate::new(&security.exclude, tokens, security.auth_token.clone()).map(Arc::new);
        if gate.is_none() {
            warn!("Authentication disabled");
        }

        Ok(Self {
            config: Arc::new(config),
            store,
            auth,
            gate,
        })
    }

    /// Builds the mailer and identity provider the configuration asks for.
    pub fn from_config(config: AppConfig, store: Arc<dyn DocumentStore>) -> Result<Self, AuthError> {
        let mailer: Arc<dyn Mailer> = match &config.mail.relay_url {
            Some(url) => {
                info!("Relaying mail through {}", url);
                Arc::new(RelayMailer::new(url.clone(), config.mail.from.clone()))
            }
            None => Arc::new(LogMailer),
        };
        let google = config
            .security
            .google_client_id
            .clone()
            .map(|client_id| Arc::new(GoogleProvider::new(client_id)) as Arc<dyn IdentityProvider>);
        Self::new(config, store, mailer, google)
    }

    /// Handle for the data and file routes. The credential collection is off limits
    /// to them while the auth routes own it.
    pub fn collection(&self, name: &str) -> Result<Collection, ApiError> {
        if self.auth.is_some() && name == USERS_COLLECTION {
            return Err(ApiError::forbidden(format!(
                "The {} collection is only reachable through /auth",
                USERS_COLLECTION
            )));
        }
        Ok(Collection::new(self.store.clone(), name)?)
    }

    pub fn filter_options(&self) -> FilterOptions {
        self.config.filter_options()
    }

    pub fn auth(&self) -> Result<&AuthService, ApiError> {
        self.auth
            .as_deref()
            .ok_or_else(|| ApiError::not_found("Authentication is not enabled"))
    }
}
