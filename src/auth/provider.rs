use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::AuthError;

pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity asserted by an external provider after its token checked out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExternalIdentity {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Checks `id_token` and returns who it belongs to. Provider outages are
    /// [AuthError::Provider]; bad tokens are [AuthError::ProviderRejected].
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, AuthError>;
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Verifies Google ID tokens (RS256) against Google's published signing keys.
pub struct GoogleProvider {
    client: reqwest::Client,
    client_id: String,
    jwks_url: String,
}

impl GoogleProvider {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::with_jwks_url(client_id, GOOGLE_JWKS_URL)
    }

    pub fn with_jwks_url(client_id: impl Into<String>, jwks_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            jwks_url: jwks_url.into(),
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!("key endpoint returned {}", response.status())));
        }
        response.json::<JwkSet>().await.map_err(|e| AuthError::Provider(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, AuthError> {
        let header = decode_header(id_token).map_err(|e| AuthError::ProviderRejected(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::ProviderRejected("token header has no key id".to_string()))?;

        let keys = self.fetch_keys().await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| AuthError::ProviderRejected(format!("unknown signing key {}", kid)))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| AuthError::Provider(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        let claims = decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|e| AuthError::ProviderRejected(e.to_string()))?
            .claims;

        if claims.email_verified == Some(false) {
            return Err(AuthError::ProviderRejected("email address is not verified".to_string()));
        }
        let email = claims
            .email
            .ok_or_else(|| AuthError::ProviderRejected("token carries no email".to_string()))?;
        Ok(ExternalIdentity {
            email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_tokens_are_rejected_before_any_fetch() {
        let provider = GoogleProvider::with_jwks_url("client", "http://127.0.0.1:9/never");
        let err = provider.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::ProviderRejected(_)));
    }
}
