pub mod mailer;
pub mod password;
pub mod provider;
pub mod service;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::database::StoreError;
use crate::filter::FilterError;
use crate::identifier::Identifier;
use crate::value::Value;

pub use mailer::{LogMailer, MailError, Mailer, RelayMailer};
pub use provider::{GoogleProvider, IdentityProvider};
pub use service::AuthService;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("duplicate user: {0} is already registered")]
    EmailTaken(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired code")]
    InvalidCode,

    #[error("User not found")]
    UnknownUser,

    #[error("Invalid token: {0}")]
    Token(String),

    #[error("{0} is not enabled")]
    Disabled(&'static str),

    #[error("Identity provider rejected the token: {0}")]
    ProviderRejected(String),

    #[error("Identity provider unavailable: {0}")]
    Provider(String),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Session,
    Recovery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User `_id` rendered as a path segment.
    pub id: String,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: &Value, purpose: TokenPurpose, expiry_secs: u64) -> Result<Self, AuthError> {
        let id = Identifier::from_value(user_id)
            .ok_or_else(|| AuthError::Token(format!("user id of type {} cannot be carried in a token", user_id.type_name())))?;
        let now = Utc::now();
        let exp = (now + Duration::seconds(expiry_secs as i64)).timestamp();
        Ok(Self {
            id: id.to_path_segment(),
            purpose,
            iat: now.timestamp(),
            exp,
        })
    }

    pub fn user_id(&self) -> Value {
        Identifier::resolve(&self.id).to_value()
    }
}

/// Signs and checks HS256 session and recovery tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_expiry_secs: u64,
    recovery_expiry_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, security: &SecurityConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_expiry_secs: security.session_expiry_secs,
            recovery_expiry_secs: security.recovery_expiry_secs,
        }
    }

    pub fn issue(&self, user_id: &Value, purpose: TokenPurpose) -> Result<String, AuthError> {
        let expiry = match purpose {
            TokenPurpose::Session => self.session_expiry_secs,
            TokenPurpose::Recovery => self.recovery_expiry_secs,
        };
        let claims = Claims::new(user_id, purpose, expiry)?;
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Decodes `token` and checks that its purpose is one of `accepted`.
    pub fn verify(&self, token: &str, accepted: &[TokenPurpose]) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| AuthError::Token(e.to_string()))?;
        if !accepted.contains(&token_data.claims.purpose) {
            return Err(AuthError::Token("token cannot be used here".to_string()));
        }
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::value::ObjectId;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", &AppConfig::development().security)
    }

    #[test]
    fn session_tokens_round_trip_user_ids() {
        let issuer = issuer();
        let id = Value::ObjectId(ObjectId::new());
        let token = issuer.issue(&id, TokenPurpose::Session).unwrap();
        let claims = issuer.verify(&token, &[TokenPurpose::Session]).unwrap();
        assert_eq!(claims.user_id(), id);
        assert_eq!(claims.exp - claims.iat, 14_400);
    }

    #[test]
    fn recovery_tokens_are_short_lived_and_scoped() {
        let issuer = issuer();
        let token = issuer.issue(&Value::from("u1"), TokenPurpose::Recovery).unwrap();
        assert!(issuer.verify(&token, &[TokenPurpose::Session]).is_err());
        let claims = issuer.verify(&token, &[TokenPurpose::Session, TokenPurpose::Recovery]).unwrap();
        assert_eq!(claims.exp - claims.iat, 240);
        assert_eq!(claims.user_id(), Value::from("u1"));
    }

    #[test]
    fn rejects_foreign_signatures() {
        let token = issuer().issue(&Value::Int(1), TokenPurpose::Session).unwrap();
        let other = TokenIssuer::new("other-secret", &AppConfig::development().security);
        assert!(matches!(other.verify(&token, &[TokenPurpose::Session]), Err(AuthError::Token(_))));
    }
}
