use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::mailer::{Mailer, Message};
use super::password::{digest, hash_password, numeric_code, recovery_code, unusable_password, verify_password};
use super::provider::IdentityProvider;
use super::{AuthError, Claims, TokenIssuer, TokenPurpose};
use crate::database::{Collection, DocumentStore};
use crate::doc;
use crate::filter::Filter;
use crate::value::{Document, Value, ID_FIELD};

pub const USERS_COLLECTION: &str = "users";

const EMAIL: &str = "email";
const PASSWORD: &str = "password";
const ACTIVE: &str = "active";
const ACTIVATION_CODE: &str = "activation_code";
const RECOVERY_HASH: &str = "recovery_hash";

/// Fields that never leave the service.
const SECRET_FIELDS: [&str; 3] = [PASSWORD, ACTIVATION_CODE, RECOVERY_HASH];

/// A freshly issued token together with the (public) user it belongs to.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: Document,
}

impl Session {
    pub fn into_document(self) -> Document {
        doc! { "token" => self.token, "user" => self.user }
    }
}

/// Credential lifecycle over the `users` collection.
pub struct AuthService {
    users: Collection,
    tokens: TokenIssuer,
    mailer: Arc<dyn Mailer>,
    google: Option<Arc<dyn IdentityProvider>>,
    activation_code_digits: u32,
    /// Held from the email lookup until the new user is stored.
    enrolment: Mutex<()>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        tokens: TokenIssuer,
        mailer: Arc<dyn Mailer>,
        google: Option<Arc<dyn IdentityProvider>>,
        activation_code_digits: u32,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            users: Collection::new(store, USERS_COLLECTION)?,
            tokens,
            mailer,
            google,
            activation_code_digits,
            enrolment: Mutex::new(()),
        })
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn register(&self, mut body: Document) -> Result<Session, AuthError> {
        let email = required_str(&body, EMAIL)?.to_string();
        let password = required_str(&body, PASSWORD)?.to_string();

        for field in [ID_FIELD, ACTIVATION_CODE, RECOVERY_HASH, ACTIVE] {
            body.remove(field);
        }
        body.insert(PASSWORD, hash_password(&password)?);
        body.insert(ACTIVE, false);

        let _enrolling = self.enrolment.lock().await;
        if self.find_by(EMAIL, Value::from(email.as_str())).await?.is_some() {
            return Err(AuthError::EmailTaken(email));
        }
        let id = self.users.insert_one(body.clone()).await?;
        body.set_id(id);
        info!("Registered user {}", email);
        self.session_for(&body)
    }

    pub async fn login(&self, credentials: &Document) -> Result<Session, AuthError> {
        let email = required_str(credentials, EMAIL)?;
        let password = required_str(credentials, PASSWORD)?;

        let Some(user) = self.find_by(EMAIL, Value::from(email)).await? else {
            warn!("Login for unknown email {}", email);
            return Err(AuthError::InvalidCredentials);
        };
        let stored = user.get(PASSWORD).and_then(Value::as_str).unwrap_or_default();
        if !verify_password(password, stored) {
            warn!("Login with wrong password for {}", email);
            return Err(AuthError::InvalidCredentials);
        }
        self.session_for(&user)
    }

    pub async fn current_user(&self, claims: &Claims) -> Result<Document, AuthError> {
        Ok(public_user(self.load(claims).await?))
    }

    pub async fn update_password(&self, claims: &Claims, body: &Document) -> Result<Session, AuthError> {
        let password = required_str(body, PASSWORD)?;
        let user = self.load(claims).await?;
        let id = user.id().cloned().unwrap_or_default();

        let set = doc! { PASSWORD => hash_password(password)?, RECOVERY_HASH => Value::Null };
        self.users.update_one(&Filter::by_id(id.clone()), &set).await?;
        let updated = self.users.find_one(&Filter::by_id(id)).await?.ok_or(AuthError::UnknownUser)?;
        self.session_for(&updated)
    }

    pub async fn request_activation(&self, claims: &Claims) -> Result<(), AuthError> {
        let user = self.load(claims).await?;
        let id = user.id().cloned().unwrap_or_default();
        let email = user.get(EMAIL).and_then(Value::as_str).unwrap_or_default().to_string();

        let code = numeric_code(self.activation_code_digits);
        self.users
            .update_one(&Filter::by_id(id), &doc! { ACTIVATION_CODE => digest(&code) })
            .await?;
        self.mailer
            .send(&Message {
                to: email,
                subject: "Activation code".to_string(),
                body: format!("Your activation code is {}", code),
            })
            .await?;
        Ok(())
    }

    pub async fn activate(&self, claims: &Claims, body: &Document) -> Result<Document, AuthError> {
        let code = required_str(body, "code")?;
        let user = self.load(claims).await?;
        let id = user.id().cloned().unwrap_or_default();

        match user.get(ACTIVATION_CODE).and_then(Value::as_str) {
            Some(stored) if stored == digest(code) => {}
            _ => return Err(AuthError::InvalidCode),
        }
        let set = doc! { ACTIVATION_CODE => Value::Null, ACTIVE => true };
        self.users.update_one(&Filter::by_id(id.clone()), &set).await?;
        let updated = self.users.find_one(&Filter::by_id(id)).await?.ok_or(AuthError::UnknownUser)?;
        Ok(public_user(updated))
    }

    pub async fn request_recovery(&self, body: &Document) -> Result<(), AuthError> {
        let email = required_str(body, EMAIL)?;
        let Some(user) = self.find_by(EMAIL, Value::from(email)).await? else {
            warn!("Password recovery for unknown email {}", email);
            return Err(AuthError::InvalidCredentials);
        };
        let id = user.id().cloned().unwrap_or_default();

        let code = recovery_code();
        self.users
            .update_one(&Filter::by_id(id), &doc! { RECOVERY_HASH => digest(&code) })
            .await?;
        self.mailer
            .send(&Message {
                to: email.to_string(),
                subject: "Password recovery".to_string(),
                body: format!("Use this code to recover your password: {}", code),
            })
            .await?;
        Ok(())
    }

    /// Consumes a recovery code and returns a short-lived recovery token.
    pub async fn validate_recovery(&self, code: &str) -> Result<String, AuthError> {
        if code.is_empty() {
            return Err(AuthError::MissingField(RECOVERY_HASH));
        }
        let Some(user) = self.find_by(RECOVERY_HASH, Value::from(digest(code))).await? else {
            return Err(AuthError::InvalidCode);
        };
        let id = user.id().cloned().unwrap_or_default();
        self.users
            .update_one(&Filter::by_id(id.clone()), &doc! { RECOVERY_HASH => Value::Null })
            .await?;
        self.tokens.issue(&id, TokenPurpose::Recovery)
    }

    pub async fn social_google(&self, body: &Document) -> Result<Session, AuthError> {
        let provider = self.google.as_ref().ok_or(AuthError::Disabled("Google sign-in"))?;
        let id_token = required_str(body, "id_token")?;
        let identity = provider.verify(id_token).await?;

        let _enrolling = self.enrolment.lock().await;
        if let Some(user) = self.find_by(EMAIL, Value::from(identity.email.as_str())).await? {
            return self.session_for(&user);
        }

        let mut user = doc! {
            EMAIL => identity.email.as_str(),
            "name" => identity.name,
            "picture" => identity.picture,
            PASSWORD => unusable_password()?,
            ACTIVE => true,
            "provider" => provider.name(),
        };
        let id = self.users.insert_one(user.clone()).await?;
        user.set_id(id);
        info!("Created user {} from {} sign-in", identity.email, provider.name());
        self.session_for(&user)
    }

    fn session_for(&self, user: &Document) -> Result<Session, AuthError> {
        let id = user.id().ok_or(AuthError::UnknownUser)?;
        Ok(Session {
            token: self.tokens.issue(id, TokenPurpose::Session)?,
            user: public_user(user.clone()),
        })
    }

    async fn load(&self, claims: &Claims) -> Result<Document, AuthError> {
        self.users
            .find_one(&Filter::by_id(claims.user_id()))
            .await?
            .ok_or(AuthError::UnknownUser)
    }

    async fn find_by(&self, field: &str, value: Value) -> Result<Option<Document>, AuthError> {
        let mut filter = Filter::new();
        filter.where_clause(doc! { field => value })?;
        Ok(self.users.find_one(&filter).await?)
    }
}

fn required_str<'a>(body: &'a Document, field: &'static str) -> Result<&'a str, AuthError> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingField(field))
}

/// The user document as clients may see it.
pub fn public_user(mut user: Document) -> Document {
    for field in SECRET_FIELDS {
        user.remove(field);
    }
    user
}
