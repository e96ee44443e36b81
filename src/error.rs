// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::AuthError;
use crate::codec::CodecError;
use crate::database::StoreError;
use crate::filter::FilterError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    MalformedInput(String),
    BodyShape(String),
    Conflict(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (identity provider, mail relay)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::MalformedInput(_) => 400,
            ApiError::BodyShape(_) => 400,
            ApiError::Conflict(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::MalformedInput(msg) => msg,
            ApiError::BodyShape(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "status": "error",
            "statusCode": self.status_code(),
            "message": self.message(),
            "code": self.error_code()
        })
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::MalformedInput(_) => "MALFORMED_INPUT",
            ApiError::BodyShape(_) => "BODY_SHAPE",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn malformed_input(message: impl Into<String>) -> Self {
        ApiError::MalformedInput(message.into())
    }

    pub fn body_shape(message: impl Into<String>) -> Self {
        ApiError::BodyShape(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        ApiError::malformed_input(err.to_string())
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Codec(codec) => codec.into(),
            other => ApiError::malformed_input(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { .. } => ApiError::conflict(err.to_string()),
            StoreError::ImmutableId
            | StoreError::InvalidId(_)
            | StoreError::InvalidUpdate(_)
            | StoreError::InvalidCollection(_) => ApiError::body_shape(err.to_string()),
            StoreError::Corrupt { .. } => {
                tracing::error!("Store corruption: {}", err);
                ApiError::internal_server_error("Stored document could not be read")
            }
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
            StoreError::ConfigMissing(_) | StoreError::InvalidDatabaseUrl => {
                tracing::error!("Store misconfigured: {}", err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingField(_) => ApiError::body_shape(err.to_string()),
            AuthError::EmailTaken(_) => ApiError::conflict(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidCode | AuthError::ProviderRejected(_) => {
                tracing::warn!("Auth rejected: {}", err);
                ApiError::forbidden(err.to_string())
            }
            AuthError::UnknownUser | AuthError::Disabled(_) => ApiError::not_found(err.to_string()),
            AuthError::Token(_) => ApiError::unauthorized(err.to_string()),
            AuthError::Provider(_) | AuthError::Mail(_) => {
                tracing::error!("Upstream failure: {}", err);
                ApiError::bad_gateway(err.to_string())
            }
            AuthError::Hash(_) => {
                tracing::error!("{}", err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            AuthError::Filter(filter) => filter.into(),
            AuthError::Store(store) => store.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_status_and_code() {
        let body = ApiError::body_shape("Request body must be an object").to_json();
        assert_eq!(body["status"], "error");
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["code"], "BODY_SHAPE");
        assert_eq!(body["message"], "Request body must be an object");
    }

    #[test]
    fn store_errors_are_classified() {
        let dup = ApiError::from(StoreError::Duplicate {
            collection: "widgets".to_string(),
            key: "\"a\"".to_string(),
        });
        assert_eq!(dup.status_code(), 400);
        assert!(dup.message().contains("duplicate"));
        assert_eq!(ApiError::from(StoreError::ImmutableId).status_code(), 400);
        let corrupt = ApiError::from(StoreError::Corrupt {
            collection: "c".to_string(),
            key: "k".to_string(),
            reason: "bad".to_string(),
        });
        assert_eq!(corrupt.status_code(), 500);
        assert!(!corrupt.message().contains("bad"));
    }

    #[test]
    fn auth_errors_are_classified() {
        assert_eq!(ApiError::from(AuthError::InvalidCredentials).status_code(), 403);
        assert_eq!(ApiError::from(AuthError::MissingField("email")).status_code(), 400);
        assert_eq!(ApiError::from(AuthError::Provider("down".to_string())).status_code(), 502);
        assert_eq!(ApiError::from(AuthError::UnknownUser).status_code(), 404);
    }

    #[test]
    fn codec_errors_mention_json() {
        let err = crate::codec::decode("{nope").unwrap_err();
        let api = ApiError::from(err);
        assert_eq!(api.status_code(), 400);
        assert!(api.message().contains("JSON"));
    }
}
