use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::codec;
use crate::error::ApiError;
use crate::value::{Document, Value};

pub type ApiResult<T> = Result<T, ApiError>;

/// Request body decoded as extended JSON whatever the `Content-Type` says.
/// An empty body is `None`.
#[derive(Debug)]
pub struct ExtJsonBody(pub Option<Value>);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for ExtJsonBody {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let text = String::from_request(req, state).await.map_err(IntoResponse::into_response)?;
        codec::decode(&text)
            .map(ExtJsonBody)
            .map_err(|e| ApiError::from(e).into_response())
    }
}

impl ExtJsonBody {
    /// Body as a single document; anything else (including no body) is rejected.
    pub fn document(self) -> ApiResult<Document> {
        match self.0 {
            Some(Value::Document(doc)) => Ok(doc),
            _ => Err(ApiError::body_shape("Request body must be an object")),
        }
    }

    pub fn array(self) -> ApiResult<Vec<Value>> {
        match self.0 {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ApiError::body_shape("Request body must be an array")),
        }
    }
}

/// Extended-JSON response with an explicit status
#[derive(Debug)]
pub struct ExtJson {
    status: StatusCode,
    body: serde_json::Value,
}

impl ExtJson {
    pub fn document(doc: &Document) -> Self {
        Self {
            status: StatusCode::OK,
            body: codec::document_to_json(doc),
        }
    }

    pub fn documents(docs: &[Document]) -> Self {
        Self {
            status: StatusCode::OK,
            body: serde_json::Value::Array(docs.iter().map(codec::document_to_json).collect()),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for ExtJson {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
