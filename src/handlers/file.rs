// handlers/file.rs - GET /file/:collection/:object_id/:file/:type/:prop

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::files::file_bytes;
use crate::error::ApiError;
use crate::filter::Filter;
use crate::identifier::Identifier;
use crate::middleware::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct FilePath {
    collection: String,
    object_id: String,
    file: String,
    #[serde(rename = "type")]
    subtype: String,
    prop: String,
}

/// Streams the raw bytes behind a `<base>_linked` URL
pub async fn get(State(state): State<AppState>, Path(path): Path<FilePath>) -> ApiResult<Response> {
    let content_type = HeaderValue::from_str(&format!("{}/{}", path.file, path.subtype))
        .map_err(|_| ApiError::malformed_input("Invalid content type"))?;

    let handle = state.collection(&path.collection)?;
    let id = Identifier::resolve(&path.object_id).to_value();
    let doc = handle
        .find_one(&Filter::by_id(id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No document {} in {}", path.object_id, path.collection)))?;
    let value = doc
        .get_path(&path.prop)
        .ok_or_else(|| ApiError::not_found(format!("No file at {}", path.prop)))?;
    let bytes = file_bytes(value)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::HeaderName::from_static("content-transfer-encoding"),
                HeaderValue::from_static("binary"),
            ),
        ],
        bytes,
    )
        .into_response())
}
