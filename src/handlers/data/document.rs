// handlers/data/document.rs - Single-document routes on /:collection/:id

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use super::utils::resolve_id;
use crate::api::{files, format};
use crate::filter::Filter;
use crate::middleware::{ApiResult, ExtJson, ExtJsonBody};
use crate::state::AppState;
use crate::value::Document;

/// Write results for a point lookup that matched nothing keep their body but answer 404.
fn status_for(hits: u64) -> StatusCode {
    if hits == 1 {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// GET /:collection/:id
pub async fn get(State(state): State<AppState>, Path((collection, id)): Path<(String, String)>) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    match handle.find_one(&Filter::by_id(resolve_id(&id))).await? {
        Some(mut doc) => {
            files::virtualize(handle.name(), &mut doc);
            Ok(ExtJson::document(&doc))
        }
        None => Ok(ExtJson::document(&Document::new()).with_status(StatusCode::NOT_FOUND)),
    }
}

/// POST /:collection/:id
pub async fn post(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    body: ExtJsonBody,
) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    let mut doc = body.document()?;
    doc.set_id(resolve_id(&id));
    let inserted = handle.insert_one(doc).await?;
    Ok(ExtJson::document(&format::insert_result(&[inserted])))
}

/// PATCH /:collection/:id - `$set` the body's fields
pub async fn patch(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    body: ExtJsonBody,
) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    let set = body.document()?;
    let result = handle.update_one(&Filter::by_id(resolve_id(&id)), &set).await?;
    Ok(ExtJson::document(&format::update_result(&result)).with_status(status_for(result.matched_count)))
}

/// PUT /:collection/:id - replace everything but `_id`
pub async fn put(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    body: ExtJsonBody,
) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    let replacement = body.document()?;
    let result = handle
        .replace_one(&Filter::by_id(resolve_id(&id)), replacement, false)
        .await?;
    Ok(ExtJson::document(&format::update_result(&result)).with_status(status_for(result.matched_count)))
}

/// DELETE /:collection/:id
pub async fn delete(State(state): State<AppState>, Path((collection, id)): Path<(String, String)>) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    let result = handle.delete_one(&Filter::by_id(resolve_id(&id))).await?;
    Ok(ExtJson::document(&format::delete_result(&result)).with_status(status_for(result.deleted_count)))
}
