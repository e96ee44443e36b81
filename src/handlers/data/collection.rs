// handlers/data/collection.rs - Collection-wide routes on /:collection

use axum::extract::{Path, Query, State};
use tracing::debug;

use super::utils::{bulk_items, insert_items};
use crate::api::format::{self, BulkOutcome};
use crate::api::files;
use crate::filter::{query, Filter};
use crate::middleware::{ApiResult, ExtJson, ExtJsonBody};
use crate::state::AppState;

/// GET /:collection - filtered, sorted, paged listing
pub async fn get(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    let filter = query::translate(&params, &state.filter_options())?;
    let mut docs = handle.find(&filter).await?;
    for doc in docs.iter_mut() {
        files::virtualize(handle.name(), doc);
    }
    Ok(ExtJson::documents(&docs))
}

/// POST /:collection - one document or an array, all or nothing
pub async fn post(State(state): State<AppState>, Path(collection): Path<String>, body: ExtJsonBody) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    let docs = insert_items(body.0)?;
    let ids = handle.insert_many(docs).await?;
    Ok(ExtJson::document(&format::insert_result(&ids)))
}

/// PATCH /:collection - `$set` per item, each addressed by its own `_id`
pub async fn patch(State(state): State<AppState>, Path(collection): Path<String>, body: ExtJsonBody) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    let items = bulk_items(body.array()?)?;
    let mut outcome = BulkOutcome::default();
    for (index, id, set) in items {
        outcome.record(index, handle.update_one(&Filter::by_id(id), &set).await);
    }
    debug!("bulk update on {}: {} errors", handle.name(), outcome.write_errors.len());
    Ok(ExtJson::document(&outcome.into_document(false)))
}

/// PUT /:collection - replace per item, inserting the ones that do not exist
pub async fn put(State(state): State<AppState>, Path(collection): Path<String>, body: ExtJsonBody) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    let items = bulk_items(body.array()?)?;
    let mut outcome = BulkOutcome::default();
    for (index, id, replacement) in items {
        outcome.record(index, handle.replace_one(&Filter::by_id(id), replacement, true).await);
    }
    debug!("bulk replace on {}: {} errors", handle.name(), outcome.write_errors.len());
    Ok(ExtJson::document(&outcome.into_document(true)))
}

/// DELETE /:collection - an empty filter removes everything
pub async fn delete(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<ExtJson> {
    let handle = state.collection(&collection)?;
    let filter = query::translate(&params, &state.filter_options())?;
    let result = handle.delete_many(&filter).await?;
    Ok(ExtJson::document(&format::delete_result(&result)))
}
