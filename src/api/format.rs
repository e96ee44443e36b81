//! Write-result bodies returned by the data routes.

use crate::database::{DeleteResult, StoreError, UpdateResult};
use crate::doc;
use crate::error::ApiError;
use crate::value::{Document, Value};

/// `{result:{ok,n}, insertedCount, insertedIds:{"0": id, ...}}`
pub fn insert_result(ids: &[Value]) -> Document {
    let inserted_ids: Document = ids
        .iter()
        .enumerate()
        .map(|(index, id)| (index.to_string(), id.clone()))
        .collect();
    doc! {
        "result" => doc! { "ok" => 1, "n" => ids.len() },
        "insertedCount" => ids.len(),
        "insertedIds" => inserted_ids,
    }
}

/// `{result:{ok,n,nModified}, matchedCount, modifiedCount}` for a single update or replace.
pub fn update_result(result: &UpdateResult) -> Document {
    doc! {
        "result" => doc! { "ok" => 1, "n" => result.matched_count, "nModified" => result.modified_count },
        "matchedCount" => result.matched_count,
        "modifiedCount" => result.modified_count,
    }
}

pub fn delete_result(result: &DeleteResult) -> Document {
    doc! {
        "result" => doc! { "ok" => 1, "n" => result.deleted_count },
        "deletedCount" => result.deleted_count,
    }
}

/// A bulk item the store refused.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteError {
    pub index: usize,
    pub code: u16,
    pub message: String,
}

/// Aggregated result of applying bulk items one at a time.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted: Vec<(usize, Value)>,
    pub write_errors: Vec<WriteError>,
}

impl BulkOutcome {
    pub fn record(&mut self, index: usize, result: Result<UpdateResult, StoreError>) {
        match result {
            Ok(update) => {
                self.matched += update.matched_count;
                self.modified += update.modified_count;
                if let Some(id) = update.upserted_id {
                    self.upserted.push((index, id));
                }
            }
            Err(err) => {
                let api = ApiError::from(err);
                self.write_errors.push(WriteError {
                    index,
                    code: api.status_code(),
                    message: api.message().to_string(),
                });
            }
        }
    }

    /// Result body; the upsert fields appear only for operations that upsert.
    pub fn into_document(self, upserts: bool) -> Document {
        let upserted_count = self.upserted.len() as u64;
        let mut result = doc! {
            "ok" => 1,
            "n" => self.matched + upserted_count,
            "nModified" => self.modified,
        };
        if upserts {
            result.insert("nUpserted", upserted_count);
        }

        let mut body = doc! {
            "result" => result,
            "matchedCount" => self.matched,
            "modifiedCount" => self.modified,
        };
        if upserts {
            let ids: Document = self
                .upserted
                .into_iter()
                .map(|(index, id)| (index.to_string(), id))
                .collect();
            body.insert("upsertedCount", upserted_count);
            body.insert("upsertedIds", ids);
        }
        if !self.write_errors.is_empty() {
            let errors: Vec<Value> = self
                .write_errors
                .into_iter()
                .map(|e| {
                    Value::Document(doc! {
                        "index" => e.index,
                        "code" => e.code as i32,
                        "errmsg" => e.message,
                    })
                })
                .collect();
            body.insert("writeErrors", errors);
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_ids_are_keyed_by_position() {
        let body = insert_result(&[Value::from("a"), Value::Int(2)]);
        assert_eq!(body.get_path("result.n"), Some(&Value::Int(2)));
        assert_eq!(body.get_path("insertedIds.0"), Some(&Value::from("a")));
        assert_eq!(body.get_path("insertedIds.1"), Some(&Value::Int(2)));
    }

    #[test]
    fn bulk_outcome_aggregates_counts_and_failures() {
        let mut outcome = BulkOutcome::default();
        outcome.record(
            0,
            Ok(UpdateResult {
                matched_count: 1,
                modified_count: 1,
                upserted_id: None,
            }),
        );
        outcome.record(
            1,
            Ok(UpdateResult {
                matched_count: 0,
                modified_count: 0,
                upserted_id: Some(Value::from("id-3")),
            }),
        );
        outcome.record(2, Err(StoreError::ImmutableId));

        let body = outcome.into_document(true);
        assert_eq!(body.get_path("result.nModified"), Some(&Value::Int(1)));
        assert_eq!(body.get_path("result.nUpserted"), Some(&Value::Int(1)));
        assert_eq!(body.get_path("result.n"), Some(&Value::Int(2)));
        assert_eq!(body.get_path("upsertedIds.1"), Some(&Value::from("id-3")));
        assert_eq!(body.get_path("writeErrors.0.index"), Some(&Value::Int(2)));
        assert_eq!(body.get_path("writeErrors.0.code"), Some(&Value::Int(400)));
    }

    #[test]
    fn update_bodies_omit_upsert_fields() {
        let body = BulkOutcome::default().into_document(false);
        assert!(body.get("upsertedIds").is_none());
        assert!(body.get("writeErrors").is_none());
        assert_eq!(body.get_path("result.ok"), Some(&Value::Int(1)));
    }
}
