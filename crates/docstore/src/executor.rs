//! Operation executors
//!
//! Every executor takes a session copy, resolves the handle's collection,
//! runs one driver call, normalizes "not found" where absence is expected,
//! and releases the session when it returns.

use crate::connection::CollectionHandle;
use crate::error::normalize_not_found;
use crate::ops::{
    is_operator_document, operator_form, projection, BulkFailure, BulkInsert, BulkResult,
    ChangeInfo, Find, FindAll, FindById, Insert, Remove, RemoveAll, Update, UpdateAll, Upsert,
    UpsertAll,
};
use crate::{DocStoreError, Result};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    error::ErrorKind,
    options::{
        FindOneOptions, FindOptions as DriverFindOptions, InsertManyOptions, ReplaceOptions,
        UpdateOptions,
    },
    results::UpdateResult,
};
use tracing::{debug, warn};

fn change_info(result: UpdateResult) -> ChangeInfo {
    ChangeInfo {
        matched: result.matched_count,
        modified: result.modified_count,
        removed: 0,
        upserted_id: result.upserted_id,
    }
}

impl CollectionHandle {
    /// Insert one document, returning its id
    pub async fn insert(&self, op: &Insert) -> Result<Bson> {
        let (_session, collection) = self.session()?;

        let result = collection.insert_one(&op.data).await?;

        debug!("Inserted document {} into {}", result.inserted_id, self.name());
        Ok(result.inserted_id)
    }

    /// Insert many documents in one unordered batch
    ///
    /// Documents rejected by the server are listed in
    /// [`BulkResult::failures`]; the rest of the batch is still inserted.
    pub async fn bulk_insert(&self, op: &BulkInsert) -> Result<BulkResult> {
        if op.data.is_empty() {
            return Ok(BulkResult::default());
        }

        let (_session, collection) = self.session()?;
        let total = op.data.len();
        let options = InsertManyOptions::builder().ordered(false).build();

        let outcome = collection.insert_many(&op.data).with_options(options).await;

        let result = match outcome {
            Ok(result) => BulkResult {
                inserted: result.inserted_ids.len() as u64,
                failures: Vec::new(),
            },
            Err(e) => {
                let failures = match e.kind.as_ref() {
                    ErrorKind::InsertMany(failure) if failure.write_concern_error.is_none() => {
                        failure.write_errors.as_ref().map(|errors| {
                            errors
                                .iter()
                                .map(|w| BulkFailure {
                                    index: w.index,
                                    code: w.code,
                                    message: w.message.clone(),
                                })
                                .collect::<Vec<_>>()
                        })
                    }
                    _ => None,
                };

                match failures {
                    Some(failures) => BulkResult {
                        inserted: total.saturating_sub(failures.len()) as u64,
                        failures,
                    },
                    None => return Err(e.into()),
                }
            }
        };

        debug!(
            "Bulk inserted {}/{} documents into {}",
            result.inserted,
            total,
            self.name()
        );
        Ok(result)
    }

    /// Replace the document with the given id
    ///
    /// An operator document (`$set`, ...) is applied as an update instead.
    /// A missing id is not an error: the result is all zeros.
    pub async fn update(&self, op: &Update) -> Result<ChangeInfo> {
        let id = op.object_id()?;
        normalize_not_found(self.write_by_id(id, &op.data, false).await)
    }

    /// Replace the document with the given id, inserting it when absent
    pub async fn upsert(&self, op: &Upsert) -> Result<ChangeInfo> {
        let id = op.object_id()?;
        normalize_not_found(self.write_by_id(id, &op.data, true).await)
    }

    async fn write_by_id(&self, id: ObjectId, data: &Document, upsert: bool) -> Result<ChangeInfo> {
        let (_session, collection) = self.session()?;
        let filter = doc! { "_id": id };

        let result = if is_operator_document(data) {
            let options = UpdateOptions::builder().upsert(upsert).build();
            collection
                .update_one(filter, data.clone())
                .with_options(options)
                .await?
        } else {
            let options = ReplaceOptions::builder().upsert(upsert).build();
            collection
                .replace_one(filter, data)
                .with_options(options)
                .await?
        };

        let info = change_info(result);
        debug!(
            "Wrote {} in {}: matched {}, modified {}, upserted {}",
            id,
            self.name(),
            info.matched,
            info.modified,
            info.upserted()
        );

        if info.matched == 0 && !info.upserted() {
            return Err(DocStoreError::not_found(format!("{}/{}", self.name(), id)));
        }
        Ok(info)
    }

    /// Update every document matching the filter
    pub async fn update_all(&self, op: &UpdateAll) -> Result<ChangeInfo> {
        normalize_not_found(self.write_many(&op.query, &op.data, false).await)
    }

    /// Update every document matching the filter, inserting one when none match
    pub async fn upsert_all(&self, op: &UpsertAll) -> Result<ChangeInfo> {
        normalize_not_found(self.write_many(&op.query, &op.data, true).await)
    }

    async fn write_many(&self, query: &Document, data: &Document, upsert: bool) -> Result<ChangeInfo> {
        let (_session, collection) = self.session()?;
        let options = UpdateOptions::builder().upsert(upsert).build();

        let result = collection
            .update_many(query.clone(), operator_form(data))
            .with_options(options)
            .await?;

        let info = change_info(result);
        debug!(
            "Updated many in {}: matched {}, modified {}, upserted {}",
            self.name(),
            info.matched,
            info.modified,
            info.upserted()
        );
        Ok(info)
    }

    /// Fetch one document by id
    ///
    /// A missing id yields `Ok(None)`.
    pub async fn find_by_id(&self, op: &FindById) -> Result<Option<Document>> {
        let id = op.object_id()?;
        let (_session, collection) = self.session()?;

        let mut options = FindOneOptions::default();
        options.projection = projection(&op.fields);

        let record = collection
            .find_one(doc! { "_id": id })
            .with_options(options)
            .await?;

        debug!("Find {} in {}: found {}", id, self.name(), record.is_some());
        Ok(record)
    }

    /// Fetch documents matching the filter, honouring skip then limit
    pub async fn find(&self, op: &Find) -> Result<Vec<Document>> {
        let mut options = DriverFindOptions::default();
        options.projection = projection(&op.fields);
        op.options.apply(&mut options);

        self.find_with(op.query.clone(), options).await
    }

    /// Fetch every document in the collection
    pub async fn find_all(&self, op: &FindAll) -> Result<Vec<Document>> {
        let mut options = DriverFindOptions::default();
        options.projection = projection(&op.fields);

        self.find_with(Document::new(), options).await
    }

    async fn find_with(&self, filter: Document, options: DriverFindOptions) -> Result<Vec<Document>> {
        let (_session, collection) = self.session()?;

        let cursor = collection.find(filter).with_options(options).await?;
        let records: Vec<Document> = cursor.try_collect().await?;

        debug!("Found {} documents in {}", records.len(), self.name());
        Ok(records)
    }

    /// Remove the first document matching the filter
    ///
    /// Nothing matching is not an error: the result is all zeros.
    pub async fn remove(&self, op: &Remove) -> Result<ChangeInfo> {
        normalize_not_found(self.remove_one(&op.query).await)
    }

    async fn remove_one(&self, query: &Document) -> Result<ChangeInfo> {
        let (_session, collection) = self.session()?;

        let result = collection.delete_one(query.clone()).await?;

        debug!("Removed {} documents from {}", result.deleted_count, self.name());
        if result.deleted_count == 0 {
            return Err(DocStoreError::not_found(format!(
                "{}: no document matches {}",
                self.name(),
                query
            )));
        }

        Ok(ChangeInfo {
            matched: result.deleted_count,
            removed: result.deleted_count,
            ..Default::default()
        })
    }

    /// Remove every document in the collection
    pub async fn remove_all(&self, _op: &RemoveAll) -> Result<ChangeInfo> {
        let (_session, collection) = self.session()?;

        warn!(
            "Removing every document from {}.{}",
            self.connection().database_name(),
            self.name()
        );
        let result = collection.delete_many(doc! {}).await?;

        debug!("Removed {} documents from {}", result.deleted_count, self.name());
        Ok(ChangeInfo {
            matched: result.deleted_count,
            removed: result.deleted_count,
            ..Default::default()
        })
    }
}
