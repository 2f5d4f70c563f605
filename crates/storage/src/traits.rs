use std::sync::Arc;

use async_trait::async_trait;

use crate::document::{Document, Query, StoredDocument};
use crate::error::StoreError;

/// The remote document store as seen by the field-visit core.
///
/// Collections are addressed by slash-separated paths with an odd number of
/// segments: `visits`, `visits/{visit_id}/observations`. Documents are JSON
/// objects; ids are assigned by the store on `create`.
///
/// ## Server timestamps
///
/// Top-level fields holding [`server_timestamp`](crate::server_timestamp) in
/// a `create` document or `update` patch are resolved by the store to its own
/// write-time clock.
///
/// ## Failure
///
/// Access-rule rejections surface as [`StoreError::PermissionDenied`]; a
/// missing document on `get`/`update` as [`StoreError::NotFound`]. No
/// operation is retried by the store.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a store can be shared
/// between the visit controller, cascades and task screens.
#[async_trait]
pub trait FieldStore: Send + Sync + 'static {
    /// Create a document with a store-assigned id. Returns the stored
    /// document with sentinels resolved.
    async fn create(&self, collection: &str, document: Document)
        -> Result<StoredDocument, StoreError>;

    /// Shallow-merge `patch` into an existing document and return the result.
    ///
    /// Returns `Err(StoreError::NotFound)` if the document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<StoredDocument, StoreError>;

    /// Read a single document.
    ///
    /// Returns `Err(StoreError::NotFound)` if the document does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<StoredDocument, StoreError>;

    /// Run an equality-filter query over one collection.
    async fn query(&self, collection: &str, query: &Query)
        -> Result<Vec<StoredDocument>, StoreError>;
}

#[async_trait]
impl<S: FieldStore> FieldStore for Arc<S> {
    async fn create(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<StoredDocument, StoreError> {
        (**self).create(collection, document).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<StoredDocument, StoreError> {
        (**self).update(collection, id, patch).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<StoredDocument, StoreError> {
        (**self).get(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        (**self).query(collection, query).await
    }
}
