/// All errors that can be returned by a FieldStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store's access rules rejected the operation.
    #[error("permission denied on {collection}")]
    PermissionDenied { collection: String },

    /// No document with the given id exists in the collection.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// The collection path does not name a collection
    /// (`visits` and `visits/{id}/observations` are valid, `visits/{id}` is not).
    #[error("invalid collection path: {path}")]
    InvalidPath { path: String },

    /// A record could not be encoded into a document.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A stored document does not have the shape of the requested record.
    #[error("document {collection}/{id} could not be decoded: {message}")]
    Decode {
        collection: String,
        id: String,
        message: String,
    },

    /// A backend-specific failure (I/O, serialization, connection, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True for the permission-denied subdivision; everything else is a
    /// generic failure from the caller's point of view.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied { .. })
    }
}
