//! Error types and result types for document store operations.
//!
//! Every backend reports failures through [`DocumentStoreError`]. Use
//! [`DocumentStoreResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// None of these are retried by the store layer; they are surfaced to the immediate caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentStoreError {
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    NotFound(String, String),
    /// A payload could not be converted to or from the target document type.
    ///
    /// Fatal for one-shot reads. Inside an active stream the offending record is skipped instead.
    #[error("Decode error: {0}")]
    Decode(String),
    /// An opaque failure of the backend or the network beneath it.
    ///
    /// Fatal to the in-flight operation. Streams yield it once and then terminate.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The document does not have the structure the backend requires (e.g. it is not a map).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl DocumentStoreError {
    /// Returns `true` if this error reports a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::NotFound(..))
    }

    /// Returns `true` if this error came from the backend transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, DocumentStoreError::Transport(_))
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Decode(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Decode(err.to_string())
    }
}
