//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait is the capability set every provider satisfies, whether it is
//! an in-memory substitute or an adapter over a remote document database. A backend is
//! bound to exactly one collection and works on BSON payloads; typing happens in
//! [`DocumentStore`](crate::store::DocumentStore).
//!
//! # Example
//!
//! ```ignore
//! use docstream::backend::StoreBackend;
//! use bson::{Bson, doc};
//!
//! let backend = MyBackendImpl::new();
//!
//! backend.set_document("u1", Bson::Document(doc! { "id": "u1", "name": "Ann" })).await?;
//! let docs = backend.get_documents(&["u1".to_string()]).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::fmt::Debug;

use crate::{
    batch,
    error::DocumentStoreResult,
    query::Predicate,
    subscription::{ListenTarget, Subscription},
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and support concurrent access from multiple async
/// tasks. Mutations must be serialized so readers never observe a partially applied change.
///
/// # Error Handling
///
/// A missing document is [`NotFound`](crate::error::DocumentStoreError::NotFound); backend
/// or network failures are [`Transport`](crate::error::DocumentStoreError::Transport).
/// Nothing is retried at this layer.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// The name of the collection this backend is bound to.
    fn collection_name(&self) -> &str;

    /// Creates the document or replaces it entirely. Never fails because the id exists.
    async fn set_document(&self, id: &str, document: Bson) -> DocumentStoreResult<()>;

    /// Retrieves a single document.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no document with that id exists at call time.
    async fn get_document(&self, id: &str) -> DocumentStoreResult<Bson>;

    /// Retrieves several documents, in the order of `ids`.
    ///
    /// Lookups run concurrently. If any id is missing or any lookup fails, the whole call
    /// fails and no partial result is returned.
    async fn get_documents(&self, ids: &[String]) -> DocumentStoreResult<Vec<Bson>> {
        batch::fan_out(ids, |id| self.get_document(id)).await
    }

    /// Retrieves the documents selected by `predicate`.
    ///
    /// Backends without a query engine may ignore the predicate and return the whole
    /// collection; such backends document the limitation.
    async fn query_documents(&self, predicate: &Predicate) -> DocumentStoreResult<Vec<Bson>>;

    /// Retrieves every document in the collection, in no particular order.
    async fn get_all_documents(&self) -> DocumentStoreResult<Vec<Bson>>;

    /// Deletes a document. Deleting a missing id succeeds.
    async fn delete_document(&self, id: &str) -> DocumentStoreResult<()>;

    /// Deletes several documents concurrently. Any single failure fails the call.
    async fn delete_documents(&self, ids: &[String]) -> DocumentStoreResult<()> {
        batch::fan_out_unit(ids, |id| self.delete_document(id)).await
    }

    /// Deletes every document in the collection.
    async fn delete_all_documents(&self) -> DocumentStoreResult<()>;

    /// Registers a listener for `target`.
    ///
    /// The first notification on the returned feed describes the current state of the
    /// target. The registration stays active until released.
    async fn subscribe(&self, target: ListenTarget) -> DocumentStoreResult<Subscription>;

    /// Releases backend resources such as connections. The default is a no-op.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Factory trait for creating backend instances from configuration.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
