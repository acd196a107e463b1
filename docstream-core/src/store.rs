//! The typed document store facade.
//!
//! [`DocumentStore`] is the single type applications hold. It is bound to one backend at
//! construction and forwards every operation to it, converting between the document type
//! and the backend's BSON payloads on the way.
//!
//! # Example
//!
//! ```ignore
//! use docstream::{store::DocumentStore, memory::InMemoryStore};
//!
//! let users = DocumentStore::<User>::new(InMemoryStore::new());
//! users.set(&User { id: "u1".into(), name: "Ann".into() }).await?;
//! let ann = users.get_document("u1").await?;
//! ```

use bson::Bson;
use std::{
    fmt::{self, Debug},
    marker::PhantomData,
    sync::Arc,
};
use tracing::info;

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
    query::Predicate,
    stream::{ChangeStream, DocumentStream, SnapshotStream},
    subscription::ListenTarget,
};

/// A strongly-typed document store over a single backend.
///
/// Cloning is cheap; clones share the backend.
pub struct DocumentStore<D: Document> {
    backend: Arc<dyn StoreBackend>,
    _marker: PhantomData<fn() -> D>,
}

impl<D: Document> DocumentStore<D> {
    /// Creates a document store with the given backend.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    /// Creates a document store over an already shared backend.
    pub fn from_shared(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }

    /// Returns the name of the collection the backend is bound to.
    pub fn collection_name(&self) -> &str {
        self.backend.collection_name()
    }

    /// Creates or replaces the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the document cannot be serialized, or the backend's error.
    pub async fn set_document(&self, id: &str, document: &D) -> DocumentStoreResult<()> {
        self.backend
            .set_document(id, document.to_bson()?)
            .await
    }

    /// Creates or replaces a document under its own id.
    pub async fn set(&self, document: &D) -> DocumentStoreResult<()> {
        self.set_document(document.id(), document).await
    }

    /// Retrieves the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if it does not exist, or `Decode` if the payload does not decode.
    pub async fn get_document(&self, id: &str) -> DocumentStoreResult<D> {
        D::from_bson(self.backend.get_document(id).await?)
    }

    /// Retrieves several documents in the order of `ids`.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any id is missing or any payload fails to decode.
    pub async fn get_documents<I, S>(&self, ids: I) -> DocumentStoreResult<Vec<D>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>();

        decode_all(self.backend.get_documents(&ids).await?)
    }

    /// Retrieves the documents selected by `predicate`.
    ///
    /// The in-memory backend ignores the predicate and returns the whole collection.
    pub async fn get_documents_by_query(&self, predicate: &Predicate) -> DocumentStoreResult<Vec<D>> {
        decode_all(self.backend.query_documents(predicate).await?)
    }

    /// Retrieves every document in the collection.
    pub async fn get_all_documents(&self) -> DocumentStoreResult<Vec<D>> {
        decode_all(self.backend.get_all_documents().await?)
    }

    /// Watches a single document.
    ///
    /// The stream yields the current value once the document exists and again on every
    /// change. It never yields while the document is absent.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the listener cannot be registered.
    pub async fn stream_document(&self, id: &str) -> DocumentStoreResult<DocumentStream<D>> {
        let subscription = self
            .backend
            .subscribe(ListenTarget::Document(id.to_string()))
            .await?;

        Ok(DocumentStream::new(subscription, id))
    }

    /// Watches the whole collection, yielding a full snapshot on every change.
    pub async fn stream_all_documents(&self) -> DocumentStoreResult<SnapshotStream<D>> {
        let subscription = self
            .backend
            .subscribe(ListenTarget::Collection)
            .await?;

        Ok(SnapshotStream::new(subscription))
    }

    /// Watches the documents selected by `predicate`, yielding them all on every change.
    ///
    /// The in-memory backend ignores the predicate and watches the whole collection.
    pub async fn stream_documents_by_query(
        &self,
        predicate: &Predicate,
    ) -> DocumentStoreResult<SnapshotStream<D>> {
        let subscription = self
            .backend
            .subscribe(ListenTarget::Query(predicate.clone()))
            .await?;

        Ok(SnapshotStream::new(subscription))
    }

    /// Watches the documents selected by `predicate`, yielding one event per changed document.
    pub async fn stream_changes_by_query(
        &self,
        predicate: &Predicate,
    ) -> DocumentStoreResult<ChangeStream<D>> {
        let subscription = self
            .backend
            .subscribe(ListenTarget::Query(predicate.clone()))
            .await?;

        Ok(ChangeStream::new(subscription))
    }

    /// Watches the whole collection, yielding one event per changed document.
    ///
    /// Preferred over [`stream_all_documents`](Self::stream_all_documents) for large
    /// collections, since unchanged documents are not re-sent.
    pub async fn stream_changes(&self) -> DocumentStoreResult<ChangeStream<D>> {
        let subscription = self
            .backend
            .subscribe(ListenTarget::Collection)
            .await?;

        Ok(ChangeStream::new(subscription))
    }

    /// Deletes the document stored under `id`. Succeeds if it does not exist.
    pub async fn delete_document(&self, id: &str) -> DocumentStoreResult<()> {
        self.backend.delete_document(id).await
    }

    /// Deletes several documents.
    pub async fn delete_documents<I, S>(&self, ids: I) -> DocumentStoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>();

        self.backend.delete_documents(&ids).await
    }

    /// Deletes every document in the collection.
    pub async fn delete_all_documents(&self) -> DocumentStoreResult<()> {
        self.backend.delete_all_documents().await
    }

    /// Shuts down the backend. Other clones of this store become unusable.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        info!(collection = %self.collection_name(), "shutting down document store");

        self.backend.shutdown().await
    }
}

fn decode_all<D: Document>(payloads: Vec<Bson>) -> DocumentStoreResult<Vec<D>> {
    payloads
        .into_iter()
        .map(D::from_bson)
        .collect()
}

impl<D: Document> Clone for DocumentStore<D> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            _marker: PhantomData,
        }
    }
}

impl<D: Document> Debug for DocumentStore<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("backend", &self.backend)
            .finish()
    }
}
