//! In-memory storage implementation for document stores.
//!
//! Documents live in a single ordered map behind an async-aware read-write lock. Every
//! mutation is applied under the write lock and the resulting map is then published to all
//! registered observers before the lock is released, so observers see mutations in program
//! order and never a partially applied one.

use async_trait::async_trait;
use bson::Bson;
use futures::{
    StreamExt,
    channel::mpsc::{self, UnboundedSender},
};
use mea::rwlock::RwLock;
use std::{
    fmt::{self, Debug},
    sync::Arc,
};
use tracing::debug;

use docstream_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    change::{Notification, Snapshot},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Predicate,
    subscription::{ListenTarget, ListenerRegistration, Subscription},
};

/// Collection name used when none is configured.
pub const DEFAULT_COLLECTION: &str = "memory";

type Observer = UnboundedSender<DocumentStoreResult<Notification>>;

#[derive(Default)]
struct MemoryState {
    documents: Snapshot,
    observers: Vec<Observer>,
}

impl MemoryState {
    /// Sends the current map to every observer, dropping the ones that are gone.
    fn publish(&mut self) {
        let snapshot = Arc::new(self.documents.clone());

        self.observers.retain(|observer| {
            observer
                .unbounded_send(Ok(Notification::Snapshot(snapshot.clone())))
                .is_ok()
        });
    }
}

impl Debug for MemoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryState")
            .field("documents", &self.documents.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Thread-safe in-memory document storage backend.
///
/// Behaves as a stand-in for a remote document database: upserts replace whole documents,
/// reads of missing ids fail with `NotFound`, deletes are idempotent, and subscriptions
/// receive the current collection on registration and after every mutation.
///
/// # Limitations
///
/// [`query_documents`](StoreBackend::query_documents) ignores the predicate and returns the
/// whole collection. Reproducing a real query engine is out of scope.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state. Clones share the
/// same documents and observers.
///
/// # Example
///
/// ```ignore
/// use docstream_memory::InMemoryStore;
/// use docstream::backend::StoreBackend;
/// use bson::{Bson, doc};
///
/// let store = InMemoryStore::new();
/// store.set_document("u1", Bson::Document(doc! { "id": "u1", "name": "Ann" })).await?;
/// assert_eq!(store.get_all_documents().await?.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    name: Arc<str>,
    state: Arc<RwLock<MemoryState>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store bound to the default collection name.
    pub fn new() -> Self {
        Self::with_documents(DEFAULT_COLLECTION, Snapshot::new())
    }

    /// Creates a store bound to `collection` and seeded with `documents`.
    pub fn with_documents(collection: &str, documents: Snapshot) -> Self {
        Self {
            name: Arc::from(collection),
            state: Arc::new(RwLock::new(MemoryState {
                documents,
                observers: Vec::new(),
            })),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the number of registrations that have not been released.
    pub async fn observer_count(&self) -> usize {
        let mut state = self.state.write().await;
        state.observers.retain(|observer| !observer.is_closed());
        state.observers.len()
    }

    /// Applies `mutation` under the write lock and publishes the resulting map.
    async fn mutate<R>(&self, mutation: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut state = self.state.write().await;
        let result = mutation(&mut state.documents);
        state.publish();

        result
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    fn collection_name(&self) -> &str {
        &self.name
    }

    async fn set_document(&self, id: &str, document: Bson) -> DocumentStoreResult<()> {
        let replaced = self
            .mutate(|documents| documents.insert(id.to_string(), document))
            .await
            .is_some();

        debug!(collection = %self.name, id, replaced, "document set");

        Ok(())
    }

    async fn get_document(&self, id: &str) -> DocumentStoreResult<Bson> {
        self.state
            .read()
            .await
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| DocumentStoreError::NotFound(id.to_string(), self.name.to_string()))
    }

    async fn query_documents(&self, predicate: &Predicate) -> DocumentStoreResult<Vec<Bson>> {
        if !predicate.is_unrestricted() {
            debug!(collection = %self.name, ?predicate, "predicate ignored by in-memory backend");
        }

        self.get_all_documents().await
    }

    async fn get_all_documents(&self) -> DocumentStoreResult<Vec<Bson>> {
        Ok(self
            .state
            .read()
            .await
            .documents
            .values()
            .cloned()
            .collect())
    }

    async fn delete_document(&self, id: &str) -> DocumentStoreResult<()> {
        let existed = self
            .mutate(|documents| documents.remove(id))
            .await
            .is_some();

        debug!(collection = %self.name, id, existed, "document deleted");

        Ok(())
    }

    async fn delete_all_documents(&self) -> DocumentStoreResult<()> {
        let count = self
            .mutate(|documents| {
                let count = documents.len();
                documents.clear();
                count
            })
            .await;

        debug!(collection = %self.name, count, "all documents deleted");

        Ok(())
    }

    async fn subscribe(&self, target: ListenTarget) -> DocumentStoreResult<Subscription> {
        if let ListenTarget::Query(predicate) = &target {
            if !predicate.is_unrestricted() {
                debug!(collection = %self.name, ?predicate, "predicate ignored by in-memory backend");
            }
        }

        let (observer, feed) = mpsc::unbounded();
        let mut state = self.state.write().await;

        // The whole map is published regardless of target; the stream narrows it down.
        observer
            .unbounded_send(Ok(Notification::Snapshot(Arc::new(state.documents.clone()))))
            .map_err(|err| DocumentStoreError::Transport(err.to_string()))?;

        let registration = {
            let observer = observer.clone();
            ListenerRegistration::new(move || observer.close_channel())
        };

        state.observers.push(observer);

        debug!(
            collection = %self.name,
            ?target,
            observers = state.observers.len(),
            "listener registered"
        );

        Ok(Subscription::new(feed.boxed(), registration))
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docstream_memory::InMemoryStore;
/// use docstream::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .collection("users")
///     .document("u1", Bson::Document(doc! { "id": "u1", "name": "Ann" }))
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    collection: Option<String>,
    documents: Snapshot,
}

impl InMemoryStoreBuilder {
    /// Sets the collection name reported by the store and used in error messages.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Seeds one document. A later document with the same id replaces an earlier one.
    pub fn document(mut self, id: impl Into<String>, document: Bson) -> Self {
        self.documents.insert(id.into(), document);
        self
    }

    /// Seeds several documents.
    pub fn documents<I, S>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = (S, Bson)>,
        S: Into<String>,
    {
        self.documents.extend(
            documents
                .into_iter()
                .map(|(id, document)| (id.into(), document)),
        );
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds the store. Always succeeds.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::with_documents(
            self.collection.as_deref().unwrap_or(DEFAULT_COLLECTION),
            self.documents,
        ))
    }
}
