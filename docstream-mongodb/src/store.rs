use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::{
    StreamExt, TryStreamExt, future,
    stream::{self, abortable},
};
use mongodb::{
    Client, Collection as MongoCollection,
    change_stream::event::OperationType,
    options::{ClientOptions, FindOptions, FullDocumentBeforeChangeType, FullDocumentType},
};
use tracing::{debug, trace, warn};

use docstream_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    change::{ChangeKind, Notification, RawChange},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Predicate,
    subscription::{ListenTarget, ListenerRegistration, Subscription},
};

use crate::{config::MongoDbConfig, query};

/// MongoDB-backed document store bound to a single collection.
///
/// Documents are stored with their docstream id as `_id`; the field is stripped again on
/// read, so payloads round-trip unchanged.
///
/// Subscriptions use MongoDB change streams, which require a replica set or sharded
/// cluster. Payloads for deletions are only available when the collection has pre-images
/// enabled; without them the last value seen by the stream is reported instead.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    collection: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
            collection: collection.into(),
        }
    }

    pub fn builder(dsn: &str, database: &str, collection: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database, collection)
    }

    fn get_collection(&self) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&self.collection)
    }

    async fn find_all(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection()
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| DocumentStoreError::Transport(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocumentStoreError::Transport(e.to_string()))
    }
}

/// Adds the `_id` key to a payload before it is written.
fn prepare_document(id: &str, document: Bson) -> DocumentStoreResult<Document> {
    let mut document = match document {
        Bson::Document(document) => document,
        other => {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "expected a document, got {:?}",
                other.element_type()
            )));
        }
    };

    document.insert("_id", id);

    Ok(document)
}

fn restore_document(mut document: Document) -> Bson {
    document.remove("_id");

    Bson::Document(document)
}

fn document_id(document: &Document) -> DocumentStoreResult<String> {
    match document.get("_id") {
        Some(Bson::String(id)) => Ok(id.clone()),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a string _id, got {other:?}"
        ))),
    }
}

/// Returns the watch pipeline plus the filter and options of the initial read for `target`.
fn watch_scope(target: &ListenTarget) -> (Vec<Document>, Document, FindOptions) {
    match target {
        ListenTarget::Collection => (Vec::new(), doc! {}, FindOptions::default()),
        ListenTarget::Document(id) => (
            vec![doc! {
                "$match": {
                    "$or": [
                        { "documentKey._id": id.as_str() },
                        { "operationType": "invalidate" },
                    ]
                }
            }],
            doc! { "_id": id.as_str() },
            FindOptions::default(),
        ),
        ListenTarget::Query(predicate) => {
            let (filter, options) = query::translate(predicate);

            (
                vec![doc! { "$match": query::change_filter(predicate) }],
                filter,
                options,
            )
        }
    }
}

/// Maps one change stream event to a raw change.
///
/// Returns `None` for operations that do not affect individual documents. An invalidated
/// stream is reported as a transport error, which ends the subscription.
fn classify_event(
    operation: OperationType,
    document_key: Option<Document>,
    full_document: Option<Document>,
    before_change: Option<Document>,
) -> Option<DocumentStoreResult<RawChange>> {
    let kind = match operation {
        OperationType::Insert => ChangeKind::Added,
        OperationType::Update | OperationType::Replace => ChangeKind::Modified,
        OperationType::Delete => ChangeKind::Removed,
        OperationType::Invalidate => {
            return Some(Err(DocumentStoreError::Transport(
                "change stream invalidated".to_string(),
            )));
        }
        other => {
            trace!(operation = ?other, "change event ignored");
            return None;
        }
    };

    let id = match document_key.as_ref().map(document_id) {
        Some(Ok(id)) => id,
        _ => {
            warn!(?document_key, "change event without a usable document key");
            return None;
        }
    };

    let payload = match kind {
        ChangeKind::Removed => before_change,
        _ => full_document,
    };

    Some(Ok(RawChange::new(id, kind, payload.map(restore_document))))
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn set_document(&self, id: &str, document: Bson) -> DocumentStoreResult<()> {
        self.get_collection()
            .replace_one(doc! { "_id": id }, prepare_document(id, document)?)
            .upsert(true)
            .await
            .map_err(|e| DocumentStoreError::Transport(e.to_string()))?;

        Ok(())
    }

    async fn get_document(&self, id: &str) -> DocumentStoreResult<Bson> {
        self.get_collection()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| DocumentStoreError::Transport(e.to_string()))?
            .map(restore_document)
            .ok_or_else(|| DocumentStoreError::NotFound(id.to_string(), self.collection.clone()))
    }

    async fn query_documents(&self, predicate: &Predicate) -> DocumentStoreResult<Vec<Bson>> {
        let (filter, options) = query::translate(predicate);

        Ok(
            self.get_collection()
                .find(filter)
                .with_options(options)
                .await
                .map_err(|e| DocumentStoreError::Transport(e.to_string()))?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(|e| DocumentStoreError::Transport(e.to_string()))?
                .into_iter()
                .map(restore_document)
                .collect()
        )
    }

    async fn get_all_documents(&self) -> DocumentStoreResult<Vec<Bson>> {
        Ok(
            self.find_all(doc! {}, FindOptions::default())
                .await?
                .into_iter()
                .map(restore_document)
                .collect()
        )
    }

    async fn delete_document(&self, id: &str) -> DocumentStoreResult<()> {
        self.get_collection()
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| DocumentStoreError::Transport(e.to_string()))?;

        Ok(())
    }

    async fn delete_documents(&self, ids: &[String]) -> DocumentStoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.get_collection()
            .delete_many(doc! { "_id": { "$in": ids.to_vec() } })
            .await
            .map_err(|e| DocumentStoreError::Transport(e.to_string()))?;

        Ok(())
    }

    async fn delete_all_documents(&self) -> DocumentStoreResult<()> {
        let result = self
            .get_collection()
            .delete_many(doc! {})
            .await
            .map_err(|e| DocumentStoreError::Transport(e.to_string()))?;

        debug!(collection = %self.collection, deleted = result.deleted_count, "all documents deleted");

        Ok(())
    }

    async fn subscribe(&self, target: ListenTarget) -> DocumentStoreResult<Subscription> {
        let (pipeline, filter, options) = watch_scope(&target);

        // Open the stream before the initial read so no write between the two is lost.
        let events = self
            .get_collection()
            .watch()
            .pipeline(pipeline)
            .full_document(FullDocumentType::UpdateLookup)
            .full_document_before_change(FullDocumentBeforeChangeType::WhenAvailable)
            .await
            .map_err(|e| DocumentStoreError::Transport(e.to_string()))?;

        let initial = self
            .find_all(filter, options)
            .await?
            .into_iter()
            .map(|document| -> DocumentStoreResult<RawChange> {
                Ok(RawChange::added(document_id(&document)?, restore_document(document)))
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        let changes = events.filter_map(|event| {
            future::ready(match event {
                Ok(event) => classify_event(
                    event.operation_type,
                    event.document_key,
                    event.full_document,
                    event.full_document_before_change,
                )
                .map(|change| change.map(|change| Notification::Changes(vec![change]))),
                Err(e) => Some(Err(DocumentStoreError::Transport(e.to_string()))),
            })
        });

        let (feed, handle) = abortable(
            stream::iter([Ok(Notification::Changes(initial))]).chain(changes),
        );

        debug!(collection = %self.collection, ?target, "change stream opened");

        Ok(Subscription::new(
            feed.boxed(),
            ListenerRegistration::new(move || handle.abort()),
        ))
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Builder for [`MongoDbStore`]. Parses the connection string when built.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    collection: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str, collection: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
        }
    }
}

impl From<MongoDbConfig> for MongoDbStoreBuilder {
    fn from(config: MongoDbConfig) -> Self {
        Self {
            dsn: config.dsn,
            database: config.database,
            collection: config.collection,
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
            self.collection,
        ))
    }
}
