//! Backend selection.
//!
//! A [`DatabaseConfig`] names the backend a [`DocumentStore`] should run on, and
//! [`connect`] builds it. Switching an application from the in-memory backend to MongoDB is
//! a configuration change only.

use bson::Bson;
use tracing::info;

use docstream_core::{
    backend::StoreBackendBuilder,
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
    store::DocumentStore,
};
use docstream_memory::InMemoryStore;

#[cfg(feature = "mongodb")]
use docstream_core::backend::StoreBackend;
#[cfg(feature = "mongodb")]
use docstream_mongodb::{MongoDbConfig, MongoDbStoreBuilder};

/// The backend a document store runs on.
#[derive(Debug, Clone)]
pub enum DatabaseConfig<D: Document> {
    /// An in-memory store pre-populated with `seed`.
    Mock { seed: Vec<D> },
    /// A MongoDB collection.
    #[cfg(feature = "mongodb")]
    Remote(MongoDbConfig),
}

impl<D: Document> DatabaseConfig<D> {
    /// An empty in-memory store.
    pub fn mock() -> Self {
        Self::Mock { seed: Vec::new() }
    }

    /// An in-memory store holding `seed`. Later documents replace earlier ones with the same id.
    pub fn seeded(seed: impl IntoIterator<Item = D>) -> Self {
        Self::Mock {
            seed: seed.into_iter().collect(),
        }
    }
}

impl<D: Document> Default for DatabaseConfig<D> {
    fn default() -> Self {
        Self::mock()
    }
}

/// Builds the backend described by `config` and returns a store over it.
///
/// # Errors
///
/// Returns `Decode` if a seed document cannot be serialized, or `Initialization` if the
/// remote backend cannot be configured.
pub async fn connect<D: Document>(config: DatabaseConfig<D>) -> DocumentStoreResult<DocumentStore<D>> {
    match config {
        DatabaseConfig::Mock { seed } => {
            let documents = seed
                .iter()
                .map(|document| -> DocumentStoreResult<(String, Bson)> {
                    Ok((document.id().to_string(), document.to_bson()?))
                })
                .collect::<DocumentStoreResult<Vec<_>>>()?;
            let seeded = documents.len();

            let backend = InMemoryStore::builder()
                .documents(documents)
                .build()
                .await?;

            info!(seeded, "connected to in-memory store");

            Ok(DocumentStore::new(backend))
        }
        #[cfg(feature = "mongodb")]
        DatabaseConfig::Remote(config) => {
            let backend = MongoDbStoreBuilder::from(config).build().await?;

            info!(collection = %backend.collection_name(), "connected to mongodb store");

            Ok(DocumentStore::new(backend))
        }
    }
}
