//! Main docstream crate providing a unified interface for document storage.
//!
//! This crate is the primary entry point for users of docstream. It re-exports the core
//! types from the sub-crates, gives access to the storage backends, and provides
//! [`connect`] to build a store from a [`DatabaseConfig`].
//!
//! # Features
//!
//! - **Type-safe document storage** - Define your data structures with Serde and store them safely
//! - **Swappable backends** - In-memory and MongoDB storage behind one trait
//! - **Live change streams** - Watch a document, a whole collection, or individual changes
//! - **Order-preserving batches** - Multi-id reads run concurrently and return in request order
//!
//! # Quick Start
//!
//! ```ignore
//! use docstream::{prelude::*, DatabaseConfig};
//! use futures::StreamExt;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: String,
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> &str { &self.id }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let users = docstream::connect(DatabaseConfig::<User>::mock()).await?;
//!
//!     let mut changes = users.stream_changes().await?;
//!
//!     users.set(&User { id: "u1".into(), name: "Alice".into() }).await?;
//!
//!     if let Some(event) = changes.next().await {
//!         println!("{:?}", event?);
//!     }
//!
//!     let alice = users.get_document("u1").await?;
//!     let both = users.get_documents(["u1", "u1"]).await?;
//!
//!     users.shutdown().await
//! }
//! ```
//!
//! # Listener Lifetime
//!
//! Every stream holds a listener registration on its backend. The registration is released
//! when the stream ends, is cancelled, or is dropped. A handle obtained from
//! `registration()` cancels the stream from another task.
//!
//! ```ignore
//! let mut snapshots = users.stream_all_documents().await?;
//! let handle = snapshots.registration();
//!
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     handle.remove();
//! });
//!
//! while let Some(snapshot) = snapshots.next().await {
//!     println!("{} users", snapshot?.len());
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod config;
pub mod prelude;

pub use config::{DatabaseConfig, connect};
pub use docstream_core::{backend, batch, change, document, error, query, store, stream, subscription};
pub use docstream_core::{
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    store::DocumentStore,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docstream_memory::{DEFAULT_COLLECTION, InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docstream_mongodb::{MongoDbConfig, MongoDbStore, MongoDbStoreBuilder};
}
