//! In-memory document storage backend for docstream.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait,
//! standing in for a remote document database in development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Mutations are serialized behind an async-aware RwLock
//! - **Live observers** - Every registration receives the full collection after each mutation
//! - **Seeding** - The builder accepts initial documents
//!
//! The predicate passed to `query_documents` is ignored; queries return the whole collection.
//!
//! # Quick Start
//!
//! ```ignore
//! use docstream::{Document, DocumentStore, memory::InMemoryStore};
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
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().collection("users").build().await?;
//!     let users = DocumentStore::<User>::new(backend);
//!
//!     users.set(&User { id: "u1".into(), name: "Ann".into() }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstream_memory;

pub mod store;

pub use store::{DEFAULT_COLLECTION, InMemoryStore, InMemoryStoreBuilder};
