//! MongoDB backend implementation for docstream.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait, with
//! predicate queries executed by MongoDB's query engine and live subscriptions driven by
//! change streams.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docstream = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Query support** - Predicates are translated to MongoDB filters, sorts and limits
//! - **Live changes** - Subscriptions map change stream events to added, modified and removed
//!
//! # Example
//!
//! ```ignore
//! use docstream::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database", "users")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstream_mongodb;

pub mod config;
pub mod query;
pub mod store;

pub use config::MongoDbConfig;
pub use store::{MongoDbStore, MongoDbStoreBuilder};
