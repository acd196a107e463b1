//! A backend-agnostic document store access layer with live change streams.
//!
//! This crate is the core of the docstream project and provides:
//!
//! - **Document traits** ([`document`]) - The identity contract and serialization helpers
//! - **Store backend abstraction** ([`backend`]) - The capability set every provider implements
//! - **Query predicates** ([`query`]) - Opaque filters handed to the backend
//! - **Batch execution** ([`batch`]) - Order-preserving, all-or-nothing fan-out for multi-id operations
//! - **Change types** ([`change`]) - Change events and the raw notifications backends publish
//! - **Subscriptions** ([`subscription`]) - Listener registrations and their release
//! - **Change streams** ([`stream`]) - Typed document, snapshot and change-event streams
//! - **Document store** ([`store`]) - The typed facade applications hold
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docstream::{Document, DocumentStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: String,
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstream_core;

pub mod backend;
pub mod batch;
pub mod change;
pub mod document;
pub mod error;
pub mod query;
pub mod store;
pub mod stream;
pub mod subscription;
