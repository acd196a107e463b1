//! Convenient re-exports of commonly used types from docstream.
//!
//! ```ignore
//! use docstream::prelude::*;
//! ```

pub use docstream_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    change::{ChangeEvent, ChangeKind},
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Comparison, Predicate, SortDirection},
    store::DocumentStore,
    stream::{ChangeStream, DocumentStream, SnapshotStream, StreamLifecycle},
    subscription::ListenerRegistration,
};
