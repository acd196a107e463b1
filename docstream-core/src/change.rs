//! Document change events and the raw records backends publish.
//!
//! Backends feed subscriptions with [`Notification`]s. A backend with a native notion of
//! change type (a remote database's change stream) publishes [`RawChange`] records; a
//! backend without one publishes its whole post-mutation map and lets the stream engine
//! classify changes with [`diff_snapshots`].

use bson::Bson;
use std::{collections::BTreeMap, sync::Arc};

/// Full collection state keyed by document id.
pub type Snapshot = BTreeMap<String, Bson>;

/// The kind of transition a document went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The document appeared. Also reported for documents present when a stream starts.
    Added,
    /// The document was overwritten with a different value.
    Modified,
    /// The document was deleted.
    Removed,
}

/// One observed transition of exactly one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<D> {
    pub kind: ChangeKind,
    pub document: D,
}

impl<D> ChangeEvent<D> {
    pub fn new(kind: ChangeKind, document: D) -> Self {
        Self { kind, document }
    }
}

/// A change record as delivered by a backend, before decoding.
///
/// `payload` may be missing, e.g. a remote delete that carries no pre-image.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChange {
    pub id: String,
    pub kind: ChangeKind,
    pub payload: Option<Bson>,
}

impl RawChange {
    pub fn new(id: impl Into<String>, kind: ChangeKind, payload: Option<Bson>) -> Self {
        Self {
            id: id.into(),
            kind,
            payload,
        }
    }

    pub fn added(id: impl Into<String>, payload: Bson) -> Self {
        Self::new(id, ChangeKind::Added, Some(payload))
    }

    pub fn modified(id: impl Into<String>, payload: Bson) -> Self {
        Self::new(id, ChangeKind::Modified, Some(payload))
    }

    pub fn removed(id: impl Into<String>, payload: Option<Bson>) -> Self {
        Self::new(id, ChangeKind::Removed, payload)
    }
}

/// A single delivery on a subscription feed.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The complete state of the watched collection after a mutation.
    Snapshot(Arc<Snapshot>),
    /// Native change records, in the order the backend reported them.
    Changes(Vec<RawChange>),
}

/// Classifies the differences between two snapshots.
///
/// An id only in `next` is `Added`, an id only in `prev` is `Removed` (carrying its old
/// value), and an id in both with a different value is `Modified`. Results are ordered by id.
pub fn diff_snapshots(prev: &Snapshot, next: &Snapshot) -> Vec<RawChange> {
    let mut changes = Vec::new();

    for (id, value) in next {
        match prev.get(id) {
            None => changes.push(RawChange::added(id.clone(), value.clone())),
            Some(old) if old != value => changes.push(RawChange::modified(id.clone(), value.clone())),
            Some(_) => {}
        }
    }

    for (id, old) in prev {
        if !next.contains_key(id) {
            changes.push(RawChange::removed(id.clone(), Some(old.clone())));
        }
    }

    changes.sort_by(|a, b| a.id.cmp(&b.id));
    changes
}
