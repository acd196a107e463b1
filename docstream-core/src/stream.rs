//! Change-stream engine.
//!
//! Turns a backend's raw [`Subscription`] feed into typed streams:
//!
//! - [`ChangeStream`] - one [`ChangeEvent`] per changed document
//! - [`DocumentStream`] - the current value of a single document whenever it changes
//! - [`SnapshotStream`] - the whole collection, or a query's matches, whenever any member changes
//!
//! Each stream keeps the last observed view of the watched scope. Full snapshots are
//! diffed against it; native change records are applied to it. A record that fails to
//! decode is logged and skipped. A feed error is yielded once and ends the stream. The
//! registration is released exactly once on every exit path: feed end, feed error,
//! [`cancel`](StreamLifecycle::cancel), an external handle's `remove()`, or drop.

use bson::Bson;
use futures::{Stream, StreamExt, ready};
use std::{
    collections::{BTreeMap, VecDeque},
    marker::PhantomData,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tracing::{debug, trace, warn};

use crate::{
    change::{ChangeEvent, ChangeKind, Notification, RawChange, Snapshot, diff_snapshots},
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
    subscription::{ListenerRegistration, Subscription},
};

/// A change whose payload is known.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedChange {
    pub id: String,
    pub kind: ChangeKind,
    pub payload: Bson,
}

/// The changes produced by one notification.
#[derive(Debug, Default)]
pub(crate) struct Batch {
    pub changes: Vec<ResolvedChange>,
    /// Set for the first notification of a subscription.
    pub initial: bool,
}

impl Batch {
    fn touches(&self, id: &str) -> bool {
        self.changes.iter().any(|change| change.id == id)
    }
}

/// Tracks the last observed state of a watched scope.
#[derive(Debug, Default)]
pub(crate) struct Reconciler {
    view: Snapshot,
    primed: bool,
}

impl Reconciler {
    pub fn view(&self) -> &Snapshot {
        &self.view
    }

    pub fn apply(&mut self, notification: Notification) -> Batch {
        let initial = !self.primed;
        self.primed = true;

        let changes = match notification {
            Notification::Snapshot(next) => {
                let changes = diff_snapshots(&self.view, &next);
                self.view = Arc::unwrap_or_clone(next);

                changes
                    .into_iter()
                    .filter_map(|change| self.resolve(change))
                    .collect()
            }
            Notification::Changes(records) => records
                .into_iter()
                .filter_map(|record| self.apply_record(record))
                .collect(),
        };

        Batch { changes, initial }
    }

    /// Applies one native record. The emitted kind follows the view, not the backend: a
    /// record that matches the observed value or removes an unseen id produces nothing.
    fn apply_record(&mut self, record: RawChange) -> Option<ResolvedChange> {
        match record.kind {
            ChangeKind::Added | ChangeKind::Modified => {
                let Some(payload) = record.payload else {
                    return self.resolve(record);
                };

                let kind = match self.view.insert(record.id.clone(), payload.clone()) {
                    Some(previous) if previous == payload => {
                        trace!(id = %record.id, "change record matches observed value");
                        return None;
                    }
                    Some(_) => ChangeKind::Modified,
                    None => ChangeKind::Added,
                };

                Some(ResolvedChange {
                    id: record.id,
                    kind,
                    payload,
                })
            }
            ChangeKind::Removed => {
                let Some(previous) = self.view.remove(&record.id) else {
                    trace!(id = %record.id, "removal of unobserved document");
                    return None;
                };

                self.resolve(RawChange {
                    payload: record.payload.or(Some(previous)),
                    ..record
                })
            }
        }
    }

    fn resolve(&self, record: RawChange) -> Option<ResolvedChange> {
        match record.payload {
            Some(payload) => Some(ResolvedChange {
                id: record.id,
                kind: record.kind,
                payload,
            }),
            None => {
                warn!(id = %record.id, kind = ?record.kind, "skipping change record without payload");
                None
            }
        }
    }
}

/// Attachment state shared by the typed streams.
///
/// `subscription` is `Some` while attached. Detaching releases the registration.
struct Engine {
    subscription: Option<Subscription>,
    registration: ListenerRegistration,
    reconciler: Reconciler,
}

impl Engine {
    fn new(subscription: Subscription) -> Self {
        Self {
            registration: subscription.registration().clone(),
            subscription: Some(subscription),
            reconciler: Reconciler::default(),
        }
    }

    fn is_attached(&self) -> bool {
        self.subscription.is_some() && !self.registration.is_removed()
    }

    fn cancel(&mut self) -> bool {
        self.registration.remove() | self.detach()
    }

    fn detach(&mut self) -> bool {
        match self.subscription.take() {
            Some(subscription) => {
                let released = subscription.release();
                debug!(released, "change stream detached");
                released
            }
            None => false,
        }
    }

    fn poll_batch(&mut self, cx: &mut Context<'_>) -> Poll<Option<DocumentStoreResult<Batch>>> {
        if !self.is_attached() {
            self.detach();
            return Poll::Ready(None);
        }

        let Some(subscription) = self.subscription.as_mut() else {
            return Poll::Ready(None);
        };

        match subscription.feed.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(notification))) => Poll::Ready(Some(Ok(self.reconciler.apply(notification)))),
            Poll::Ready(Some(Err(err))) => {
                warn!(error = %err, "subscription feed failed, closing stream");
                self.detach();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                self.detach();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

fn decode<D: Document>(id: &str, payload: Bson) -> Option<D> {
    match D::from_bson(payload) {
        Ok(document) => Some(document),
        Err(err) => {
            warn!(id = %id, error = %err, "skipping undecodable document");
            None
        }
    }
}

/// Lifecycle controls shared by the typed streams.
pub trait StreamLifecycle {
    /// Returns a handle that cancels this stream from elsewhere.
    fn registration(&self) -> ListenerRegistration;

    /// Stops the stream and releases its registration.
    ///
    /// Returns `true` if this call performed the release.
    fn cancel(&mut self) -> bool;

    /// Returns `true` while the stream can still deliver items.
    fn is_attached(&self) -> bool;
}

/// Stream of per-document [`ChangeEvent`]s.
pub struct ChangeStream<D> {
    engine: Engine,
    pending: VecDeque<ChangeEvent<D>>,
}

impl<D: Document> ChangeStream<D> {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            engine: Engine::new(subscription),
            pending: VecDeque::new(),
        }
    }
}

impl<D> StreamLifecycle for ChangeStream<D> {
    fn registration(&self) -> ListenerRegistration {
        self.engine.registration.clone()
    }

    fn cancel(&mut self) -> bool {
        self.engine.cancel()
    }

    fn is_attached(&self) -> bool {
        self.engine.is_attached()
    }
}

impl<D> Unpin for ChangeStream<D> {}

impl<D: Document> Stream for ChangeStream<D> {
    type Item = DocumentStoreResult<ChangeEvent<D>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if !this.engine.is_attached() {
                this.pending.clear();
            }

            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            match ready!(this.engine.poll_batch(cx)) {
                Some(Ok(batch)) => this.pending.extend(
                    batch
                        .changes
                        .into_iter()
                        .filter_map(|change| {
                            decode::<D>(&change.id, change.payload)
                                .map(|document| ChangeEvent::new(change.kind, document))
                        }),
                ),
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Stream of a single document's value.
///
/// Nothing is emitted while the document does not exist; the stream waits for it to appear.
pub struct DocumentStream<D> {
    engine: Engine,
    id: String,
    _marker: PhantomData<fn() -> D>,
}

impl<D: Document> DocumentStream<D> {
    pub fn new(subscription: Subscription, id: impl Into<String>) -> Self {
        Self {
            engine: Engine::new(subscription),
            id: id.into(),
            _marker: PhantomData,
        }
    }

    /// The id of the watched document.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl<D> StreamLifecycle for DocumentStream<D> {
    fn registration(&self) -> ListenerRegistration {
        self.engine.registration.clone()
    }

    fn cancel(&mut self) -> bool {
        self.engine.cancel()
    }

    fn is_attached(&self) -> bool {
        self.engine.is_attached()
    }
}

impl<D: Document> Stream for DocumentStream<D> {
    type Item = DocumentStoreResult<D>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match ready!(this.engine.poll_batch(cx)) {
                Some(Ok(batch)) => {
                    if !batch.touches(&this.id) {
                        continue;
                    }

                    let current = this.engine.reconciler.view().get(&this.id).cloned();

                    if let Some(document) = current.and_then(|payload| decode::<D>(&this.id, payload)) {
                        return Poll::Ready(Some(Ok(document)));
                    }
                }
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Stream of full collection snapshots, or of the documents matching a query.
///
/// Emits once for the initial state and again for every notification that changes at least
/// one document. Documents are decoded once per change; a document that fails to decode is
/// left out of every snapshot until it is written again.
pub struct SnapshotStream<D> {
    engine: Engine,
    documents: BTreeMap<String, D>,
}

impl<D: Document> SnapshotStream<D> {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            engine: Engine::new(subscription),
            documents: BTreeMap::new(),
        }
    }

    fn absorb(&mut self, changes: Vec<ResolvedChange>) {
        for change in changes {
            match change.kind {
                ChangeKind::Removed => {
                    self.documents.remove(&change.id);
                }
                ChangeKind::Added | ChangeKind::Modified => match decode::<D>(&change.id, change.payload) {
                    Some(document) => {
                        self.documents.insert(change.id, document);
                    }
                    None => {
                        self.documents.remove(&change.id);
                    }
                },
            }
        }
    }
}

impl<D> StreamLifecycle for SnapshotStream<D> {
    fn registration(&self) -> ListenerRegistration {
        self.engine.registration.clone()
    }

    fn cancel(&mut self) -> bool {
        self.engine.cancel()
    }

    fn is_attached(&self) -> bool {
        self.engine.is_attached()
    }
}

impl<D> Unpin for SnapshotStream<D> {}

impl<D: Document> Stream for SnapshotStream<D> {
    type Item = DocumentStoreResult<Vec<D>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match ready!(this.engine.poll_batch(cx)) {
                Some(Ok(batch)) => {
                    if !batch.initial && batch.changes.is_empty() {
                        continue;
                    }

                    this.absorb(batch.changes);

                    return Poll::Ready(Some(Ok(this.documents.values().cloned().collect())));
                }
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}
