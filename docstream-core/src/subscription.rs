//! Live watch registrations.
//!
//! A backend answers [`StoreBackend::subscribe`](crate::backend::StoreBackend::subscribe)
//! with a [`Subscription`]: a feed of [`Notification`]s plus the [`ListenerRegistration`]
//! that stops it. The registration must be released on every exit path; dropping the
//! subscription releases it, and releasing twice is a no-op.

use futures::{StreamExt, stream::BoxStream};
use std::{
    fmt::{self, Debug},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{change::Notification, error::DocumentStoreResult, query::Predicate};

/// The stream of notifications a backend delivers for one registration.
///
/// An `Err` item is a transport-level failure and ends the subscription.
pub type NotificationFeed = BoxStream<'static, DocumentStoreResult<Notification>>;

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenTarget {
    /// Every document in the backend's collection.
    Collection,
    /// A single document id.
    Document(String),
    /// The documents selected by a predicate. Backends that ignore predicates in
    /// `query_documents` treat this like [`Collection`](ListenTarget::Collection).
    Query(Predicate),
}

struct RegistrationInner {
    removed: AtomicBool,
    release: Box<dyn Fn() + Send + Sync>,
}

/// Handle to an active watch registration.
///
/// Clones share the same registration, so a handle can be passed to another task to cancel
/// a stream from outside. The backend's release hook runs at most once.
#[derive(Clone)]
pub struct ListenerRegistration {
    inner: Arc<RegistrationInner>,
}

impl ListenerRegistration {
    /// Creates a registration whose release runs `release`.
    pub fn new(release: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(RegistrationInner {
                removed: AtomicBool::new(false),
                release: Box::new(release),
            }),
        }
    }

    /// Creates a registration with nothing to release.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Releases the registration.
    ///
    /// Returns `true` if this call performed the release, `false` if it had already happened.
    pub fn remove(&self) -> bool {
        if self.inner.removed.swap(true, Ordering::AcqRel) {
            return false;
        }

        (self.inner.release)();
        tracing::debug!("listener registration released");

        true
    }

    /// Returns `true` once the registration has been released.
    pub fn is_removed(&self) -> bool {
        self.inner.removed.load(Ordering::Acquire)
    }
}

impl Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("removed", &self.is_removed())
            .finish()
    }
}

/// A notification feed bound to the registration that produces it.
pub struct Subscription {
    pub(crate) feed: NotificationFeed,
    registration: ListenerRegistration,
}

impl Subscription {
    pub fn new(feed: NotificationFeed, registration: ListenerRegistration) -> Self {
        Self { feed, registration }
    }

    pub fn registration(&self) -> &ListenerRegistration {
        &self.registration
    }

    /// Releases the registration. Equivalent to dropping the subscription.
    pub fn release(&self) -> bool {
        self.registration.remove()
    }

    /// Waits for the next raw notification. `None` once the backend has closed the feed.
    pub async fn next_notification(&mut self) -> Option<DocumentStoreResult<Notification>> {
        self.feed.next().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registration.remove();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("registration", &self.registration)
            .finish_non_exhaustive()
    }
}
