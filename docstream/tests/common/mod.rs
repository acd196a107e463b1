#![allow(dead_code)]

use async_trait::async_trait;
use docstream::{
    backend::StoreBackend,
    bson::Bson,
    change::{ChangeKind, Notification, RawChange},
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Predicate,
    subscription::{ListenTarget, ListenerRegistration, Subscription},
};
use futures::{
    StreamExt,
    channel::mpsc::{self, UnboundedSender},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a subscriber filtered by `DOCSTREAM_LOG`. Silent unless the variable is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("DOCSTREAM_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl Document for User {
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.into(),
        name: name.into(),
    }
}

type Observer = (ListenTarget, UnboundedSender<DocumentStoreResult<Notification>>);

#[derive(Debug, Default)]
struct FeedState {
    documents: BTreeMap<String, Bson>,
    observers: Vec<Observer>,
}

impl FeedState {
    fn notify(&mut self, changes: Vec<RawChange>) {
        self.observers.retain(|(target, observer)| {
            let visible = changes
                .iter()
                .filter(|change| match target {
                    ListenTarget::Collection | ListenTarget::Query(_) => true,
                    ListenTarget::Document(id) => &change.id == id,
                })
                .cloned()
                .collect::<Vec<_>>();

            visible.is_empty() || observer.unbounded_send(Ok(Notification::Changes(visible))).is_ok()
        });
    }
}

/// A backend that reports native per-document change records the way a remote database
/// does, including deletions without a payload.
#[derive(Debug, Default, Clone)]
pub struct ChangeFeedStore {
    state: Arc<Mutex<FeedState>>,
}

impl ChangeFeedStore {
    pub fn with_users(users: &[User]) -> Self {
        let store = Self::default();

        store.state.lock().unwrap().documents.extend(
            users
                .iter()
                .map(|user| (user.id.clone(), user.to_bson().unwrap())),
        );

        store
    }

    /// Delivers a transport failure to every open feed.
    pub fn fail(&self, message: &str) {
        let state = self.state.lock().unwrap();

        for (_, observer) in &state.observers {
            let _ = observer.unbounded_send(Err(DocumentStoreError::Transport(message.to_string())));
        }
    }

    pub fn observer_count(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.observers.retain(|(_, observer)| !observer.is_closed());
        state.observers.len()
    }
}

#[async_trait]
impl StoreBackend for ChangeFeedStore {
    fn collection_name(&self) -> &str {
        "remote"
    }

    async fn set_document(&self, id: &str, document: Bson) -> DocumentStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let kind = match state.documents.insert(id.to_string(), document.clone()) {
            Some(_) => ChangeKind::Modified,
            None => ChangeKind::Added,
        };

        state.notify(vec![RawChange::new(id, kind, Some(document))]);

        Ok(())
    }

    async fn get_document(&self, id: &str) -> DocumentStoreResult<Bson> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| DocumentStoreError::NotFound(id.to_string(), "remote".to_string()))
    }

    async fn query_documents(&self, _predicate: &Predicate) -> DocumentStoreResult<Vec<Bson>> {
        self.get_all_documents().await
    }

    async fn get_all_documents(&self) -> DocumentStoreResult<Vec<Bson>> {
        Ok(self.state.lock().unwrap().documents.values().cloned().collect())
    }

    async fn delete_document(&self, id: &str) -> DocumentStoreResult<()> {
        let mut state = self.state.lock().unwrap();

        if state.documents.remove(id).is_some() {
            state.notify(vec![RawChange::removed(id, None)]);
        }

        Ok(())
    }

    async fn delete_all_documents(&self) -> DocumentStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let removed = std::mem::take(&mut state.documents)
            .into_keys()
            .map(|id| RawChange::removed(id, None))
            .collect();

        state.notify(removed);

        Ok(())
    }

    async fn subscribe(&self, target: ListenTarget) -> DocumentStoreResult<Subscription> {
        let (observer, feed) = mpsc::unbounded();
        let mut state = self.state.lock().unwrap();

        let initial = state
            .documents
            .iter()
            .filter(|(id, _)| match &target {
                ListenTarget::Collection | ListenTarget::Query(_) => true,
                ListenTarget::Document(watched) => *id == watched,
            })
            .map(|(id, document)| RawChange::added(id.clone(), document.clone()))
            .collect();

        observer
            .unbounded_send(Ok(Notification::Changes(initial)))
            .unwrap();

        let registration = {
            let observer = observer.clone();
            ListenerRegistration::new(move || observer.close_channel())
        };

        state.observers.push((target, observer));

        Ok(Subscription::new(feed.boxed(), registration))
    }
}
