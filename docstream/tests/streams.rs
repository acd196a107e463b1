mod common;

use common::{ChangeFeedStore, User, init_tracing, user};
use docstream::{
    DatabaseConfig, DocumentStore, DocumentStoreError, connect,
    change::ChangeKind,
    memory::InMemoryStore,
    query::Predicate,
    stream::StreamLifecycle,
};
use futures::StreamExt;
use std::time::Duration;

async fn classify_sequence(users: &DocumentStore<User>) -> Vec<(ChangeKind, User)> {
    let mut changes = users.stream_changes().await.unwrap();

    users.set(&user("u1", "Ann")).await.unwrap();
    users.set(&user("u1", "Anna")).await.unwrap();
    users.delete_document("u1").await.unwrap();
    users.delete_document("u1").await.unwrap();
    users.set(&user("u2", "Bob")).await.unwrap();

    let mut events = Vec::new();
    for _ in 0..4 {
        let event = changes.next().await.unwrap().unwrap();
        events.push((event.kind, event.document));
    }

    assert!(changes.cancel());

    events
}

#[tokio::test]
async fn test_change_classification_matches_across_backends() {
    init_tracing();

    let expected = vec![
        (ChangeKind::Added, user("u1", "Ann")),
        (ChangeKind::Modified, user("u1", "Anna")),
        (ChangeKind::Removed, user("u1", "Anna")),
        (ChangeKind::Added, user("u2", "Bob")),
    ];

    let memory = connect(DatabaseConfig::<User>::mock()).await.unwrap();
    let remote = DocumentStore::<User>::new(ChangeFeedStore::default());

    assert_eq!(classify_sequence(&memory).await, expected);
    assert_eq!(classify_sequence(&remote).await, expected);
}

#[tokio::test]
async fn test_existing_documents_arrive_as_added() {
    let seed = [user("u1", "Ann"), user("u2", "Bob")];
    let memory = connect(DatabaseConfig::seeded(seed.clone())).await.unwrap();
    let remote = DocumentStore::<User>::new(ChangeFeedStore::with_users(&seed));

    for users in [memory, remote] {
        let changes = users.stream_changes().await.unwrap();
        let initial = changes.take(2).map(|event| event.unwrap()).collect::<Vec<_>>().await;

        assert!(initial.iter().all(|event| event.kind == ChangeKind::Added));
        assert_eq!(
            initial.into_iter().map(|event| event.document).collect::<Vec<_>>(),
            seed.to_vec()
        );
    }
}

#[tokio::test]
async fn test_snapshot_stream_follows_program_order() {
    init_tracing();

    let users = connect(DatabaseConfig::<User>::mock()).await.unwrap();
    let mut snapshots = users.stream_all_documents().await.unwrap();

    assert_eq!(snapshots.next().await.unwrap().unwrap(), Vec::<User>::new());

    users.set(&user("a", "Ann")).await.unwrap();
    users.set(&user("b", "Bob")).await.unwrap();
    users.delete_document("a").await.unwrap();

    assert_eq!(snapshots.next().await.unwrap().unwrap(), vec![user("a", "Ann")]);
    assert_eq!(
        snapshots.next().await.unwrap().unwrap(),
        vec![user("a", "Ann"), user("b", "Bob")]
    );
    assert_eq!(snapshots.next().await.unwrap().unwrap(), vec![user("b", "Bob")]);
}

#[tokio::test]
async fn test_snapshot_stream_on_change_feed() {
    let backend = ChangeFeedStore::with_users(&[user("a", "Ann")]);
    let users = DocumentStore::<User>::new(backend);
    let mut snapshots = users.stream_all_documents().await.unwrap();

    assert_eq!(snapshots.next().await.unwrap().unwrap(), vec![user("a", "Ann")]);

    users.set(&user("b", "Bob")).await.unwrap();
    users.delete_all_documents().await.unwrap();

    assert_eq!(
        snapshots.next().await.unwrap().unwrap(),
        vec![user("a", "Ann"), user("b", "Bob")]
    );
    assert_eq!(snapshots.next().await.unwrap().unwrap(), Vec::<User>::new());
}

#[tokio::test]
async fn test_query_streams_ignore_predicate_without_query_engine() {
    let seed = [user("a", "Ann"), user("b", "Bob")];
    let memory = connect(DatabaseConfig::seeded(seed.clone())).await.unwrap();
    let remote = DocumentStore::<User>::new(ChangeFeedStore::with_users(&seed));
    let predicate = Predicate::new().where_eq("name", "Ann");

    for users in [memory, remote] {
        let mut snapshots = users.stream_documents_by_query(&predicate).await.unwrap();
        let mut changes = users.stream_changes_by_query(&predicate).await.unwrap();

        assert_eq!(snapshots.next().await.unwrap().unwrap(), seed.to_vec());

        users.set(&user("c", "Cid")).await.unwrap();

        assert_eq!(snapshots.next().await.unwrap().unwrap().len(), 3);

        let kinds = (&mut changes)
            .take(3)
            .map(|event| event.unwrap())
            .map(|event| (event.kind, event.document.id))
            .collect::<Vec<_>>()
            .await;

        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Added, "a".to_string()),
                (ChangeKind::Added, "b".to_string()),
                (ChangeKind::Added, "c".to_string()),
            ]
        );
        assert!(changes.cancel());
    }
}

#[tokio::test]
async fn test_document_stream_waits_for_document() {
    let users = connect(DatabaseConfig::<User>::mock()).await.unwrap();
    let mut values = users.stream_document("u1").await.unwrap();

    users.set(&user("u2", "Bob")).await.unwrap();
    users.set(&user("u1", "Ann")).await.unwrap();
    users.set(&user("u2", "Bobby")).await.unwrap();
    users.set(&user("u1", "Anna")).await.unwrap();
    users.delete_document("u1").await.unwrap();
    users.set(&user("u1", "Annie")).await.unwrap();

    assert_eq!(values.next().await.unwrap().unwrap(), user("u1", "Ann"));
    assert_eq!(values.next().await.unwrap().unwrap(), user("u1", "Anna"));
    assert_eq!(values.next().await.unwrap().unwrap(), user("u1", "Annie"));
}

#[tokio::test]
async fn test_document_stream_on_change_feed() {
    let users = DocumentStore::<User>::new(ChangeFeedStore::default());
    let mut values = users.stream_document("u1").await.unwrap();

    users.set(&user("u2", "Bob")).await.unwrap();
    users.set(&user("u1", "Ann")).await.unwrap();

    assert_eq!(values.next().await.unwrap().unwrap(), user("u1", "Ann"));
}

#[tokio::test]
async fn test_cancel_releases_registration() {
    init_tracing();

    let backend = InMemoryStore::new();
    let users = DocumentStore::<User>::new(backend.clone());
    let mut changes = users.stream_changes().await.unwrap();
    let _snapshots = users.stream_all_documents().await.unwrap();

    assert_eq!(backend.observer_count().await, 2);

    assert!(changes.cancel());
    assert!(!changes.cancel());
    assert_eq!(backend.observer_count().await, 1);

    users.set(&user("u1", "Ann")).await.unwrap();

    assert!(changes.next().await.is_none());
    assert!(!changes.is_attached());
}

#[tokio::test]
async fn test_external_handle_stops_stream() {
    let backend = ChangeFeedStore::default();
    let users = DocumentStore::<User>::new(backend.clone());
    let mut values = users.stream_document("u1").await.unwrap();
    let handle = values.registration();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.remove()
    });

    // Nothing is written, so the stream only ends through the handle.
    let next = tokio::time::timeout(Duration::from_secs(5), values.next())
        .await
        .unwrap();

    assert!(next.is_none());
    assert!(canceller.await.unwrap());
    assert_eq!(backend.observer_count(), 0);
}

#[tokio::test]
async fn test_dropping_stream_releases_registration() {
    let backend = InMemoryStore::new();
    let users = DocumentStore::<User>::new(backend.clone());

    let snapshots = users.stream_all_documents().await.unwrap();
    let handle = snapshots.registration();

    drop(snapshots);

    assert!(handle.is_removed());
    assert!(!handle.remove());
    assert_eq!(backend.observer_count().await, 0);
}

#[tokio::test]
async fn test_transport_failure_ends_stream() {
    let backend = ChangeFeedStore::with_users(&[user("u1", "Ann")]);
    let users = DocumentStore::<User>::new(backend.clone());
    let mut changes = users.stream_changes().await.unwrap();

    assert_eq!(changes.next().await.unwrap().unwrap().kind, ChangeKind::Added);

    backend.fail("connection reset");

    assert_eq!(
        changes.next().await.unwrap(),
        Err(DocumentStoreError::Transport("connection reset".into()))
    );
    assert!(changes.next().await.is_none());
    assert!(changes.registration().is_removed());
    assert_eq!(backend.observer_count(), 0);
}
