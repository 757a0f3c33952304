//! Repository Integration Tests
//!
//! Tests for the document stores (in-process and SQLite) and the
//! preference stores.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::domain::{DocumentFields, Item, ItemId, RawDocument, StoreError};
    use crate::repository::db;
    use crate::repository::{
        DocumentStore, JsonFilePreferences, MemoryPreferences, MemoryStore, PreferenceStore,
        SqliteStore, StoreEvent, Subscription,
    };

    const TODOS: &str = "todos";

    async fn next_event(sub: &mut Subscription) -> StoreEvent {
        tokio::time::timeout(Duration::from_secs(2), sub.next_event())
            .await
            .expect("timed out waiting for store event")
            .expect("subscription ended")
    }

    async fn next_snapshot(sub: &mut Subscription) -> Vec<RawDocument> {
        match next_event(sub).await {
            StoreEvent::Snapshot(docs) => docs,
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    fn texts(docs: &[RawDocument]) -> Vec<String> {
        docs.iter().map(|doc| doc.decode().text).collect()
    }

    // ========================
    // MemoryStore
    // ========================

    #[tokio::test]
    async fn test_memory_subscribe_delivers_current_snapshot() {
        let store = MemoryStore::new();
        store.put(TODOS, "a", Item::fields("x"));

        let mut sub = store.subscribe(TODOS).await.expect("subscribe failed");
        let docs = next_snapshot(&mut sub).await;
        assert_eq!(docs, vec![RawDocument::with_text("a", "x")]);
    }

    #[tokio::test]
    async fn test_memory_create_pushes_snapshot_ordered_by_id() {
        let store = MemoryStore::new();
        store.put(TODOS, "m", Item::fields("middle"));
        let mut sub = store.subscribe(TODOS).await.unwrap();
        next_snapshot(&mut sub).await;

        store.put(TODOS, "a", Item::fields("first"));
        assert_eq!(texts(&next_snapshot(&mut sub).await), vec!["first", "middle"]);

        let id = store.create(TODOS, Item::fields("generated")).await.unwrap();
        let docs = next_snapshot(&mut sub).await;
        assert_eq!(docs.len(), 3);
        assert!(docs.iter().any(|doc| doc.id == id));
    }

    #[tokio::test]
    async fn test_memory_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.put(TODOS, "a", Item::fields("x"));

        store.delete(TODOS, &ItemId::from("a")).await.expect("delete failed");
        store.delete(TODOS, &ItemId::from("a")).await.expect("second delete failed");
        store.delete("other", &ItemId::from("zz")).await.expect("missing collection");
        assert!(store.documents(TODOS).is_empty());
    }

    #[tokio::test]
    async fn test_memory_unreachable() {
        let store = MemoryStore::new();
        store.set_reachable(false);

        assert!(matches!(store.subscribe(TODOS).await, Err(StoreError::Unavailable(_))));
        assert!(matches!(
            store.create(TODOS, Item::fields("x")).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.delete(TODOS, &ItemId::from("a")).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_channel_failure_and_recovery() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(TODOS).await.unwrap();
        next_snapshot(&mut sub).await;

        store.fail_channel(TODOS, "network lost");
        assert_eq!(next_event(&mut sub).await, StoreEvent::ChannelError("network lost".into()));

        // Writes while the channel is down are not pushed...
        store.put(TODOS, "a", Item::fields("x"));
        store.recover_channel(TODOS);

        // ...the recovery snapshot carries them.
        assert_eq!(texts(&next_snapshot(&mut sub).await), vec!["x"]);
    }

    #[tokio::test]
    async fn test_memory_paused_delivery_coalesces() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(TODOS).await.unwrap();
        next_snapshot(&mut sub).await;

        store.set_delivery_paused(true);
        store.put(TODOS, "a", Item::fields("x"));
        store.put(TODOS, "b", Item::fields("y"));
        store.set_delivery_paused(false);

        assert_eq!(texts(&next_snapshot(&mut sub).await), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_memory_dropped_subscription_is_pruned() {
        let store = MemoryStore::new();
        let sub = store.subscribe(TODOS).await.unwrap();
        assert_eq!(store.subscriber_count(TODOS), 1);

        drop(sub);
        assert_eq!(store.subscriber_count(TODOS), 0);
    }

    #[tokio::test]
    async fn test_closed_subscription_is_pruned_while_receiver_lives() {
        let store = MemoryStore::new();
        let mut first = store.subscribe(TODOS).await.unwrap();
        let second = store.subscribe(TODOS).await.unwrap();
        assert_eq!(store.subscriber_count(TODOS), 2);

        let handle = second.close_handle();
        handle.close();
        assert!(handle.is_closed());
        assert_eq!(store.subscriber_count(TODOS), 1);

        first.close();
        assert_eq!(store.subscriber_count(TODOS), 0);

        // Nothing new reaches a closed subscription.
        next_snapshot(&mut first).await;
        store.put(TODOS, "a", Item::fields("x"));
        assert_eq!(first.next_event().await, None);
        drop(second);
    }

    // ========================
    // SqliteStore
    // ========================

    #[tokio::test]
    async fn test_sqlite_create_and_delete_push_snapshots() {
        let store = SqliteStore::open_in_memory().expect("open failed");
        let mut sub = store.subscribe(TODOS).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());

        let id = store.create(TODOS, Item::fields("buy milk")).await.unwrap();
        let docs = next_snapshot(&mut sub).await;
        assert_eq!(docs, vec![RawDocument::with_text(id.clone(), "buy milk")]);

        store.delete(TODOS, &id).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_delete_missing_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.delete(TODOS, &ItemId::from("nope")).await;
        assert_eq!(result, Err(StoreError::NotFound("nope".into())));
    }

    #[tokio::test]
    async fn test_sqlite_collections_are_isolated() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create("other", Item::fields("elsewhere")).await.unwrap();

        let mut sub = store.subscribe(TODOS).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_pushes_commits_from_other_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.db");

        let viewer = SqliteStore::open(&path, Duration::from_millis(20)).unwrap();
        let writer = SqliteStore::open(&path, Duration::ZERO).unwrap();

        let mut sub = viewer.subscribe(TODOS).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());

        writer.create(TODOS, Item::fields("from elsewhere")).await.unwrap();

        loop {
            let docs = next_snapshot(&mut sub).await;
            if !docs.is_empty() {
                assert_eq!(texts(&docs), vec!["from elsewhere"]);
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_sqlite_reopen_keeps_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.db");

        {
            let store = SqliteStore::open(&path, Duration::ZERO).unwrap();
            store.create(TODOS, Item::fields("persisted")).await.unwrap();
        }

        let store = SqliteStore::open(&path, Duration::ZERO).unwrap();
        let mut sub = store.subscribe(TODOS).await.unwrap();
        assert_eq!(texts(&next_snapshot(&mut sub).await), vec!["persisted"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sqlite_concurrent_writes_push_snapshots_in_commit_order() {
        const WRITERS: usize = 8;
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut sub = store.subscribe(TODOS).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());

        let tasks: Vec<_> = (0..WRITERS)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.create(TODOS, Item::fields(&format!("item {}", n))).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().expect("create failed");
        }

        let mut sizes = Vec::new();
        for _ in 0..WRITERS {
            sizes.push(next_snapshot(&mut sub).await.len());
        }
        assert_eq!(sizes, (1..=WRITERS).collect::<Vec<_>>());
    }

    #[test]
    fn test_sqlite_schema_stamps_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_connection(&dir.path().join("todos.db")).unwrap();
        db::insert_document(&conn, TODOS, &ItemId::from("a"), &Item::fields("x")).unwrap();

        let created_at: i64 = conn
            .query_row(
                "SELECT created_at FROM documents WHERE collection = ?1 AND id = ?2",
                rusqlite::params![TODOS, "a"],
                |row| row.get(0),
            )
            .unwrap();
        assert!(created_at > 0);

        // Reopening an existing file leaves the schema alone.
        drop(conn);
        let conn = db::open_connection(&dir.path().join("todos.db")).unwrap();
        assert_eq!(texts(&db::load_collection(&conn, TODOS).unwrap()), vec!["x"]);
    }

    #[tokio::test]
    async fn test_sqlite_extra_fields_survive() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut fields = DocumentFields::new();
        fields.insert("priority".into(), serde_json::json!(2));
        store.create(TODOS, fields).await.unwrap();

        let mut sub = store.subscribe(TODOS).await.unwrap();
        let docs = next_snapshot(&mut sub).await;
        assert_eq!(docs[0].fields.get("priority"), Some(&serde_json::json!(2)));
        assert_eq!(docs[0].decode().text, "");
    }

    // ========================
    // Preferences
    // ========================

    #[test]
    fn test_memory_preferences() {
        let prefs = MemoryPreferences::new().with("theme", "dark");
        assert_eq!(prefs.read("theme").unwrap(), Some("dark".to_string()));
        assert_eq!(prefs.read("missing").unwrap(), None);

        prefs.set_fail_writes(true);
        assert!(prefs.write("theme", "light").is_err());
        assert_eq!(prefs.read("theme").unwrap(), Some("dark".to_string()));
    }

    #[test]
    fn test_json_preferences_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let prefs = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(prefs.read("theme").unwrap(), None);
        prefs.write("theme", "dark").unwrap();

        let reopened = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(reopened.read("theme").unwrap(), Some("dark".to_string()));
    }

    #[test]
    fn test_json_preferences_tolerate_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();

        let prefs = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(prefs.read("theme").unwrap(), None);
        prefs.write("theme", "light").unwrap();
        assert_eq!(
            JsonFilePreferences::open(&path).unwrap().read("theme").unwrap(),
            Some("light".to_string())
        );
    }
}
