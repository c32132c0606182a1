use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tower_sessions_dynamodb_store::{
    entity::session::SessionItem, expiry::to_seconds_epoch, table::TableDescription, DynamoDbStore,
    Error, ExpiredDeletion, Id, MemoryTable, Record, SessionData, SessionRepository, SessionStore,
    StoreOptions, TableError, TableOptions, TableService, TableStatus,
};

const DEFAULT_TTL_SECS: i64 = 86_400;

fn test_options() -> StoreOptions {
    StoreOptions::default()
        .with_table_name("test-sessions")
        .with_hash_key("test-sessionId")
        .with_hash_prefix("test:")
}

async fn store_with(options: StoreOptions) -> (DynamoDbStore, MemoryTable) {
    let table = MemoryTable::new();
    let store = DynamoDbStore::new(table.clone(), options).unwrap();
    store.ensure_table().await.unwrap();
    (store, table)
}

async fn test_store() -> (DynamoDbStore, MemoryTable) {
    store_with(test_options()).await
}

async fn raw_item(store: &DynamoDbStore, table: &MemoryTable, sid: &str) -> Option<SessionItem> {
    table
        .get_item(&store.options().table, &store.session_key(sid))
        .await
        .unwrap()
}

fn payload(value: serde_json::Value) -> SessionData {
    serde_json::from_value(value).unwrap()
}

fn now_secs() -> i64 {
    to_seconds_epoch(OffsetDateTime::now_utc())
}

#[tokio::test]
async fn creates_a_new_table() {
    let table = MemoryTable::new();
    let store = DynamoDbStore::new(table.clone(), test_options()).unwrap();

    assert_eq!(store.ensure_table().await.unwrap(), TableStatus::Created);
    assert_eq!(table.hash_key("test-sessions").await.as_deref(), Some("test-sessionId"));
}

#[tokio::test]
async fn uses_an_existing_table() {
    let table = MemoryTable::new();
    table.create_table(&test_options().table).await.unwrap();

    let store = DynamoDbStore::new(table, test_options()).unwrap();
    assert_eq!(store.ensure_table().await.unwrap(), TableStatus::Existing);
}

#[tokio::test]
async fn creates_table_with_default_values() {
    let table = MemoryTable::new();
    let store = DynamoDbStore::new(table.clone(), StoreOptions::default()).unwrap();

    assert_eq!(store.ensure_table().await.unwrap(), TableStatus::Created);
    assert_eq!(table.hash_key("sessions").await.as_deref(), Some("sessionId"));
    assert_eq!(store.session_key("abc"), "sess:abc");
}

#[tokio::test]
async fn rejects_invalid_options() {
    let result = DynamoDbStore::new(MemoryTable::new(), StoreOptions::default().with_table_name(""));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn set_uses_default_ttl() {
    let (store, table) = test_store().await;
    let before = now_secs();

    store.set("default-ttl", &payload(json!({"name": "x"}))).await.unwrap();

    let item = raw_item(&store, &table, "default-ttl").await.unwrap();
    let expires = item.expires.unwrap();
    assert!(expires >= before + DEFAULT_TTL_SECS);
    assert!(expires <= now_secs() + DEFAULT_TTL_SECS);
    assert_eq!(item.sess.get("name"), Some(&json!("x")));
    assert!(item.sess.updated().is_some());
}

#[tokio::test]
async fn set_uses_cookie_max_age() {
    let (store, table) = test_store().await;
    let before = now_secs();

    store
        .set("max-age", &payload(json!({"cookie": {"maxAge": 100_000}})))
        .await
        .unwrap();

    let item = raw_item(&store, &table, "max-age").await.unwrap();
    let expires = item.expires.unwrap();
    assert!(expires >= before + 100);
    assert!(expires <= now_secs() + 100);
    assert_eq!(item.sess.cookie_max_age(), Some(100_000));
}

#[tokio::test]
async fn set_overwrites_the_whole_record() {
    let (store, table) = test_store().await;

    store
        .set("update", &payload(json!({"name": "first", "cart": [1]})))
        .await
        .unwrap();
    store.set("update", &payload(json!({"name": "second"}))).await.unwrap();

    let item = raw_item(&store, &table, "update").await.unwrap();
    assert_eq!(item.sess.get("name"), Some(&json!("second")));
    assert_eq!(item.sess.get("cart"), None);
    assert_eq!(table.len("test-sessions").await, Some(1));
}

#[tokio::test]
async fn get_returns_stored_payload_with_updated_marker() {
    let (store, _) = test_store().await;
    let session = payload(json!({"name": "x", "nested": {"a": [1, 2, {"b": null}]}}));

    store.set("existing", &session).await.unwrap();
    let mut loaded = store.get("existing").await.unwrap().unwrap();

    assert!(loaded.updated().is_some());
    loaded.remove("updated");
    assert_eq!(loaded, session);
}

#[tokio::test]
async fn get_missing_session_returns_none() {
    let (store, _) = test_store().await;
    assert_eq!(store.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn expired_session_is_kept_when_configured() {
    let (store, table) = store_with(test_options().with_keep_expired(true)).await;

    store
        .set("expired-keep", &payload(json!({"cookie": {"maxAge": -1_000}})))
        .await
        .unwrap();

    assert_eq!(store.get("expired-keep").await.unwrap(), None);
    assert!(raw_item(&store, &table, "expired-keep").await.is_some());
}

#[tokio::test]
async fn expired_session_is_destroyed_by_default() {
    let (store, table) = test_store().await;

    store
        .set("expired-destroy", &payload(json!({"cookie": {"maxAge": -1_000}})))
        .await
        .unwrap();

    assert_eq!(store.get("expired-destroy").await.unwrap(), None);
    assert!(raw_item(&store, &table, "expired-destroy").await.is_none());
}

#[tokio::test]
async fn item_without_expiry_counts_as_expired() {
    let (store, table) = store_with(test_options().with_keep_expired(true)).await;
    table
        .put_item(
            &store.options().table,
            SessionItem {
                key: store.session_key("no-expiry"),
                expires: None,
                sess: payload(json!({"name": "x"})),
            },
        )
        .await
        .unwrap();

    assert_eq!(store.get("no-expiry").await.unwrap(), None);
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let (store, table) = test_store().await;

    store.set("destroy", &payload(json!({"name": "x"}))).await.unwrap();
    store.destroy("destroy").await.unwrap();
    assert!(raw_item(&store, &table, "destroy").await.is_none());

    store.destroy("destroy").await.unwrap();
    store.destroy("never-existed").await.unwrap();
}

#[tokio::test]
async fn touch_extends_expiry_after_interval() {
    let (store, table) = store_with(test_options().with_touch_interval(std::time::Duration::ZERO)).await;

    store.set("touch", &SessionData::new()).await.unwrap();
    let original = raw_item(&store, &table, "touch").await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
    store.touch("touch", &original.sess).await.unwrap();

    let touched = raw_item(&store, &table, "touch").await.unwrap();
    assert!(touched.expires.unwrap() > original.expires.unwrap());
    assert!(touched.expires.unwrap() < original.expires.unwrap() + 5);
    assert!(touched.sess.updated().unwrap() > original.sess.updated().unwrap());
}

#[tokio::test]
async fn touch_with_stale_marker_extends_expiry() {
    let (store, table) =
        store_with(test_options().with_touch_interval(std::time::Duration::from_secs(30))).await;

    let now_ms = OffsetDateTime::now_utc().unix_timestamp() * 1000;
    let stale = payload(json!({"name": "stale", "updated": now_ms - 60_000}));
    table
        .put_item(
            &store.options().table,
            SessionItem {
                key: store.session_key("stale"),
                expires: Some(now_secs() + 100),
                sess: stale.clone(),
            },
        )
        .await
        .unwrap();

    store.touch("stale", &stale).await.unwrap();

    let touched = raw_item(&store, &table, "stale").await.unwrap();
    let expires = touched.expires.unwrap();
    assert!(expires >= now_secs() + DEFAULT_TTL_SECS - 5);
    assert!(expires <= now_secs() + DEFAULT_TTL_SECS);
    assert!(touched.sess.updated().unwrap() >= now_ms);
    assert_eq!(touched.sess.get("name"), Some(&json!("stale")));

    // The refreshed marker is inside the interval, so a second touch is a no-op.
    store.touch("stale", &touched.sess).await.unwrap();
    assert_eq!(raw_item(&store, &table, "stale").await.unwrap(), touched);
}

#[tokio::test]
async fn touch_within_interval_is_skipped() {
    let (store, table) =
        store_with(test_options().with_touch_interval(std::time::Duration::from_secs(30))).await;

    store.set("touch-skip", &SessionData::new()).await.unwrap();
    let original = raw_item(&store, &table, "touch-skip").await.unwrap();

    store.touch("touch-skip", &original.sess).await.unwrap();
    store.touch("touch-skip", &original.sess).await.unwrap();

    assert_eq!(raw_item(&store, &table, "touch-skip").await.unwrap(), original);
}

#[tokio::test]
async fn touch_keeps_payload_fields() {
    let (store, table) = test_store().await;

    store
        .set("touch-payload", &payload(json!({"name": "x", "cart": [1, 2]})))
        .await
        .unwrap();
    // A payload without the marker is always due for a refresh.
    store
        .touch("touch-payload", &payload(json!({"name": "ignored"})))
        .await
        .unwrap();

    let item = raw_item(&store, &table, "touch-payload").await.unwrap();
    assert_eq!(item.sess.get("name"), Some(&json!("x")));
    assert_eq!(item.sess.get("cart"), Some(&json!([1, 2])));
}

#[tokio::test]
async fn touch_does_not_recreate_missing_session() {
    let (store, table) = test_store().await;

    store.touch("gone", &SessionData::new()).await.unwrap();

    assert!(raw_item(&store, &table, "gone").await.is_none());
    assert_eq!(table.len("test-sessions").await, Some(0));
}

#[tokio::test]
async fn set_get_destroy_scenario() {
    let (store, table) = test_store().await;

    store.set("abc", &payload(json!({"name": "x"}))).await.unwrap();
    assert!(table
        .get_item(&store.options().table, "test:abc")
        .await
        .unwrap()
        .is_some());

    let loaded = store.get("abc").await.unwrap().unwrap();
    assert_eq!(loaded.get("name"), Some(&json!("x")));
    assert!(loaded.updated().is_some());
    assert_eq!(loaded.as_map().len(), 2);

    store.destroy("abc").await.unwrap();
    assert_eq!(store.get("abc").await.unwrap(), None);
}

/// A table service whose every call fails.
#[derive(Debug)]
struct FailingTable;

fn unavailable() -> TableError {
    TableError::Service("service unavailable".into())
}

#[async_trait]
impl TableService for FailingTable {
    async fn describe_table(&self, _: &TableOptions) -> Result<TableDescription, TableError> {
        Err(unavailable())
    }

    async fn create_table(&self, _: &TableOptions) -> Result<(), TableError> {
        Err(unavailable())
    }

    async fn get_item(&self, _: &TableOptions, _: &str) -> Result<Option<SessionItem>, TableError> {
        Err(unavailable())
    }

    async fn put_item(&self, _: &TableOptions, _: SessionItem) -> Result<(), TableError> {
        Err(unavailable())
    }

    async fn update_expiry(&self, _: &TableOptions, _: &str, _: i64, _: i64) -> Result<bool, TableError> {
        Err(unavailable())
    }

    async fn delete_item(&self, _: &TableOptions, _: &str) -> Result<(), TableError> {
        Err(unavailable())
    }

    async fn scan_expired(&self, _: &TableOptions, _: i64) -> Result<Vec<String>, TableError> {
        Err(unavailable())
    }
}

#[tokio::test]
async fn provisioning_failure_is_reported() {
    let store = DynamoDbStore::new(FailingTable, test_options()).unwrap();

    match store.ensure_table().await {
        Err(Error::Provision { table, source }) => {
            assert_eq!(table, "test-sessions");
            assert!(matches!(source, TableError::Service(_)));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn storage_errors_are_propagated() {
    let store = DynamoDbStore::new(FailingTable, test_options()).unwrap();
    let session = payload(json!({"name": "x"}));

    assert!(matches!(
        store.set("abc", &session).await,
        Err(Error::Table(TableError::Service(_)))
    ));
    assert!(matches!(
        store.get("abc").await,
        Err(Error::Table(TableError::Service(_)))
    ));
    assert!(matches!(
        store.destroy("abc").await,
        Err(Error::Table(TableError::Service(_)))
    ));
    assert!(matches!(
        store.touch("abc", &session).await,
        Err(Error::Table(TableError::Service(_)))
    ));
}

#[tokio::test]
async fn throttled_touch_skips_the_table_entirely() {
    let store = DynamoDbStore::new(FailingTable, test_options()).unwrap();
    let mut session = SessionData::new();
    session.insert("updated", json!(to_seconds_epoch(OffsetDateTime::now_utc()) * 1_000));

    store.touch("abc", &session).await.unwrap();
}

#[tokio::test]
async fn tower_session_round_trip() {
    let (store, table) = test_store().await;
    let mut record = Record {
        id: Id::default(),
        data: HashMap::from([("user_id".to_string(), json!(123))]),
        expiry_date: OffsetDateTime::now_utc() + Duration::hours(1),
    };

    store.create(&mut record).await.unwrap();
    let loaded = store.load(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, record.id);
    assert_eq!(loaded.data, record.data);
    assert!((loaded.expiry_date - record.expiry_date).abs() <= Duration::seconds(2));

    let item = raw_item(&store, &table, &record.id.to_string()).await.unwrap();
    assert_eq!(item.sess.get("data"), Some(&json!({"user_id": 123})));

    store.delete(&record.id).await.unwrap();
    assert!(store.load(&record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn tower_create_regenerates_colliding_id() {
    let (store, _) = test_store().await;
    let id = Id::default();
    let expiry_date = OffsetDateTime::now_utc() + Duration::hours(1);

    let mut first = Record {
        id,
        data: HashMap::from([("owner".to_string(), json!("first"))]),
        expiry_date,
    };
    store.create(&mut first).await.unwrap();
    assert_eq!(first.id, id);

    let mut second = Record {
        id,
        data: HashMap::from([("owner".to_string(), json!("second"))]),
        expiry_date,
    };
    store.create(&mut second).await.unwrap();
    assert_ne!(second.id, id);

    let original = store.load(&id).await.unwrap().unwrap();
    assert_eq!(original.data.get("owner"), Some(&json!("first")));
}

#[tokio::test]
async fn tower_load_ignores_expired_records() {
    let (store, _) = test_store().await;
    let record = Record {
        id: Id::default(),
        data: HashMap::new(),
        expiry_date: OffsetDateTime::now_utc() - Duration::minutes(1),
    };

    store.save(&record).await.unwrap();
    assert!(store.load(&record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_expired_removes_only_expired_sessions() {
    let (store, table) = store_with(test_options().with_keep_expired(true)).await;

    store
        .set("old-1", &payload(json!({"cookie": {"maxAge": -5_000}})))
        .await
        .unwrap();
    store
        .set("old-2", &payload(json!({"cookie": {"maxAge": -5_000}})))
        .await
        .unwrap();
    store.set("live", &SessionData::new()).await.unwrap();
    table
        .put_item(
            &store.options().table,
            SessionItem {
                key: "other:old".into(),
                expires: Some(1),
                sess: SessionData::new(),
            },
        )
        .await
        .unwrap();

    store.delete_expired().await.unwrap();

    assert!(raw_item(&store, &table, "old-1").await.is_none());
    assert!(raw_item(&store, &table, "old-2").await.is_none());
    assert!(raw_item(&store, &table, "live").await.is_some());
    assert_eq!(table.len("test-sessions").await, Some(2));
}

#[tokio::test]
async fn tower_errors_map_to_backend() {
    let store = DynamoDbStore::new(FailingTable, test_options()).unwrap();

    let err = store.load(&Id::default()).await.unwrap_err();
    assert!(matches!(err, tower_sessions_dynamodb_store::session_store::Error::Backend(_)));
}
