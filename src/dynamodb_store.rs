use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use tower_sessions::{session::Id, session::Record, session_store, ExpiredDeletion, SessionStore};
use tracing::{debug, instrument};

use crate::bootstrap::{self, TableStatus};
use crate::config::StoreOptions;
use crate::entity::session::SessionItem;
use crate::error::{Error, Result};
use crate::expiry::{self, to_millis_epoch, to_seconds_epoch};
use crate::repository::SessionRepository;
use crate::session::SessionData;
use crate::table::TableService;

/// Payload field holding `Record::data` for sessions written through
/// [`SessionStore`].
const RECORD_DATA_FIELD: &str = "data";

/// A DynamoDB-based session store.
///
/// `DynamoDbStore` keeps one item per session in a single table keyed by a
/// string hash key. It serves both the express-style [`SessionRepository`]
/// contract and `tower-sessions`' [`SessionStore`].
///
/// # Usage
///
/// ```no_run
/// use tower_sessions::Expiry;
/// use time::Duration;
/// use tower_sessions_dynamodb_store::{DynamoDbStore, StoreOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Resolve the client from the environment and create the table if needed
/// let store = DynamoDbStore::connect(StoreOptions::default().with_table_name("app-sessions")).await?;
///
/// let session_layer = tower_sessions::SessionManagerLayer::new(store)
///     .with_expiry(Expiry::OnInactivity(Duration::days(7)));
/// # Ok(())
/// # }
/// ```
///
/// # Table Layout
///
/// | Attribute   | Type | Description                                |
/// |-------------|------|--------------------------------------------|
/// | `sessionId` | S    | Hash prefix + session id (name configurable)|
/// | `expires`   | N    | Expiration in seconds since epoch           |
/// | `sess`      | M    | Session payload                             |
///
/// # Expiration
///
/// Reads treat a record whose `expires` has passed as absent. By default the
/// record is deleted on that read; with `keep_expired` it is left in place
/// for [`ExpiredDeletion::delete_expired`] or a table TTL to remove.
///
/// # Error Handling
///
/// Errors are returned as [`Error`]. Through the `tower-sessions` traits they
/// map to `session_store::Error`:
///
/// - Table service errors → `session_store::Error::Backend`
/// - Undecodable items → `session_store::Error::Decode`
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    table_service: Arc<dyn TableService>,
    options: Arc<StoreOptions>,
}

impl DynamoDbStore {
    /// Creates a store over `table_service` without touching the table.
    ///
    /// Call [`ensure_table`](Self::ensure_table) before serving requests.
    ///
    /// # Examples
    ///
    /// ```
    /// use tower_sessions_dynamodb_store::{DynamoDbStore, MemoryTable, StoreOptions};
    ///
    /// # async fn example() -> Result<(), tower_sessions_dynamodb_store::Error> {
    /// let store = DynamoDbStore::new(MemoryTable::new(), StoreOptions::default())?;
    /// store.ensure_table().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(table_service: impl TableService, options: StoreOptions) -> Result<Self> {
        Self::from_arc(Arc::new(table_service), options)
    }

    /// Like [`new`](Self::new), for a service shared with other owners.
    pub fn from_arc(table_service: Arc<dyn TableService>, options: StoreOptions) -> Result<Self> {
        options.validate()?;
        debug!(table = %options.table.name, keep_expired = options.keep_expired, "initializing store");
        Ok(Self {
            table_service,
            options: Arc::new(options),
        })
    }

    /// Resolves the DynamoDB client from `options` and the process
    /// environment, then makes sure the table exists.
    #[cfg(feature = "dynamodb")]
    pub async fn connect(options: StoreOptions) -> Result<Self> {
        let env = crate::config::process_env();
        let client_config = crate::config::resolve_config(&options.dynamo_config, &env)?;
        let table = crate::table::DynamoDbTable::connect(&client_config).await;

        let store = Self::new(table, options)?;
        store.ensure_table().await?;
        Ok(store)
    }

    /// Creates the session table unless it already exists.
    pub async fn ensure_table(&self) -> Result<TableStatus> {
        bootstrap::ensure_table(self.table_service.as_ref(), &self.options.table).await
    }

    /// The validated options this store was built with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Storage key of a raw session id.
    pub fn session_key(&self, sid: &str) -> String {
        self.options.table.key_for(sid)
    }

    /// Reads the item for `sid`, applying the expired-record policy.
    async fn load_live(&self, sid: &str) -> Result<Option<SessionItem>> {
        let key = self.session_key(sid);
        let item = self
            .table_service
            .get_item(&self.options.table, &key)
            .await
            .inspect_err(|err| debug!(sid, error = %err, "error getting session"))?;

        match item {
            None => {
                debug!(sid, "session not found");
                Ok(None)
            }
            Some(item) if item.is_expired(OffsetDateTime::now_utc()) => {
                self.handle_expired(sid).await?;
                Ok(None)
            }
            Some(item) => {
                debug!(sid, "session found");
                Ok(Some(item))
            }
        }
    }

    async fn handle_expired(&self, sid: &str) -> Result<()> {
        debug!(sid, keep_expired = self.options.keep_expired, "found session but it is expired");
        if self.options.keep_expired {
            Ok(())
        } else {
            SessionRepository::destroy(self, sid).await
        }
    }
}

#[async_trait]
impl SessionRepository for DynamoDbStore {
    /// Writes the session with a fresh expiry and `updated` marker.
    ///
    /// The expiry comes from `cookie.maxAge` when the payload has one and
    /// from the configured TTL otherwise.
    #[instrument(level = "debug", skip(self, session))]
    async fn set(&self, sid: &str, session: &SessionData) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let expires = expiry::expiration_date(session, self.options.default_ttl(), now);

        let mut sess = session.clone();
        sess.set_updated(to_millis_epoch(now));
        let item = SessionItem {
            key: self.session_key(sid),
            expires: Some(to_seconds_epoch(expires)),
            sess,
        };

        debug!(sid, expires = item.expires, "saving session");
        self.table_service
            .put_item(&self.options.table, item)
            .await
            .inspect_err(|err| debug!(sid, error = %err, "error saving session"))?;

        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get(&self, sid: &str) -> Result<Option<SessionData>> {
        Ok(self.load_live(sid).await?.map(|item| item.sess))
    }

    #[instrument(level = "debug", skip(self))]
    async fn destroy(&self, sid: &str) -> Result<()> {
        self.table_service
            .delete_item(&self.options.table, &self.session_key(sid))
            .await
            .inspect_err(|err| debug!(sid, error = %err, "error destroying session"))?;

        debug!(sid, "destroyed session");
        Ok(())
    }

    /// Refreshes `expires` and `updated` without rewriting the payload.
    ///
    /// Skipped entirely while the payload's `updated` marker is younger than
    /// the touch interval. Touching a session that no longer exists does not
    /// recreate it.
    #[instrument(level = "debug", skip(self, session))]
    async fn touch(&self, sid: &str, session: &SessionData) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let now_ms = to_millis_epoch(now);

        if !expiry::touch_due(session.updated(), self.options.touch_interval, now_ms) {
            debug!(sid, "skipping touch of session");
            return Ok(());
        }

        let expires = to_seconds_epoch(expiry::expiration_date(
            session,
            self.options.default_ttl(),
            now,
        ));
        debug!(sid, expires, "touching session");

        let refreshed = self
            .table_service
            .update_expiry(&self.options.table, &self.session_key(sid), expires, now_ms)
            .await
            .inspect_err(|err| debug!(sid, error = %err, "error touching session"))?;
        if !refreshed {
            debug!(sid, "session no longer stored, nothing to touch");
        }

        Ok(())
    }
}

/// Payload written for a `tower-sessions` record: the record data under
/// `data` and the remaining lifetime as `cookie.maxAge`.
fn record_to_session(record: &Record, now: OffsetDateTime) -> SessionData {
    let remaining = (record.expiry_date - now).whole_milliseconds();
    let max_age = i64::try_from(remaining).unwrap_or(if remaining < 0 { i64::MIN } else { i64::MAX });

    let mut session = SessionData::new().with_cookie_max_age(max_age);
    let data = record
        .data
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<serde_json::Map<_, _>>();
    session.insert(RECORD_DATA_FIELD, Value::Object(data));
    session
}

fn item_to_record(id: Id, item: SessionItem) -> Result<Record> {
    let expires = item
        .expires
        .ok_or_else(|| Error::InvalidTimestamp("missing expiry".to_string()))?;
    let data = match item.sess.into_map().remove(RECORD_DATA_FIELD) {
        Some(Value::Object(map)) => map.into_iter().collect::<HashMap<_, _>>(),
        Some(Value::Null) | None => HashMap::new(),
        Some(other) => {
            return Err(Error::Table(crate::error::TableError::Malformed(format!(
                "record data of session `{id}` is not an object: {other}"
            ))))
        }
    };

    Ok(Record {
        id,
        data,
        expiry_date: expiry::from_seconds_epoch(expires)?,
    })
}

#[async_trait]
impl SessionStore for DynamoDbStore {
    /// Creates a new session record.
    ///
    /// If an item already exists under the record's id a new id is
    /// generated until a free one is found.
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        // Session ID collision mitigation
        while self
            .table_service
            .get_item(&self.options.table, &self.session_key(&record.id.to_string()))
            .await
            .map_err(Error::from)?
            .is_some()
        {
            record.id = Id::default();
        }

        self.save(record).await
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let session = record_to_session(record, OffsetDateTime::now_utc());
        SessionRepository::set(self, &record.id.to_string(), &session).await?;
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        match self.load_live(&session_id.to_string()).await? {
            Some(item) => Ok(Some(item_to_record(*session_id, item)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        SessionRepository::destroy(self, &session_id.to_string()).await?;
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for DynamoDbStore {
    /// Deletes every item under the hash prefix whose expiry has passed.
    ///
    /// This scans the whole table, so run it periodically (for example from
    /// a background task once an hour) rather than per request.
    async fn delete_expired(&self) -> session_store::Result<()> {
        let now = to_seconds_epoch(OffsetDateTime::now_utc());
        let table = &self.options.table;

        let keys = self
            .table_service
            .scan_expired(table, now)
            .await
            .map_err(Error::from)?;
        for key in &keys {
            self.table_service
                .delete_item(table, key)
                .await
                .map_err(Error::from)?;
        }

        debug!(table = %table.name, deleted = keys.len(), "deleted expired sessions");
        Ok(())
    }
}
