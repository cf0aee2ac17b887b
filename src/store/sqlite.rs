use super::{ContentStore, SessionStore, SettingsStore, UserStore};
use crate::domain::model::{
    BundleSession, ContentKind, ContentRecord, MessageRef, UploadMode, UserRecord,
};
use crate::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const SCHEMA_VERSION_KEY: &str = "linkvault_schema_version";
const SCHEMA_VERSION: u32 = 1;
const UPLOAD_MODE_KEY: &str = "upload_mode";

/// SQLite-backed store for every persistent collection.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and run migrations.
    pub async fn open(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        // Each connection to `:memory:` is its own database.
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            max_connections.max(1)
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Self::new(pool).await
    }

    /// Wrap an existing pool and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        ensure_schema_version(&pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS content_records (
                 token            TEXT PRIMARY KEY,
                 kind             TEXT NOT NULL,
                 items            TEXT NOT NULL,
                 owner_id         INTEGER NOT NULL,
                 display_name     TEXT,
                 required_channel TEXT,
                 created_at       TEXT NOT NULL,
                 expires_at       TEXT
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_content_records_owner
                 ON content_records(owner_id, created_at)",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                 user_id      INTEGER PRIMARY KEY,
                 display_name TEXT,
                 first_seen   TEXT NOT NULL,
                 last_seen    TEXT NOT NULL,
                 is_banned    INTEGER NOT NULL DEFAULT 0
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS bundle_sessions (
                 user_id            INTEGER PRIMARY KEY,
                 items              TEXT NOT NULL DEFAULT '[]',
                 required_channel   TEXT,
                 display_name       TEXT,
                 expires_after_secs INTEGER,
                 created_at         TEXT NOT NULL,
                 expires_at         TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn ensure_schema_version(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(SCHEMA_META_TABLE).execute(pool).await?;

    let stored: Option<(String,)> = sqlx::query_as("SELECT value FROM schema_meta WHERE key = $1")
        .bind(SCHEMA_VERSION_KEY)
        .fetch_optional(pool)
        .await?;

    if let Some((value,)) = stored {
        let parsed = value.parse::<u32>().map_err(|_| {
            StoreError::Backend(format!("invalid schema version value: {value}"))
        })?;
        if parsed != SCHEMA_VERSION {
            return Err(StoreError::Backend(format!(
                "incompatible schema version: stored={parsed}, expected={SCHEMA_VERSION}"
            )));
        }
        return Ok(());
    }

    sqlx::query("INSERT INTO schema_meta (key, value) VALUES ($1, $2)")
        .bind(SCHEMA_VERSION_KEY)
        .bind(SCHEMA_VERSION.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Fixed-width UTC timestamps so text comparison in SQL matches time order.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("invalid timestamp {raw}: {e}")))
}

fn map_record_row(row: &SqliteRow) -> Result<ContentRecord, StoreError> {
    let kind_raw: String = row.try_get("kind")?;
    let kind = ContentKind::parse(&kind_raw)
        .ok_or_else(|| StoreError::Backend(format!("unknown record kind: {kind_raw}")))?;
    let items_raw: String = row.try_get("items")?;
    let created_raw: String = row.try_get("created_at")?;
    let expires_raw: Option<String> = row.try_get("expires_at")?;

    let record = ContentRecord {
        token: row.try_get("token")?,
        kind,
        items: serde_json::from_str(&items_raw)?,
        owner_id: row.try_get("owner_id")?,
        display_name: row.try_get("display_name")?,
        required_channel: row.try_get("required_channel")?,
        created_at: decode_ts(&created_raw)?,
        expires_at: expires_raw.as_deref().map(decode_ts).transpose()?,
    };
    record
        .check_shape()
        .map_err(|e| StoreError::Backend(format!("corrupt record {}: {e}", record.token)))?;
    Ok(record)
}

fn map_user_row(row: &SqliteRow) -> Result<UserRecord, StoreError> {
    let first_seen: String = row.try_get("first_seen")?;
    let last_seen: String = row.try_get("last_seen")?;
    Ok(UserRecord {
        user_id: row.try_get("user_id")?,
        display_name: row.try_get("display_name")?,
        first_seen: decode_ts(&first_seen)?,
        last_seen: decode_ts(&last_seen)?,
        is_banned: row.try_get("is_banned")?,
    })
}

fn map_session_row(row: &SqliteRow) -> Result<BundleSession, StoreError> {
    let items_raw: String = row.try_get("items")?;
    let created_raw: String = row.try_get("created_at")?;
    let expires_raw: String = row.try_get("expires_at")?;
    let expires_after: Option<i64> = row.try_get("expires_after_secs")?;

    Ok(BundleSession {
        user_id: row.try_get("user_id")?,
        collected_items: serde_json::from_str(&items_raw)?,
        required_channel: row.try_get("required_channel")?,
        display_name: row.try_get("display_name")?,
        #[allow(clippy::cast_sign_loss)]
        expires_after: expires_after.map(|secs| Duration::from_secs(secs.max(0) as u64)),
        created_at: decode_ts(&created_raw)?,
        expires_at: decode_ts(&expires_raw)?,
    })
}

#[allow(clippy::cast_sign_loss)]
fn count_to_u64(value: i64) -> u64 {
    value.max(0) as u64
}

const RECORD_COLUMNS: &str =
    "token, kind, items, owner_id, display_name, required_channel, created_at, expires_at";

impl ContentStore for SqliteStore {
    fn put<'a>(
        &'a self,
        record: &'a ContentRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let items = serde_json::to_string(&record.items)?;
            let result = sqlx::query(
                "INSERT INTO content_records
                     (token, kind, items, owner_id, display_name, required_channel, created_at, expires_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT(token) DO NOTHING",
            )
            .bind(&record.token)
            .bind(record.kind.as_str())
            .bind(items)
            .bind(record.owner_id)
            .bind(record.display_name.as_deref())
            .bind(record.required_channel.as_deref())
            .bind(encode_ts(record.created_at))
            .bind(record.expires_at.map(encode_ts))
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::DuplicateToken(record.token.clone()));
            }
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ContentRecord>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {RECORD_COLUMNS} FROM content_records WHERE token = $1"
            ))
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };
            let record = map_record_row(&row)?;
            if record.is_expired_at(Utc::now()) {
                return Ok(None);
            }
            Ok(Some(record))
        })
    }

    fn exists<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let found: Option<(i64,)> =
                sqlx::query_as("SELECT 1 FROM content_records WHERE token = $1")
                    .bind(token)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(found.is_some())
        })
    }

    fn delete<'a>(
        &'a self,
        token: &'a str,
        owner_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<ContentRecord, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {RECORD_COLUMNS} FROM content_records WHERE token = $1"
            ))
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else {
                return Err(StoreError::NotFound(token.to_string()));
            };
            let record = map_record_row(&row)?;
            if record.owner_id != owner_id {
                return Err(StoreError::PermissionDenied {
                    token: token.to_string(),
                    user_id: owner_id,
                });
            }

            let result =
                sqlx::query("DELETE FROM content_records WHERE token = $1 AND owner_id = $2")
                    .bind(token)
                    .bind(owner_id)
                    .execute(&self.pool)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(token.to_string()));
            }
            Ok(record)
        })
    }

    fn list_by_owner<'a>(
        &'a self,
        owner_id: i64,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ContentRecord>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {RECORD_COLUMNS}
                 FROM content_records
                 WHERE owner_id = $1 AND (expires_at IS NULL OR expires_at > $2)
                 ORDER BY created_at DESC
                 LIMIT $3"
            ))
            .bind(owner_id)
            .bind(encode_ts(Utc::now()))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(map_record_row).collect()
        })
    }

    fn purge_expired<'a>(
        &'a self,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query(
                "DELETE FROM content_records WHERE expires_at IS NOT NULL AND expires_at <= $1",
            )
            .bind(encode_ts(now))
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
    }

    fn count<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content_records")
                .fetch_one(&self.pool)
                .await?;
            Ok(count_to_u64(count))
        })
    }
}

impl UserStore for SqliteStore {
    fn touch_user<'a>(
        &'a self,
        user_id: i64,
        display_name: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let now = encode_ts(Utc::now());
            sqlx::query(
                "INSERT INTO users (user_id, display_name, first_seen, last_seen, is_banned)
                 VALUES ($1, $2, $3, $3, 0)
                 ON CONFLICT(user_id) DO UPDATE SET
                     display_name = COALESCE(excluded.display_name, users.display_name),
                     last_seen = excluded.last_seen",
            )
            .bind(user_id)
            .bind(display_name)
            .bind(&now)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn get_user<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<UserRecord>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT user_id, display_name, first_seen, last_seen, is_banned
                 FROM users
                 WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(|r| map_user_row(&r)).transpose()
        })
    }

    fn set_banned<'a>(
        &'a self,
        user_id: i64,
        banned: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let now = encode_ts(Utc::now());
            sqlx::query(
                "INSERT INTO users (user_id, display_name, first_seen, last_seen, is_banned)
                 VALUES ($1, NULL, $2, $2, $3)
                 ON CONFLICT(user_id) DO UPDATE SET is_banned = excluded.is_banned",
            )
            .bind(user_id)
            .bind(&now)
            .bind(banned)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn is_banned<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let banned: Option<(bool,)> =
                sqlx::query_as("SELECT is_banned FROM users WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(banned.is_some_and(|(banned,)| banned))
        })
    }

    fn broadcast_recipients<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<i64>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let rows: Vec<(i64,)> =
                sqlx::query_as("SELECT user_id FROM users WHERE is_banned = 0 ORDER BY user_id")
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        })
    }

    fn user_counts<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(u64, u64), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let (total, banned): (i64, i64) = sqlx::query_as(
                "SELECT COUNT(*), COALESCE(SUM(is_banned), 0) FROM users",
            )
            .fetch_one(&self.pool)
            .await?;
            Ok((count_to_u64(total), count_to_u64(banned)))
        })
    }
}

impl SettingsStore for SqliteStore {
    fn upload_mode<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<UploadMode>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let value: Option<(String,)> =
                sqlx::query_as("SELECT value FROM settings WHERE key = $1")
                    .bind(UPLOAD_MODE_KEY)
                    .fetch_optional(&self.pool)
                    .await?;
            match value {
                None => Ok(None),
                Some((raw,)) => UploadMode::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| StoreError::Backend(format!("unknown upload mode: {raw}"))),
            }
        })
    }

    fn set_upload_mode<'a>(
        &'a self,
        mode: UploadMode,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES ($1, $2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(UPLOAD_MODE_KEY)
            .bind(mode.as_str())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }
}

impl SessionStore for SqliteStore {
    fn get_session<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<BundleSession>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT user_id, items, required_channel, display_name, expires_after_secs,
                        created_at, expires_at
                 FROM bundle_sessions
                 WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(|r| map_session_row(&r)).transpose()
        })
    }

    fn put_session<'a>(
        &'a self,
        session: &'a BundleSession,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let items = serde_json::to_string(&session.collected_items)?;
            let expires_after = session
                .expires_after
                .map(|ttl| i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
            sqlx::query(
                "INSERT OR REPLACE INTO bundle_sessions
                     (user_id, items, required_channel, display_name, expires_after_secs,
                      created_at, expires_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(session.user_id)
            .bind(items)
            .bind(session.required_channel.as_deref())
            .bind(session.display_name.as_deref())
            .bind(expires_after)
            .bind(encode_ts(session.created_at))
            .bind(encode_ts(session.expires_at))
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn append_item<'a>(
        &'a self,
        user_id: i64,
        item: MessageRef,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<usize>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let item = serde_json::to_string(&item)?;
            let len: Option<(i64,)> = sqlx::query_as(
                "UPDATE bundle_sessions
                 SET items = json_insert(items, '$[#]', json($1)),
                     expires_at = $2
                 WHERE user_id = $3 AND expires_at > $4
                 RETURNING json_array_length(items)",
            )
            .bind(item)
            .bind(encode_ts(expires_at))
            .bind(user_id)
            .bind(encode_ts(now))
            .fetch_optional(&self.pool)
            .await?;
            Ok(len.map(|(len,)| usize::try_from(len).unwrap_or(0)))
        })
    }

    fn delete_session<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM bundle_sessions WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }
}
