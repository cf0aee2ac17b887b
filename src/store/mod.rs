//! Persistence contracts for links, users, settings and bundle sessions.
//!
//! Every mutation is a single-row statement; nothing here needs a
//! multi-row transaction. Token uniqueness comes from the primary key.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::domain::model::{BundleSession, ContentRecord, MessageRef, UploadMode, UserRecord};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

pub trait ContentStore: Send + Sync {
    /// Insert a new record. `DuplicateToken` if the token is taken.
    fn put<'a>(
        &'a self,
        record: &'a ContentRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Look up a live record. Expired records read as absent.
    fn get<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ContentRecord>, StoreError>> + Send + 'a>>;

    /// Whether the token is taken, expired rows included.
    fn exists<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>>;

    /// Remove a record owned by `owner_id` and return it.
    fn delete<'a>(
        &'a self,
        token: &'a str,
        owner_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<ContentRecord, StoreError>> + Send + 'a>>;

    /// Newest live records of one owner.
    fn list_by_owner<'a>(
        &'a self,
        owner_id: i64,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ContentRecord>, StoreError>> + Send + 'a>>;

    fn purge_expired<'a>(
        &'a self,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + 'a>>;

    fn count<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + 'a>>;
}

pub trait UserStore: Send + Sync {
    /// Create or refresh a user on every inbound interaction.
    fn touch_user<'a>(
        &'a self,
        user_id: i64,
        display_name: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    fn get_user<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<UserRecord>, StoreError>> + Send + 'a>>;

    /// Toggle the ban flag, creating the user row if it does not exist yet.
    fn set_banned<'a>(
        &'a self,
        user_id: i64,
        banned: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    fn is_banned<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>>;

    /// Every known user that is not banned.
    fn broadcast_recipients<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<i64>, StoreError>> + Send + 'a>>;

    /// `(total, banned)`
    fn user_counts<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(u64, u64), StoreError>> + Send + 'a>>;
}

pub trait SettingsStore: Send + Sync {
    fn upload_mode<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<UploadMode>, StoreError>> + Send + 'a>>;

    fn set_upload_mode<'a>(
        &'a self,
        mode: UploadMode,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}

pub trait SessionStore: Send + Sync {
    /// Raw session row; expiry is interpreted by the caller.
    fn get_session<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<BundleSession>, StoreError>> + Send + 'a>>;

    /// Insert or replace the user's session.
    fn put_session<'a>(
        &'a self,
        session: &'a BundleSession,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Append to a session that is still live at `now` and push its expiry to
    /// `expires_at`. Returns the new item count, `None` without a live session.
    fn append_item<'a>(
        &'a self,
        user_id: i64,
        item: MessageRef,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<usize>, StoreError>> + Send + 'a>>;

    fn delete_session<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>>;
}
