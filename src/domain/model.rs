use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A message living in some chat: an archived copy in the archive channel, or
/// a source message in the uploader's private chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Single,
    Bundle,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Bundle => "bundle",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single" => Some(Self::Single),
            "bundle" => Some(Self::Bundle),
            _ => None,
        }
    }
}

/// One shareable unit behind a token. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub token: String,
    pub kind: ContentKind,
    pub items: Vec<MessageRef>,
    pub owner_id: i64,
    pub display_name: Option<String>,
    pub required_channel: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Why a record could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("{} record with {len} items", .kind.as_str())]
    Shape { kind: ContentKind, len: usize },

    #[error("expiry of {}s is out of range", .0.as_secs())]
    Expiry(Duration),
}

impl ContentRecord {
    /// Build a record, enforcing that `items` is non-empty and that a single
    /// record carries exactly one item.
    pub fn new(
        token: String,
        kind: ContentKind,
        items: Vec<MessageRef>,
        owner_id: i64,
        options: &UploadOptions,
        created_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        check_shape(kind, items.len())?;
        let expires_at = options.expires_at(created_at)?;
        Ok(Self {
            token,
            kind,
            items,
            owner_id,
            display_name: options.display_name.clone(),
            required_channel: options.required_channel.clone(),
            created_at,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn check_shape(&self) -> Result<(), RecordError> {
        check_shape(self.kind, self.items.len())
    }
}

fn check_shape(kind: ContentKind, len: usize) -> Result<(), RecordError> {
    let ok = match kind {
        ContentKind::Single => len == 1,
        ContentKind::Bundle => len > 0,
    };
    if ok {
        Ok(())
    } else {
        Err(RecordError::Shape { kind, len })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_banned: bool,
}

/// Items collected by `/batch` before `/done` turns them into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSession {
    pub user_id: i64,
    pub collected_items: Vec<MessageRef>,
    pub required_channel: Option<String>,
    pub display_name: Option<String>,
    pub expires_after: Option<Duration>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl BundleSession {
    pub fn options(&self) -> UploadOptions {
        UploadOptions {
            required_channel: self.required_channel.clone(),
            display_name: self.display_name.clone(),
            expires_after: self.expires_after,
            rejected_expiry: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    #[default]
    Public,
    AdminsOnly,
}

impl UploadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::AdminsOnly => "admins_only",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Self::Public),
            "admins_only" | "admins" | "private" => Some(Self::AdminsOnly),
            _ => None,
        }
    }
}

/// Who is uploading, as far as the upload gate cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uploader {
    pub user_id: i64,
    pub is_admin: bool,
}

/// Per-link constraints chosen at upload time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub required_channel: Option<String>,
    pub display_name: Option<String>,
    pub expires_after: Option<Duration>,
    /// A well-formed expiry beyond [`MAX_TTL`], kept so the upload can be refused.
    pub rejected_expiry: Option<String>,
}

impl UploadOptions {
    /// Parse `channel=@c expires=12h some name` style arguments. Unknown words
    /// become the display name.
    pub fn parse(input: &str) -> Self {
        let mut options = Self::default();
        let mut name_words = Vec::new();

        for word in input.split_whitespace() {
            match word.split_once('=') {
                Some(("channel" | "ch", value)) if !value.is_empty() => {
                    options.required_channel = Some(value.to_string());
                }
                Some(("expires" | "ttl", value)) => match parse_duration(value) {
                    Some(ttl) => options.expires_after = Some(ttl),
                    None if duration_secs(value).is_some_and(|secs| secs > MAX_TTL.as_secs()) => {
                        options.rejected_expiry = Some(value.to_string());
                    }
                    None => name_words.push(word),
                },
                _ => name_words.push(word),
            }
        }

        if !name_words.is_empty() {
            options.display_name = Some(name_words.join(" "));
        }
        options
    }

    /// Fill an absent expiry with the configured default.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        if self.expires_after.is_none() {
            self.expires_after = ttl;
        }
        self
    }

    /// Absolute expiry for a record created at `created_at`.
    pub fn expires_at(&self, created_at: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, RecordError> {
        let Some(ttl) = self.expires_after else {
            return Ok(None);
        };
        ChronoDuration::from_std(ttl)
            .ok()
            .and_then(|delta| created_at.checked_add_signed(delta))
            .map(Some)
            .ok_or(RecordError::Expiry(ttl))
    }
}

/// Longest expiry a link may carry.
pub const MAX_TTL: Duration = Duration::from_secs(3650 * 86_400);

/// `90`, `90s`, `30m`, `12h`, `7d`. Zero and anything beyond [`MAX_TTL`] are
/// rejected.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let secs = duration_secs(value)?;
    (secs > 0 && secs <= MAX_TTL.as_secs()).then(|| Duration::from_secs(secs))
}

/// Seconds named by a duration string, saturating at `u64::MAX`.
fn duration_secs(value: &str) -> Option<u64> {
    let value = value.trim();
    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value, "s"),
    };
    if digits.is_empty() {
        return None;
    }
    let amount = digits.parse::<u64>().unwrap_or(u64::MAX);
    let factor: u64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return None,
    };
    Some(amount.saturating_mul(factor))
}

/// Short human form used in replies: `45s`, `10m`, `3h`, `2d`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 86_400 && secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
