use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `linkvault`.
///
/// Each subsystem defines its own error variant. Handlers match on these to
/// pick the reply a user sees; binary plumbing continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum LinkError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Storage ─────────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Ingestion ───────────────────────────────────────────────────────
    #[error("ingest: {0}")]
    Ingest(#[from] IngestError),

    // ── Chat platform ───────────────────────────────────────────────────
    #[error("platform: {0}")]
    Platform(#[from] PlatformError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Store errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("token already exists: {0}")]
    DuplicateToken(String),

    #[error("user {user_id} does not own {token}")]
    PermissionDenied { token: String, user_id: i64 },

    #[error("backend: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Backend(format!("json: {err}"))
    }
}

// ─── Ingestion errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("uploads are restricted to admins")]
    UploadsRestricted,

    #[error("user {0} is banned")]
    Banned(i64),

    #[error("no active bundle session")]
    NoActiveSession,

    #[error("bundle has no items")]
    EmptyBundle,

    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),

    #[error("token generation exhausted after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    #[error("archive failed: {0}")]
    Archive(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ─── Chat platform errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{method} request failed: {message}")]
    Request { method: String, message: String },

    #[error("{method} rejected ({code}): {description}")]
    Api {
        method: String,
        code: i64,
        description: String,
    },

    #[error("{method} response malformed: {message}")]
    Decode { method: String, message: String },

    #[error("{method} timed out")]
    Timeout { method: String },
}

impl PlatformError {
    /// The recipient blocked the bot or deleted their account.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Api { code: 403, .. })
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, LinkError>;
