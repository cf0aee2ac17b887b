use crate::domain::model::ContentRecord;
use crate::error::{IngestError, StoreError};
use crate::store::ContentStore;
use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Mints short lowercase-alphanumeric tokens and stores records under them.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    length: usize,
    max_attempts: u32,
}

impl TokenGenerator {
    pub fn new(length: usize, max_attempts: u32) -> Self {
        Self {
            length,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
            .collect()
    }

    /// Store the record returned by `build` under a fresh token.
    ///
    /// A candidate is skipped when it already exists, and a `DuplicateToken`
    /// from `put` (another writer won the race) also counts as a collision.
    pub async fn issue<F>(
        &self,
        store: &dyn ContentStore,
        mut build: F,
    ) -> Result<ContentRecord, IngestError>
    where
        F: FnMut(String) -> ContentRecord,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.generate();
            if store.exists(&candidate).await? {
                tracing::debug!("Token collision on attempt {attempt}, retrying");
                continue;
            }

            let record = build(candidate);
            match store.put(&record).await {
                Ok(()) => return Ok(record),
                Err(StoreError::DuplicateToken(token)) => {
                    tracing::debug!("Token {token} taken concurrently on attempt {attempt}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            "Token generation exhausted after {} attempts (length {}); the token space needs attention",
            self.max_attempts,
            self.length
        );
        Err(IngestError::GenerationExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// `https://t.me/<bot>?start=<token>`. Tokens are `[a-z0-9]`, so no escaping.
pub fn deep_link(bot_username: &str, token: &str) -> String {
    format!(
        "https://t.me/{}?start={token}",
        bot_username.trim_start_matches('@')
    )
}

/// Telegram share sheet for a link.
pub fn share_link(link: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(link.as_bytes()).collect();
    format!("https://t.me/share/url?url={encoded}")
}
