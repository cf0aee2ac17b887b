//! Token → access decision.
//!
//! `resolve` walks lookup, ban check and membership gate in that order and
//! never has side effects, so the "I have joined" button can call it again
//! as often as the user presses it.

use crate::domain::membership::MembershipOracle;
use crate::domain::model::{ContentRecord, MessageRef};
use crate::error::LinkError;
use crate::store::{ContentStore, UserStore};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Unknown or expired token.
    NotFound,
    Banned,
    /// Channels still to join, in gate order.
    Denied { missing: Vec<String> },
    Allowed { record: ContentRecord },
}

impl Outcome {
    pub fn items(&self) -> &[MessageRef] {
        match self {
            Self::Allowed { record } => &record.items,
            _ => &[],
        }
    }
}

pub struct LinkResolver {
    store: Arc<dyn ContentStore>,
    users: Arc<dyn UserStore>,
    oracle: Arc<dyn MembershipOracle>,
    global_gate: Vec<String>,
}

impl LinkResolver {
    pub fn new(
        store: Arc<dyn ContentStore>,
        users: Arc<dyn UserStore>,
        oracle: Arc<dyn MembershipOracle>,
        global_gate: Vec<String>,
    ) -> Self {
        Self {
            store,
            users,
            oracle,
            global_gate,
        }
    }

    pub async fn resolve(&self, token: &str, user_id: i64) -> Result<Outcome, LinkError> {
        let Some(record) = self.store.get(token).await? else {
            return Ok(Outcome::NotFound);
        };

        if self.users.is_banned(user_id).await? {
            tracing::info!("Banned user {user_id} tried to open {token}");
            return Ok(Outcome::Banned);
        }

        let gate = self.gate_for(&record);
        if !gate.is_empty() {
            let missing = self.oracle.unsatisfied(user_id, &gate).await;
            if !missing.is_empty() {
                return Ok(Outcome::Denied { missing });
            }
        }

        Ok(Outcome::Allowed { record })
    }

    /// Global channels in configured order, then the record's own channel,
    /// without duplicates.
    fn gate_for(&self, record: &ContentRecord) -> Vec<String> {
        let mut gate: Vec<String> = Vec::with_capacity(self.global_gate.len() + 1);
        let candidates = self
            .global_gate
            .iter()
            .chain(record.required_channel.iter());
        for channel in candidates {
            let channel = channel.trim();
            if !channel.is_empty() && !gate.iter().any(|c| c.eq_ignore_ascii_case(channel)) {
                gate.push(channel.to_string());
            }
        }
        gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::fake::{Call, FakePlatform};
    use crate::chat::{ChatPlatform, MemberStatus};
    use crate::domain::membership::PlatformMembershipOracle;
    use crate::domain::model::{ContentKind, UploadOptions};
    use crate::store::SqliteStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    struct Fixture {
        store: SqliteStore,
        platform: Arc<FakePlatform>,
    }

    impl Fixture {
        async fn new() -> Self {
            Self {
                store: SqliteStore::open("sqlite::memory:", 1).await.unwrap(),
                platform: Arc::new(FakePlatform::new()),
            }
        }

        fn resolver(&self, gate: &[&str]) -> LinkResolver {
            let oracle = PlatformMembershipOracle::new(
                Arc::clone(&self.platform) as Arc<dyn ChatPlatform>,
                Duration::from_secs(1),
            );
            LinkResolver::new(
                Arc::new(self.store.clone()),
                Arc::new(self.store.clone()),
                Arc::new(oracle),
                gate.iter().map(|c| (*c).to_string()).collect(),
            )
        }

        async fn put(&self, token: &str, channel: Option<&str>, items: Vec<MessageRef>) {
            let kind = if items.len() == 1 {
                ContentKind::Single
            } else {
                ContentKind::Bundle
            };
            let options = UploadOptions {
                required_channel: channel.map(str::to_string),
                ..UploadOptions::default()
            };
            let record =
                ContentRecord::new(token.into(), kind, items, 1, &options, Utc::now()).unwrap();
            self.store.put(&record).await.unwrap();
        }

        fn membership_lookups(&self) -> usize {
            self.platform
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::GetChatMember { .. }))
                .count()
        }
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let fx = Fixture::new().await;
        let outcome = fx.resolver(&["@news"]).resolve("nothere1", 5).await.unwrap();
        assert_eq!(outcome, Outcome::NotFound);
        assert_eq!(fx.membership_lookups(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_not_found_even_for_members() {
        let fx = Fixture::new().await;
        let mut record = ContentRecord::new(
            "expired1".into(),
            ContentKind::Single,
            vec![MessageRef::new(-100, 1)],
            1,
            &UploadOptions::default(),
            Utc::now(),
        )
        .unwrap();
        record.expires_at = Some(Utc::now() - ChronoDuration::seconds(1));
        fx.store.put(&record).await.unwrap();
        fx.platform.set_member("@news", 5, MemberStatus::Member);

        let outcome = fx.resolver(&["@news"]).resolve("expired1", 5).await.unwrap();
        assert_eq!(outcome, Outcome::NotFound);
    }

    #[tokio::test]
    async fn banned_user_is_refused_before_gating() {
        let fx = Fixture::new().await;
        fx.put("tok00001", None, vec![MessageRef::new(-100, 1)]).await;
        fx.store.set_banned(5, true).await.unwrap();

        let outcome = fx.resolver(&["@news"]).resolve("tok00001", 5).await.unwrap();
        assert_eq!(outcome, Outcome::Banned);
        assert_eq!(fx.membership_lookups(), 0);
    }

    #[tokio::test]
    async fn no_gate_means_allowed() {
        let fx = Fixture::new().await;
        fx.put("tok00002", None, vec![MessageRef::new(-100, 7)]).await;

        let outcome = fx.resolver(&[]).resolve("tok00002", 5).await.unwrap();
        assert_eq!(outcome.items(), &[MessageRef::new(-100, 7)]);
        assert_eq!(fx.membership_lookups(), 0);
    }

    #[tokio::test]
    async fn missing_channels_listed_in_gate_order() {
        let fx = Fixture::new().await;
        fx.put("tok00003", Some("@vip"), vec![MessageRef::new(-100, 1)])
            .await;
        fx.platform.set_member("@b", 5, MemberStatus::Member);

        let outcome = fx
            .resolver(&["@a", "@b", "@c"])
            .resolve("tok00003", 5)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Denied {
                missing: vec!["@a".into(), "@c".into(), "@vip".into()]
            }
        );
        assert!(outcome.items().is_empty());
    }

    #[tokio::test]
    async fn record_channel_duplicating_global_is_checked_once() {
        let fx = Fixture::new().await;
        fx.put("tok00004", Some("@news"), vec![MessageRef::new(-100, 1)])
            .await;
        fx.platform.set_member("@news", 5, MemberStatus::Member);

        let outcome = fx.resolver(&["@news"]).resolve("tok00004", 5).await.unwrap();
        assert!(matches!(outcome, Outcome::Allowed { .. }));
        assert_eq!(fx.membership_lookups(), 1);
    }

    #[tokio::test]
    async fn failed_lookup_denies() {
        let fx = Fixture::new().await;
        fx.put("tok00005", None, vec![MessageRef::new(-100, 1)]).await;
        fx.platform.fail_membership("@news");

        let outcome = fx.resolver(&["@news"]).resolve("tok00005", 5).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Denied {
                missing: vec!["@news".into()]
            }
        );
    }

    #[tokio::test]
    async fn retry_after_joining_allows_and_preserves_order() {
        let fx = Fixture::new().await;
        let items = vec![
            MessageRef::new(-100, 5),
            MessageRef::new(-100, 2),
            MessageRef::new(-100, 9),
        ];
        fx.put("tok00006", Some("@vip"), items.clone()).await;
        let resolver = fx.resolver(&[]);

        let first = resolver.resolve("tok00006", 5).await.unwrap();
        assert!(matches!(first, Outcome::Denied { .. }));

        fx.platform.set_member("@vip", 5, MemberStatus::Member);
        let second = resolver.resolve("tok00006", 5).await.unwrap();
        assert_eq!(second.items(), items.as_slice());

        let third = resolver.resolve("tok00006", 5).await.unwrap();
        assert_eq!(second, third);
    }
}
