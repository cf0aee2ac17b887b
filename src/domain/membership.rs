use crate::chat::ChatPlatform;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Answers "which of these channels has the user not joined yet?".
pub trait MembershipOracle: Send + Sync {
    /// Channels from `channels` the user is not a member of, in input order.
    fn unsatisfied<'a>(
        &'a self,
        user_id: i64,
        channels: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Vec<String>> + Send + 'a>>;
}

/// Membership via the chat platform's `getChatMember`.
///
/// Lookups that fail or exceed the timeout count as "not a member": letting
/// them through would leak gated content. There is no retry.
pub struct PlatformMembershipOracle {
    platform: Arc<dyn ChatPlatform>,
    timeout: Duration,
}

impl PlatformMembershipOracle {
    pub fn new(platform: Arc<dyn ChatPlatform>, timeout: Duration) -> Self {
        Self { platform, timeout }
    }

    async fn is_member(&self, user_id: i64, channel: &str) -> bool {
        match tokio::time::timeout(self.timeout, self.platform.get_chat_member(channel, user_id))
            .await
        {
            Ok(Ok(status)) => status.is_member(),
            Ok(Err(e)) => {
                tracing::warn!("Membership check for user {user_id} in {channel} failed: {e}");
                false
            }
            Err(_) => {
                tracing::warn!(
                    "Membership check for user {user_id} in {channel} timed out after {:?}",
                    self.timeout
                );
                false
            }
        }
    }
}

impl MembershipOracle for PlatformMembershipOracle {
    fn unsatisfied<'a>(
        &'a self,
        user_id: i64,
        channels: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Vec<String>> + Send + 'a>> {
        Box::pin(async move {
            let mut missing = Vec::new();
            for channel in channels {
                if !self.is_member(user_id, channel).await {
                    missing.push(channel.clone());
                }
            }
            missing
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MemberStatus;
    use crate::chat::fake::FakePlatform;

    fn oracle(platform: &Arc<FakePlatform>) -> PlatformMembershipOracle {
        PlatformMembershipOracle::new(
            Arc::clone(platform) as Arc<dyn ChatPlatform>,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn reports_only_channels_the_user_has_not_joined() {
        let platform = Arc::new(FakePlatform::new());
        platform.set_member("@news", 7, MemberStatus::Member);
        platform.set_member("@vip", 7, MemberStatus::Left);
        platform.set_member("@ops", 7, MemberStatus::Administrator);

        let channels = vec!["@news".to_string(), "@vip".to_string(), "@ops".to_string()];
        let missing = oracle(&platform).unsatisfied(7, &channels).await;
        assert_eq!(missing, vec!["@vip".to_string()]);
    }

    #[tokio::test]
    async fn lookup_errors_fail_closed() {
        let platform = Arc::new(FakePlatform::new());
        platform.set_member("@news", 7, MemberStatus::Member);
        platform.fail_membership("@news");

        let channels = vec!["@news".to_string()];
        let missing = oracle(&platform).unsatisfied(7, &channels).await;
        assert_eq!(missing, channels);
    }

    #[tokio::test]
    async fn restricted_members_still_count() {
        let platform = Arc::new(FakePlatform::new());
        platform.set_member("@news", 7, MemberStatus::Restricted { is_member: true });
        platform.set_member("@news", 8, MemberStatus::Kicked);

        let channels = vec!["@news".to_string()];
        let oracle = oracle(&platform);
        assert!(oracle.unsatisfied(7, &channels).await.is_empty());
        assert_eq!(oracle.unsatisfied(8, &channels).await, channels);
    }

    #[tokio::test]
    async fn slow_lookup_counts_as_missing() {
        let platform = Arc::new(FakePlatform::new());
        platform.set_member("@slow", 7, MemberStatus::Member);
        platform.set_member("@fast", 7, MemberStatus::Member);
        platform.delay_membership("@slow", Duration::from_secs(2));

        let oracle = PlatformMembershipOracle::new(
            Arc::clone(&platform) as Arc<dyn ChatPlatform>,
            Duration::from_millis(50),
        );
        let channels = vec!["@slow".to_string(), "@fast".to_string()];
        let started = std::time::Instant::now();
        let missing = oracle.unsatisfied(7, &channels).await;
        assert_eq!(missing, vec!["@slow".to_string()]);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
