use crate::chat::ChatPlatform;
use crate::domain::model::MessageRef;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
    /// Recipients that blocked the bot (403).
    pub blocked: usize,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed + self.blocked
    }
}

pub struct Broadcaster {
    platform: Arc<dyn ChatPlatform>,
    delay: Duration,
}

impl Broadcaster {
    pub fn new(platform: Arc<dyn ChatPlatform>, delay: Duration) -> Self {
        Self { platform, delay }
    }

    /// Copy `source` to every recipient, pausing between sends. One failing
    /// recipient never stops the run.
    pub async fn broadcast(&self, source: MessageRef, recipients: &[i64]) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        tracing::info!("Broadcasting message {} to {} users", source.message_id, recipients.len());

        for (idx, &user_id) in recipients.iter().enumerate() {
            if idx > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.platform.copy_message(user_id, source).await {
                Ok(_) => report.sent += 1,
                Err(e) if e.is_blocked() => {
                    tracing::debug!("User {user_id} blocked the bot");
                    report.blocked += 1;
                }
                Err(e) => {
                    tracing::warn!("Broadcast to user {user_id} failed: {e}");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Broadcast done: {} sent, {} failed, {} blocked",
            report.sent,
            report.failed,
            report.blocked
        );
        report
    }
}
