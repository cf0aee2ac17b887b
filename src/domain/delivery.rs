use crate::chat::ChatPlatform;
use crate::domain::model::MessageRef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// `deleteMessages` accepts at most this many ids per call.
const DELETE_CHUNK: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Copies now sitting in the user's chat, in delivery order.
    pub sent: Vec<MessageRef>,
    pub failed: usize,
}

/// Copies archived items to users and removes archived items on revocation.
pub struct DeliveryOrchestrator {
    platform: Arc<dyn ChatPlatform>,
    item_delay: Duration,
}

impl DeliveryOrchestrator {
    pub fn new(platform: Arc<dyn ChatPlatform>, item_delay: Duration) -> Self {
        Self {
            platform,
            item_delay,
        }
    }

    /// Copy every item to `user_id` in stored order. A failed item is counted
    /// and the rest are still attempted.
    pub async fn deliver(&self, items: &[MessageRef], user_id: i64) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (idx, item) in items.iter().enumerate() {
            if idx > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            match self.platform.copy_message(user_id, *item).await {
                Ok(copy) => report.sent.push(copy),
                Err(e) => {
                    tracing::warn!(
                        "Delivery of {}/{} to user {user_id} failed: {e}",
                        item.chat_id,
                        item.message_id
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Delete archived items. Returns `(removed, failed)` counted per item.
    pub async fn purge_archive(&self, items: &[MessageRef]) -> (usize, usize) {
        delete_grouped(self.platform.as_ref(), items).await
    }
}

async fn delete_grouped(platform: &dyn ChatPlatform, items: &[MessageRef]) -> (usize, usize) {
    let mut by_chat: Vec<(i64, Vec<i64>)> = Vec::new();
    for item in items {
        match by_chat.iter_mut().find(|(chat, _)| *chat == item.chat_id) {
            Some((_, ids)) => ids.push(item.message_id),
            None => by_chat.push((item.chat_id, vec![item.message_id])),
        }
    }

    let (mut removed, mut failed) = (0, 0);
    for (chat_id, ids) in by_chat {
        for chunk in ids.chunks(DELETE_CHUNK) {
            match platform.delete_messages(chat_id, chunk).await {
                Ok(()) => removed += chunk.len(),
                Err(e) => {
                    tracing::warn!("Deleting {} messages in {chat_id} failed: {e}", chunk.len());
                    failed += chunk.len();
                }
            }
        }
    }
    (removed, failed)
}

/// Identifies one scheduled retraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetractionKey {
    pub user_id: i64,
    pub batch: Uuid,
}

/// Owns the timers that delete delivered copies after a delay.
pub struct RetractionScheduler {
    platform: Arc<dyn ChatPlatform>,
    pending: Mutex<HashMap<RetractionKey, JoinHandle<()>>>,
}

impl RetractionScheduler {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Delete `refs` from the user's chat once `after` has elapsed.
    pub fn schedule(
        self: &Arc<Self>,
        user_id: i64,
        refs: Vec<MessageRef>,
        after: Duration,
    ) -> RetractionKey {
        let key = RetractionKey {
            user_id,
            batch: Uuid::new_v4(),
        };
        let scheduler = Arc::clone(self);

        // Held across the spawn so the task cannot finish and unregister
        // before it is registered.
        let mut pending = self.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let (removed, failed) = delete_grouped(scheduler.platform.as_ref(), &refs).await;
            if failed > 0 {
                tracing::warn!(
                    "Retraction {} for user {user_id}: {failed} of {} messages not deleted",
                    key.batch,
                    refs.len()
                );
            } else {
                tracing::debug!("Retracted {removed} messages for user {user_id}");
            }
            scheduler.lock().remove(&key);
        });
        pending.insert(key, handle);
        key
    }

    /// Stop a retraction that has not fired yet.
    pub fn cancel(&self, key: &RetractionKey) -> bool {
        match self.lock().remove(key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Abort every outstanding retraction.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<(RetractionKey, JoinHandle<()>)> = self.lock().drain().collect();
        for (_, handle) in &drained {
            handle.abort();
        }
        if !drained.is_empty() {
            tracing::warn!(
                "Dropped {} pending retractions on shutdown; those messages stay in user chats",
                drained.len()
            );
        }
        drained.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RetractionKey, JoinHandle<()>>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
