//! Per-user ordered queues.
//!
//! Each active user gets one worker task fed by a bounded channel, so a
//! user's updates run in arrival order while different users proceed
//! concurrently. Idle workers exit; the next update spawns a fresh one that
//! first waits for its predecessor to finish. Queuing never waits: an update
//! for a user whose queue is full is dropped and the user is told to resend.

use super::App;
use crate::telegram::Update;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Upper bound on waiting for workers to drain at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

struct Worker {
    tx: mpsc::Sender<Update>,
    handle: JoinHandle<()>,
}

pub struct Dispatcher {
    app: Arc<App>,
    capacity: usize,
    idle: Duration,
    workers: HashMap<i64, Worker>,
}

impl Dispatcher {
    pub fn new(app: Arc<App>, capacity: usize, idle: Duration) -> Self {
        Self {
            app,
            capacity: capacity.max(1),
            idle,
            workers: HashMap::new(),
        }
    }

    pub fn active(&self) -> usize {
        self.workers.values().filter(|w| !w.tx.is_closed()).count()
    }

    /// Queue an update behind earlier ones from the same user.
    pub fn dispatch(&mut self, update: Update) {
        let Some(user_id) = update.sender().map(|u| u.id) else {
            tracing::debug!("Ignoring update {} without a sender", update.update_id);
            return;
        };

        let update = match self.workers.get(&user_id) {
            Some(worker) => match worker.tx.try_send(update) {
                Ok(()) => return,
                Err(TrySendError::Full(update)) => {
                    self.reject_busy(user_id, update.update_id);
                    return;
                }
                // Worker went idle and closed its queue.
                Err(TrySendError::Closed(update)) => update,
            },
            None => update,
        };

        let previous = self.workers.remove(&user_id).map(|w| w.handle);
        let worker = self.spawn_worker(user_id, previous);
        if worker.tx.try_send(update).is_err() {
            tracing::error!("Fresh worker for user {user_id} rejected an update");
        }
        self.workers.insert(user_id, worker);
    }

    fn reject_busy(&self, user_id: i64, update_id: i64) {
        tracing::warn!("Queue for user {user_id} is full, dropping update {update_id}");
        let app = Arc::clone(&self.app);
        tokio::spawn(async move { app.notify_busy(user_id).await });
    }

    /// Forget workers that have exited.
    pub fn prune(&mut self) {
        self.workers
            .retain(|_, worker| !(worker.tx.is_closed() && worker.handle.is_finished()));
    }

    /// Close every queue and wait for in-flight updates to finish.
    pub async fn shutdown(self) {
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .into_values()
            .map(|worker| worker.handle)
            .collect();
        let drain = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!("Worker ended abnormally: {e}");
                }
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!("Workers did not drain within {DRAIN_TIMEOUT:?}");
        }
    }

    fn spawn_worker(&self, user_id: i64, previous: Option<JoinHandle<()>>) -> Worker {
        let (tx, mut rx) = mpsc::channel::<Update>(self.capacity);
        let app = Arc::clone(&self.app);
        let idle = self.idle;

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            loop {
                match tokio::time::timeout(idle, rx.recv()).await {
                    Ok(Some(update)) => app.handle_update(update).await,
                    Ok(None) => break,
                    Err(_) => {
                        // Stop accepting, then finish what is already queued.
                        rx.close();
                        while let Some(update) = rx.recv().await {
                            app.handle_update(update).await;
                        }
                        tracing::debug!("Worker for user {user_id} idle, exiting");
                        break;
                    }
                }
            }
        });
        Worker { tx, handle }
    }
}
