//! Cancellation handles for background posting loops, keyed by the channel
//! they post into. Registering a channel twice replaces the old loop instead
//! of stacking a second one.

use std::{collections::HashMap, sync::Arc};

use poise::serenity_prelude::ChannelId;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Tasks {
    handles: Arc<Mutex<HashMap<ChannelId, JoinHandle<()>>>>,
}

impl Tasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, channel: ChannelId, handle: JoinHandle<()>) {
        if let Some(old) = self.handles.lock().await.insert(channel, handle) {
            debug!(%channel, "replacing existing task");
            old.abort();
        }
    }

    /// Aborts the channel's task. Returns whether there was one.
    pub async fn cancel(&self, channel: ChannelId) -> bool {
        match self.handles.lock().await.remove(&channel) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::oneshot;

    const CHANNEL: ChannelId = ChannelId::new(1);

    /// Pending task that signals through the returned receiver when it gets
    /// aborted.
    fn guarded_task() -> (JoinHandle<()>, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });

        (handle, rx)
    }

    #[tokio::test]
    async fn cancel_aborts_the_registered_task() {
        let tasks = Tasks::new();
        let (handle, rx) = guarded_task();

        tasks.register(CHANNEL, handle).await;

        assert!(tasks.cancel(CHANNEL).await);
        rx.await.expect_err("sender should be dropped by the abort");
    }

    #[tokio::test]
    async fn cancel_without_a_task_reports_nothing_to_do() {
        let tasks = Tasks::new();
        assert!(!tasks.cancel(CHANNEL).await);
    }

    #[tokio::test]
    async fn reregistering_replaces_the_old_task() {
        let tasks = Tasks::new();

        let (first, first_rx) = guarded_task();
        let (second, second_rx) = guarded_task();

        tasks.register(CHANNEL, first).await;
        tasks.register(CHANNEL, second).await;

        first_rx
            .await
            .expect_err("first task should be aborted by the replacement");

        assert!(tasks.cancel(CHANNEL).await);
        second_rx.await.expect_err("second task aborted on cancel");
    }
}
