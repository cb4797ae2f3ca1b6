//! Detached background work

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// A background task that returned an error
#[derive(Debug, Clone)]
pub struct BackgroundFailure {
    pub task: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Owner of fire-and-forget tasks
///
/// Callers never wait for these tasks. Failures are logged and published
/// to subscribers.
pub struct BackgroundTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
    failures: broadcast::Sender<BackgroundFailure>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            handles: Mutex::new(Vec::new()),
            failures,
        }
    }

    pub fn spawn<F>(&self, task: &str, future: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let task = task.to_string();
        let failures = self.failures.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = future.await {
                tracing::warn!(task = %task, error = %e, "Background task failed");
                // No subscribers is fine
                let _ = failures.send(BackgroundFailure {
                    task,
                    error: format!("{:#}", e),
                    failed_at: Utc::now(),
                });
            }
        });

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackgroundFailure> {
        self.failures.subscribe()
    }

    /// Number of tasks not yet finished
    pub fn pending(&self) -> usize {
        let handles = self.handles.lock();
        handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every task spawned so far
    pub async fn drain(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "Background task panicked");
                }
            }
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
