//! Asynchronous execution-log writer.
//!
//! The sink decouples log persistence from the response path: `enqueue`
//! pushes onto a bounded in-memory queue and returns immediately; a
//! dedicated drain task writes to the [`LogStore`]. On overflow the oldest
//! record is dropped and a counter incremented — the caller path is never
//! blocked and the queue is never unbounded. Store failures are logged,
//! not surfaced.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::traits::LogStore;
use crate::types::ExecutionLog;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct SinkShared {
    queue: Mutex<VecDeque<ExecutionLog>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

/// Handle to the running sink. Cheap to share behind the engine.
pub struct LogSink {
    shared: Arc<SinkShared>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl LogSink {
    /// Spawn the drain task and return the sink handle. Requires a tokio
    /// runtime.
    pub fn spawn(store: Arc<dyn LogStore>, capacity: usize) -> Self {
        let shared = Arc::new(SinkShared {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let drain = tokio::spawn(drain_loop(Arc::clone(&shared), store, shutdown_rx));
        Self {
            shared,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            drain: Mutex::new(Some(drain)),
        }
    }

    /// Hand a log record to the sink. Never blocks on I/O; on overflow the
    /// oldest queued record is dropped.
    pub async fn enqueue(&self, log: ExecutionLog) {
        {
            let mut queue = self.shared.queue.lock().await;
            if queue.len() >= self.shared.capacity {
                queue.pop_front();
                let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped, "log sink overflow, dropping oldest record");
            }
            queue.push_back(log);
        }
        self.shared.notify.notify_one();
    }

    /// Total records dropped on overflow since startup.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Drain the queue and stop the background task.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.drain.lock().await.take() {
            let _ = handle.await;
        }
    }
}

async fn drain_loop(
    shared: Arc<SinkShared>,
    store: Arc<dyn LogStore>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                flush(&shared, &store).await;
                return;
            }

            _ = shared.notify.notified() => {
                flush(&shared, &store).await;
            }
        }
    }
}

/// Write everything currently queued, one record at a time so a slow
/// store only ever delays logs, never the response path.
async fn flush(shared: &SinkShared, store: &Arc<dyn LogStore>) {
    loop {
        let next = shared.queue.lock().await.pop_front();
        let Some(log) = next else { break };
        if let Err(e) = store.append(&log).await {
            tracing::error!(flow_id = %log.flow_id, error = %e, "execution log write failed");
        }
    }
}
