//! Best-effort acknowledgment queue
//!
//! New alarms enqueue an [`AckTask`]; a background worker tells the backend
//! the report was seen. Enqueueing never blocks. Each task is attempted once
//! and failures are only logged.

use chrono::{DateTime, Utc};
use clinick_client::ReportBackend;
use clinick_core::ReportId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A pending "mark seen" call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckTask {
    /// Unique task identifier
    pub id: Uuid,
    /// Report to acknowledge
    pub report_id: ReportId,
    /// When the task was queued
    pub enqueued_at: DateTime<Utc>,
}

impl AckTask {
    /// New task for `report_id`
    #[must_use]
    pub fn new(report_id: ReportId) -> Self {
        Self {
            id: Uuid::new_v4(),
            report_id,
            enqueued_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct AckCounters {
    enqueued: AtomicU64,
    acknowledged: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckStats {
    /// Tasks accepted by the queue
    pub enqueued: u64,
    /// Tasks the backend accepted
    pub acknowledged: u64,
    /// Tasks the backend rejected or never received
    pub failed: u64,
    /// Tasks discarded because the queue was full or closed
    pub dropped: u64,
}

impl AckStats {
    /// Tasks that have been attempted
    #[must_use]
    pub const fn settled(&self) -> u64 {
        self.acknowledged + self.failed
    }
}

/// Sending side of the acknowledgment queue
#[derive(Debug, Clone)]
pub struct AckQueue {
    sender: async_channel::Sender<AckTask>,
    counters: Arc<AckCounters>,
}

/// Receiving side, consumed by the worker
#[derive(Debug)]
pub struct AckReceiver {
    receiver: async_channel::Receiver<AckTask>,
    counters: Arc<AckCounters>,
}

impl AckQueue {
    /// Create a queue holding at most `capacity` pending tasks
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, AckReceiver) {
        let (sender, receiver) = async_channel::bounded(capacity.max(1));
        let counters = Arc::new(AckCounters::default());
        (
            Self {
                sender,
                counters: Arc::clone(&counters),
            },
            AckReceiver { receiver, counters },
        )
    }

    /// Queue an acknowledgment without waiting
    ///
    /// Returns the task id, or `None` if the task was dropped.
    pub fn enqueue(&self, report_id: ReportId) -> Option<Uuid> {
        let task = AckTask::new(report_id);
        let id = task.id;

        match self.sender.try_send(task) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Some(id)
            }
            Err(e) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                let reason = if e.is_full() { "full" } else { "closed" };
                warn!(report_id = %e.into_inner().report_id, reason, "Dropping mark-seen acknowledgment");
                None
            }
        }
    }

    /// Tasks waiting for the worker
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> AckStats {
        AckStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            acknowledged: self.counters.acknowledged.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting tasks; the worker drains what is queued and exits
    pub fn close(&self) -> bool {
        self.sender.close()
    }
}

impl AckReceiver {
    /// Take the next queued task without waiting
    pub fn try_next(&self) -> Option<AckTask> {
        self.receiver.try_recv().ok()
    }

    /// Run the worker until the queue is closed and drained
    pub async fn run(self, backend: Arc<dyn ReportBackend>) {
        while let Ok(task) = self.receiver.recv().await {
            match backend.mark_seen(&task.report_id).await {
                Ok(()) => {
                    self.counters.acknowledged.fetch_add(1, Ordering::Relaxed);
                    debug!(report_id = %task.report_id, task_id = %task.id, "Report marked as seen");
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(report_id = %task.report_id, task_id = %task.id, error = %e, "Failed to mark report as seen");
                }
            }
        }
        info!("Acknowledgment worker stopped");
    }

    /// Spawn [`run`](Self::run) on the current runtime
    #[must_use]
    pub fn spawn(self, backend: Arc<dyn ReportBackend>) -> JoinHandle<()> {
        tokio::spawn(self.run(backend))
    }
}
