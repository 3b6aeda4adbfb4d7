//! Job delivery with optional delay.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::job::{JobTicket, QueueError};

/// Queue boundary the worker consumes.
///
/// Delivery is at-least-once: a ticket may arrive for a job that already
/// finished, and the job machine skips it.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Deliver `ticket` after `delay` (immediately when zero).
    async fn enqueue(&self, ticket: JobTicket, delay: Duration) -> Result<(), QueueError>;

    /// Next deliverable ticket; `None` once the queue is closed and empty.
    async fn next(&self) -> Option<JobTicket>;

    /// Tickets enqueued but not yet taken, delayed ones included.
    fn pending(&self) -> usize;

    /// Refuse new tickets. Tickets already scheduled are still delivered.
    fn close(&self);
}

/// In-process queue on a tokio channel. Delayed tickets wait on a timer task.
pub struct MemoryJobQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<JobTicket>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<JobTicket>>,
    pending: Arc<AtomicUsize>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<JobTicket>> {
        self.tx.lock().ok().and_then(|tx| tx.clone())
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, ticket: JobTicket, delay: Duration) -> Result<(), QueueError> {
        let tx = self.sender().ok_or(QueueError::Closed)?;
        debug!(
            submission_id = %ticket.submission_id,
            attempt = ticket.attempt_count,
            delay_ms = delay.as_millis() as u64,
            "ticket enqueued"
        );

        self.pending.fetch_add(1, Ordering::SeqCst);
        if delay.is_zero() {
            if tx.send(ticket).is_err() {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                return Err(QueueError::Closed);
            }
            return Ok(());
        }

        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(ticket).is_err() {
                pending.fetch_sub(1, Ordering::SeqCst);
            }
        });
        Ok(())
    }

    async fn next(&self) -> Option<JobTicket> {
        let ticket = self.rx.lock().await.recv().await?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(ticket)
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}
