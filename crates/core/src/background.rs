//! Low-priority work queue drained by a single worker task.
//!
//! Access-time bumps, deletes of corrupt rows, and eviction passes are
//! submitted here so get/set never wait on them. Jobs run in submission order;
//! eviction requests coalesce so at most one pass is queued at a time.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};

/// Work the background worker knows how to run.
#[derive(Debug)]
pub enum Job {
    /// Stamp `last_accessed_at` for a key that was just read.
    Touch { cache_key: String, at_ms: i64 },
    /// Remove an entry that failed validation on read.
    Delete { cache_key: String },
    /// Run one eviction pass.
    Evict,
    /// Signals once every job submitted before it has run.
    Barrier(oneshot::Sender<()>),
}

/// Sending half of the worker channel.
#[derive(Debug)]
pub struct BackgroundQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    eviction_queued: AtomicBool,
}

impl BackgroundQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Mutex::new(Some(tx)), eviction_queued: AtomicBool::new(false) }, rx)
    }

    /// Queue a job. Returns false once the queue has been closed.
    pub fn submit(&self, job: Job) -> bool {
        let sender = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match sender.as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    /// Queue an eviction pass unless one is already waiting.
    pub fn request_eviction(&self) -> bool {
        if self.eviction_queued.swap(true, Ordering::AcqRel) {
            return true;
        }
        let queued = self.submit(Job::Evict);
        if !queued {
            self.eviction_queued.store(false, Ordering::Release);
        }
        queued
    }

    /// Called by the worker as it picks up an eviction job.
    pub fn eviction_started(&self) {
        self.eviction_queued.store(false, Ordering::Release);
    }

    /// Wait until every job queued so far has run.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.submit(Job::Barrier(done_tx)) {
            let _ = done_rx.await;
        }
    }

    /// Stop accepting work. The worker exits once the channel drains.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_eviction_requests_coalesce() {
        let (queue, mut rx) = BackgroundQueue::new();
        assert!(queue.request_eviction());
        assert!(queue.request_eviction());
        queue.close();

        let mut evictions = 0;
        while let Some(job) = rx.recv().await {
            if matches!(job, Job::Evict) {
                evictions += 1;
            }
        }
        assert_eq!(evictions, 1);
    }

    #[tokio::test]
    async fn test_eviction_requeues_after_start() {
        let (queue, mut rx) = BackgroundQueue::new();
        queue.request_eviction();
        assert!(matches!(rx.recv().await, Some(Job::Evict)));
        queue.eviction_started();

        queue.request_eviction();
        assert!(matches!(rx.recv().await, Some(Job::Evict)));
    }

    #[tokio::test]
    async fn test_closed_queue_rejects() {
        let (queue, _rx) = BackgroundQueue::new();
        queue.close();
        assert!(!queue.submit(Job::Evict));
        assert!(!queue.request_eviction());
        queue.flush().await;
    }
}
