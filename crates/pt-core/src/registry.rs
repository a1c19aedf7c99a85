//! Consumer registry: named fan-out of change sets to registered sinks.
//!
//! Each consumer gets its own bounded queue and a dedicated worker thread
//! draining it. A full queue drops the change set for that consumer rather
//! than blocking the scanner; the drop is counted so it's visible in
//! metrics.

use crate::collect::scanner::ChangeSet;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

/// A registered sink. Implementations should return quickly; slow
/// consumers only ever delay their own queue, never the scanner or other
/// consumers.
pub trait Consumer: Send + 'static {
    fn on_change(&mut self, change_set: Arc<ChangeSet>);
}

struct ConsumerHandle {
    tx: SyncSender<Arc<ChangeSet>>,
    worker: Option<JoinHandle<()>>,
}

/// Thread-safe named set of consumers. Registration and deregistration may
/// happen concurrently with notification.
pub struct ConsumerRegistry {
    consumers: RwLock<HashMap<String, ConsumerHandle>>,
    queue_capacity: usize,
    dropped: Arc<AtomicU64>,
}

impl ConsumerRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a consumer under `name`, replacing any existing consumer of
    /// the same name (its worker is stopped by dropping its sender, which
    /// closes its queue and lets its `recv` loop exit).
    pub fn register(&self, name: impl Into<String>, mut consumer: impl Consumer) {
        let (tx, rx) = sync_channel::<Arc<ChangeSet>>(self.queue_capacity);
        let worker = std::thread::spawn(move || {
            while let Ok(change_set) = rx.recv() {
                consumer.on_change(change_set);
            }
        });
        let handle = ConsumerHandle {
            tx,
            worker: Some(worker),
        };
        let mut guard = self.consumers.write().unwrap();
        if let Some(old) = guard.insert(name.into(), handle) {
            drop(old.tx);
            // Not joined: a replaced consumer's worker exits on its own once
            // its queue drains and the sender above is dropped.
        }
    }

    /// Deregister and stop the consumer registered under `name`, joining
    /// its worker thread. Idempotent.
    pub fn deregister(&self, name: &str) {
        let removed = self.consumers.write().unwrap().remove(name);
        if let Some(mut handle) = removed {
            drop(handle.tx);
            if let Some(worker) = handle.worker.take() {
                let _ = worker.join();
            }
        }
    }

    /// Fan out a change set to every registered consumer. Non-blocking per
    /// consumer: a full queue drops the change set for that consumer.
    pub fn notify(&self, change_set: Arc<ChangeSet>) {
        let guard = self.consumers.read().unwrap();
        for handle in guard.values() {
            if let Err(TrySendError::Full(_)) = handle.tx.try_send(Arc::clone(&change_set)) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.consumers.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn consumer_dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Named metrics for this registry, keyed to match the scanner's own
    /// `metrics()` surface so the two can be merged by a caller.
    pub fn metrics(&self) -> HashMap<String, f64> {
        let mut m = HashMap::new();
        m.insert(
            "scanner_consumer_dropped".to_string(),
            self.consumer_dropped_count() as f64,
        );
        m
    }
}

impl Drop for ConsumerRegistry {
    fn drop(&mut self) {
        let mut guard = self.consumers.write().unwrap();
        for (_, mut handle) in guard.drain() {
            drop(handle.tx);
            if let Some(worker) = handle.worker.take() {
                let _ = worker.join();
            }
        }
    }
}
