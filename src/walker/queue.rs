//! Bounded work queue with backpressure and join support
//!
//! A fixed-capacity crossbeam channel sits between producers and a worker
//! pool. `push` blocks while the channel is full, which caps the number of
//! in-flight items no matter how large the tree is.
//!
//! Completion is tracked with an outstanding-item counter rather than by
//! polling for an empty channel: an item is outstanding from the moment it
//! is pushed until the worker handling it calls [`WorkQueue::task_done`].
//! Workers push children *before* acknowledging their own item, so the
//! counter cannot reach zero while any part of the tree is still pending.
//! [`WorkQueue::join`] waits for zero.
//!
//! Shutdown uses sentinels: after the join, one [`Message::Stop`] per
//! worker is sent, and each worker exits when it receives one.

use crate::error::WorkerError;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Item carried by the channel
#[derive(Debug)]
pub enum Message<T> {
    /// A unit of work
    Work(T),

    /// Stop sentinel; the receiving worker exits
    Stop,
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total items enqueued
    pub enqueued: AtomicU64,

    /// Total items dequeued
    pub dequeued: AtomicU64,

    /// Number of times a non-blocking push found the queue full
    pub backpressure_events: AtomicU64,
}

impl QueueStats {
    /// Get queue throughput (dequeued items)
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get backpressure event count
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Outstanding-item counter with a condition variable for `join`
#[derive(Debug, Default)]
struct Outstanding {
    count: Mutex<u64>,
    idle: Condvar,
}

impl Outstanding {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        debug_assert!(*count > 0, "task_done called more times than items pushed");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn get(&self) -> u64 {
        *self.count.lock()
    }
}

/// Bounded FIFO shared between producers and a worker pool.
///
/// Cloning is cheap; all clones share the same channel and counters.
pub struct WorkQueue<T> {
    sender: Sender<Message<T>>,
    receiver: Receiver<Message<T>>,
    capacity: usize,
    outstanding: Arc<Outstanding>,
    stats: Arc<QueueStats>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            capacity: self.capacity,
            outstanding: Arc::clone(&self.outstanding),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> WorkQueue<T> {
    /// Create a new work queue with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);

        Self {
            sender,
            receiver,
            capacity,
            outstanding: Arc::new(Outstanding::default()),
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Push an item, blocking while the queue is full
    pub fn push(&self, item: T) -> Result<(), WorkerError> {
        self.outstanding.add();
        if self.sender.send(Message::Work(item)).is_err() {
            self.outstanding.done();
            return Err(WorkerError::QueueClosed);
        }
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Push an item without blocking.
    ///
    /// Returns the item back if the queue is full, so the caller can
    /// handle it some other way.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.outstanding.add();
        match self.sender.try_send(Message::Work(item)) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(Message::Work(item)))
            | Err(TrySendError::Disconnected(Message::Work(item))) => {
                self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                self.outstanding.done();
                Err(item)
            }
            // Only work items are sent from here
            Err(_) => {
                self.outstanding.done();
                Ok(())
            }
        }
    }

    /// Receive the next message, blocking until one is available.
    ///
    /// Returns `None` only if every sender is gone, which cannot happen
    /// while the queue itself is alive.
    pub fn recv(&self) -> Option<Message<T>> {
        let msg = self.receiver.recv().ok()?;
        if matches!(msg, Message::Work(_)) {
            self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        }
        Some(msg)
    }

    /// Acknowledge one received work item as fully handled
    pub fn task_done(&self) {
        self.outstanding.done();
    }

    /// Block until every pushed item has been acknowledged
    pub fn join(&self) {
        let mut count = self.outstanding.count.lock();
        while *count > 0 {
            self.outstanding.idle.wait(&mut count);
        }
    }

    /// Wait up to `timeout` for the queue to drain. Returns true if idle.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let mut count = self.outstanding.count.lock();
        if *count > 0 {
            self.outstanding.idle.wait_for(&mut count, timeout);
        }
        *count == 0
    }

    /// Send one stop sentinel per worker
    pub fn stop(&self, workers: usize) -> Result<(), WorkerError> {
        for _ in 0..workers {
            self.sender
                .send(Message::Stop)
                .map_err(|_| WorkerError::QueueClosed)?;
        }
        Ok(())
    }

    /// Items pushed but not yet acknowledged
    pub fn outstanding(&self) -> u64 {
        self.outstanding.get()
    }

    /// Check if all work is complete
    pub fn is_complete(&self) -> bool {
        self.outstanding.get() == 0
    }

    /// Check if the channel is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get current channel length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}
