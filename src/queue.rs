//! Bounded FIFO queue shared by every connection handler.
//!
//! Two counting semaphores gate a mutex-protected `VecDeque`:
//!
//! ```text
//! enqueue:  free_slots.acquire ─► lock ─► push_back  ─► unlock ─► filled_slots += 1
//! dequeue:  filled_slots.acquire ─► lock ─► pop_front ─► unlock ─► free_slots += 1
//! ```
//!
//! Permits are only taken or returned outside the mutex and the list is
//! only touched inside it, so `filled_slots <= len <= capacity - free_slots`
//! holds at every instant. Waiting is a true semaphore wait (FIFO-fair in
//! tokio), never a poll loop.
//!
//! Once a permit is acquired, the rest of the operation is synchronous, so
//! dropping an `enqueue`/`dequeue` future can never leave a permit taken
//! without the matching list mutation.
//!
//! # Shutdown
//!
//! [`BoundedQueue::close`] closes both semaphores: every parked and future
//! caller returns [`BufferdError::QueueClosed`]. Payloads still queued are
//! dropped with the queue.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{BufferdError, Result};

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 10;

/// Largest capacity a queue can be created with.
pub const MAX_CAPACITY: usize = Semaphore::MAX_PERMITS;

/// Fixed-capacity FIFO queue of encoded payloads.
///
/// Share it as `Arc<BoundedQueue>`; the raw container is never exposed.
#[derive(Debug)]
pub struct BoundedQueue {
    /// Queued payloads, head first.
    items: Mutex<VecDeque<Bytes>>,
    /// Available capacity, starts at `capacity`.
    free_slots: Semaphore,
    /// Available items, starts at 0.
    filled_slots: Semaphore,
    /// Fixed capacity.
    capacity: usize,
}

impl BoundedQueue {
    /// Create an empty queue holding at most `capacity` payloads.
    ///
    /// A capacity of 0 makes every `enqueue` wait forever; callers are
    /// expected to validate it (see [`ServerBuilder`](crate::server::ServerBuilder)).
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAX_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            free_slots: Semaphore::new(capacity),
            filled_slots: Semaphore::new(0),
            capacity,
        }
    }

    /// Append `payload` at the tail, waiting while the queue is full.
    ///
    /// Returns the queue length right after the append.
    ///
    /// # Errors
    ///
    /// `QueueClosed` if the queue is closed before space becomes available.
    pub async fn enqueue(&self, payload: Bytes) -> Result<usize> {
        acquire(&self.free_slots, None).await?;
        Ok(self.commit_enqueue(payload))
    }

    /// Like [`enqueue`](Self::enqueue), but gives up when `cancel` fires.
    ///
    /// # Errors
    ///
    /// `Cancelled` if the token fires first (the payload is not queued),
    /// `QueueClosed` if the queue closes first.
    pub async fn enqueue_cancellable(
        &self,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        acquire(&self.free_slots, Some(cancel)).await?;
        Ok(self.commit_enqueue(payload))
    }

    /// Remove and return the head payload, waiting while the queue is empty.
    ///
    /// # Errors
    ///
    /// `QueueClosed` if the queue is closed before an item becomes available.
    pub async fn dequeue(&self) -> Result<Bytes> {
        acquire(&self.filled_slots, None).await?;
        Ok(self.commit_dequeue())
    }

    /// Like [`dequeue`](Self::dequeue), but gives up when `cancel` fires.
    ///
    /// # Errors
    ///
    /// `Cancelled` if the token fires first (nothing is removed),
    /// `QueueClosed` if the queue closes first.
    pub async fn dequeue_cancellable(&self, cancel: &CancellationToken) -> Result<Bytes> {
        acquire(&self.filled_slots, Some(cancel)).await?;
        Ok(self.commit_dequeue())
    }

    /// Close the queue, waking every waiter with `QueueClosed`.
    pub fn close(&self) {
        self.free_slots.close();
        self.filled_slots.close();
        tracing::debug!(depth = self.len(), "queue closed");
    }

    /// Whether [`close`](Self::close) has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.free_slots.is_closed()
    }

    /// Current number of queued payloads.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently reserved by a producer.
    #[inline]
    pub fn available_capacity(&self) -> usize {
        self.free_slots.available_permits()
    }

    fn commit_enqueue(&self, payload: Bytes) -> usize {
        let depth = {
            let mut items = self.lock();
            items.push_back(payload);
            items.len()
        };
        self.filled_slots.add_permits(1);
        depth
    }

    fn commit_dequeue(&self) -> Bytes {
        let payload = self
            .lock()
            .pop_front()
            .expect("an item permit guarantees a queued payload");
        self.free_slots.add_permits(1);
        payload
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Bytes>> {
        // Critical sections never panic midway, so a poisoned list is intact.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BoundedQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Take one permit from `signal` and keep it (the matching `add_permits`
/// on the other semaphore hands it on).
async fn acquire(signal: &Semaphore, cancel: Option<&CancellationToken>) -> Result<()> {
    let permit = match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => return Err(BufferdError::Cancelled),
            permit = signal.acquire() => permit,
        },
        None => signal.acquire().await,
    };
    permit.map_err(|_| BufferdError::QueueClosed)?.forget();
    Ok(())
}
