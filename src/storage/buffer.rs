use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use crate::errors::{Error, Result};

/// Outcome of a non-blocking put
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome<T> {
    /// The item was stored
    Accepted,
    /// The buffer was full; the item is handed back to the caller
    Rejected(T),
}

impl<T> PutOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Fixed-capacity FIFO buffer with non-blocking put and get
#[derive(Debug)]
pub struct Buffer<T> {
    /// Maximum number of items held at once
    cap: u32,

    /// Stored items, oldest first
    queue: Mutex<VecDeque<T>>,

    /// Set exactly once by `close`
    closed: AtomicBool,

    /// Held for read by `put` and for write by `close`, so that no put can
    /// land after the buffer is closed
    closing_lock: RwLock<()>,
}

impl<T> Buffer<T> {
    /// Create a buffer holding at most `cap` items
    pub fn new(cap: u32) -> Result<Self> {
        if cap == 0 {
            return Err(Error::illegal_parameter(format!(
                "illegal size for buffer: {}",
                cap
            )));
        }

        Ok(Self {
            cap,
            queue: Mutex::new(VecDeque::with_capacity(cap as usize)),
            closed: AtomicBool::new(false),
            closing_lock: RwLock::new(()),
        })
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    pub fn len(&self) -> u32 {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store an item without waiting.
    ///
    /// A full buffer is not an error: the item comes back as
    /// `PutOutcome::Rejected`.
    pub fn put(&self, item: T) -> Result<PutOutcome<T>> {
        let _closing = self.closing_lock.read().unwrap_or_else(PoisonError::into_inner);
        if self.closed() {
            return Err(Error::ClosedBuffer);
        }

        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() >= self.cap as usize {
            return Ok(PutOutcome::Rejected(item));
        }
        queue.push_back(item);

        Ok(PutOutcome::Accepted)
    }

    /// Take the oldest item without waiting; `None` when empty
    pub fn get(&self) -> Result<Option<T>> {
        if self.closed() {
            return Err(Error::ClosedBuffer);
        }

        Ok(self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front())
    }

    /// Close the buffer. Returns true only for the call that closed it.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        // Wait out any put that saw the buffer open
        drop(self.closing_lock.write().unwrap_or_else(PoisonError::into_inner));
        true
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
