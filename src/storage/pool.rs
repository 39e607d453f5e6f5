use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::errors::{Error, Result};
use crate::storage::buffer::{Buffer, PutOutcome};

/// Failed puts, per buffer in the pool, before a new buffer is added
pub const GROW_THRESHOLD_FACTOR: u32 = 5;

/// Failed gets, per buffer in the pool, before an empty buffer is retired
pub const SHRINK_THRESHOLD_FACTOR: u32 = 10;

/// Pause after a full unsuccessful pass over the buffers
const RETRY_BACKOFF: Duration = Duration::from_millis(1);

/// Elastic pool of fixed-capacity buffers behind one blocking put/get.
///
/// The pool starts with a single buffer. Sustained put pressure adds buffers
/// up to `max_buffer_number`; sustained empty gets retire idle buffers back
/// down to one.
#[derive(Debug)]
pub struct Pool<T> {
    /// Capacity of every buffer
    buffer_cap: u32,

    /// Upper bound on the number of buffers
    max_buffer_number: u32,

    /// Current number of live buffers
    buffer_number: AtomicU32,

    /// Items held across all buffers
    total: AtomicU64,

    /// Buffers waiting for their next turn. A buffer being used by a put or
    /// get is taken out and handed back afterwards.
    buffers: Mutex<VecDeque<Arc<Buffer<T>>>>,

    closed: AtomicBool,

    /// Guards buffer-set membership changes (grow, close)
    rwlock: RwLock<()>,
}

impl<T> Pool<T> {
    /// Create a pool of buffers holding `buffer_cap` items each
    pub fn new(buffer_cap: u32, max_buffer_number: u32) -> Result<Self> {
        if buffer_cap == 0 {
            return Err(Error::illegal_parameter(format!(
                "illegal buffer cap for buffer pool: {}",
                buffer_cap
            )));
        }
        if max_buffer_number == 0 {
            return Err(Error::illegal_parameter(format!(
                "illegal max buffer number for buffer pool: {}",
                max_buffer_number
            )));
        }

        let mut buffers = VecDeque::with_capacity(max_buffer_number as usize);
        buffers.push_back(Arc::new(Buffer::new(buffer_cap)?));

        Ok(Self {
            buffer_cap,
            max_buffer_number,
            buffer_number: AtomicU32::new(1),
            total: AtomicU64::new(0),
            buffers: Mutex::new(buffers),
            closed: AtomicBool::new(false),
            rwlock: RwLock::new(()),
        })
    }

    pub fn buffer_cap(&self) -> u32 {
        self.buffer_cap
    }

    pub fn max_buffer_number(&self) -> u32 {
        self.max_buffer_number
    }

    pub fn buffer_number(&self) -> u32 {
        self.buffer_number.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Store an item, waiting until some buffer accepts it.
    ///
    /// Fails only once the pool is closed.
    pub async fn put(&self, item: T) -> Result<()> {
        let mut item = item;
        let mut count = 0u32;
        let max_count = self.buffer_number() * GROW_THRESHOLD_FACTOR;
        let mut attempts = 0u32;

        loop {
            if self.closed() {
                return Err(Error::ClosedPool);
            }

            if let Some(buffer) = self.checkout() {
                match self.put_data(buffer, item, &mut count, max_count)? {
                    None => return Ok(()),
                    Some(rejected) => item = rejected,
                }
            }

            attempts += 1;
            self.pause(&mut attempts).await;
        }
    }

    /// Take an item, waiting until one is available.
    ///
    /// Fails only once the pool is closed.
    pub async fn get(&self) -> Result<T> {
        let mut count = 0u32;
        let max_count = self.buffer_number() * SHRINK_THRESHOLD_FACTOR;
        let mut attempts = 0u32;

        loop {
            if self.closed() {
                return Err(Error::ClosedPool);
            }

            if let Some(buffer) = self.checkout() {
                if let Some(item) = self.get_data(buffer, &mut count, max_count)? {
                    return Ok(item);
                }
            }

            attempts += 1;
            self.pause(&mut attempts).await;
        }
    }

    /// Close the pool and every buffer in it.
    ///
    /// Returns false if the pool was already closed.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let _membership = self.rwlock.write().unwrap_or_else(PoisonError::into_inner);
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        for buffer in buffers.drain(..) {
            buffer.close();
        }
        debug!("Closed buffer pool");

        true
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Yield after each miss; back off after a whole pass over the buffers
    async fn pause(&self, attempts: &mut u32) {
        if *attempts >= self.buffer_number().max(1) {
            *attempts = 0;
            tokio::time::sleep(RETRY_BACKOFF).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    /// Take the next buffer out of rotation
    fn checkout(&self) -> Option<Arc<Buffer<T>>> {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Put a buffer back into rotation, or close it if the pool closed
    /// while it was checked out
    fn restore(&self, buffer: Arc<Buffer<T>>) -> Result<()> {
        let _membership = self.rwlock.read().unwrap_or_else(PoisonError::into_inner);
        if self.closed() {
            buffer.close();
            return Err(Error::ClosedPool);
        }
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(buffer);
        Ok(())
    }

    /// Try one buffer. Returns the item back if it still has to be placed.
    fn put_data(
        &self,
        buffer: Arc<Buffer<T>>,
        item: T,
        count: &mut u32,
        max_count: u32,
    ) -> Result<Option<T>> {
        let outcome = buffer.put(item);
        if let Ok(PutOutcome::Accepted) = outcome {
            self.total.fetch_add(1, Ordering::AcqRel);
        }
        self.restore(buffer)?;

        let item = match outcome? {
            PutOutcome::Accepted => return Ok(None),
            PutOutcome::Rejected(item) => item,
        };

        *count = count.saturating_add(1);
        if *count < max_count || self.buffer_number() >= self.max_buffer_number {
            return Ok(Some(item));
        }

        *count = 0;
        self.grow(item)
    }

    /// Add a new buffer seeded with the pending item
    fn grow(&self, item: T) -> Result<Option<T>> {
        let _membership = self.rwlock.write().unwrap_or_else(PoisonError::into_inner);
        if self.closed() {
            return Err(Error::ClosedPool);
        }
        if self.buffer_number() >= self.max_buffer_number {
            return Ok(Some(item));
        }

        let buffer = Buffer::new(self.buffer_cap)?;
        if let PutOutcome::Rejected(item) = buffer.put(item)? {
            return Ok(Some(item));
        }
        // Counted before the buffer is visible to getters
        self.total.fetch_add(1, Ordering::AcqRel);
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Arc::new(buffer));
        let number = self.buffer_number.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(buffer_number = number, "Grew buffer pool");

        Ok(None)
    }

    /// Try one buffer, retiring it instead of handing it back when the pool
    /// has been idle long enough and the buffer is empty
    fn get_data(&self, buffer: Arc<Buffer<T>>, count: &mut u32, max_count: u32) -> Result<Option<T>> {
        let item = match buffer.get() {
            Ok(item) => item,
            Err(e) => {
                self.restore(buffer)?;
                return Err(e);
            }
        };

        if let Some(item) = item {
            self.total.fetch_sub(1, Ordering::AcqRel);
            self.restore(buffer)?;
            return Ok(Some(item));
        }

        *count = count.saturating_add(1);
        if *count >= max_count && buffer.is_empty() && self.retire_slot() {
            buffer.close();
            *count = 0;
            debug!(buffer_number = self.buffer_number(), "Retired idle buffer");
            return Ok(None);
        }

        self.restore(buffer)?;
        Ok(None)
    }

    /// Reserve the removal of one buffer; never goes below one
    fn retire_slot(&self) -> bool {
        self.buffer_number
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n > 1 {
                    Some(n - 1)
                } else {
                    None
                }
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_illegal_parameters() {
        assert!(matches!(Pool::<u32>::new(0, 1), Err(Error::IllegalParameter(_))));
        assert!(matches!(Pool::<u32>::new(1, 0), Err(Error::IllegalParameter(_))));
    }

    #[tokio::test]
    async fn test_put_and_get_track_total() {
        let pool = Pool::new(4, 2).unwrap();
        assert_eq!(pool.buffer_number(), 1);

        for i in 0..3 {
            pool.put(i).await.unwrap();
        }
        assert_eq!(pool.total(), 3);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(pool.get().await.unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(pool.total(), 0);
    }

    #[tokio::test]
    async fn test_grows_under_pressure_up_to_max() {
        let pool = Pool::new(1, 3).unwrap();

        let mut last_number = pool.buffer_number();
        for i in 0..3 {
            pool.put(i).await.unwrap();
            assert!(pool.buffer_number() >= last_number);
            last_number = pool.buffer_number();
        }
        assert_eq!(pool.buffer_number(), 3);
        assert_eq!(pool.total(), 3);

        // Every buffer is full and the pool is at its maximum: put blocks
        assert!(timeout(Duration::from_millis(200), pool.put(99)).await.is_err());
        assert_eq!(pool.buffer_number(), 3);
        assert_eq!(pool.total(), 3);
    }

    #[tokio::test]
    async fn test_shrinks_back_to_one_buffer() {
        let pool = Pool::new(1, 3).unwrap();
        for i in 0..3 {
            pool.put(i).await.unwrap();
        }
        assert_eq!(pool.buffer_number(), 3);

        for _ in 0..3 {
            pool.get().await.unwrap();
        }
        assert_eq!(pool.total(), 0);

        // Keep getting from the empty pool; idle buffers get retired
        assert!(timeout(Duration::from_millis(500), pool.get()).await.is_err());
        assert_eq!(pool.buffer_number(), 1);

        // The surviving buffer still works
        pool.put(7).await.unwrap();
        assert_eq!(pool.get().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_close_fails_pending_and_later_calls() {
        let pool = Arc::new(Pool::<u32>::new(1, 1).unwrap());

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(pool.close());
        assert!(!pool.close());
        assert!(pool.closed());

        assert_eq!(waiter.await.unwrap(), Err(Error::ClosedPool));
        assert_eq!(pool.put(1).await, Err(Error::ClosedPool));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_and_consumers() {
        let pool = Arc::new(Pool::new(2, 4).unwrap());

        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    for i in 0..50 {
                        pool.put(p * 100 + i).await.unwrap();
                    }
                })
            })
            .collect();

        let consumer = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let mut received = Vec::new();
                for _ in 0..200 {
                    received.push(pool.get().await.unwrap());
                }
                received
            })
        };

        for producer in producers {
            producer.await.unwrap();
        }
        let mut received = consumer.await.unwrap();
        received.sort_unstable();
        received.dedup();

        assert_eq!(received.len(), 200);
        assert_eq!(pool.total(), 0);
        assert!(pool.buffer_number() <= pool.max_buffer_number());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_total_never_wraps_while_growing() {
        let pool = Arc::new(Pool::new(1, 8).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let watcher = {
            let pool = Arc::clone(&pool);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let mut highest = 0;
                while !done.load(Ordering::Acquire) {
                    highest = highest.max(pool.total());
                    tokio::task::yield_now().await;
                }
                highest
            })
        };
        let consumer = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                for _ in 0..500 {
                    pool.get().await.unwrap();
                }
            })
        };
        for i in 0..500u32 {
            pool.put(i).await.unwrap();
        }
        consumer.await.unwrap();
        done.store(true, Ordering::Release);

        assert!(watcher.await.unwrap() <= 500);
        assert_eq!(pool.total(), 0);
    }

    #[test]
    fn test_miss_counters_saturate() {
        let pool = Pool::new(1, 1).unwrap();

        let mut count = u32::MAX;
        let buffer = pool.checkout().unwrap();
        assert_eq!(pool.get_data(buffer, &mut count, u32::MAX).unwrap(), None);
        assert_eq!(count, u32::MAX);
        assert_eq!(pool.buffer_number(), 1);

        let buffer = pool.checkout().unwrap();
        assert_eq!(pool.put_data(buffer, 1, &mut count, u32::MAX).unwrap(), None);
        let buffer = pool.checkout().unwrap();
        assert_eq!(pool.put_data(buffer, 2, &mut count, u32::MAX).unwrap(), Some(2));
        assert_eq!(count, u32::MAX);
        assert_eq!(pool.total(), 1);
    }
}
