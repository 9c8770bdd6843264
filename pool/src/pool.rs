//! Pool of reusable ring buffers.
//!
//! Provides pooled, growable [`Ring`] buffers that can be reused to reduce
//! allocation overhead in hot paths that need a scratch buffer for a brief
//! window per operation.
//!
//! # Thread Safety
//!
//! [`Pool`] is `Send + Sync`, cheap to clone, and can be safely shared across
//! threads. Checkout and return are non-blocking: the free-list is a
//! lock-free queue ([`crossbeam_queue::SegQueue`]) and metrics are atomic.
//!
//! # Retention Policy
//!
//! Buffers grow while checked out to fit whatever payload a caller writes.
//! On return, a buffer whose capacity exceeds twice the configured default
//! size is discarded and replaced with a fresh default-sized instance,
//! bounding the worst-case memory retained per pooled buffer. Buffers at or
//! below the threshold are reset in place and kept, so moderate organic
//! growth is amortized across uses.

use crate::Ring;
use crossbeam_queue::SegQueue;
use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};
use std::{num::NonZeroUsize, sync::Arc};
use tracing::debug;

/// Default capacity for newly constructed buffers.
const DEFAULT_BUFFER_SIZE: usize = 1 << 12; // 4KiB

/// Configuration for a [`Pool`].
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Capacity used to construct new buffers when the free-list is empty or
    /// when a retired buffer is replaced. Fixed for the lifetime of the pool.
    ///
    /// Also determines the retention threshold: returned buffers with
    /// capacity above `2 * buffer_size` are discarded.
    pub buffer_size: NonZeroUsize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_size: NonZeroUsize::new(DEFAULT_BUFFER_SIZE)
                .expect("default buffer size is nonzero"),
        }
    }
}

/// Metrics for the pool.
struct Metrics {
    /// Number of buffers currently checked out.
    active: Gauge,
    /// Total number of checkouts.
    checkouts: Counter,
    /// Total number of buffers handed out over the pool's lifetime.
    buffers: Counter,
    /// Cumulative capacity (in bytes) of returned buffers.
    returned_capacity: Counter,
    /// Cumulative length (in bytes) of returned buffers.
    returned_length: Counter,
    /// Total number of oversized buffers discarded on return.
    shrinks: Counter,
    /// Cumulative bytes reclaimed by discarding oversized buffers.
    shrunk_bytes: Counter,
}

impl Metrics {
    fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            active: Gauge::default(),
            checkouts: Counter::default(),
            buffers: Counter::default(),
            returned_capacity: Counter::default(),
            returned_length: Counter::default(),
            shrinks: Counter::default(),
            shrunk_bytes: Counter::default(),
        };

        registry.register(
            "buffer_pool_active",
            "Number of buffers currently checked out of the pool",
            metrics.active.clone(),
        );
        registry.register(
            "buffer_pool_checkouts",
            "Total number of buffer checkouts",
            metrics.checkouts.clone(),
        );
        registry.register(
            "buffer_pool_buffers",
            "Total number of buffers handed out over the pool's lifetime",
            metrics.buffers.clone(),
        );
        registry.register(
            "buffer_pool_returned_capacity_bytes",
            "Cumulative capacity in bytes of returned buffers",
            metrics.returned_capacity.clone(),
        );
        registry.register(
            "buffer_pool_returned_length_bytes",
            "Cumulative length in bytes of returned buffers",
            metrics.returned_length.clone(),
        );
        registry.register(
            "buffer_pool_shrinks",
            "Total number of oversized buffers discarded on return",
            metrics.shrinks.clone(),
        );
        registry.register(
            "buffer_pool_shrunk_bytes",
            "Cumulative bytes reclaimed by discarding oversized buffers",
            metrics.shrunk_bytes.clone(),
        );

        metrics
    }
}

/// Internal state of the pool.
struct Inner {
    /// Capacity for newly constructed buffers. Never mutated after
    /// construction.
    buffer_size: usize,
    /// Buffers available for checkout. `pop` hands each instance to exactly
    /// one caller.
    freelist: SegQueue<Ring>,
    metrics: Metrics,
}

/// A concurrency-safe pool of reusable [`Ring`] buffers.
///
/// A checked-out buffer is exclusively owned by the caller; the pool holds no
/// reference to it until it is passed back to [`Pool::release`]. The
/// free-list is unordered: any available instance may satisfy any request.
///
/// # Clone Semantics
///
/// `Clone` creates another handle to the same pool (via `Arc`). All handles
/// share the same free-list and metrics.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("buffer_size", &self.inner.buffer_size)
            .field("available", &self.inner.freelist.len())
            .finish()
    }
}

impl Pool {
    /// Creates a new pool with the given configuration, registering its
    /// metrics against `registry`.
    pub fn new(config: PoolConfig, registry: &mut Registry) -> Self {
        let metrics = Metrics::new(registry);
        Self {
            inner: Arc::new(Inner {
                buffer_size: config.buffer_size.get(),
                freelist: SegQueue::new(),
                metrics,
            }),
        }
    }

    /// Returns the configured capacity for newly constructed buffers.
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Checks a buffer out of the pool, constructing a fresh one of the
    /// configured size if none is available.
    ///
    /// The returned buffer is logically empty (`len() == 0`); its storage may
    /// hold stale bytes from a prior use, which are unreachable through the
    /// [`Ring`] API.
    pub fn acquire(&self) -> Ring {
        let buffer = self
            .inner
            .freelist
            .pop()
            .unwrap_or_else(|| Ring::with_capacity(self.inner.buffer_size));

        let metrics = &self.inner.metrics;
        metrics.active.inc();
        metrics.checkouts.inc();
        metrics.buffers.inc();

        buffer
    }

    /// Returns a buffer to the pool, applying the retention policy.
    ///
    /// `buffer` must have been obtained from this pool via [`Pool::acquire`].
    /// Releasing a buffer constructed elsewhere is not checked and skews the
    /// pool's accounting.
    pub fn release(&self, mut buffer: Ring) {
        let (capacity, length) = (buffer.capacity(), buffer.len());

        let metrics = &self.inner.metrics;
        metrics.active.dec();
        metrics.returned_capacity.inc_by(capacity as u64);
        metrics.returned_length.inc_by(length as u64);

        // Buffers more than twice the default size are not returned to the
        // pool; a default-sized replacement is pooled instead.
        let buffer_size = self.inner.buffer_size;
        let max_allowed = buffer_size.saturating_mul(2);
        let buffer = if capacity > max_allowed {
            let reclaimed = capacity - buffer_size;
            metrics.shrinks.inc();
            metrics.shrunk_bytes.inc_by(reclaimed as u64);
            debug!(capacity, reclaimed, "discarding oversized buffer");
            Ring::with_capacity(buffer_size)
        } else {
            buffer.reset();
            buffer
        };

        self.inner.freelist.push(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, thread};

    fn test_registry() -> Registry {
        Registry::default()
    }

    fn test_pool(buffer_size: usize) -> Pool {
        let config = PoolConfig {
            buffer_size: NonZeroUsize::new(buffer_size).unwrap(),
        };
        Pool::new(config, &mut test_registry())
    }

    #[test]
    fn test_default_config() {
        assert_eq!(PoolConfig::default().buffer_size.get(), 4096);
    }

    #[test]
    fn test_acquire_from_empty_pool() {
        let pool = Pool::new(PoolConfig::default(), &mut test_registry());
        let buffer = pool.acquire();
        assert_eq!(buffer.capacity(), 4096);
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_release_then_acquire_reuses_instance() {
        let pool = Pool::new(PoolConfig::default(), &mut test_registry());

        let mut buffer = pool.acquire();
        buffer.write(b"hello");
        assert_eq!(buffer.len(), 5);
        let ptr = buffer.storage_ptr();
        pool.release(buffer);

        // The same instance comes back, reset and with capacity unchanged.
        let buffer = pool.acquire();
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.capacity(), 4096);
        assert_eq!(buffer.storage_ptr(), ptr);
    }

    #[test]
    fn test_outstanding_buffers_are_distinct() {
        let pool = Pool::new(PoolConfig::default(), &mut test_registry());

        let buffers: Vec<Ring> = (0..8).map(|_| pool.acquire()).collect();
        let addrs: HashSet<usize> = buffers
            .iter()
            .map(|buffer| buffer.storage_ptr() as usize)
            .collect();
        assert_eq!(addrs.len(), 8);
    }

    #[test]
    fn test_oversized_buffer_discarded() {
        let pool = Pool::new(PoolConfig::default(), &mut test_registry());

        let mut buffer = pool.acquire();
        buffer.write(&[0u8; 9000]);
        assert_eq!(buffer.capacity(), 9000);
        let ptr = buffer.storage_ptr();
        pool.release(buffer);

        assert_eq!(pool.inner.metrics.shrinks.get(), 1);
        assert_eq!(pool.inner.metrics.shrunk_bytes.get(), 9000 - 4096);

        // The pooled replacement is a fresh default-sized instance.
        let buffer = pool.acquire();
        assert_eq!(buffer.capacity(), 4096);
        assert_eq!(buffer.len(), 0);
        assert_ne!(buffer.storage_ptr(), ptr);
    }

    #[test]
    fn test_moderately_grown_buffer_kept() {
        let pool = Pool::new(PoolConfig::default(), &mut test_registry());

        let mut buffer = pool.acquire();
        buffer.write(&[0u8; 8000]);
        assert_eq!(buffer.capacity(), 8192);
        let ptr = buffer.storage_ptr();
        pool.release(buffer);

        assert_eq!(pool.inner.metrics.shrinks.get(), 0);

        // The same instance is reused with its grown capacity.
        let buffer = pool.acquire();
        assert_eq!(buffer.capacity(), 8192);
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.storage_ptr(), ptr);
    }

    #[test]
    fn test_capacity_at_threshold_kept() {
        // Exactly twice the default size is not oversized.
        let pool = test_pool(4096);

        let mut buffer = pool.acquire();
        buffer.write(&[0u8; 8192]);
        assert_eq!(buffer.capacity(), 8192);
        pool.release(buffer);

        assert_eq!(pool.inner.metrics.shrinks.get(), 0);
        assert_eq!(pool.acquire().capacity(), 8192);
    }

    #[test]
    fn test_shrink_with_custom_buffer_size() {
        let pool = test_pool(1024);

        let mut buffer = pool.acquire();
        assert_eq!(buffer.capacity(), 1024);

        buffer.write(&[0u8; 5000]);
        assert_eq!(buffer.capacity(), 5000);
        pool.release(buffer);

        assert_eq!(pool.inner.metrics.shrinks.get(), 1);
        assert_eq!(pool.inner.metrics.shrunk_bytes.get(), 5000 - 1024);
        assert_eq!(pool.acquire().capacity(), 1024);
    }

    #[test]
    fn test_active_gauge_tracks_outstanding() {
        let pool = Pool::new(PoolConfig::default(), &mut test_registry());

        let mut buffers: Vec<Ring> = (0..5).map(|_| pool.acquire()).collect();
        assert_eq!(pool.inner.metrics.active.get(), 5);

        for _ in 0..3 {
            pool.release(buffers.pop().unwrap());
        }
        assert_eq!(pool.inner.metrics.active.get(), 2);

        for buffer in buffers.drain(..) {
            pool.release(buffer);
        }
        assert_eq!(pool.inner.metrics.active.get(), 0);
    }

    #[test]
    fn test_checkout_counters() {
        let pool = Pool::new(PoolConfig::default(), &mut test_registry());

        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.inner.metrics.checkouts.get(), 2);
        assert_eq!(pool.inner.metrics.buffers.get(), 2);

        pool.release(a);
        pool.release(b);

        // Reuse still counts as a checkout.
        let _c = pool.acquire();
        assert_eq!(pool.inner.metrics.checkouts.get(), 3);
    }

    #[test]
    fn test_returned_byte_counters() {
        let pool = Pool::new(PoolConfig::default(), &mut test_registry());

        let mut buffer = pool.acquire();
        buffer.write(&[0u8; 100]);
        pool.release(buffer);

        assert_eq!(pool.inner.metrics.returned_capacity.get(), 4096);
        assert_eq!(pool.inner.metrics.returned_length.get(), 100);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = Pool::new(PoolConfig::default(), &mut test_registry());

        let handles: Vec<_> = (0..8usize)
            .map(|i| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for j in 0..100usize {
                        let mut buffer = pool.acquire();
                        assert_eq!(buffer.len(), 0);
                        // Mix payload sizes so some returns trip the
                        // retention policy and some do not.
                        buffer.write(&vec![0xABu8; (i * 1000 + j * 37) % 10_000]);
                        pool.release(buffer);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.inner.metrics.active.get(), 0);
        assert_eq!(pool.inner.metrics.checkouts.get(), 800);

        // Every pooled buffer survived the retention policy: reset, and at
        // or below twice the default size.
        while let Some(buffer) = pool.inner.freelist.pop() {
            assert_eq!(buffer.len(), 0);
            assert!(buffer.capacity() <= 2 * 4096);
        }
    }
}
