//! Recycle scratch buffers across short-lived, high-frequency I/O operations.
//!
//! This crate provides a concurrency-safe cache of growable ring buffers for
//! workloads that repeatedly need a scratch buffer for a brief window (e.g.
//! scanning or streaming pipelines). Checking a buffer out of the [`Pool`]
//! and returning it amortizes allocation cost across uses, while a size-based
//! retention policy prevents a single oversized payload from permanently
//! inflating the pool's memory footprint: buffers that grew beyond twice the
//! configured default size are discarded on return and replaced with a fresh
//! default-sized instance.
//!
//! # Example
//!
//! ```rust
//! use prometheus_client::registry::Registry;
//! use salvage_pool::{Pool, PoolConfig};
//!
//! let mut registry = Registry::default();
//! let pool = Pool::new(PoolConfig::default(), &mut registry);
//!
//! // Checked-out buffers are exclusively owned and always start empty.
//! let mut buffer = pool.acquire();
//! assert_eq!(buffer.len(), 0);
//! buffer.write(b"hello world");
//!
//! let mut out = [0u8; 11];
//! assert_eq!(buffer.read(&mut out), 11);
//! assert_eq!(&out, b"hello world");
//!
//! // Returning the buffer makes it available to the next caller.
//! pool.release(buffer);
//! ```
//!
//! # Status
//!
//! `salvage-pool` is **ALPHA** software and is not yet recommended for
//! production use. Developers should expect breaking changes and occasional
//! instability.

mod pool;
pub use pool::{Pool, PoolConfig};
mod ring;
pub use ring::Ring;
