//! Growable circular byte buffer.
//!
//! [`Ring`] is the reusable container handed out by the pool. Content is
//! written at the tail and consumed from the head in FIFO order, wrapping
//! around the backing storage. When a write does not fit, the storage grows
//! and the content is linearized to the front of the new allocation, so
//! capacity only ever increases between [`Ring::reset`] calls.
//!
//! # Capacity
//!
//! [`Ring::with_capacity`] allocates exactly the requested number of bytes
//! and [`Ring::capacity`] reports exactly that value. Growth targets
//! `max(2 * capacity, len + additional)`: doubling amortizes repeated small
//! appends while a single large write lands on its exact size.

use bytes::Buf;

/// A growable circular byte buffer.
///
/// Reads and writes preserve FIFO order across wraparound and growth. The
/// readable content may occupy up to two contiguous regions of storage; use
/// [`Ring::as_slices`] to view both without copying.
pub struct Ring {
    buf: Box<[u8]>,
    /// Index of the first readable byte. Invariant: `head < buf.len()`
    /// whenever `len > 0`.
    head: usize,
    /// Number of readable bytes. Invariant: `len <= buf.len()`.
    len: usize,
}

impl Ring {
    /// Allocates a buffer with storage for exactly `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Returns the allocated storage size in bytes.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns the number of readable bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no readable bytes remain.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clears the logical content. Capacity is unchanged. Idempotent.
    #[inline]
    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Ensures storage for at least `additional` more bytes beyond the
    /// current content.
    ///
    /// Grows to `max(2 * capacity, len + additional)` and linearizes the
    /// content to the front of the new storage. No-op when the content
    /// already fits.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.len + additional;
        if required <= self.capacity() {
            return;
        }
        let mut buf = vec![0u8; required.max(self.capacity() * 2)].into_boxed_slice();
        let (first, second) = self.as_slices();
        buf[..first.len()].copy_from_slice(first);
        buf[first.len()..first.len() + second.len()].copy_from_slice(second);
        self.buf = buf;
        self.head = 0;
    }

    /// Appends all of `src`, growing storage if it does not fit.
    pub fn write(&mut self, src: &[u8]) {
        if src.is_empty() {
            return;
        }
        self.reserve(src.len());
        let capacity = self.capacity();
        let tail = (self.head + self.len) % capacity;
        let first = src.len().min(capacity - tail);
        self.buf[tail..tail + first].copy_from_slice(&src[..first]);
        self.buf[..src.len() - first].copy_from_slice(&src[first..]);
        self.len += src.len();
    }

    /// Copies up to `dst.len()` bytes out in FIFO order, returning the number
    /// of bytes read (0 when empty).
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = self.len.min(dst.len());
        if n == 0 {
            return 0;
        }
        let first = n.min(self.capacity() - self.head);
        dst[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        dst[first..n].copy_from_slice(&self.buf[..n - first]);
        self.head = (self.head + n) % self.capacity();
        self.len -= n;
        n
    }

    /// Raw storage pointer, for reuse assertions in tests.
    #[cfg(test)]
    pub(crate) fn storage_ptr(&self) -> *const u8 {
        self.buf.as_ptr()
    }

    /// Returns the readable content as up to two contiguous segments, in
    /// FIFO order. The second segment is empty unless the content wraps.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        if self.len == 0 {
            return (&[], &[]);
        }
        let first = self.len.min(self.capacity() - self.head);
        (
            &self.buf[self.head..self.head + first],
            &self.buf[..self.len - first],
        )
    }
}

impl std::fmt::Debug for Ring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ring")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .finish()
    }
}

impl Buf for Ring {
    #[inline]
    fn remaining(&self) -> usize {
        self.len
    }

    #[inline]
    fn chunk(&self) -> &[u8] {
        self.as_slices().0
    }

    #[inline]
    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.len, "cannot advance past end of buffer");
        if cnt == 0 {
            return;
        }
        self.head = (self.head + cnt) % self.capacity();
        self.len -= cnt;
    }
}
