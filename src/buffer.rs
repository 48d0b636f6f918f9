//! The shared write buffer.
//!
//! Every write of a run, blocking or queued, points at the same
//! [`WriteBuffer`]. The io_uring backend hands the kernel a raw pointer into it,
//! so the bytes live in a [`Pin<Box<[u8]>>`] whose address cannot change while
//! entries are in flight.

use std::pin::Pin;

/// Byte the buffer is filled with.
pub const FILL_BYTE: u8 = b'A';

/// Heap-allocated, pinned, read-only block of `transfer_size` bytes.
#[derive(Debug)]
pub struct WriteBuffer {
    inner: Pin<Box<[u8]>>,
}

impl WriteBuffer {
    /// Allocates `len` bytes of [`FILL_BYTE`].
    pub fn filled(len: usize) -> Self {
        Self::filled_with(len, FILL_BYTE)
    }

    /// Allocates `len` bytes set to `byte`.
    pub fn filled_with(len: usize, byte: u8) -> Self {
        Self {
            inner: Pin::new(vec![byte; len].into_boxed_slice()),
        }
    }

    /// The buffer contents.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Stable pointer to the first byte, valid for as long as `self` lives.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.inner.as_ptr()
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` for a zero-length buffer.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
