//! A single contiguous region of `capacity + reserved` bytes with two
//! independent cursors. Mirrors `ringmpsc::Ring`'s `UnsafeCell<Box<[T]>>`
//! single-writer-per-half discipline, specialised to bytes and to disjoint
//! reader/writer index ranges instead of a shared head/tail pair.

use std::cell::UnsafeCell;

/// The raw byte region leased by a pipe between `borrow` and `recycle`.
///
/// # Safety
///
/// `BackingStore` is `Send + Sync` because the SPSC discipline enforced by
/// [`crate::state::ChannelState`] and [`crate::capacity::Capacity`]
/// guarantees the reader and writer only ever touch disjoint byte ranges:
/// the writer's range is `[write_position, write_position + n)` for an `n`
/// it just reserved from `available_for_write`; the reader's is the
/// symmetric range carved from `available_for_read`. Neither range can
/// overlap because the capacity counters enforce
/// `available_for_read + available_for_write + pending_to_flush <= capacity`
/// at every point.
pub(crate) struct BackingStore {
    buf: UnsafeCell<Box<[u8]>>,
    capacity: usize,
    reserved: usize,
}

unsafe impl Send for BackingStore {}
unsafe impl Sync for BackingStore {}

impl BackingStore {
    pub(crate) fn new(buf: Box<[u8]>, capacity: usize, reserved: usize) -> Self {
        debug_assert_eq!(buf.len(), capacity + reserved);
        Self {
            buf: UnsafeCell::new(buf),
            capacity,
            reserved,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a mutable slice of `len` bytes starting at logical index
    /// `pos` (which may run into the reserved tail, `pos + len <= capacity +
    /// reserved`). Caller must hold the write lease for this range.
    ///
    /// # Safety
    ///
    /// The caller must guarantee no other live borrow (read or write)
    /// overlaps `[pos, pos + len)`.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn write_slice(&self, pos: usize, len: usize) -> &mut [u8] {
        debug_assert!(pos + len <= self.capacity + self.reserved);
        let buf = &mut *self.buf.get();
        &mut buf[pos..pos + len]
    }

    /// Returns a shared slice of `len` bytes starting at logical index
    /// `pos`. Caller must hold the read lease for this range.
    ///
    /// # Safety
    ///
    /// The caller must guarantee no concurrent write borrow overlaps
    /// `[pos, pos + len)`.
    pub(crate) unsafe fn read_slice(&self, pos: usize, len: usize) -> &[u8] {
        debug_assert!(pos + len <= self.capacity + self.reserved);
        let buf = &*self.buf.get();
        &buf[pos..pos + len]
    }

    /// Copies `n` bytes out of the reserved tail back to the start of the
    /// logical region. A wrapping write lands its
    /// whole span, including the part that overruns `capacity`, in one
    /// linear slice `[pos, pos + len)`; `carry` then publishes the overrun
    /// at its real logical position `[0, n)` so later linear reads (which
    /// never cross into the reserved tail themselves) see it.
    pub(crate) fn carry(&self, n: usize) {
        if n == 0 {
            return;
        }
        unsafe {
            let buf = &mut *self.buf.get();
            let (head, tail) = buf.split_at_mut(self.capacity);
            head[..n].copy_from_slice(&tail[..n]);
        }
    }

    /// Copies `n` bytes from the start of the logical region into the
    /// reserved tail. Before a wrapping read's
    /// single linear slice `[pos, pos + len)` can be taken, the data that
    /// really lives at `[0, n)` has to be mirrored into the tail so the
    /// straddling remainder reads correctly.
    pub(crate) fn roll_bytes(&self, n: usize) {
        if n == 0 {
            return;
        }
        unsafe {
            let buf = &mut *self.buf.get();
            let (head, tail) = buf.split_at_mut(self.capacity);
            tail[..n].copy_from_slice(&head[..n]);
        }
    }

    pub(crate) fn into_inner(self) -> Box<[u8]> {
        self.buf.into_inner()
    }
}
