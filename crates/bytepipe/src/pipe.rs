//! `Pipe`: the channel itself. Composes [`Capacity`], [`BackingStore`],
//! [`StateMachine`], [`ClosedMarker`] and a pair of [`Slot`]s into the
//! single-producer/single-consumer async byte pipe described by the module
//! header. Cloning a `Pipe` is cheap (an `Arc` bump) and is how the
//! writer-side task and the reader-side task each get their own handle onto
//! the same channel — mirroring how an `Arc<ringmpsc_stream::channel::
//! Channel<T>>` is shared between a `RingSender` and `RingReceiver` pair,
//! except here one concrete type exposes both halves of the API rather than
//! two.

use crate::backing::BackingStore;
use crate::capacity::Capacity;
use crate::closed::{ClosedMarker, ClosedState};
use crate::config::{BufferPool, HeapPool, PipeConfig};
use crate::error::{CloseCause, DisplayCause, PipeError, VisitorError, WriteError};
use crate::invariants::debug_assert_position_monotonic;
use crate::metrics::PipeMetrics;
use crate::slots::Slot;
use crate::state::{LeaseError, StateMachine};

use crossbeam_utils::CachePadded;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A single-producer/single-consumer, in-process, non-blocking byte pipe
/// with a bounded ring-buffered backing store.
///
/// Cloning shares the same underlying channel; the strict single-producer/
/// single-consumer contract is enforced at runtime, not by the type system — at
/// most one task may have a read in flight and at most one a write in
/// flight at any moment, or calls fail with [`PipeError::Misuse`] /
/// [`WriteError::Misuse`] rather than deadlocking or corrupting data.
#[derive(Clone)]
pub struct Pipe {
    inner: Arc<PipeInner>,
}

struct PipeInner {
    capacity: Capacity,
    state: StateMachine,
    closed: ClosedMarker,
    read_slot: Slot,
    write_slot: Slot,
    // Each cursor is touched by only one side, but the two sit right next to
    // each other in `PipeInner`; cache-padding keeps the reader's writes to
    // `read_position` from bouncing the cache line the writer's
    // `write_position` lives on, same motivation as the teacher's separate
    // `CacheAligned` producer-hot/consumer-hot groups in `Ring<T>`.
    read_position: CachePadded<AtomicUsize>,
    write_position: CachePadded<AtomicUsize>,
    config: PipeConfig,
    pool: Arc<dyn BufferPool>,
    metrics: PipeMetrics,
    join: Mutex<Option<crate::join::JoinState>>,
}

impl Pipe {
    /// Creates a new empty pipe with the default configuration and a
    /// heap-allocating buffer pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PipeConfig::default(), Arc::new(HeapPool))
    }

    /// Creates a new empty pipe with an explicit configuration and buffer
    /// pool.
    #[must_use]
    pub fn with_config(config: PipeConfig, pool: Arc<dyn BufferPool>) -> Self {
        Self {
            inner: Arc::new(PipeInner {
                capacity: Capacity::new(config.capacity),
                state: StateMachine::new(),
                closed: ClosedMarker::new(),
                read_slot: Slot::new(),
                write_slot: Slot::new(),
                read_position: CachePadded::new(AtomicUsize::new(0)),
                write_position: CachePadded::new(AtomicUsize::new(0)),
                config,
                pool,
                metrics: PipeMetrics::new(),
                join: Mutex::new(None),
            }),
        }
    }

    /// Creates a pipe preloaded with `content`, immediately readable without
    /// a writer ever having leased a buffer. `content.len()` must not
    /// exceed `config.capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `content.len() > config.capacity`.
    #[must_use]
    pub fn with_content(content: &[u8], config: PipeConfig, pool: Arc<dyn BufferPool>) -> Self {
        assert!(
            content.len() <= config.capacity,
            "preloaded content exceeds ring capacity"
        );
        let mut buf = pool.lease(config.backing_len());
        buf[..content.len()].copy_from_slice(content);
        let backing = Arc::new(BackingStore::new(buf, config.capacity, config.reserved_size));
        Self {
            inner: Arc::new(PipeInner {
                capacity: Capacity::new_preloaded(config.capacity, content.len()),
                state: StateMachine::new_preloaded(backing),
                closed: ClosedMarker::new(),
                read_slot: Slot::new(),
                write_slot: Slot::new(),
                read_position: CachePadded::new(AtomicUsize::new(0)),
                write_position: CachePadded::new(AtomicUsize::new(content.len())),
                config,
                pool,
                metrics: PipeMetrics::new(),
                join: Mutex::new(None),
            }),
        }
    }

    // ---- status --------------------------------------------------------

    #[must_use]
    pub fn available_for_read(&self) -> usize {
        self.inner.capacity.available_for_read()
    }

    #[must_use]
    pub fn available_for_write(&self) -> usize {
        self.inner.capacity.available_for_write()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_closed()
    }

    #[must_use]
    pub fn metrics(&self) -> &PipeMetrics {
        &self.inner.metrics
    }

    #[must_use]
    pub fn total_bytes_read(&self) -> u64 {
        self.inner.metrics.total_bytes_read()
    }

    #[must_use]
    pub fn total_bytes_written(&self) -> u64 {
        self.inner.metrics.total_bytes_written()
    }

    fn close_error_for_reader(&self) -> PipeError {
        match self.inner.closed.state() {
            Some(ClosedState::WithCause(cause)) => PipeError::ClosedWithCause(DisplayCause(cause)),
            Some(ClosedState::Normal) | None => PipeError::Closed,
        }
    }

    fn close_error_for_writer(&self) -> WriteError {
        match self.inner.closed.state() {
            Some(ClosedState::WithCause(cause)) => WriteError::ClosedWithCause(DisplayCause(cause)),
            Some(ClosedState::Normal) | None => WriteError::Closed,
        }
    }

    // ---- close / cancel -------------------------------------------------

    /// Closes the channel for writing. If `cause` is `None` this is a
    /// graceful close: the reader drains whatever is already buffered, then
    /// sees EOF. If `cause` is `Some`, this is an abortive close: buffered
    /// bytes are discarded and every pending or future call on either side
    /// observes the cause.
    pub fn close(&self, cause: Option<CloseCause>) -> bool {
        let state = match cause {
            Some(c) => ClosedState::WithCause(c),
            None => ClosedState::Normal,
        };
        let won = self.inner.closed.set(state.clone());
        if won {
            if matches!(state, ClosedState::WithCause(_)) {
                self.inner.capacity.force_lock_for_release();
                if let Some(backing) = self.inner.state.terminate() {
                    self.inner.pool.recycle(backing_into_box(backing));
                }
            }
            self.inner.read_slot.resume_all();
            self.inner.write_slot.resume_all();
            tracing::debug!(abortive = matches!(state, ClosedState::WithCause(_)), "pipe closed");
        }
        won
    }

    /// Aborts the channel immediately, discarding any buffered-but-unread
    /// bytes. Equivalent to `close(Some(cause))`.
    pub fn cancel(&self, cause: CloseCause) -> bool {
        self.close(Some(cause))
    }

    /// Runs `cancellation` to completion on a background task and cancels
    /// this pipe with its output once it resolves. Attaching a job
    /// transfers ownership of the close decision to it.
    pub fn attach_job<F>(&self, cancellation: F)
    where
        F: Future<Output = CloseCause> + Send + 'static,
    {
        let pipe = self.clone();
        tokio::spawn(async move {
            let cause = cancellation.await;
            pipe.cancel(cause);
        });
    }

    /// Promotes pending writes to readable data and wakes a suspended reader
    /// if one is waiting.
    pub fn flush(&self) {
        if self.inner.capacity.flush() {
            self.inner.metrics.record_flush();
            self.inner.read_slot.resume();
        }
    }

    fn auto_flush_if_configured(&self, became_full: bool) {
        if self.inner.config.auto_flush || became_full {
            self.flush();
        }
    }

    // ---- write lease -----------------------------------------------------

    fn acquire_write_lease(&self) -> Result<Arc<BackingStore>, WriteError> {
        let config = self.inner.config;
        let pool = Arc::clone(&self.inner.pool);
        match self.inner.state.setup_for_write(|| {
            let buf = pool.lease(config.backing_len());
            Arc::new(BackingStore::new(buf, config.capacity, config.reserved_size))
        }) {
            Ok(backing) => Ok(backing),
            Err(LeaseError::Terminated) => Err(self.close_error_for_writer()),
            Err(LeaseError::AlreadyLeased) => {
                Err(WriteError::Misuse("a write is already in progress on this pipe"))
            }
            Err(LeaseError::NoBuffer) => unreachable!("write lease always has a fresh-buffer path"),
        }
    }

    fn release_write_lease(&self, became_empty: bool) {
        if let Some(backing) = self.inner.state.restore_after_write(became_empty) {
            self.inner.pool.recycle(backing_into_box(backing));
        }
    }

    async fn ensure_writable(&self, min: usize) -> Result<(), WriteError> {
        loop {
            if self.is_closed() {
                return Err(self.close_error_for_writer());
            }
            if self.inner.capacity.available_for_write() >= min {
                return Ok(());
            }
            self.inner.metrics.record_writer_suspension();
            self.inner
                .write_slot
                .wait_until(|| self.is_closed() || self.inner.capacity.available_for_write() >= min)
                .await
                .map_err(WriteError::Misuse)?;
        }
    }

    // ---- read lease ------------------------------------------------------

    fn acquire_read_lease(&self) -> Result<Arc<BackingStore>, PipeError> {
        match self.inner.state.setup_for_read() {
            Ok(backing) => Ok(backing),
            Err(LeaseError::Terminated) | Err(LeaseError::NoBuffer) => Err(self.close_error_for_reader()),
            Err(LeaseError::AlreadyLeased) => {
                Err(PipeError::Misuse("a read is already in progress on this pipe"))
            }
        }
    }

    fn release_read_lease(&self, became_empty: bool) {
        if let Some(backing) = self.inner.state.restore_after_read(became_empty) {
            self.inner.pool.recycle(backing_into_box(backing));
        }
        // Every completed read frees write space, not only a read that
        // drains the ring to nothing — a writer blocked on `ensure_writable`
        // for less than the full ring only needs *some* of it back. Gating
        // this on `became_empty` (as an earlier pass did) would leave a
        // writer waiting on a partial drain parked forever; `wait_until`'s
        // predicate recheck makes an extra wakeup here harmless when no
        // space freed up at all (the zero-bytes-consumed path).
        self.inner.write_slot.resume();
    }

    /// Suspends until at least `min` bytes are readable, or the channel
    /// closes. Returns `false` if closed
    /// before `min` bytes ever became available.
    pub async fn await_at_least(&self, min: usize) -> Result<bool, PipeError> {
        loop {
            if self.inner.capacity.available_for_read() >= min {
                return Ok(true);
            }
            if self.is_closed() {
                return Ok(self.inner.capacity.available_for_read() >= min);
            }
            self.inner.metrics.record_reader_suspension();
            self.inner
                .read_slot
                .wait_until(|| self.is_closed() || self.inner.capacity.available_for_read() >= min)
                .await
                .map_err(PipeError::Misuse)?;
        }
    }

    /// Suspends until at least one byte is readable or the channel closes
    /// readable or the channel closes.
    pub async fn await_content(&self) -> Result<bool, PipeError> {
        self.await_at_least(1).await
    }

    /// Suspends until at least `min` bytes of write space are free or the
    /// channel closes.
    pub async fn await_free_space(&self, min: usize) -> Result<bool, WriteError> {
        loop {
            if self.inner.capacity.available_for_write() >= min {
                return Ok(true);
            }
            if self.is_closed() {
                return Ok(false);
            }
            self.inner
                .write_slot
                .wait_until(|| self.is_closed() || self.inner.capacity.available_for_write() >= min)
                .await
                .map_err(WriteError::Misuse)?;
        }
    }

    // ---- zero-copy visitor core -------------------------------------------

    /// Reserves at least `min` readable bytes (suspending until they exist
    /// or the channel closes), hands the caller a contiguous slice bounded
    /// by the physical end of the ring, and commits whatever the visitor
    /// reports consuming.
    ///
    /// The visitor returns how many of the leading bytes of the slice it
    /// consumed; it may consume fewer than it was given, but never more,
    /// and never "moves the limit" — it only ever sees the slice once.
    /// Unconsumed bytes are left readable for the next call.
    pub async fn read<V>(&self, min: usize, visitor: V) -> Result<usize, PipeError>
    where
        V: FnOnce(&[u8]) -> usize,
    {
        if min > 0 && !self.await_at_least(min).await? {
            // Closed with fewer than `min` bytes ever available: fall
            // through and give the visitor whatever is left (possibly 0,
            // i.e. true EOF) rather than treating it as an error.
        }
        self.read_now(visitor)
    }

    /// Non-suspending counterpart of [`Self::read`]: visits whatever is
    /// immediately readable (possibly 0 bytes) without waiting.
    pub fn read_now<V>(&self, visitor: V) -> Result<usize, PipeError>
    where
        V: FnOnce(&[u8]) -> usize,
    {
        let backing = match self.acquire_read_lease() {
            Ok(b) => b,
            Err(PipeError::Closed) | Err(PipeError::ClosedWithCause(_)) => return Ok(0),
            Err(e) => return Err(e),
        };
        let pos = self.inner.read_position.load(Ordering::Relaxed);
        let run = (backing.capacity() - pos).min(self.inner.capacity.available_for_read());
        let reserved = self.inner.capacity.try_read_at_most(run);
        if reserved == 0 {
            self.release_read_lease(self.inner.capacity.is_empty());
            return Ok(0);
        }
        let slice = unsafe { backing.read_slice(pos, reserved) };
        let consumed = visitor(slice);
        debug_assert_position_monotonic!(consumed, reserved);
        if consumed > reserved {
            self.inner.capacity.complete_read(0);
            self.release_read_lease(self.inner.capacity.is_empty());
            return Err(VisitorError::PositionTampered { consumed, reserved }.into());
        }
        self.inner.read_position.store((pos + consumed) % backing.capacity(), Ordering::Relaxed);
        self.inner.metrics.add_bytes_read(consumed as u64);
        self.inner.capacity.complete_read(consumed);
        let refund = reserved - consumed;
        if refund > 0 {
            // Spec.md §6.2 step 5: unused reservation is refunded through
            // `pendingToFlush` rather than directly to `availableForRead`
            // (see DESIGN.md "zero-copy read refund"). An immediate flush
            // republishes it right away; the gap only matters to this same
            // reader, per the SPSC contract.
            self.inner.capacity.complete_write(refund);
            self.flush();
        }
        let became_empty = self.inner.capacity.is_empty();
        self.release_read_lease(became_empty);
        Ok(consumed)
    }

    /// Reserves at least `min` bytes of write space (suspending until free
    /// or closed), hands the caller a contiguous mutable slice bounded by
    /// the physical end of the ring, and commits what the visitor reports
    /// writing. Auto-flushes per
    /// [`PipeConfig::auto_flush`].
    pub async fn write<V>(&self, min: usize, visitor: V) -> Result<usize, WriteError>
    where
        V: FnOnce(&mut [u8]) -> usize,
    {
        self.ensure_writable(min.max(1)).await?;
        self.write_now(visitor)
    }

    /// Non-suspending counterpart of [`Self::write`].
    pub fn write_now<V>(&self, visitor: V) -> Result<usize, WriteError>
    where
        V: FnOnce(&mut [u8]) -> usize,
    {
        if self.is_closed() {
            return Err(self.close_error_for_writer());
        }
        let backing = self.acquire_write_lease()?;
        let pos = self.inner.write_position.load(Ordering::Relaxed);
        let run = (backing.capacity() - pos).min(self.inner.capacity.available_for_write());
        let reserved = self.inner.capacity.try_write_at_most(run);
        if reserved == 0 {
            self.release_write_lease(false);
            return Ok(0);
        }
        let slice = unsafe { backing.write_slice(pos, reserved) };
        let written = visitor(slice);
        debug_assert_position_monotonic!(written, reserved);
        if written > reserved {
            self.release_write_lease(false);
            return Err(VisitorError::PositionTampered { consumed: written, reserved }.into());
        }
        self.inner.write_position.store((pos + written) % backing.capacity(), Ordering::Relaxed);
        self.inner.metrics.add_bytes_written(written as u64);
        self.inner.capacity.complete_write(written);
        let refund = reserved - written;
        if refund > 0 {
            // Symmetric write-side refund: unwritten reservation goes
            // straight back to `availableForWrite` via `completeRead`,
            // with no visibility caveat (it was never readable to begin
            // with).
            self.inner.capacity.complete_read(refund);
        }
        let became_full = self.inner.capacity.is_full();
        self.release_write_lease(false);
        self.auto_flush_if_configured(became_full);
        Ok(written)
    }

    /// Repeatedly invokes `visitor` with whatever is writable, suspending
    /// for more space between calls, until the visitor reports it has
    /// nothing further to offer or the channel closes.
    pub async fn write_while<V>(&self, mut visitor: V) -> Result<(), WriteError>
    where
        V: FnMut(&mut [u8]) -> usize,
    {
        loop {
            let mut offered_zero = false;
            let written = self
                .write(1, |buf| {
                    let n = visitor(buf);
                    offered_zero = n == 0;
                    n
                })
                .await?;
            if offered_zero || written == 0 {
                return Ok(());
            }
        }
    }

    /// Runs a multi-round writer session: `session` is invoked with a
    /// writable slice and reports both how much it consumed and whether
    /// the session is finished.
    pub async fn write_suspend_session<F>(&self, mut session: F) -> Result<(), WriteError>
    where
        F: FnMut(&mut [u8]) -> WriteSessionStep,
    {
        loop {
            let mut finished = false;
            let consumed = self
                .write(1, |buf| {
                    let step = session(buf);
                    finished = matches!(step, WriteSessionStep::Done(_));
                    step.consumed()
                })
                .await?;
            if finished || consumed == 0 {
                return Ok(());
            }
        }
    }

    // ---- bulk slice convenience -------------------------------------------

    /// Writes all of `src`, suspending as needed.
    pub async fn write_fully(&self, src: &[u8]) -> Result<(), WriteError> {
        let mut offset = 0;
        while offset < src.len() {
            let n = self
                .write(1, |buf| {
                    let take = buf.len().min(src.len() - offset);
                    buf[..take].copy_from_slice(&src[offset..offset + take]);
                    take
                })
                .await?;
            offset += n;
        }
        Ok(())
    }

    /// Writes as much of `src` as is immediately available, without
    /// suspending. Returns the number of bytes written (possibly 0).
    pub fn write_available(&self, src: &[u8]) -> Result<usize, WriteError> {
        self.write_now(|buf| {
            let take = buf.len().min(src.len());
            buf[..take].copy_from_slice(&src[..take]);
            take
        })
    }

    /// Reads until `dst` is completely filled or the channel closes early
    /// early.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::UnexpectedEof`] if the channel closes normally
    /// before `dst` is filled.
    pub async fn read_fully(&self, dst: &mut [u8]) -> Result<(), PipeError> {
        let requested = dst.len();
        let mut offset = 0;
        while offset < dst.len() {
            let n = self
                .read(1, |buf| {
                    let take = buf.len().min(dst.len() - offset);
                    dst[offset..offset + take].copy_from_slice(&buf[..take]);
                    take
                })
                .await?;
            if n == 0 {
                return Err(PipeError::UnexpectedEof {
                    read: offset as u64,
                    requested: requested as u64,
                });
            }
            offset += n;
        }
        Ok(())
    }

    /// Reads as much of `dst` as is immediately available without
    /// suspending. Returns `0` both when nothing is currently buffered and
    /// at true end-of-stream; use [`Self::is_closed`] to disambiguate.
    pub fn read_available(&self, dst: &mut [u8]) -> Result<usize, PipeError> {
        self.read_now(|buf| {
            let take = buf.len().min(dst.len());
            dst[..take].copy_from_slice(&buf[..take]);
            take
        })
    }

    /// Copies up to `dst.len()` bytes into `dst` without consuming them
    /// without consuming them. Implemented as a zero-copy read that always
    /// reports zero bytes consumed, so the whole reservation is refunded.
    pub fn peek_to(&self, dst: &mut [u8]) -> Result<usize, PipeError> {
        let mut copied = 0;
        self.read_now(|buf| {
            copied = buf.len().min(dst.len());
            dst[..copied].copy_from_slice(&buf[..copied]);
            0
        })?;
        Ok(copied)
    }

    /// Discards up to `max` readable bytes without copying them anywhere,
    /// suspending as needed, and returns how many were actually discarded.
    pub async fn discard(&self, max: u64) -> Result<u64, PipeError> {
        let mut discarded: u64 = 0;
        while discarded < max {
            let want = ((max - discarded) as usize).max(1);
            let n = self.read(1, |buf| buf.len().min(want)).await?;
            if n == 0 {
                break;
            }
            discarded += n as u64;
        }
        Ok(discarded)
    }

    // ---- primitives --------------------------------------------------------

    async fn write_primitive(&self, bytes: &[u8]) -> Result<(), WriteError> {
        let s = bytes.len();
        loop {
            self.ensure_writable(s).await?;
            let backing = self.acquire_write_lease()?;
            if !self.inner.capacity.try_write_exact(s) {
                // Another writer task can't exist (SPSC), but `ensure_writable`
                // and the lease acquisition aren't atomic with this CAS: a
                // concurrent reader could have moved bytes in between. Retry.
                self.release_write_lease(false);
                continue;
            }
            let pos = self.inner.write_position.load(Ordering::Relaxed);
            let end_space = backing.capacity() - pos;
            unsafe { backing.write_slice(pos, s) }.copy_from_slice(bytes);
            if end_space < s {
                backing.carry(s - end_space);
            }
            self.inner.write_position.store((pos + s) % backing.capacity(), Ordering::Relaxed);
            self.inner.metrics.add_bytes_written(s as u64);
            self.inner.capacity.complete_write(s);
            let became_full = self.inner.capacity.is_full();
            self.release_write_lease(false);
            self.auto_flush_if_configured(became_full);
            return Ok(());
        }
    }

    async fn read_primitive(&self, buf: &mut [u8]) -> Result<(), PipeError> {
        let s = buf.len();
        loop {
            if !self.await_at_least(s).await? {
                return Err(PipeError::UnexpectedEof {
                    read: 0,
                    requested: s as u64,
                });
            }
            let backing = self.acquire_read_lease()?;
            if !self.inner.capacity.try_read_exact(s) {
                self.release_read_lease(false);
                continue;
            }
            let pos = self.inner.read_position.load(Ordering::Relaxed);
            let end_space = backing.capacity() - pos;
            if end_space < s {
                backing.roll_bytes(s - end_space);
            }
            buf.copy_from_slice(unsafe { backing.read_slice(pos, s) });
            self.inner.read_position.store((pos + s) % backing.capacity(), Ordering::Relaxed);
            break;
        }
        self.inner.metrics.add_bytes_read(s as u64);
        self.inner.capacity.complete_read(s);
        let became_empty = self.inner.capacity.is_empty();
        self.release_read_lease(became_empty);
        Ok(())
    }

    pub async fn write_u8(&self, v: u8) -> Result<(), WriteError> {
        self.write_primitive(&v.to_be_bytes()).await
    }
    pub async fn write_u16(&self, v: u16) -> Result<(), WriteError> {
        self.write_primitive(&v.to_be_bytes()).await
    }
    pub async fn write_u32(&self, v: u32) -> Result<(), WriteError> {
        self.write_primitive(&v.to_be_bytes()).await
    }
    pub async fn write_u64(&self, v: u64) -> Result<(), WriteError> {
        self.write_primitive(&v.to_be_bytes()).await
    }
    pub async fn write_f32(&self, v: f32) -> Result<(), WriteError> {
        self.write_primitive(&v.to_be_bytes()).await
    }
    pub async fn write_f64(&self, v: f64) -> Result<(), WriteError> {
        self.write_primitive(&v.to_be_bytes()).await
    }

    pub async fn read_u8(&self) -> Result<u8, PipeError> {
        let mut b = [0u8; 1];
        self.read_primitive(&mut b).await?;
        Ok(u8::from_be_bytes(b))
    }
    pub async fn read_u16(&self) -> Result<u16, PipeError> {
        let mut b = [0u8; 2];
        self.read_primitive(&mut b).await?;
        Ok(u16::from_be_bytes(b))
    }
    pub async fn read_u32(&self) -> Result<u32, PipeError> {
        let mut b = [0u8; 4];
        self.read_primitive(&mut b).await?;
        Ok(u32::from_be_bytes(b))
    }
    pub async fn read_u64(&self) -> Result<u64, PipeError> {
        let mut b = [0u8; 8];
        self.read_primitive(&mut b).await?;
        Ok(u64::from_be_bytes(b))
    }
    pub async fn read_f32(&self) -> Result<f32, PipeError> {
        let mut b = [0u8; 4];
        self.read_primitive(&mut b).await?;
        Ok(f32::from_be_bytes(b))
    }
    pub async fn read_f64(&self) -> Result<f64, PipeError> {
        let mut b = [0u8; 8];
        self.read_primitive(&mut b).await?;
        Ok(f64::from_be_bytes(b))
    }

    // ---- join / splice -------------------------------------------------------

    /// Drains `self` into `target`, returning the number of bytes copied
    /// once `self` reaches EOF. If `propagate_close` is set, `target` is
    /// closed (with `self`'s closing cause, if any) once draining finishes
    /// once draining finishes.
    ///
    /// # Errors
    ///
    /// Fails with [`PipeError::Misuse`] if `target`'s delegation chain
    /// resolves back to `self` (a join cycle).
    pub async fn join_to(&self, target: &Pipe, propagate_close: bool) -> Result<u64, PipeError> {
        crate::join::join_to(self, target, propagate_close).await
    }

    pub(crate) fn install_join(&self, state: crate::join::JoinState) {
        *self.inner.join.lock().unwrap() = Some(state);
    }

    pub(crate) fn clear_join(&self) {
        *self.inner.join.lock().unwrap() = None;
    }

    /// Resolves the final target of this pipe's join chain, collapsing
    /// multi-hop joins. Returns
    /// `self` if it is not currently delegating.
    #[must_use]
    pub fn resolve_delegation(&self) -> Pipe {
        match &*self.inner.join.lock().unwrap() {
            Some(state) => state.target.resolve_delegation(),
            None => self.clone(),
        }
    }

    pub(crate) fn is_same_channel(&self, other: &Pipe) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn take_close_cause_for_propagation(&self) -> Option<CloseCause> {
        match self.inner.closed.state() {
            Some(ClosedState::WithCause(c)) => Some(c),
            _ => None,
        }
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

/// A step reported by a [`Pipe::write_suspend_session`] round.
pub enum WriteSessionStep {
    /// More rounds will follow; `usize` is how many leading bytes of the
    /// offered slice were consumed this round.
    Continue(usize),
    /// This was the final round; `usize` is how many leading bytes of the
    /// offered slice were consumed this round.
    Done(usize),
}

impl WriteSessionStep {
    fn consumed(&self) -> usize {
        match self {
            Self::Continue(n) | Self::Done(n) => *n,
        }
    }
}

fn backing_into_box(backing: Arc<BackingStore>) -> Box<[u8]> {
    match Arc::try_unwrap(backing) {
        Ok(b) => b.into_inner(),
        Err(shared) => {
            // Another clone is still briefly alive (e.g. a concurrent
            // `resolve_delegation` snapshot); nothing to recycle this time.
            drop(shared);
            Box::new([])
        }
    }
}
