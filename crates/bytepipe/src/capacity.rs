//! Atomic occupancy accounting packed into a single word and updated via
//! CAS, in the same spirit as `ringmpsc::Ring`'s packed head/tail sequence
//! numbers.
//!
//! Three counters share one `AtomicU64`:
//! `available_for_read | available_for_write | pending_to_flush`, each 21
//! bits (capacity is bounded to [`crate::config::PipeConfig::MAX_CAPACITY`]),
//! plus one lock bit. A `try*` operation CASes the word; the caller then
//! calls the matching `complete*` once the actual bytes moved are known.
//! The read-visitor refund path lands in `pending_to_flush` rather than
//! directly back in `available_for_read`, since the bytes were never
//! published as write space to begin with — see the `complete_write` call
//! in the refund branch of `Pipe::read_now`.

use crate::invariants::{debug_assert_conserved_occupancy, debug_assert_sufficient};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

const FIELD_BITS: u32 = 21;
const FIELD_MASK: u64 = (1 << FIELD_BITS) - 1;
const LOCK_BIT: u64 = 1 << 63;

#[inline]
fn pack(ar: usize, aw: usize, pf: usize, locked: bool) -> u64 {
    debug_assert!(ar as u64 <= FIELD_MASK && aw as u64 <= FIELD_MASK && pf as u64 <= FIELD_MASK);
    (ar as u64) | ((aw as u64) << FIELD_BITS) | ((pf as u64) << (2 * FIELD_BITS))
        | if locked { LOCK_BIT } else { 0 }
}

#[inline]
fn unpack(word: u64) -> (usize, usize, usize, bool) {
    let ar = (word & FIELD_MASK) as usize;
    let aw = ((word >> FIELD_BITS) & FIELD_MASK) as usize;
    let pf = ((word >> (2 * FIELD_BITS)) & FIELD_MASK) as usize;
    let locked = word & LOCK_BIT != 0;
    (ar, aw, pf, locked)
}

/// The packed, CAS-driven occupancy triple for one ring.
///
/// `word` is the single hottest cell in the whole pipe — both the producer
/// and the consumer CAS it on every operation — so it is cache-padded the
/// same way the teacher's `Ring<T>` pads its `tail`/`head` sequence counters,
/// to keep it off a cache line shared with something else that would
/// otherwise bounce between cores on every reservation.
pub(crate) struct Capacity {
    word: CachePadded<AtomicU64>,
    total: usize,
}

impl Capacity {
    /// Creates a capacity starting fully available for write (empty ring).
    pub(crate) fn new(total: usize) -> Self {
        Self {
            word: CachePadded::new(AtomicU64::new(pack(0, total, 0, false))),
            total,
        }
    }

    /// Creates a capacity preloaded with `preloaded` bytes already available
    /// to read (used when a pipe is constructed with existing content).
    pub(crate) fn new_preloaded(total: usize, preloaded: usize) -> Self {
        debug_assert!(preloaded <= total);
        Self {
            word: CachePadded::new(AtomicU64::new(pack(preloaded, total - preloaded, 0, false))),
            total,
        }
    }

    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.total
    }

    #[inline]
    fn load(&self) -> (usize, usize, usize, bool) {
        unpack(self.word.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn available_for_read(&self) -> usize {
        self.load().0
    }

    #[inline]
    pub(crate) fn available_for_write(&self) -> usize {
        self.load().1
    }

    #[inline]
    pub(crate) fn pending_to_flush(&self) -> usize {
        self.load().2
    }

    #[inline]
    pub(crate) fn is_locked(&self) -> bool {
        self.load().3
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.available_for_write() == 0
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        let (ar, _, pf, _) = self.load();
        ar == 0 && pf == 0
    }

    /// CAS loop shared by every `try_*`/`complete_*`/`flush` operation.
    /// `f` receives the unpacked triple and returns the new triple plus
    /// whatever result the caller wants, or `None` to fail without retrying.
    fn update<R>(&self, mut f: impl FnMut(usize, usize, usize) -> Option<((usize, usize, usize), R)>) -> Option<R> {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let (ar, aw, pf, locked) = unpack(current);
            if locked {
                return None;
            }
            let ((new_ar, new_aw, new_pf), result) = f(ar, aw, pf)?;
            debug_assert_conserved_occupancy!(new_ar, new_aw, new_pf, self.total);
            let new_word = pack(new_ar, new_aw, new_pf, false);
            match self.word.compare_exchange_weak(
                current,
                new_word,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(result),
                Err(actual) => current = actual,
            }
        }
    }

    /// Reserves exactly `n` bytes of write space, or fails if unavailable.
    pub(crate) fn try_write_exact(&self, n: usize) -> bool {
        if n == 0 {
            return true;
        }
        self.update(|ar, aw, pf| {
            if aw >= n {
                Some(((ar, aw - n, pf), ()))
            } else {
                None
            }
        })
        .is_some()
    }

    /// Reserves up to `k` bytes of write space, returning how much was
    /// actually reserved (0 if the ring is full).
    pub(crate) fn try_write_at_most(&self, k: usize) -> usize {
        if k == 0 {
            return 0;
        }
        self.update(|ar, aw, pf| {
            let take = aw.min(k);
            if take == 0 {
                None
            } else {
                Some(((ar, aw - take, pf), take))
            }
        })
        .unwrap_or(0)
    }

    /// Reserves *all* currently available write space, provided it is at
    /// least `min` bytes (used by the zero-copy write visitor).
    pub(crate) fn try_write_at_least(&self, min: usize) -> usize {
        self.update(|ar, aw, pf| {
            if aw >= min && aw > 0 {
                Some(((ar, 0, pf), aw))
            } else {
                None
            }
        })
        .unwrap_or(0)
    }

    /// Finalizes `n` bytes of a write reservation into `pending_to_flush`.
    pub(crate) fn complete_write(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.update(|ar, aw, pf| {
            debug_assert_sufficient!(self.total.saturating_sub(ar + aw + pf), n, "write limbo");
            Some(((ar, aw, pf + n), ()))
        });
    }

    /// Reserves exactly `n` bytes of readable data.
    pub(crate) fn try_read_exact(&self, n: usize) -> bool {
        if n == 0 {
            return true;
        }
        self.update(|ar, aw, pf| {
            if ar >= n {
                Some(((ar - n, aw, pf), ()))
            } else {
                None
            }
        })
        .is_some()
    }

    /// Reserves up to `k` bytes of readable data, returning how much was
    /// actually reserved.
    pub(crate) fn try_read_at_most(&self, k: usize) -> usize {
        if k == 0 {
            return 0;
        }
        self.update(|ar, aw, pf| {
            let take = ar.min(k);
            if take == 0 {
                None
            } else {
                Some(((ar - take, aw, pf), take))
            }
        })
        .unwrap_or(0)
    }

    /// Reserves *all* currently readable data, provided it is at least
    /// `min` bytes.
    pub(crate) fn try_read_at_least(&self, min: usize) -> usize {
        self.update(|ar, aw, pf| {
            if ar >= min && ar > 0 {
                Some(((0, aw, pf), ar))
            } else {
                None
            }
        })
        .unwrap_or(0)
    }

    /// Finalizes `n` bytes of a read reservation, freeing them for the
    /// writer to reuse.
    pub(crate) fn complete_read(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.update(|ar, aw, pf| {
            debug_assert_sufficient!(self.total.saturating_sub(ar + aw + pf), n, "read limbo");
            Some(((ar, aw + n, pf), ()))
        });
    }

    /// Promotes pending writes to readable. Returns `true` if any bytes
    /// moved.
    pub(crate) fn flush(&self) -> bool {
        self.update(|ar, aw, pf| {
            if pf == 0 {
                None
            } else {
                Some(((ar + pf, aw, 0), ()))
            }
        })
        .is_some()
    }

    /// Resets the counters to a fresh, empty state (full write availability)
    /// — used when a new backing buffer is leased for writing.
    pub(crate) fn reset_for_write(&self) {
        self.word
            .store(pack(0, self.total, 0, false), Ordering::Release);
    }

    /// Resets the counters for a preloaded backing buffer about to be read.
    pub(crate) fn reset_for_read(&self, preloaded: usize) {
        debug_assert!(preloaded <= self.total);
        self.word.store(
            pack(preloaded, self.total - preloaded, 0, false),
            Ordering::Release,
        );
    }

    /// Locks the capacity for release only if the ring is idle (no leased
    /// bytes anywhere). Poisons all future `try_*` calls on success.
    pub(crate) fn try_lock_for_release(&self) -> bool {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let (ar, aw, pf, locked) = unpack(current);
            if locked || !(ar == 0 && pf == 0 && aw == self.total) {
                return false;
            }
            match self.word.compare_exchange_weak(
                current,
                current | LOCK_BIT,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Locks the capacity for release unconditionally — used by an abortive
    /// close, which may discard buffered-but-unread bytes.
    pub(crate) fn force_lock_for_release(&self) {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            if current & LOCK_BIT != 0 {
                return;
            }
            match self.word.compare_exchange_weak(
                current,
                current | LOCK_BIT,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_capacity_is_empty_and_fully_writable() {
        let cap = Capacity::new(100);
        assert!(cap.is_empty());
        assert!(!cap.is_full());
        assert_eq!(cap.available_for_write(), 100);
        assert_eq!(cap.available_for_read(), 0);
    }

    #[test]
    fn write_then_flush_makes_bytes_readable() {
        let cap = Capacity::new(100);
        assert!(cap.try_write_exact(40));
        assert_eq!(cap.available_for_write(), 60);
        assert_eq!(cap.available_for_read(), 0);
        cap.complete_write(40);
        assert_eq!(cap.pending_to_flush(), 40);
        assert!(cap.flush());
        assert_eq!(cap.available_for_read(), 40);
        assert_eq!(cap.pending_to_flush(), 0);
    }

    #[test]
    fn read_reservation_frees_write_space_on_complete() {
        let cap = Capacity::new(100);
        cap.try_write_exact(50);
        cap.complete_write(50);
        cap.flush();

        assert!(cap.try_read_exact(30));
        assert_eq!(cap.available_for_read(), 20);
        cap.complete_read(30);
        assert_eq!(cap.available_for_write(), 80);
    }

    #[test]
    fn over_reservation_fails_without_mutating_state() {
        let cap = Capacity::new(10);
        assert!(!cap.try_write_exact(11));
        assert_eq!(cap.available_for_write(), 10);
        assert_eq!(cap.try_read_at_most(5), 0);
    }

    #[test]
    fn try_lock_for_release_requires_idle_ring() {
        let cap = Capacity::new(10);
        cap.try_write_exact(5);
        cap.complete_write(5);
        assert!(!cap.try_lock_for_release(), "pending bytes should block lock");
        cap.flush();
        assert!(!cap.try_lock_for_release(), "readable bytes should block lock");
        cap.try_read_exact(5);
        cap.complete_read(5);
        assert!(cap.try_lock_for_release());
        assert!(cap.is_locked());
        assert!(!cap.try_write_exact(1));
    }

    #[test]
    fn force_lock_poisons_regardless_of_pending_bytes() {
        let cap = Capacity::new(10);
        cap.try_write_exact(5);
        cap.complete_write(5);
        cap.force_lock_for_release();
        assert!(cap.is_locked());
        assert!(!cap.try_read_exact(1));
    }

    #[test]
    fn at_least_reservations_take_everything_available() {
        let cap = Capacity::new(10);
        cap.try_write_exact(4);
        cap.complete_write(4);
        cap.flush();
        assert_eq!(cap.try_read_at_least(2), 4);
        assert_eq!(cap.available_for_read(), 0);
    }
}
