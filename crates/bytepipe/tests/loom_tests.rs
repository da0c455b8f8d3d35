//! Loom-based concurrency check for the packed occupancy word.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! The real [`bytepipe`] crate's `Capacity` is not loom-instrumented (loom's
//! `AtomicU64` isn't a drop-in for `std`'s outside test builds), so — as
//! `ringmpsc-rs` does in its own `loom_tests.rs` — this rebuilds just the
//! CAS protocol in isolation: a single packed word split into a "reserved
//! for read" and "reserved for write" half, exercised by one writer thread
//! and one reader thread racing to reserve and commit against it. Loom
//! exhaustively explores interleavings to confirm the two threads never
//! observe an over-reservation.

#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicU64, Ordering};
use loom::sync::Arc;
use loom::thread;

const FIELD_BITS: u32 = 8;
const FIELD_MASK: u64 = (1 << FIELD_BITS) - 1;

struct LoomCapacity {
    word: AtomicU64,
    total: u64,
}

impl LoomCapacity {
    fn new(total: u64) -> Self {
        Self {
            word: AtomicU64::new(total), // all capacity starts available for write
            total,
        }
    }

    fn unpack(word: u64) -> (u64, u64) {
        (word & FIELD_MASK, (word >> FIELD_BITS) & FIELD_MASK)
    }

    fn pack(ar: u64, aw: u64) -> u64 {
        ar | (aw << FIELD_BITS)
    }

    fn try_write(&self, n: u64) -> bool {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let (ar, aw) = Self::unpack(current);
            if aw < n {
                return false;
            }
            let next = Self::pack(ar, aw - n);
            match self
                .word
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn commit_write(&self, n: u64) {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let (ar, aw) = Self::unpack(current);
            let next = Self::pack(ar + n, aw);
            match self
                .word
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn try_read(&self, n: u64) -> bool {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let (ar, aw) = Self::unpack(current);
            if ar < n {
                return false;
            }
            let next = Self::pack(ar - n, aw);
            match self
                .word
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn commit_read(&self, n: u64) {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let (ar, aw) = Self::unpack(current);
            let next = Self::pack(ar, aw + n);
            match self
                .word
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[test]
fn occupancy_never_exceeds_capacity_under_concurrent_write_and_read() {
    loom::model(|| {
        let cap = Arc::new(LoomCapacity::new(2));

        let writer = {
            let cap = Arc::clone(&cap);
            thread::spawn(move || {
                if cap.try_write(1) {
                    cap.commit_write(1);
                }
            })
        };

        let reader = {
            let cap = Arc::clone(&cap);
            thread::spawn(move || {
                // The reader only has something to take once the writer's
                // commit is visible; a failed try_read is a valid outcome
                // under every interleaving.
                let _ = cap.try_read(1);
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();

        let (ar, aw) = LoomCapacity::unpack(cap.word.load(Ordering::Acquire));
        assert!(ar + aw <= cap.total, "occupancy exceeded capacity: ar={ar} aw={aw}");
    });
}

#[test]
fn write_then_read_reservation_is_exact_under_interleaving() {
    loom::model(|| {
        let cap = Arc::new(LoomCapacity::new(1));
        assert!(cap.try_write(1));
        cap.commit_write(1);

        let cap2 = Arc::clone(&cap);
        let reader = thread::spawn(move || {
            if cap2.try_read(1) {
                cap2.commit_read(1);
            }
        });
        reader.join().unwrap();

        let (ar, aw) = LoomCapacity::unpack(cap.word.load(Ordering::Acquire));
        assert_eq!(ar, 0);
        assert_eq!(aw, 1);
    });
}
