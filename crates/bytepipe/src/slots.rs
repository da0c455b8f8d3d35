//! Two single-cell parked-continuation stores, one per side. The parked
//! continuation is a task registered on a [`tokio::sync::Notify`] (the same
//! primitive `ringmpsc-stream`'s `RingSender`/`RingReceiver` use for
//! backpressure and data-arrival signalling), with an explicit `AtomicBool`
//! guarding the "at most one parked continuation" invariant that `Notify`
//! alone does not enforce.

use crate::invariants::debug_assert_slot_vacant;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// One side's suspension slot.
pub(crate) struct Slot {
    parked: AtomicBool,
    notify: Notify,
}

impl Slot {
    pub(crate) fn new() -> Self {
        Self {
            parked: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Installs the calling task as this slot's sole parked continuation and
    /// suspends until `predicate` holds:
    ///
    /// 1. If the slot is non-empty, fail with "operation already in progress".
    /// 2. Re-check `predicate()`; if already true, don't park.
    /// 3. Install (here: flip the guard bit).
    /// 4. Register this task as a notify waiter — *before* the final
    ///    predicate re-check, not after. `Notify::notified()` captures the
    ///    current notification count at creation time, not at first poll, so
    ///    creating it here means a `resume_all()` that lands anywhere after
    ///    this line, including the gap before the re-check below, is still
    ///    observed once the future is actually polled. Creating it only
    ///    after the re-check (as an earlier version of this function did)
    ///    would lose exactly that `resume_all()` — `notify_waiters()`, unlike
    ///    `notify_one()`, banks no permit for a waiter that registers after
    ///    it runs, so a `close()` racing the gap between the re-check and
    ///    the `notified()` call would park this task forever.
    /// 5. Re-check `predicate()` again; if it turned true while installing,
    ///    skip the await and resume inline — the registered-but-never-polled
    ///    future is simply dropped.
    ///
    /// Returns `Err` if a second task tried to park here concurrently,
    /// which is a caller-side violation of the single-producer/single-consumer
    /// contract.
    pub(crate) async fn wait_until(
        &self,
        mut predicate: impl FnMut() -> bool,
    ) -> Result<(), &'static str> {
        if predicate() {
            return Ok(());
        }

        let already_parked = self.parked.swap(true, Ordering::AcqRel);
        debug_assert_slot_vacant!(already_parked);
        if already_parked {
            return Err("operation already in progress");
        }

        let notified = self.notify.notified();
        tokio::pin!(notified);
        if !predicate() {
            notified.await;
        }

        self.parked.store(false, Ordering::Release);
        Ok(())
    }

    /// Wakes at most one parked continuation.
    pub(crate) fn resume(&self) {
        self.notify.notify_one();
    }

    /// Wakes every parked continuation — used on close/cancel, when the
    /// slot must never be left holding a waiter.
    pub(crate) fn resume_all(&self) {
        self.notify.notify_waiters();
    }

    #[cfg(test)]
    pub(crate) fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Acquire)
    }
}
