//! A sticky one-shot close record. `None -> Some(cause?)` via CAS; once set
//! it never changes.

use crate::error::CloseCause;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// The outcome of a channel close, as observed by a suspension resumption.
#[derive(Debug, Clone)]
pub(crate) enum ClosedState {
    /// Writer closed normally; readers drain then see EOF.
    Normal,
    /// Abortive close or cancellation with a sticky cause.
    WithCause(CloseCause),
}

/// One-shot close marker, safe to check from either side without locking in
/// the common (not-yet-closed) case.
pub(crate) struct ClosedMarker {
    // Fast-path flag for `is_closed()`; always kept in lockstep with `cause`
    // because both are only ever written together, under `cause`'s lock, in
    // `set()`. Never read alone to decide whether `cause` is populated — see
    // `state()`, which locks regardless, so there's no window where
    // `is_closed()` is true but the cause hasn't been written yet.
    set: AtomicBool,
    cause: Mutex<Option<ClosedState>>,
}

impl ClosedMarker {
    pub(crate) fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
            cause: Mutex::new(None),
        }
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// Attempts to set the marker. Returns `true` if this call won the race
    /// (first close wins).
    pub(crate) fn set(&self, state: ClosedState) -> bool {
        let mut cause = self.cause.lock().unwrap();
        if cause.is_some() {
            return false;
        }
        *cause = Some(state);
        self.set.store(true, Ordering::Release);
        true
    }

    /// Returns the recorded close state, if any.
    pub(crate) fn state(&self) -> Option<ClosedState> {
        self.cause.lock().unwrap().clone()
    }
}
