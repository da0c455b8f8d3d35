//! The closed sum type gating lease acquisition. Modeled as a tagged enum
//! matched exhaustively, never subclassed.
//!
//! Transitions are guarded by a `std::sync::Mutex` rather than a single CAS
//! word: the state's payload is an owned `Arc<BackingStore>`, and packing an
//! owned allocation into a lock-free word needs tagged pointers or hazard
//! pointers, which is out of scope here. The mutex is held only for the
//! O(1) transition itself, never across an `.await` point, so no mutex is
//! ever held across a suspension point.

use crate::backing::BackingStore;
use crate::invariants::{debug_assert_no_concurrent_reader, debug_assert_no_concurrent_writer};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) enum ChannelState {
    IdleEmpty,
    IdleNonEmpty(Arc<BackingStore>),
    Writing(Arc<BackingStore>),
    Reading(Arc<BackingStore>),
    ReadingWriting(Arc<BackingStore>),
    Terminated,
}

impl ChannelState {
    fn backing(&self) -> Option<&Arc<BackingStore>> {
        match self {
            Self::IdleEmpty | Self::Terminated => None,
            Self::IdleNonEmpty(b) | Self::Writing(b) | Self::Reading(b) | Self::ReadingWriting(b) => {
                Some(b)
            }
        }
    }
}

pub(crate) struct StateMachine {
    inner: Mutex<ChannelState>,
}

/// Why a write/read lease acquisition could not proceed.
pub(crate) enum LeaseError {
    /// A lease of this kind is already held — violates the single-
    /// producer/single-consumer contract.
    AlreadyLeased,
    /// The channel is terminated; no further I/O is possible.
    Terminated,
    /// No backing buffer exists to read from (the caller should have
    /// checked `available_for_read` before acquiring a read lease — there
    /// is nothing to lease while the channel is `IdleEmpty`).
    NoBuffer,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(ChannelState::IdleEmpty),
        }
    }

    pub(crate) fn new_preloaded(backing: Arc<BackingStore>) -> Self {
        Self {
            inner: Mutex::new(ChannelState::IdleNonEmpty(backing)),
        }
    }

    /// Acquires a writer lease, leasing a fresh buffer via `lease_new` if the
    /// channel is currently `IdleEmpty`.
    pub(crate) fn setup_for_write(
        &self,
        lease_new: impl FnOnce() -> Arc<BackingStore>,
    ) -> Result<Arc<BackingStore>, LeaseError> {
        let mut state = self.inner.lock().unwrap();
        match &*state {
            ChannelState::IdleEmpty => {
                let backing = lease_new();
                *state = ChannelState::Writing(Arc::clone(&backing));
                Ok(backing)
            }
            ChannelState::IdleNonEmpty(b) => {
                let backing = Arc::clone(b);
                *state = ChannelState::Writing(backing.clone());
                Ok(backing)
            }
            ChannelState::Reading(b) => {
                let backing = Arc::clone(b);
                *state = ChannelState::ReadingWriting(backing.clone());
                Ok(backing)
            }
            ChannelState::Writing(_) | ChannelState::ReadingWriting(_) => {
                debug_assert_no_concurrent_writer!(true);
                Err(LeaseError::AlreadyLeased)
            }
            ChannelState::Terminated => Err(LeaseError::Terminated),
        }
    }

    /// Releases a writer lease. If the ring is now idle (caller reports
    /// `became_empty`), the state collapses to `IdleEmpty` and the backing
    /// store is handed back to the caller for recycling.
    pub(crate) fn restore_after_write(&self, became_empty: bool) -> Option<Arc<BackingStore>> {
        let mut state = self.inner.lock().unwrap();
        match &*state {
            ChannelState::Writing(b) => {
                if became_empty {
                    let backing = Arc::clone(b);
                    *state = ChannelState::IdleEmpty;
                    Some(backing)
                } else {
                    let backing = Arc::clone(b);
                    *state = ChannelState::IdleNonEmpty(backing);
                    None
                }
            }
            ChannelState::ReadingWriting(b) => {
                *state = ChannelState::Reading(Arc::clone(b));
                None
            }
            _ => None,
        }
    }

    /// Acquires a reader lease.
    pub(crate) fn setup_for_read(&self) -> Result<Arc<BackingStore>, LeaseError> {
        let mut state = self.inner.lock().unwrap();
        match &*state {
            ChannelState::IdleEmpty => Err(LeaseError::NoBuffer),
            ChannelState::IdleNonEmpty(b) => {
                let backing = Arc::clone(b);
                *state = ChannelState::Reading(backing.clone());
                Ok(backing)
            }
            ChannelState::Writing(b) => {
                let backing = Arc::clone(b);
                *state = ChannelState::ReadingWriting(backing.clone());
                Ok(backing)
            }
            ChannelState::Reading(_) | ChannelState::ReadingWriting(_) => {
                debug_assert_no_concurrent_reader!(true);
                Err(LeaseError::AlreadyLeased)
            }
            ChannelState::Terminated => Err(LeaseError::Terminated),
        }
    }

    pub(crate) fn restore_after_read(&self, became_empty: bool) -> Option<Arc<BackingStore>> {
        let mut state = self.inner.lock().unwrap();
        match &*state {
            ChannelState::Reading(b) => {
                if became_empty {
                    let backing = Arc::clone(b);
                    *state = ChannelState::IdleEmpty;
                    Some(backing)
                } else {
                    let backing = Arc::clone(b);
                    *state = ChannelState::IdleNonEmpty(backing);
                    None
                }
            }
            ChannelState::ReadingWriting(b) => {
                *state = ChannelState::Writing(Arc::clone(b));
                None
            }
            _ => None,
        }
    }

    /// Unconditionally terminates the channel, returning the backing store
    /// if one was leased, so the caller can recycle it to the pool.
    pub(crate) fn terminate(&self) -> Option<Arc<BackingStore>> {
        let mut state = self.inner.lock().unwrap();
        let backing = state.backing().cloned();
        *state = ChannelState::Terminated;
        backing
    }

    pub(crate) fn is_terminated(&self) -> bool {
        matches!(&*self.inner.lock().unwrap(), ChannelState::Terminated)
    }

    /// Returns whether a writer lease is presently held (used by the
    /// zero-copy write path and by invariant checks).
    pub(crate) fn current_backing(&self) -> Option<Arc<BackingStore>> {
        self.inner.lock().unwrap().backing().cloned()
    }
}
