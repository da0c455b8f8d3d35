//! Debug assertion macros for the channel's occupancy and protocol invariants.
//!
//! These provide runtime checks for the invariants the channel protocol
//! depends on. They are only active in debug builds
//! (`#[cfg(debug_assertions)]`), so there is zero overhead in release builds.

// =============================================================================
// INV-CAP-01: Conserved Occupancy
// =============================================================================

/// Assert that the three occupancy counters sum to total capacity whenever no
/// reservation is mid-flight.
///
/// **Invariant**: `available_for_read + available_for_write + pending_to_flush == capacity`
///
/// Used in: `Capacity::new`, after `flush()`, after matched try*/complete* pairs.
macro_rules! debug_assert_conserved_occupancy {
    ($ar:expr, $aw:expr, $pf:expr, $capacity:expr) => {
        debug_assert!(
            $ar + $aw + $pf == $capacity,
            "INV-CAP-01 violated: {} + {} + {} != {}",
            $ar,
            $aw,
            $pf,
            $capacity
        )
    };
}

// =============================================================================
// INV-CAP-02: Non-Negative Counters
// =============================================================================

/// Assert that a reservation never takes more than is available.
///
/// Used in: every `try_*` operation on `Capacity` before committing a CAS.
macro_rules! debug_assert_sufficient {
    ($available:expr, $requested:expr, $what:literal) => {
        debug_assert!(
            $available >= $requested,
            "INV-CAP-02 violated: {} has {} available, {} requested",
            $what,
            $available,
            $requested
        )
    };
}

// =============================================================================
// INV-LEASE-01: Exclusive Lease
// =============================================================================

/// Assert that a writer lease is not acquired while one is already active.
///
/// Used in: `ChannelState::setup_for_write`.
macro_rules! debug_assert_no_concurrent_writer {
    ($already_writing:expr) => {
        debug_assert!(
            !$already_writing,
            "INV-LEASE-01 violated: concurrent write lease acquisition"
        )
    };
}

/// Assert that a reader lease is not acquired while one is already active.
///
/// Used in: `ChannelState::setup_for_read`.
macro_rules! debug_assert_no_concurrent_reader {
    ($already_reading:expr) => {
        debug_assert!(
            !$already_reading,
            "INV-LEASE-01 violated: concurrent read lease acquisition"
        )
    };
}

// =============================================================================
// INV-VISITOR-02: Monotonic Position
// =============================================================================

/// Assert a zero-copy visitor did not move its position backwards.
macro_rules! debug_assert_position_monotonic {
    ($actual:expr, $locked:expr) => {
        debug_assert!(
            $actual <= $locked,
            "INV-VISITOR-02 violated: visitor consumed {} of {} reserved bytes",
            $actual,
            $locked
        )
    };
}

// =============================================================================
// INV-SLOT-01: At Most One Parked Continuation
// =============================================================================

/// Assert a suspension slot was empty before a new continuation is installed.
macro_rules! debug_assert_slot_vacant {
    ($already_parked:expr) => {
        debug_assert!(
            !$already_parked,
            "INV-SLOT-01 violated: slot already holds a parked continuation"
        )
    };
}

pub(crate) use debug_assert_conserved_occupancy;
pub(crate) use debug_assert_no_concurrent_reader;
pub(crate) use debug_assert_no_concurrent_writer;
pub(crate) use debug_assert_position_monotonic;
pub(crate) use debug_assert_slot_vacant;
pub(crate) use debug_assert_sufficient;
