//! Error types surfaced across the pipe's reader/writer/visitor API.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// The cause attached to an abortive `close`/`cancel`.
///
/// Stored once (sticky, first-write-wins) and handed back to both sides on
/// every subsequent suspension resumption.
pub type CloseCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced to a reader.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipeError {
    /// The channel was closed without a cause; the reader has drained
    /// everything that was ever written.
    #[error("receive channel is closed")]
    Closed,

    /// The channel was closed or cancelled with an explicit cause.
    #[error("receive channel closed with cause: {0}")]
    ClosedWithCause(DisplayCause),

    /// A `read_fully`-family call needed more bytes than the channel could
    /// ever deliver before closing.
    #[error("unexpected EOF after reading {read} of {requested} bytes")]
    UnexpectedEof {
        /// Bytes successfully read before EOF.
        read: u64,
        /// Bytes requested by the caller.
        requested: u64,
    },

    /// API misuse: concurrent readers, etc.
    #[error("illegal state: {0}")]
    Misuse(&'static str),

    /// A zero-copy visitor violated the reservation contract.
    #[error(transparent)]
    Visitor(#[from] VisitorError),
}

/// Errors surfaced to a writer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WriteError {
    /// The channel was closed without a cause.
    #[error("write channel is closed")]
    Closed,

    /// The channel was closed or cancelled with an explicit cause.
    #[error("write channel closed with cause: {0}")]
    ClosedWithCause(DisplayCause),

    /// API misuse: concurrent writers, etc.
    #[error("illegal state: {0}")]
    Misuse(&'static str),

    /// A zero-copy visitor violated the reservation contract.
    #[error(transparent)]
    Visitor(#[from] VisitorError),
}

/// Errors raised by the zero-copy visitor contract (spec.md §6.2): a visitor
/// reported consuming more bytes than it was reserved, or its reported
/// position would move backwards relative to the reservation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VisitorError {
    /// The visitor reported consuming more bytes than were reserved, or
    /// moved its position backwards.
    #[error("visitor position moved illegally (consumed {consumed} of {reserved} reserved)")]
    PositionTampered {
        /// Bytes the visitor reported consuming.
        consumed: usize,
        /// Bytes actually reserved for the visitor.
        reserved: usize,
    },
}

/// Errors from the line-reading helper aggregates layered on the byte core.
///
/// These are kept distinct from [`PipeError`] because text decoding is an
/// external collaborator — the core only exposes byte-range visitors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TextError {
    /// No line terminator was found within the caller's byte limit.
    #[error("line exceeded the {limit}-byte limit before a terminator was found")]
    TooLongLine {
        /// The limit that was exceeded.
        limit: usize,
    },

    /// The underlying channel closed/errored while reading a line.
    #[error("channel error while reading line: {0}")]
    Pipe(#[from] PipeError),
}

/// A [`CloseCause`] wrapper that implements `Display`/`Clone` for embedding
/// in `thiserror` variants (causes are `Arc<dyn Error>`, which isn't `Eq`,
/// but we only need to print and clone it).
#[derive(Debug, Clone)]
pub struct DisplayCause(pub CloseCause);

impl fmt::Display for DisplayCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<CloseCause> for DisplayCause {
    fn from(cause: CloseCause) -> Self {
        Self(cause)
    }
}

/// A plain string cause, for callers that don't need a custom error type.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StringCause(pub String);

/// Convenience: wrap cancellation without an explicit cause.
#[derive(Debug, thiserror::Error)]
#[error("operation was cancelled")]
pub struct CancellationCause;
