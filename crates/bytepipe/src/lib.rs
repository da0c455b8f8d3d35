//! A lock-free, single-producer/single-consumer async byte pipe.
//!
//! `bytepipe` is an in-process analogue of a Unix pipe: one task writes
//! bytes, another reads them, backed by a bounded ring buffer with
//! zero-copy, lambda-based access to the buffer's contiguous runs instead
//! of forcing every byte through an intermediate `Vec`. It does not touch
//! the network or the filesystem — see [`Pipe`] for the full API.
//!
//! The core occupancy accounting ([`capacity`]) and the reader/writer lease
//! state machine ([`state`]) are modeled after `ringmpsc-rs`'s packed
//! sequence counters and `Channel`/`Producer` split, adapted from a
//! multi-item MPSC ring to a strict byte-oriented SPSC pipe with suspension
//! instead of busy-backoff.

mod backing;
mod capacity;
mod closed;
mod config;
mod error;
mod invariants;
mod join;
mod metrics;
mod pipe;
mod slots;
mod state;
mod text;

pub use config::{BufferPool, HeapPool, PipeConfig};
pub use error::{
    CancellationCause, CloseCause, DisplayCause, PipeError, StringCause, TextError, VisitorError, WriteError,
};
pub use metrics::{MetricsSnapshot, PipeMetrics};
pub use pipe::{Pipe, WriteSessionStep};
pub use text::{read_utf8_line, read_utf8_line_to};
