//! Channel splicing: draining one pipe directly into another, optionally
//! propagating the source's close cause, with delegation-chain resolution
//! so a join of a join collapses to a single hop rather than copying
//! through every intermediate buffer.
//!
//! Grounded in `ringmpsc-stream`'s `RingReceiver`/`RingSender` pairing:
//! `copy_direct` is the same "read a contiguous chunk, forward it, repeat"
//! loop that crate uses internally for its `Stream`/`Sink` adapters,
//! specialised here to move bytes zero-copy on the read side and by bulk
//! `write_fully` on the write side.

use crate::error::PipeError;
use crate::pipe::Pipe;

/// Delegation record installed on the source pipe for the duration of a
/// join.
pub(crate) struct JoinState {
    pub(crate) target: Pipe,
    pub(crate) propagate_close: bool,
}

/// Drains `src` into `target` until `src` reaches EOF, returning the total
/// bytes copied. See [`Pipe::join_to`].
pub(crate) async fn join_to(src: &Pipe, target: &Pipe, propagate_close: bool) -> Result<u64, PipeError> {
    let resolved_target = target.resolve_delegation();
    if resolved_target.is_same_channel(src) {
        return Err(PipeError::Misuse(
            "join would create a cycle: target's delegation chain resolves back to the source",
        ));
    }

    src.install_join(JoinState {
        target: resolved_target.clone(),
        propagate_close,
    });

    let result = copy_direct(src, &resolved_target).await;
    src.clear_join();

    let copied = result?;

    if propagate_close {
        let cause = src.take_close_cause_for_propagation();
        resolved_target.close(cause);
    }

    Ok(copied)
}

/// The bulk streaming loop: repeatedly takes whatever `src` has readable
/// right now (zero-copy) and pushes it into `dst`, suspending on either end
/// as needed, until `src` closes.
async fn copy_direct(src: &Pipe, dst: &Pipe) -> Result<u64, PipeError> {
    let mut total: u64 = 0;
    let mut chunk = vec![0u8; 8192];
    loop {
        let n = src
            .read(1, |buf| {
                let take = buf.len().min(chunk.len());
                chunk[..take].copy_from_slice(&buf[..take]);
                take
            })
            .await?;
        if n == 0 {
            return Ok(total);
        }
        dst.write_fully(&chunk[..n])
            .await
            .map_err(|_| PipeError::Misuse("join target closed while draining source"))?;
        total += n as u64;
    }
}
