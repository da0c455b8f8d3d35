//! UTF-8 line-reading helpers layered on top of the byte core.
//!
//! Text decoding is an external collaborator, not a core responsibility —
//! these functions are thin aggregates built purely out of [`Pipe::read`]
//! and [`Pipe::read_u8`], the way `ringmpsc-stream` layers its demo
//! line-protocol helpers over `RingReceiver` rather than teaching the ring
//! itself about framing.

use crate::error::{PipeError, TextError};
use crate::pipe::Pipe;

/// Reads a line terminated by `\n` (a preceding `\r` is stripped), appending
/// decoded bytes onto `out` and returning the number of bytes consumed from
/// the channel. Fails with [`TextError::TooLongLine`] if no terminator
/// appears within `limit` bytes.
pub async fn read_utf8_line_to(pipe: &Pipe, out: &mut String, limit: usize) -> Result<usize, TextError> {
    let mut raw = Vec::new();
    loop {
        if raw.len() >= limit {
            return Err(TextError::TooLongLine { limit });
        }
        let byte = match pipe.read_u8().await {
            Ok(b) => b,
            Err(PipeError::UnexpectedEof { .. }) if !raw.is_empty() => break,
            Err(e) => return Err(TextError::Pipe(e)),
        };
        if byte == b'\n' {
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            break;
        }
        raw.push(byte);
    }
    let consumed = raw.len();
    out.push_str(&String::from_utf8_lossy(&raw));
    Ok(consumed)
}

/// Reads a line into a freshly allocated `String`. Returns `None` at true
/// end-of-stream with nothing left to read.
pub async fn read_utf8_line(pipe: &Pipe, limit: usize) -> Result<Option<String>, TextError> {
    if !pipe.await_content().await.map_err(TextError::Pipe)? && pipe.available_for_read() == 0 {
        return Ok(None);
    }
    let mut line = String::new();
    read_utf8_line_to(pipe, &mut line, limit).await?;
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeapPool, PipeConfig};
    use std::sync::Arc;

    #[tokio::test]
    async fn reads_lines_split_on_lf_and_strips_trailing_cr() {
        let pipe = Pipe::new();
        pipe.write_fully(b"first\r\nsecond\nthird").await.unwrap();
        pipe.close(None);

        assert_eq!(read_utf8_line(&pipe, 1024).await.unwrap().unwrap(), "first");
        assert_eq!(read_utf8_line(&pipe, 1024).await.unwrap().unwrap(), "second");
        assert_eq!(read_utf8_line(&pipe, 1024).await.unwrap().unwrap(), "third");
        assert!(read_utf8_line(&pipe, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_a_line_longer_than_the_limit() {
        let pipe = Pipe::with_config(PipeConfig::new(64, 8, true), Arc::new(HeapPool));
        pipe.write_fully(b"this line has no terminator at all").await.unwrap();
        pipe.close(None);
        let err = read_utf8_line(&pipe, 8).await.unwrap_err();
        assert!(matches!(err, TextError::TooLongLine { limit: 8 }));
    }
}
