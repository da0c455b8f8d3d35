//! End-to-end scenarios: primitive round-trips, a wrap straddling the
//! physical buffer boundary, a producer that closes mid-stream, an
//! abortive close, backpressure, and channel splicing.

use bytepipe::{HeapPool, Pipe, PipeConfig};
use std::sync::Arc;
use std::time::Duration;

fn small_pipe() -> Pipe {
    Pipe::with_config(PipeConfig::new(16, 8, true), Arc::new(HeapPool))
}

#[tokio::test]
async fn round_trip_all_primitive_widths() {
    let pipe = Pipe::new();
    pipe.write_u8(0x7F).await.unwrap();
    pipe.write_u16(0xBEEF).await.unwrap();
    pipe.write_u32(0xDEAD_BEEF).await.unwrap();
    pipe.write_u64(0x0123_4567_89AB_CDEF).await.unwrap();
    pipe.write_f32(1.5).await.unwrap();
    pipe.write_f64(2.25).await.unwrap();

    assert_eq!(pipe.read_u8().await.unwrap(), 0x7F);
    assert_eq!(pipe.read_u16().await.unwrap(), 0xBEEF);
    assert_eq!(pipe.read_u32().await.unwrap(), 0xDEAD_BEEF);
    assert_eq!(pipe.read_u64().await.unwrap(), 0x0123_4567_89AB_CDEF);
    assert_eq!(pipe.read_f32().await.unwrap(), 1.5);
    assert_eq!(pipe.read_f64().await.unwrap(), 2.25);
}

#[tokio::test]
async fn primitive_write_straddles_the_physical_wrap_boundary() {
    let pipe = small_pipe(); // capacity 16, so position 14 forces an 8-byte straddle
    pipe.write_fully(&[0u8; 14]).await.unwrap();
    let mut drain = [0u8; 14];
    pipe.read_fully(&mut drain).await.unwrap();

    pipe.write_u64(0x1122_3344_5566_7788).await.unwrap();
    assert_eq!(pipe.read_u64().await.unwrap(), 0x1122_3344_5566_7788);
}

#[tokio::test]
async fn producer_closes_mid_stream_reader_drains_then_sees_eof() {
    let pipe = small_pipe();
    pipe.write_fully(b"partial").await.unwrap();
    pipe.close(None);

    let mut buf = [0u8; 7];
    pipe.read_fully(&mut buf).await.unwrap();
    assert_eq!(&buf, b"partial");

    let err = pipe.read_u8().await.unwrap_err();
    assert!(matches!(err, bytepipe::PipeError::UnexpectedEof { .. }));
}

#[tokio::test]
async fn abortive_close_discards_buffered_bytes_and_surfaces_cause() {
    let pipe = small_pipe();
    pipe.write_fully(b"buffered").await.unwrap();

    let cause: bytepipe::CloseCause = Arc::new(bytepipe::StringCause("disk on fire".into()));
    pipe.cancel(cause);

    assert_eq!(pipe.available_for_read(), 0);
    let err = pipe.read_u8().await.unwrap_err();
    match err {
        bytepipe::PipeError::ClosedWithCause(display) => {
            assert!(display.to_string().contains("disk on fire"));
        }
        other => panic!("expected ClosedWithCause, got {other:?}"),
    }
}

#[tokio::test]
async fn writer_suspends_under_backpressure_until_reader_drains() {
    let pipe = small_pipe();
    pipe.write_fully(&[0u8; 16]).await.unwrap(); // fill the ring completely

    let writer = pipe.clone();
    let blocked_write = tokio::spawn(async move { writer.write_u8(0xFF).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!blocked_write.is_finished(), "writer should be suspended while ring is full");

    let mut drain = [0u8; 16];
    pipe.read_fully(&mut drain).await.unwrap();

    blocked_write.await.unwrap().unwrap();
    assert_eq!(pipe.read_u8().await.unwrap(), 0xFF);
}

#[tokio::test]
async fn join_to_splices_all_buffered_and_future_bytes_into_the_target() {
    let source = small_pipe();
    let target = small_pipe();

    source.write_fully(b"hello ").await.unwrap();

    let src_for_join = source.clone();
    let tgt_for_join = target.clone();
    let join = tokio::spawn(async move { src_for_join.join_to(&tgt_for_join, true).await });

    tokio::task::yield_now().await;
    source.write_fully(b"world").await.unwrap();
    source.close(None);

    let copied = join.await.unwrap().unwrap();
    assert_eq!(copied, 11);

    let mut out = [0u8; 11];
    target.read_fully(&mut out).await.unwrap();
    assert_eq!(&out, b"hello world");

    let err = target.read_u8().await.unwrap_err();
    assert!(matches!(err, bytepipe::PipeError::UnexpectedEof { .. }));
}

#[tokio::test]
async fn joining_a_pipe_to_itself_is_rejected() {
    let pipe = small_pipe();
    let err = pipe.join_to(&pipe, false).await.unwrap_err();
    assert!(matches!(err, bytepipe::PipeError::Misuse(_)));
}
