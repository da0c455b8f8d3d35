use bytepipe::{HeapPool, Pipe, PipeConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tokio::runtime::Runtime;

const TOTAL_BYTES: u64 = 64 * 1024 * 1024;

fn rt() -> Runtime {
    Runtime::new().expect("build tokio runtime for benchmark")
}

fn bench_bulk_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_write_read");
    group.throughput(Throughput::Bytes(TOTAL_BYTES));

    for chunk_size in [256usize, 4096, 65536] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    rt().block_on(async {
                        let pipe = Pipe::with_config(PipeConfig::new(65536, 8, true), Arc::new(HeapPool));
                        let writer = pipe.clone();
                        let payload = vec![0xABu8; chunk_size];

                        let writer_task = tokio::spawn(async move {
                            let mut sent = 0u64;
                            while sent < TOTAL_BYTES {
                                writer.write_fully(&payload).await.unwrap();
                                sent += payload.len() as u64;
                            }
                            writer.close(None);
                        });

                        let mut received = 0u64;
                        let mut buf = vec![0u8; chunk_size];
                        loop {
                            match pipe.read_available(&mut buf) {
                                Ok(0) if pipe.is_closed() => break,
                                Ok(n) => {
                                    received += n as u64;
                                    black_box(&buf[..n]);
                                }
                                Err(_) => break,
                            }
                            if received >= TOTAL_BYTES {
                                break;
                            }
                            tokio::task::yield_now().await;
                        }

                        writer_task.await.unwrap();
                        black_box(received);
                    });
                });
            },
        );
    }

    group.finish();
}

fn bench_zero_copy_visitor(c: &mut Criterion) {
    let mut group = c.benchmark_group("zero_copy_visitor");
    group.throughput(Throughput::Bytes(TOTAL_BYTES));

    group.bench_function("write_then_read_visitors", |b| {
        b.iter(|| {
            rt().block_on(async {
                let pipe = Pipe::with_config(PipeConfig::new(65536, 8, true), Arc::new(HeapPool));
                let writer = pipe.clone();

                let writer_task = tokio::spawn(async move {
                    let mut sent = 0u64;
                    while sent < TOTAL_BYTES {
                        let n = writer
                            .write(1, |buf| {
                                for b in buf.iter_mut() {
                                    *b = 0x42;
                                }
                                buf.len()
                            })
                            .await
                            .unwrap();
                        sent += n as u64;
                    }
                    writer.close(None);
                });

                let mut received = 0u64;
                while received < TOTAL_BYTES {
                    let n = pipe
                        .read(1, |buf| {
                            black_box(buf);
                            buf.len()
                        })
                        .await
                        .unwrap();
                    if n == 0 {
                        break;
                    }
                    received += n as u64;
                }

                writer_task.await.unwrap();
                black_box(received);
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_bulk_throughput, bench_zero_copy_visitor);
criterion_main!(benches);
