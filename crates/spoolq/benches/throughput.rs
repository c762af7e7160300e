use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spoolq::{BoxError, ByteSource, Queue, QueueConfig, Record, SpoolError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

const MESSAGES: u64 = 10_000;

struct Tick(u64);

impl Record for Tick {
    fn encode(&self, sink: &mut Vec<u8>) {
        sink.extend_from_slice(self.0.to_string().as_bytes());
        sink.push(b'\n');
    }

    fn decode(source: &mut dyn ByteSource) -> Result<Self, SpoolError> {
        let value = spoolq::read_decimal(source)?;
        spoolq::expect_byte(source, b'\n')?;
        Ok(Tick(value))
    }
}

fn counting_consumer(count: &Arc<AtomicU64>) -> impl Fn(Tick) -> Result<(), BoxError> + Send + Sync {
    let count = Arc::clone(count);
    move |_tick: Tick| -> Result<(), BoxError> {
        count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn run_to_empty(config: QueueConfig) {
    let count = Arc::new(AtomicU64::new(0));
    let mut queue = Queue::new(config, counting_consumer(&count)).unwrap();
    queue.start().unwrap();
    for i in 0..MESSAGES {
        queue.enqueue(Tick(i)).unwrap();
    }
    drop(queue); // close, drain, join
    assert_eq!(count.load(Ordering::Relaxed), MESSAGES);
}

fn bench_memory_backends(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory");
    group.throughput(Throughput::Elements(MESSAGES));

    for workers in [1usize, 4] {
        group.bench_with_input(
            BenchmarkId::new("array", format!("{workers}W")),
            &workers,
            |b, &workers| {
                b.iter(|| {
                    run_to_empty(
                        QueueConfig::array()
                            .with_capacity(1024)
                            .with_worker_count(workers),
                    );
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("linked", format!("{workers}W")),
            &workers,
            |b, &workers| {
                b.iter(|| {
                    run_to_empty(
                        QueueConfig::linked()
                            .with_capacity(1024)
                            .with_worker_count(workers),
                    );
                });
            },
        );
    }

    group.finish();
}

fn bench_direct_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("direct");
    group.throughput(Throughput::Elements(MESSAGES));

    group.bench_function("inline_consumer", |b| {
        b.iter(|| run_to_empty(QueueConfig::direct()));
    });

    group.finish();
}

fn bench_disk_spool(c: &mut Criterion) {
    let mut group = c.benchmark_group("disk");
    group.sample_size(10);
    group.throughput(Throughput::Elements(MESSAGES));

    group.bench_function("spool_and_drain", |b| {
        b.iter(|| {
            let dir = tempdir().unwrap();
            run_to_empty(
                QueueConfig::disk(dir.path())
                    .with_capacity(MESSAGES as usize)
                    .with_max_file_bytes(1 << 20),
            );
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_memory_backends,
    bench_direct_dispatch,
    bench_disk_spool
);
criterion_main!(benches);
