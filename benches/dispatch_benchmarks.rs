use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use task_dispatch::{Config, ResourcePool, SharedCounter, SimulatedProcessor, TaskDispatcher};
use std::{hint::black_box, thread};
use tokio::time::Duration;

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .enable_all()
        .build()
        .unwrap()
}

// Benchmark 1: пропускная способность submit через один воркер
fn bench_submit_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_throughput");
    let rt = create_runtime();

    for size in [100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("concurrent", size), &size, |b, &size| {
            let dispatcher = rt.block_on(async {
                TaskDispatcher::with_config(Config::high_throughput(), SimulatedProcessor::instant())
            });

            b.to_async(&rt).iter(|| {
                let dispatcher = dispatcher.clone();
                async move {
                    let handles: Vec<_> = (0..size)
                        .map(|i| {
                            let dispatcher = dispatcher.clone();
                            tokio::spawn(async move {
                                let task = dispatcher.task(format!("bench-{i}"));
                                dispatcher.submit_timeout(task, Duration::from_secs(30)).await
                            })
                        })
                        .collect();

                    for handle in handles {
                        black_box(handle.await.unwrap().unwrap());
                    }
                }
            });

            rt.block_on(dispatcher.shutdown()).unwrap();
        });
    }

    group.finish();
}

// Benchmark 2: lock-free пул под конкуренцией
fn bench_pool_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_contention");

    for threads in [1, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64 * 1000));
        group.bench_with_input(BenchmarkId::new("push_pop", threads), &threads, |b, &threads| {
            let pool = ResourcePool::new();
            b.iter(|| {
                thread::scope(|s| {
                    for t in 0..threads {
                        let pool = &pool;
                        s.spawn(move || {
                            for i in 0..1000u64 {
                                pool.push(black_box(t as u64 * 1000 + i));
                                black_box(pool.pop());
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

// Benchmark 3: счётчик под мьютексом
fn bench_counter_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_contention");

    for threads in [1, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64 * 1000));
        group.bench_with_input(BenchmarkId::new("increment", threads), &threads, |b, &threads| {
            let counter = SharedCounter::new();
            b.iter(|| {
                thread::scope(|s| {
                    for _ in 0..threads {
                        s.spawn(|| {
                            for _ in 0..1000 {
                                black_box(counter.increment());
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_submit_throughput,
    bench_pool_contention,
    bench_counter_contention
);
criterion_main!(benches);
