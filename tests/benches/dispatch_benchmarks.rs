//! # Dispatch Benchmarks
//!
//! | Scenario | What is measured |
//! |----------|------------------|
//! | fan-out | One publish delivered to N subscribers |
//! | filtered | One publish where most subscribers reject via filter |
//! | interceptors | One publish through a chain of N pass-through interceptors |
//! | subscribe | Registration into an already populated kind |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dispatch_bus::{Dispatcher, Event, Interceptor, SubscribeOptions};
use dispatch_tests::fixtures::{Counter, TestEvent, TestKind};
use rand::Rng;

struct PassThrough;

#[async_trait]
impl Interceptor<TestEvent> for PassThrough {}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime")
}

fn bench_fan_out(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("fan-out");
    group.measurement_time(Duration::from_secs(5));

    for size in [1usize, 10, 100, 1_000] {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        let counter = Counter::new();
        let mut rng = rand::thread_rng();
        for _ in 0..size {
            dispatcher
                .subscribe(
                    TestKind::Test,
                    counter.handler(),
                    SubscribeOptions::new().priority(rng.gen_range(-10..=10)),
                )
                .expect("subscribe");
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("publish", size), &size, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(dispatcher.fire(TestEvent::Test { n: 0 }).await.expect("publish"))
            })
        });
    }

    group.finish();
}

fn bench_filtered(c: &mut Criterion) {
    let rt = runtime();
    let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
    let counter = Counter::new();

    for bucket in 0..100u64 {
        dispatcher
            .subscribe(
                TestKind::Test,
                counter.handler(),
                SubscribeOptions::new().filter(move |event: &Event<TestEvent>| {
                    matches!(event.payload(), TestEvent::Test { n } if n % 100 == bucket)
                }),
            )
            .expect("subscribe");
    }

    c.bench_function("filtered/100-subscribers-1-match", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(dispatcher.fire(TestEvent::Test { n: 42 }).await.expect("publish"))
        })
    });
}

fn bench_interceptors(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("interceptors");

    for chain in [0usize, 1, 5, 20] {
        let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
        for _ in 0..chain {
            dispatcher
                .add_interceptor(Arc::new(PassThrough))
                .expect("interceptor");
        }
        dispatcher
            .subscribe(TestKind::Test, Counter::new().handler(), SubscribeOptions::new())
            .expect("subscribe");

        group.bench_with_input(BenchmarkId::new("publish", chain), &chain, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(dispatcher.fire(TestEvent::Test { n: 0 }).await.expect("publish"))
            })
        });
    }

    group.finish();
}

fn bench_subscribe(c: &mut Criterion) {
    let dispatcher: Dispatcher<TestEvent> = Dispatcher::new();
    for _ in 0..1_000 {
        dispatcher
            .subscribe(TestKind::Login, Counter::new().handler(), SubscribeOptions::new())
            .expect("subscribe");
    }

    c.bench_function("subscribe/into-1000", |b| {
        b.iter(|| {
            let handle = dispatcher
                .subscribe(
                    TestKind::Login,
                    Counter::new().handler(),
                    SubscribeOptions::new().priority(5),
                )
                .expect("subscribe");
            black_box(handle.cancel())
        })
    });
}

criterion_group!(
    benches,
    bench_fan_out,
    bench_filtered,
    bench_interceptors,
    bench_subscribe
);
criterion_main!(benches);
