//! Delivery filter benchmarks for huddle-core.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use huddle_core::delivery;
use huddle_core::{Draft, Message, MessageKind, Recipient};
use std::num::NonZeroUsize;

/// A log where every fourth message is a private one to `carol`.
fn build_log(len: u64) -> Vec<Message> {
    let now = Utc::now();
    (1..=len)
        .map(|seq| {
            let draft = if seq % 4 == 0 {
                Draft::new("dave", Recipient::participant("carol"), "psst", MessageKind::Direct)
            } else {
                Draft::new("dave", Recipient::Everyone, "hello", MessageKind::Broadcast)
            };
            Message::from_draft(draft, seq, now)
        })
        .collect()
}

fn bench_filter_full(c: &mut Criterion) {
    let log = build_log(10_000);

    let mut group = c.benchmark_group("visible");
    group.throughput(Throughput::Elements(log.len() as u64));
    group.bench_function("full_10k", |b| {
        b.iter(|| delivery::visible(black_box(log.clone()), "erin", None).count())
    });
    group.finish();
}

fn bench_filter_tail(c: &mut Criterion) {
    let log = build_log(10_000);

    c.bench_function("visible_tail_100_of_10k", |b| {
        b.iter(|| {
            delivery::visible(black_box(log.clone()), "carol", NonZeroUsize::new(100)).count()
        })
    });
}

criterion_group!(benches, bench_filter_full, bench_filter_tail);
criterion_main!(benches);
