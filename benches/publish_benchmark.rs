//! Performance benchmarks for event fan-out and stream decoding
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hpbiz_realtime::bus::EventBus;
use hpbiz_realtime::events::EventEnvelope;
use hpbiz_realtime::sse::FrameDecoder;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generate an SSE body of `frames` finance updates
fn generate_stream(frames: usize) -> String {
    (0..frames)
        .map(|i| {
            format!(
                "id: {}\nevent: sa_finance_update\ndata: {{\"invoice_id\":\"inv-{}\",\"amount\":{}.5}}\n\n",
                i, i, i
            )
        })
        .collect()
}

/// Benchmark publish with a growing number of listeners on one name
fn bench_publish_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_fanout");
    let payload = json!({"company_id": "c-1", "action": "updated"});

    for listeners in [1, 10, 100].iter() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicU64::new(0));
        let _subs: Vec<_> = (0..*listeners)
            .map(|_| {
                let counter = counter.clone();
                bus.subscribe("sa_company_list_refresh", move |_| {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect();

        group.throughput(Throughput::Elements(*listeners as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_listeners", listeners)),
            &payload,
            |b, payload| b.iter(|| bus.publish(black_box("sa_company_list_refresh"), payload)),
        );
    }

    group.finish();
}

/// Benchmark chunk decoding, with the body split into fixed-size chunks
fn bench_frame_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decoding");
    let body = generate_stream(200);
    group.throughput(Throughput::Bytes(body.len() as u64));

    for chunk_size in [64, 1024, 16 * 1024].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_byte_chunks", chunk_size)),
            chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut decoder = FrameDecoder::new();
                    let mut decoded = 0usize;
                    for chunk in body.as_bytes().chunks(chunk_size) {
                        for frame in decoder.push(chunk).into_iter().flatten() {
                            if EventEnvelope::from_frame(&frame).is_ok() {
                                decoded += 1;
                            }
                        }
                    }
                    black_box(decoded)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_publish_fanout, bench_frame_decoding);
criterion_main!(benches);
