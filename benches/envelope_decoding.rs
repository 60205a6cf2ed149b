//! Benchmarks for response envelope decoding
//!
//! This benchmark measures:
//! - Envelope unwrapping for small and list payloads
//! - Rejected-code handling
//! - Cache key generation per request URL

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use netkit::api::DailyList;
use netkit::cache::CacheKeyGenerator;
use netkit::envelope::decode_envelope;
use netkit::SuccessPolicy;

const DETAIL: &str = r#"{"code":0,"message":"ok","data":{"id":9714883,"title":"hello","stories":[],"top_stories":[]}}"#;
const REJECTED: &str = r#"{"code":40001,"message":"token expired"}"#;

fn list_body(stories: usize) -> String {
    let items: Vec<String> = (0..stories)
        .map(|i| {
            format!(
                r#"{{"id":{i},"title":"story {i}","images":["https://pic.example.com/{i}.jpg"],"type":0,"ga_prefix":"101707"}}"#
            )
        })
        .collect();
    format!(
        r#"{{"code":0,"data":{{"date":"20261017","stories":[{}],"top_stories":[]}}}}"#,
        items.join(",")
    )
}

fn bench_envelope(c: &mut Criterion) {
    let policy = SuccessPolicy::default();
    let mut group = c.benchmark_group("envelope");

    group.bench_function("detail", |b| {
        b.iter(|| decode_envelope::<serde_json::Value>(black_box(DETAIL.as_bytes()), &policy))
    });
    group.bench_function("rejected", |b| {
        b.iter(|| decode_envelope::<serde_json::Value>(black_box(REJECTED.as_bytes()), &policy))
    });

    for size in [10usize, 100, 1000] {
        let body = list_body(size);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::new("daily_list", size), &body, |b, body| {
            b.iter(|| decode_envelope::<DailyList>(black_box(body.as_bytes()), &policy))
        });
    }
    group.finish();
}

fn bench_cache_keys(c: &mut Criterion) {
    let keys = CacheKeyGenerator::new();
    let url = url::Url::parse("https://news-at.example.com/api/4/news/latest?page=3&appkey=k1").unwrap();
    c.bench_function("cache_key", |b| {
        b.iter(|| keys.generate(black_box("GET"), black_box(&url), None))
    });
}

criterion_group!(benches, bench_envelope, bench_cache_keys);
criterion_main!(benches);
