//! Benchmarks for classification, fingerprinting and the tracker hot path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rpa_tracker::core::{classify, ExecutionResult};
use rpa_tracker::dedup::{DeduplicationStrategy, FieldDeduplication, HashedFieldDeduplication};
use rpa_tracker::testing::{TestTracker, SCENARIO_PROCESS};
use serde_json::json;

fn classify_benchmark(c: &mut Criterion) {
    c.bench_function("classify", |b| {
        b.iter(|| {
            for code in -3..=3 {
                black_box(classify(black_box(code)));
            }
        });
    });
    c.bench_function("execution_result_to_outcome", |b| {
        b.iter(|| black_box(ExecutionResult::new(black_box(-2)).to_outcome()));
    });
}

fn fingerprint_benchmark(c: &mut Criterion) {
    let payload = json!({
        "requerimiento": "FE-0001",
        "tipo_operacion": "ALTA",
        "cliente": {"documento": "12345678"}
    });
    let plain = FieldDeduplication::new(["requerimiento", "tipo_operacion", "cliente.documento"]);
    let hashed =
        HashedFieldDeduplication::new(["requerimiento", "tipo_operacion", "cliente.documento"]);

    c.bench_function("fingerprint_fields", |b| {
        b.iter(|| black_box(plain.fingerprint(black_box(&payload))));
    });
    c.bench_function("fingerprint_hashed", |b| {
        b.iter(|| black_box(hashed.fingerprint(black_box(&payload))));
    });
}

fn tracker_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let fixture = TestTracker::new();
    let payload = json!({"requerimiento": "FE-9999"});
    runtime
        .block_on(fixture.tracker.start_or_resume(SCENARIO_PROCESS, &payload))
        .expect("seed transaction");

    c.bench_function("start_or_resume_hit", |b| {
        b.iter(|| {
            runtime
                .block_on(fixture.tracker.start_or_resume(SCENARIO_PROCESS, black_box(&payload)))
                .expect("resume")
        });
    });
}

criterion_group!(
    benches,
    classify_benchmark,
    fingerprint_benchmark,
    tracker_benchmark
);
criterion_main!(benches);
