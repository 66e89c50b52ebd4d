use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use support_rag::chunking::chunk_text;

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = "UltraTech Super cement costs approximately 415 per bag. \
                Delivery is available within the city for bulk orders. "
        .repeat(500);
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_text(black_box(&text), black_box(1000)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
