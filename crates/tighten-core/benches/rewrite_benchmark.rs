use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tighten_core::{Matcher, Rewriter};

/// A model with `count` associations, every other one redundant
fn model_source(count: usize) -> String {
    let mut source = String::from("class Invoice < ApplicationRecord\n");
    for index in 0..count {
        if index % 2 == 0 {
            source.push_str(&format!("  belongs_to :party_{index}, optional: true\n"));
            source.push_str(&format!("  validates :party_{index}, presence: true, uniqueness: true\n"));
        } else {
            source.push_str(&format!("  belongs_to :party_{index},\n             class_name: \"Party\",\n             optional: true\n"));
        }
        source.push('\n');
    }
    source.push_str("end\n");
    source
}

fn bench_find(c: &mut Criterion) {
    let matcher = Matcher::default();
    let mut group = c.benchmark_group("find");

    for count in [10, 50, 200] {
        let source = model_source(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &source, |b, source| {
            b.iter(|| matcher.find(black_box(source)))
        });
    }

    group.finish();
}

fn bench_rewrite(c: &mut Criterion) {
    let matcher = Matcher::default();
    let rewriter = Rewriter::new(&matcher);
    let mut group = c.benchmark_group("rewrite");

    for count in [10, 50, 200] {
        let source = model_source(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &source, |b, source| {
            b.iter(|| rewriter.rewrite(black_box(source)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_find, bench_rewrite);
criterion_main!(benches);
