//! Benchmarks for binary sniffing, table reading, document generation and
//! component diffs.

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sbom_binscan::binary::inspect_bytes;
use sbom_binscan::{
    detect_format, diff, DocumentMetadata, FormatFactory, FormatHandler, SbomComponent,
};
use std::hint::black_box;

fn components(count: usize, version: &str) -> Vec<SbomComponent> {
    (0..count)
        .map(|i| {
            let name = format!("lib{i}");
            SbomComponent::new(name.clone(), name, version)
                .with_type("library")
                .with_property("file_type", "shared_library")
        })
        .collect()
}

fn benchmark_sniffing(c: &mut Criterion) {
    let object = common::fibonacci_object();
    c.bench_function("detect_format/elf", |b| {
        b.iter(|| detect_format(black_box(&object)))
    });
    c.bench_function("inspect_bytes/elf", |b| {
        b.iter(|| inspect_bytes(black_box(&object)))
    });
}

fn benchmark_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let set = components(500, "1.0");
    let metadata = DocumentMetadata::new("bench");
    for (family, version) in FormatFactory::supported_formats() {
        let Some(handler) = FormatFactory::create_for(family, version) else {
            continue;
        };
        group.bench_with_input(
            BenchmarkId::new(family.as_str(), version),
            &set,
            |b, set| b.iter(|| handler.generate(black_box(set), &metadata)),
        );
    }
    group.finish();
}

fn benchmark_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    for size in [100, 1_000, 10_000] {
        let old = components(size, "1.0");
        let mut new = components(size, "1.0");
        for component in new.iter_mut().step_by(10) {
            component.version = "1.1".to_string();
        }
        group.bench_with_input(BenchmarkId::from_parameter(size), &(old, new), |b, (old, new)| {
            b.iter(|| diff(black_box(old), black_box(new)))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_sniffing, benchmark_generation, benchmark_diff);
criterion_main!(benches);
