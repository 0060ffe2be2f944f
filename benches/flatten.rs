//! Benchmarks for region flattening and snapshot assembly.
//!
//! - Known fields only
//! - Forward-referenced fields patched during traversal
//! - Fields patched between layout and finalization
//! - A complete snapshot with a CRC over its body

extern crate snapforge;

use criterion::{criterion_group, criterion_main, Criterion};
use snapforge::prelude::*;
use std::hint::black_box;

const FIELDS: usize = 1024;

/// Flatten a region of known 16-bit fields.
fn bench_flatten_known(c: &mut Criterion) {
    let mut region = Region::new();
    for i in 0..FIELDS {
        region.write_fixed(U16Le, i as i64, None).unwrap();
    }

    c.bench_function("flatten_known_fields", |b| {
        b.iter(|| {
            let bytes = region.to_bytes(&FlattenConfig::quiet()).unwrap();
            black_box(bytes)
        });
    });
}

/// Each field refers to a marker placed after it, so every field is patched.
fn bench_flatten_forward_references(c: &mut Criterion) {
    c.bench_function("flatten_forward_references", |b| {
        b.iter(|| {
            let mut region = Region::new();
            let markers: Vec<Resolvable<Offset>> =
                (0..FIELDS).map(|_| Resolvable::new()).collect();
            for marker in &markers {
                region
                    .write_fixed(U32Le, marker.as_i64().unwrap(), Some("forward"))
                    .unwrap();
            }
            for marker in &markers {
                region.mark(marker);
            }
            let bytes = region.to_bytes(&FlattenConfig::quiet()).unwrap();
            black_box(bytes)
        });
    });
}

/// Values are resolved only after traversal has written every placeholder.
fn bench_patch_after_layout(c: &mut Criterion) {
    c.bench_function("patch_after_layout", |b| {
        b.iter(|| {
            let values: Vec<Resolvable<i64>> = (0..FIELDS).map(|_| Resolvable::new()).collect();
            let mut region = Region::new();
            for value in &values {
                region.write_fixed(U16Le, value, None).unwrap();
            }

            let sink = ImageBuffer::shared();
            let layout = region.layout(&sink).unwrap();
            for (i, value) in values.iter().enumerate() {
                value.resolve(i as i64).unwrap();
            }
            black_box(layout.finalize(&FlattenConfig::quiet()).unwrap())
        });
    });
}

/// Build a snapshot of several bytecode sections.
fn bench_build_snapshot(c: &mut Criterion) {
    c.bench_function("build_snapshot", |b| {
        b.iter(|| {
            let mut builder = SnapshotBuilder::new();
            for section in 0..8 {
                let mut code = Region::new();
                let done = Resolvable::new();
                {
                    let mut writer = InstructionWriter::new(&mut code);
                    for _ in 0..64 {
                        writer.jump_16(&done).unwrap();
                        writer.ex1(OpcodeEx1::Pop).unwrap();
                    }
                    writer.label(&done);
                    writer.ex1(OpcodeEx1::Return).unwrap();
                }
                builder
                    .add_section(&format!("code{section}"), code)
                    .unwrap();
            }
            let snapshot = builder.build(&FlattenConfig::quiet()).unwrap();
            black_box(snapshot.crc())
        });
    });
}

criterion_group!(
    benches,
    bench_flatten_known,
    bench_flatten_forward_references,
    bench_patch_after_layout,
    bench_build_snapshot,
);
criterion_main!(benches);
