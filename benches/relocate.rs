#[path = "../tests/common/mod.rs"]
mod common;

use common::{entry, TestImage, DATA_RVA};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use mokload::image::{load_sections, parse, relocate, PoolAllocator, RelocationType};
use std::hint::black_box;

const DATA_SIZE: u32 = 0x10000;

/// An image whose `.data` section is one DIR64 pointer after another, each covered by a fixup.
fn pointer_table_image() -> (Vec<u8>, u64) {
    let mut image = TestImage::new();
    image.data = (0..DATA_SIZE / 8)
        .flat_map(|index| (image.image_base + u64::from(index) * 8).to_le_bytes())
        .collect();
    image.relocations = (0..DATA_SIZE / 0x1000)
        .map(|page| {
            let entries = (0..0x1000 / 8)
                .map(|slot| entry(RelocationType::Dir64, slot * 8))
                .collect();
            (DATA_RVA + page * 0x1000, entries)
        })
        .collect();

    (image.build(), u64::from(DATA_SIZE / 8))
}

fn bench_parse(c: &mut Criterion) {
    let (raw, _) = pointer_table_image();

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("headers", |b| {
        b.iter(|| black_box(parse(black_box(&raw)).unwrap()));
    });
    group.finish();
}

fn bench_load_sections(c: &mut Criterion) {
    let (raw, _) = pointer_table_image();
    let context = parse(&raw).unwrap();

    let mut group = c.benchmark_group("load_sections");
    group.throughput(Throughput::Bytes(u64::from(context.image_size())));
    group.bench_function("pool", |b| {
        let mut allocator = PoolAllocator::new();
        b.iter(|| black_box(load_sections(&context, black_box(&raw), &mut allocator).unwrap()));
    });
    group.finish();
}

fn bench_relocate(c: &mut Criterion) {
    let (raw, fixups) = pointer_table_image();
    let context = parse(&raw).unwrap();
    let mut image = load_sections(&context, &raw, &mut PoolAllocator::new()).unwrap();
    let address = image.address();

    println!("Benchmarking relocation: {} DIR64 fixups", fixups);

    let mut group = c.benchmark_group("relocate");
    group.throughput(Throughput::Elements(fixups));
    group.bench_function("dir64", |b| {
        // Each iteration adds the delta again
        b.iter(|| black_box(relocate(&context, image.as_mut_slice(), black_box(address)).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_parse, bench_load_sections, bench_relocate);
criterion_main!(benches);
