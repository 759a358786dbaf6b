//! Benchmarks for section allocation and release

use cartridge_pagealloc::{
    Engine, EngineConfig, MemoryPageSource, SectionAllocator, SectionDirectory, PAGES_PER_SECTION,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const S: u64 = PAGES_PER_SECTION as u64;

fn benchmark_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_single_page");

    for sections in [1u64, 16, 256].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(sections),
            sections,
            |b, &sections| {
                b.iter(|| {
                    let mut directory = SectionDirectory::new();
                    let mut source = MemoryPageSource::new();
                    let mut allocator = SectionAllocator::new(&mut directory, &mut source);
                    for _ in 0..sections * S {
                        black_box(allocator.allocate_single_page(black_box(1)).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

fn benchmark_free_and_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("free_and_reuse");

    for sections in [1u64, 16, 256].iter() {
        let mut directory = SectionDirectory::new();
        let mut source = MemoryPageSource::new();
        {
            let mut allocator = SectionAllocator::new(&mut directory, &mut source);
            for _ in 0..sections * S {
                allocator.allocate_single_page(1).unwrap();
            }
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(sections),
            sections,
            |b, &sections| {
                let mut allocator = SectionAllocator::new(&mut directory, &mut source);
                // Hole in the last section, searched from the first
                let victim = 1 + (sections - 1) * S + 17;
                b.iter(|| {
                    allocator.free_page(black_box(victim)).unwrap();
                    black_box(allocator.allocate_single_page(1).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn benchmark_transaction_commit(c: &mut Criterion) {
    let engine = Engine::new(MemoryPageSource::new(), EngineConfig::default());

    c.bench_function("write_transaction_commit", |b| {
        b.iter(|| {
            let mut txn = engine.begin_write();
            let page = txn.allocator("tree").allocate_single_page(1).unwrap();
            txn.allocator("tree").free_page(page).unwrap();
            txn.commit().unwrap();
        });
    });
}

criterion_group!(
    benches,
    benchmark_allocate,
    benchmark_free_and_reuse,
    benchmark_transaction_commit
);
criterion_main!(benches);
