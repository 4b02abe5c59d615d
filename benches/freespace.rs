extern crate snespatch;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use snespatch::{
    asm::{assemble, AsmItem, AsmList, Instruction, Mnemonic},
    BinaryPatcher, ByteRange, FreeSpaceManager, Mapping, RomImage,
};
use std::hint::black_box;

/// A fragmented free set: `blocks` ranges of 0x40 bytes with 0x40 byte gaps.
fn fragmented(blocks: u32) -> FreeSpaceManager {
    FreeSpaceManager::from_ranges(
        (0..blocks).map(|i| ByteRange::from_len(i * 0x80, 0x40).unwrap()),
    )
}

/// Benchmark allocate-then-mark against free sets of growing fragmentation.
fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("freespace_allocate");
    for blocks in [16u32, 256, 4096] {
        group.throughput(Throughput::Elements(u64::from(blocks)));
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &blocks, |b, &blocks| {
            b.iter_batched(
                || fragmented(blocks),
                |mut space| {
                    while let Ok(addr) = space.get_free_addr(0x20, None) {
                        space
                            .mark_used(ByteRange::from_len(addr, 0x20).unwrap())
                            .unwrap();
                    }
                    black_box(space)
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark returning ranges to the free set in an order that forces merging.
fn bench_coalescing(c: &mut Criterion) {
    c.bench_function("freespace_coalesce", |b| {
        b.iter(|| {
            let mut space = FreeSpaceManager::new();
            for i in (0..2048u32).rev() {
                space.mark_free(ByteRange::from_len(black_box(i * 0x10), 0x10).unwrap());
            }
            black_box(space.len())
        });
    });
}

/// Benchmark a full patch session: assemble, allocate, hook and write.
fn bench_patch_session(c: &mut Criterion) {
    let routine: AsmList = vec![
        Instruction::implied(Mnemonic::Php).unwrap().into(),
        Instruction::immediate16(Mnemonic::Ldx, 0x0040).unwrap().into(),
        AsmItem::label("loop"),
        Instruction::implied(Mnemonic::Dex).unwrap().into(),
        Instruction::branch(Mnemonic::Bne, "loop").unwrap().into(),
        Instruction::implied(Mnemonic::Plp).unwrap().into(),
        Instruction::implied(Mnemonic::Rtl).unwrap().into(),
    ];

    c.bench_function("assemble_routine", |b| {
        b.iter(|| black_box(assemble(black_box(&routine)).unwrap()));
    });

    c.bench_function("patch_session_64_routines", |b| {
        b.iter_batched(
            || {
                let mut image = RomImage::new(vec![0u8; 0x40_0000], Mapping::HiRom).unwrap();
                image
                    .seed_free_space([ByteRange::new(0x30_0000, 0x40_0000).unwrap()])
                    .unwrap();
                image
            },
            |mut image| {
                let mut patcher = BinaryPatcher::new(&mut image);
                for i in 0..64u32 {
                    let hook = 0x1_0000 + i * 0x10;
                    patcher
                        .apply_jmp_patch(&routine, hook, Some(hook + 6))
                        .unwrap();
                }
                black_box(image)
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_allocation,
    bench_coalescing,
    bench_patch_session
);
criterion_main!(benches);
