use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{ImageBuffer, Luma};
use std::hint::black_box;
use std::path::Path;
use tempfile::TempDir;
use volpkg::{imreads, resolve_shape, ArrayOptions, VirtualArray};

const SIDE: u32 = 128;

fn write_volume(root: &Path, tiles: usize, slices: usize) {
    for t in 0..tiles {
        let dir = root.join(format!("{:02}", t));
        std::fs::create_dir_all(&dir).unwrap();
        for s in 0..slices {
            let img: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_fn(SIDE, SIDE, |x, y| Luma([(x + y + s as u32) as u16]));
            img.save(dir.join(format!("{:04}.tif", s))).unwrap();
        }
    }
}

fn bench_resolve_shape(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_shape");
    for files_per_dir in [100, 1_000, 10_000] {
        let paths: Vec<String> = (0..16)
            .flat_map(|d| (0..files_per_dir).map(move |f| format!("/vol/{:02}/{:05}.tif", d, f)))
            .collect();
        group.bench_with_input(
            BenchmarkId::new("two_levels", paths.len()),
            &paths,
            |b, paths| b.iter(|| resolve_shape(black_box(paths)).unwrap()),
        );
    }
    group.finish();
}

fn bench_read_region(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    write_volume(temp_dir.path(), 2, 16);
    let uncached = imreads(temp_dir.path(), "*/*.tif").unwrap();
    let cached = VirtualArray::builder(temp_dir.path())
        .pattern("*/*.tif")
        .options(ArrayOptions::default().with_chunk_cache(32))
        .build()
        .unwrap();

    let mut group = c.benchmark_group("read_region");
    for depth in [1usize, 4, 16] {
        let min = [0, 0, 32, 32];
        let max = [2, depth, 96, 96];
        group.bench_with_input(BenchmarkId::new("uncached", depth), &depth, |b, _| {
            b.iter(|| uncached.read_region::<u16>(&min, &max).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("cached", depth), &depth, |b, _| {
            b.iter(|| cached.read_region::<u16>(&min, &max).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolve_shape, bench_read_region);
criterion_main!(benches);
