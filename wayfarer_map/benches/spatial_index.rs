//! Benchmark spatial index insertion and lookup.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use wayfarer_map::spatial::SpatialIndex;
use wayfarer_map::types::{Coordinate, RoomId};

/// A deterministic scatter of rooms over a square, one z-plane.
fn scattered(count: u32) -> Vec<(RoomId, Coordinate)> {
    let side = (count as f64).sqrt().ceil() as i32 * 3;
    (0..count)
        .map(|i| {
            // Weyl-sequence hop gives a uniform-looking spread without rand.
            let n = i.wrapping_mul(2654435761);
            let x = (n % side as u32) as i32 - side / 2;
            let y = ((n >> 16) % side as u32) as i32 - side / 2;
            (RoomId(i), Coordinate::new(x, y, 0))
        })
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for count in [1_000u32, 10_000, 50_000] {
        let rooms = scattered(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &rooms, |b, rooms| {
            b.iter(|| {
                let mut index = SpatialIndex::new();
                for &(id, coord) in rooms {
                    index.insert(id, coord);
                }
                black_box(index.len())
            });
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let rooms = scattered(50_000);
    let mut index = SpatialIndex::new();
    for &(id, coord) in &rooms {
        index.insert(id, coord);
    }

    c.bench_function("find_at", |b| {
        let mut i = 0;
        b.iter(|| {
            let (_, coord) = rooms[i % rooms.len()];
            i += 1;
            black_box(index.find_at(black_box(coord)))
        });
    });

    c.bench_function("find_in_radius_5", |b| {
        let mut i = 0;
        b.iter(|| {
            let (_, coord) = rooms[i % rooms.len()];
            i += 1;
            black_box(index.find_in_radius(black_box(coord), 5))
        });
    });
}

criterion_group!(benches, bench_insert, bench_lookup);
criterion_main!(benches);
