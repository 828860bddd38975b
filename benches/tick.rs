//! Benchmarks for the simulation tick.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use myocard::{
    compute::Engine,
    schema::{Grid, Orientation, SimConfig},
};

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(20);

    for size in [128, 256, 512] {
        let config = SimConfig {
            width: size,
            height: size,
            search_radius: 64,
            ..Default::default()
        };

        let mut grid = Grid::uniform(size, size);
        grid.seed_pacemaker_patch(size / 2, size / 2, 2);
        let mut engine = Engine::new(grid, &config).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| {
                    black_box(&mut engine).tick();
                });
            },
        );
    }

    group.finish();
}

fn bench_orientations(c: &mut Criterion) {
    let mut group = c.benchmark_group("orientations");
    group.sample_size(20);

    for count in [1usize, 2, 4] {
        let size = 256;
        let config = SimConfig {
            width: size,
            height: size,
            search_radius: 64,
            ..Default::default()
        };

        let orientations = (0..count)
            .map(|i| {
                let angle = i as f32 * std::f32::consts::PI / count as f32;
                Orientation::new(angle.cos(), angle.sin())
            })
            .collect();
        let mut grid = Grid::with_orientations(size, size, orientations);
        for (i, cell) in grid.cells.iter_mut().enumerate() {
            cell.orientation = (i % count) as u32;
        }
        grid.rebuild_orientation_counts();
        grid.seed_pacemaker_patch(size / 2, size / 2, 2);

        let mut engine = Engine::new(grid, &config).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_orientations", count)),
            &count,
            |b, _| {
                b.iter(|| {
                    black_box(&mut engine).tick();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_tick, bench_orientations);
criterion_main!(benches);
