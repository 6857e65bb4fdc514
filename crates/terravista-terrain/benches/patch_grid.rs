use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::{Mat4, Vec3};
use terravista_terrain::{HeightmapGenerator, PatchGrid, PatchGridConfig, PatchVisibility, VisibilityConfig};

fn bench_patch_grid_build(c: &mut Criterion) {
    let generator = HeightmapGenerator::with_size(42, 1024, 1024);
    let heightmap = generator.generate();
    let materials = generator.materials(&heightmap);
    let config = PatchGridConfig::default();

    c.bench_function("patch_grid_build_1024", |bencher| {
        bencher.iter(|| {
            black_box(PatchGrid::build(
                black_box(&heightmap),
                &materials,
                1.0,
                &config,
            ))
        })
    });
}

fn bench_visibility_update(c: &mut Criterion) {
    let heightmap = HeightmapGenerator::with_size(42, 1024, 1024).generate();
    let mut grid = PatchGrid::build(&heightmap, &[], 1.0, &PatchGridConfig::default());
    let mut visibility = PatchVisibility::for_grid(VisibilityConfig::default(), &grid);

    let eye = Vec3::new(-200.0, 300.0, -200.0);
    let view = Mat4::look_at_rh(eye, Vec3::new(512.0, 0.0, 512.0), Vec3::Y);
    let proj = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.5, 20_000.0);
    let view_projection = proj * view;

    c.bench_function("patch_visibility_update_256", |bencher| {
        bencher.iter(|| black_box(visibility.update(&mut grid, view_projection, eye).len()))
    });
}

criterion_group!(benches, bench_patch_grid_build, bench_visibility_update);
criterion_main!(benches);
