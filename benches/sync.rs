use criterion::{criterion_group, criterion_main, Criterion, black_box};

use cubevol::mesh::{extract_node_mesh, ExtractLimits};
use cubevol::sync::NullObserver;
use cubevol::terrain::generator::{TerrainGenerator, TerrainParams};
use cubevol::{ColoredCubesVolume, IVec3, Region, TerrainVolume, VolumeConfig};

fn colored_terrain(size: u32) -> ColoredCubesVolume {
    let region = Region::with_size(size, size, size).unwrap();
    let mut volume = ColoredCubesVolume::new(region, VolumeConfig::default()).unwrap();
    let generator = TerrainGenerator::new(TerrainParams {
        height_scale: size as f32 * 0.5,
        ..Default::default()
    });
    generator.fill_colored(&mut volume).unwrap();
    volume
}

fn smooth_terrain(size: u32) -> TerrainVolume {
    let region = Region::with_size(size, size, size).unwrap();
    let mut volume = TerrainVolume::new(region, VolumeConfig::default()).unwrap();
    let generator = TerrainGenerator::new(TerrainParams {
        height_scale: size as f32 * 0.5,
        ..Default::default()
    });
    generator.fill_terrain(&mut volume).unwrap();
    volume
}

fn bench_cubic_extract_16(c: &mut Criterion) {
    let volume = colored_terrain(32);
    let area = Region::from_bounds(0, 0, 0, 15, 15, 15).unwrap();
    let limits = ExtractLimits::default();

    c.bench_function("cubic_extract_16", |b| {
        b.iter(|| extract_node_mesh(volume.store(), black_box(&area), &limits, true));
    });
}

fn bench_surface_nets_extract_16(c: &mut Criterion) {
    let volume = smooth_terrain(32);
    let area = Region::from_bounds(0, 0, 0, 15, 15, 15).unwrap();
    let limits = ExtractLimits::default();

    c.bench_function("surface_nets_extract_16", |b| {
        b.iter(|| extract_node_mesh(volume.store(), black_box(&area), &limits, true));
    });
}

fn bench_full_sync_64(c: &mut Criterion) {
    c.bench_function("full_sync_colored_64", |b| {
        b.iter_with_setup(
            || {
                let mut volume = colored_terrain(64);
                volume.set_max_node_syncs_per_tick(usize::MAX).unwrap();
                volume
            },
            |mut volume| black_box(volume.update(&mut NullObserver)),
        );
    });
}

fn bench_edit_and_resync(c: &mut Criterion) {
    let mut volume = colored_terrain(64);
    volume.set_max_node_syncs_per_tick(usize::MAX).unwrap();
    while volume.update(&mut NullObserver).had_changes() {}

    c.bench_function("edit_and_resync", |b| {
        let mut frame = 0i32;
        b.iter(|| {
            frame += 1;
            let pos = IVec3::new(frame % 64, 20, (frame / 64) % 64);
            let voxel = if frame % 2 == 0 {
                cubevol::Color::opaque(255, 0, 0)
            } else {
                cubevol::Color::EMPTY
            };
            volume.set_voxel(black_box(pos), voxel).unwrap();
            volume.update(&mut NullObserver)
        });
    });
}

fn bench_set_voxel(c: &mut Criterion) {
    let mut volume = colored_terrain(64);

    c.bench_function("set_voxel_random", |b| {
        let mut seed = 1u32;
        b.iter(|| {
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
            let pos = IVec3::new((seed % 64) as i32, ((seed >> 8) % 64) as i32, ((seed >> 16) % 64) as i32);
            volume.set_voxel(black_box(pos), cubevol::Color::opaque(seed as u8, 0, 0)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_cubic_extract_16,
    bench_surface_nets_extract_16,
    bench_full_sync_64,
    bench_edit_and_resync,
    bench_set_voxel,
);

criterion_main!(benches);
