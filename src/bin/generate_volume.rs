//! Volume generator binary: builds a dataset from noise terrain or images.
//!
//! Usage: cargo run --release --bin generate_volume -- [OPTIONS]
//!
//! Options:
//!   --out <DIR>          Dataset directory (default: "volumes/terrain")
//!   --kind <KIND>        "colored" or "smooth" (default: colored)
//!   --size <N>           Width and depth in voxels (default: 128)
//!   --height <N>         Height in voxels (default: 64)
//!   --seed <SEED>        Random seed (default: 12345)
//!   --scale <SCALE>      Terrain noise scale (default: 64.0)
//!   --node-size <N>      Leaf node edge length (default: 16)
//!   --heightmap <PNG>    Import this heightmap instead of generating noise
//!   --colormap <PNG>     Colormap paired with --heightmap
//!   --slices <DIR>       Import a folder of image slices instead
//!   --config <JSON>      Load the volume config from a file
//!
//! After building, every node is meshed once to report mesh statistics and the
//! volume is flushed to the dataset directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use cubevol::import;
use cubevol::mesh::VoxelKind;
use cubevol::sync::{FnObserver, SyncEvent};
use cubevol::terrain::{TerrainGenerator, TerrainParams};
use cubevol::{Error, Region, Result, Volume, VolumeConfig};

fn main() -> ExitCode {
    cubevol::core::logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let out = parse_arg::<PathBuf>(&args, "--out").unwrap_or_else(|| PathBuf::from("volumes/terrain"));
    let kind = parse_arg::<String>(&args, "--kind").unwrap_or_else(|| "colored".to_string());
    let size = parse_arg::<u32>(&args, "--size").unwrap_or(128);
    let height = parse_arg::<u32>(&args, "--height").unwrap_or(64);
    let seed = parse_arg::<u32>(&args, "--seed").unwrap_or(12345);
    let scale = parse_arg::<f32>(&args, "--scale").unwrap_or(64.0);

    let mut config = match parse_arg::<PathBuf>(&args, "--config") {
        Some(path) => VolumeConfig::load(&path)?,
        None => VolumeConfig::default(),
    };
    if let Some(node_size) = parse_arg::<u32>(&args, "--node-size") {
        config.base_node_size = node_size;
    }
    // one pass over every node, so no budget
    config.max_node_syncs_per_tick = usize::MAX;

    println!("=== cubevol Volume Generator ===");
    println!("Output: {}", out.display());
    println!("Kind:   {}", kind);
    println!();

    let start = Instant::now();
    let heightmap = parse_arg::<PathBuf>(&args, "--heightmap");
    let colormap = parse_arg::<PathBuf>(&args, "--colormap");
    let slices = parse_arg::<PathBuf>(&args, "--slices");

    if let (Some(heightmap), Some(colormap)) = (&heightmap, &colormap) {
        let volume = import::import_heightmap(heightmap, colormap, height, config)?;
        return finish(volume, &out, start);
    }
    if let Some(folder) = &slices {
        let volume = import::import_slices(folder, config)?;
        return finish(volume, &out, start);
    }

    let generator = TerrainGenerator::new(TerrainParams {
        seed,
        scale,
        height_scale: height as f32 * 0.75,
        sea_level: height as f32 * 0.2,
        ..Default::default()
    });
    let region = Region::with_size(size, height, size)?;
    println!("Size:  {} x {} x {}", size, height, size);
    println!("Seed:  {}, Scale: {}", seed, scale);

    match kind.as_str() {
        "colored" => {
            let mut volume = Volume::new(region, config)?;
            generator.fill_colored(&mut volume)?;
            finish(volume, &out, start)
        }
        "smooth" => {
            let mut volume = Volume::new(region, config)?;
            generator.fill_terrain(&mut volume)?;
            finish(volume, &out, start)
        }
        other => Err(Error::InvalidConfig(format!("unknown volume kind '{}'", other))),
    }
}

/// Mesh every node once for statistics, then persist the volume under `out`
fn finish<V: VoxelKind>(mut volume: Volume<V>, out: &Path, start: Instant) -> Result<()> {
    let built = start.elapsed();

    let mut vertices = 0usize;
    let mut triangles = 0usize;
    let mut meshes = 0usize;
    let mut observer = FnObserver(|event: SyncEvent<V>| {
        if let SyncEvent::MeshUpdated { mesh: Some(mesh), .. } = event {
            vertices += mesh.render.vertex_count();
            triangles += mesh.render.triangle_count();
            meshes += 1;
        }
    });
    let mut ticks = 0;
    while volume.update(&mut observer).had_changes() {
        ticks += 1;
    }
    drop(observer);
    println!(
        "Meshed {} nodes in {} ticks: {} vertices, {} triangles",
        meshes, ticks, vertices, triangles
    );

    volume.save_as(out)?;
    volume.shutdown(false)?;

    println!(
        "Done: built in {:.1}s, total {:.1}s",
        built.as_secs_f64(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn parse_arg<T: FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}
