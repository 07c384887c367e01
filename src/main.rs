use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec3;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;

use bloksel::block::BlockRegistry;
use bloksel::terrain::WorldGenConfig;
use bloksel::world::World;

/// Chunks are expected to settle within range after this many ticks at
/// a fixed 60Hz step; used only to size the demo loop, not a runtime limit.
const DEMO_TICKS: u32 = 6000;

fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init().context("failed to install logger")?;

    let registry = match std::env::var("BLOKSEL_BLOCKS_JSON") {
        Ok(path) => Arc::new(
            BlockRegistry::load_from_json(std::path::Path::new(&path))
                .with_context(|| format!("loading block definitions from {path}"))?,
        ),
        Err(_) => {
            info!("BLOKSEL_BLOCKS_JSON not set, falling back to the built-in air-only registry");
            Arc::new(BlockRegistry::empty())
        }
    };

    let config = match std::env::var("BLOKSEL_WORLDGEN_TOML") {
        Ok(path) => WorldGenConfig::load_from_path(std::path::Path::new(&path)),
        Err(_) => WorldGenConfig::default(),
    };

    let saves_dir = std::env::var("BLOKSEL_SAVES_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./Saves"));
    let seed = std::env::var("BLOKSEL_SEED").ok().and_then(|s| s.parse().ok()).unwrap_or(1337u64);
    let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);

    info!("starting world: seed={seed} saves_dir={} workers={worker_count}", saves_dir.display());
    let world = World::new(registry, config, seed, saves_dir, worker_count);

    // A fixed circular observer path exercises activation, deactivation,
    // and neighbor linking without needing a window or input devices.
    let radius = 200.0_f32;
    let angular_speed = std::f32::consts::TAU / 600.0;

    for tick in 0..DEMO_TICKS {
        let angle = tick as f32 * angular_speed;
        let position = Vec3::new(radius * angle.cos(), radius * angle.sin(), 100.0);
        let velocity = Vec3::new(-radius * angular_speed * angle.sin(), radius * angular_speed * angle.cos(), 0.0);
        world.set_observer(position, velocity);
        world.tick(1.0 / 60.0);

        if tick % 600 == 0 {
            info!("tick {tick}: active_count={} observer=({:.1},{:.1})", world.active_count(), position.x, position.y);
        }
    }

    info!("demo loop finished: active_count={}", world.active_count());
    Ok(())
}
