//! Procedural terrain: tunable generation parameters, the generator
//! itself, and tree-stamp data.

pub mod config;
pub mod generator;
pub mod trees;

pub use config::WorldGenConfig;
pub use generator::{generate, BlockPalette};

/// World generation seed type.
pub type WorldSeed = u64;
