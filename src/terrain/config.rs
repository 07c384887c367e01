//! Tunable terrain generation parameters, loadable from and saveable to
//! a TOML document (see `DESIGN.md` for why TOML stands in for the
//! spec's XML persistence format).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to write config file {path}: {source}")]
    Write { path: String, source: std::io::Error },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// One control point of a piecewise-linear shaping curve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurvePoint {
    pub t: f64,
    pub value: f64,
}

/// A piecewise-linear curve, evaluated by linear interpolation between
/// the two bracketing control points; clamps to the end points outside
/// the curve's domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiecewiseCurve1D {
    pub points: Vec<CurvePoint>,
}

impl PiecewiseCurve1D {
    pub fn new(points: Vec<CurvePoint>) -> Self {
        PiecewiseCurve1D { points }
    }

    pub fn sample(&self, t: f64) -> f64 {
        match self.points.as_slice() {
            [] => 0.0,
            [only] => only.value,
            points => {
                if t <= points[0].t {
                    return points[0].value;
                }
                if t >= points[points.len() - 1].t {
                    return points[points.len() - 1].value;
                }
                for window in points.windows(2) {
                    let (a, b) = (window[0], window[1]);
                    if t >= a.t && t <= b.t {
                        let span = b.t - a.t;
                        let frac = if span.abs() < f64::EPSILON { 0.0 } else { (t - a.t) / span };
                        return a.value + (b.value - a.value) * frac;
                    }
                }
                points[points.len() - 1].value
            }
        }
    }
}

fn default_continentalness_curve() -> PiecewiseCurve1D {
    PiecewiseCurve1D::new(vec![
        CurvePoint { t: -1.0, value: -1.0 },
        CurvePoint { t: -0.4, value: -0.2 },
        CurvePoint { t: 0.0, value: 0.1 },
        CurvePoint { t: 0.6, value: 0.6 },
        CurvePoint { t: 1.0, value: 1.0 },
    ])
}

fn default_erosion_curve() -> PiecewiseCurve1D {
    PiecewiseCurve1D::new(vec![
        CurvePoint { t: -1.0, value: 1.0 },
        CurvePoint { t: 0.0, value: 0.5 },
        CurvePoint { t: 1.0, value: 0.1 },
    ])
}

fn default_peaks_valleys_curve() -> PiecewiseCurve1D {
    PiecewiseCurve1D::new(vec![
        CurvePoint { t: -1.0, value: -1.0 },
        CurvePoint { t: 0.0, value: 0.0 },
        CurvePoint { t: 1.0, value: 1.0 },
    ])
}

/// Scale/octaves/persistence for one fractal-noise channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NoiseParams {
    pub scale: f64,
    pub octaves: u32,
    pub persistence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomeNoiseParams {
    #[serde(default = "defaults::temperature")]
    pub temperature: NoiseParams,
    #[serde(default = "defaults::humidity")]
    pub humidity: NoiseParams,
    #[serde(default = "defaults::continentalness")]
    pub continentalness: NoiseParams,
    #[serde(default = "defaults::erosion")]
    pub erosion: NoiseParams,
    #[serde(default = "defaults::weirdness")]
    pub weirdness: NoiseParams,
}

impl Default for BiomeNoiseParams {
    fn default() -> Self {
        BiomeNoiseParams {
            temperature: defaults::temperature(),
            humidity: defaults::humidity(),
            continentalness: defaults::continentalness(),
            erosion: defaults::erosion(),
            weirdness: defaults::weirdness(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DensityParams {
    #[serde(default = "defaults::f_200")]
    pub density_noise_scale: f64,
    #[serde(default = "defaults::three")]
    pub octaves: u32,
    #[serde(default = "defaults::f_0_10")]
    pub density_bias_per_block: f64,
    #[serde(default = "defaults::f_100")]
    pub top_slide_start: f64,
    #[serde(default = "defaults::f_120")]
    pub top_slide_end: f64,
    #[serde(default = "defaults::f_0")]
    pub bottom_slide_start: f64,
    #[serde(default = "defaults::f_20")]
    pub bottom_slide_end: f64,
    #[serde(default = "defaults::f_80")]
    pub default_terrain_height: f64,
    #[serde(default = "defaults::f_80")]
    pub sea_level: f64,
}

impl Default for DensityParams {
    fn default() -> Self {
        DensityParams {
            density_noise_scale: 200.0,
            octaves: 3,
            density_bias_per_block: 0.10,
            top_slide_start: 100.0,
            top_slide_end: 120.0,
            bottom_slide_start: 0.0,
            bottom_slide_end: 20.0,
            default_terrain_height: 80.0,
            sea_level: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurveRangeParams {
    #[serde(default = "defaults::neg_30")]
    pub continentalness_height_min: f64,
    #[serde(default = "defaults::f_40")]
    pub continentalness_height_max: f64,
    #[serde(default = "defaults::f_0_3")]
    pub erosion_scale_min: f64,
    #[serde(default = "defaults::f_2_5")]
    pub erosion_scale_max: f64,
    #[serde(default = "defaults::neg_15")]
    pub pv_height_min: f64,
    #[serde(default = "defaults::f_25")]
    pub pv_height_max: f64,
}

impl Default for CurveRangeParams {
    fn default() -> Self {
        CurveRangeParams {
            continentalness_height_min: -30.0,
            continentalness_height_max: 40.0,
            erosion_scale_min: 0.3,
            erosion_scale_max: 2.5,
            pv_height_min: -15.0,
            pv_height_max: 25.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CaveChannelParams {
    #[serde(default = "defaults::cave_scale")]
    pub scale: f64,
    #[serde(default = "defaults::cave_octaves")]
    pub octaves: u32,
    #[serde(default = "defaults::cave_threshold")]
    pub threshold: f64,
    #[serde(default = "defaults::cave_seed_offset")]
    pub seed_offset: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CaveParams {
    #[serde(default = "defaults::cheese_cave")]
    pub cheese: CaveChannelParams,
    #[serde(default = "defaults::spaghetti_cave")]
    pub spaghetti: CaveChannelParams,
    #[serde(default = "defaults::five")]
    pub min_cave_depth_from_surface: i32,
    #[serde(default = "defaults::three_i")]
    pub min_cave_height_above_lava: i32,
}

impl Default for CaveParams {
    fn default() -> Self {
        CaveParams {
            cheese: defaults::cheese_cave(),
            spaghetti: defaults::spaghetti_cave(),
            min_cave_depth_from_surface: 5,
            min_cave_height_above_lava: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    #[serde(default = "defaults::f_10")]
    pub tree_noise_scale: f64,
    #[serde(default = "defaults::two")]
    pub octaves: u32,
    #[serde(default = "defaults::f_0_45")]
    pub tree_placement_threshold: f64,
    #[serde(default = "defaults::three_i")]
    pub min_tree_spacing: i32,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            tree_noise_scale: 10.0,
            octaves: 2,
            tree_placement_threshold: 0.45,
            min_tree_spacing: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CarverChannelParams {
    #[serde(default = "defaults::carver_path_noise_scale")]
    pub path_noise_scale: f64,
    #[serde(default = "defaults::carver_octaves")]
    pub octaves: u32,
    #[serde(default = "defaults::carver_threshold")]
    pub threshold: f64,
    #[serde(default = "defaults::carver_seed_offset")]
    pub seed_offset: u32,
    #[serde(default = "defaults::carver_width_noise_scale")]
    pub width_noise_scale: f64,
    #[serde(default = "defaults::carver_width_octaves")]
    pub width_octaves: u32,
    #[serde(default = "defaults::carver_width_min")]
    pub width_min: f64,
    #[serde(default = "defaults::carver_width_max")]
    pub width_max: f64,
    #[serde(default = "defaults::carver_depth_min")]
    pub depth_min: f64,
    #[serde(default = "defaults::carver_depth_max")]
    pub depth_max: f64,
    #[serde(default = "defaults::carver_edge_falloff")]
    pub edge_falloff: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CarverParams {
    #[serde(default = "defaults::ravine")]
    pub ravine: CarverChannelParams,
    #[serde(default = "defaults::river")]
    pub river: CarverChannelParams,
}

impl Default for CarverParams {
    fn default() -> Self {
        CarverParams { ravine: defaults::ravine(), river: defaults::river() }
    }
}

/// All tunable parameters controlling the terrain generator. Loaded
/// once at world start and shared by reference with every generation
/// job; never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorldGenConfig {
    #[serde(default)]
    pub biome_noise: BiomeNoiseParams,
    #[serde(default)]
    pub density: DensityParams,
    #[serde(default)]
    pub curve_ranges: CurveRangeParams,
    #[serde(default)]
    pub caves: CaveParams,
    #[serde(default)]
    pub trees: TreeParams,
    #[serde(default)]
    pub carvers: CarverParams,
    #[serde(default = "default_continentalness_curve")]
    pub continentalness_curve: PiecewiseCurve1D,
    #[serde(default = "default_erosion_curve")]
    pub erosion_curve: PiecewiseCurve1D,
    #[serde(default = "default_peaks_valleys_curve")]
    pub peaks_valleys_curve: PiecewiseCurve1D,
}

impl WorldGenConfig {
    /// Loads from `path`, falling back to defaults for anything missing
    /// or malformed. A parse error is logged and defaults are returned
    /// wholesale rather than propagated — config errors must never stop
    /// a world from starting.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("malformed world gen config at {}: {err}; using defaults", path.display());
                    WorldGenConfig::default()
                }
            },
            Err(err) => {
                log::info!("no world gen config at {} ({err}); using defaults", path.display());
                WorldGenConfig::default()
            }
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

mod defaults {
    use super::{CarverChannelParams, CaveChannelParams, NoiseParams};

    pub fn temperature() -> NoiseParams {
        NoiseParams { scale: 4096.0, octaves: 4, persistence: 0.5 }
    }
    pub fn humidity() -> NoiseParams {
        NoiseParams { scale: 8192.0, octaves: 4, persistence: 0.5 }
    }
    pub fn continentalness() -> NoiseParams {
        NoiseParams { scale: 400.0, octaves: 4, persistence: 0.5 }
    }
    pub fn erosion() -> NoiseParams {
        NoiseParams { scale: 300.0, octaves: 4, persistence: 0.5 }
    }
    pub fn weirdness() -> NoiseParams {
        NoiseParams { scale: 350.0, octaves: 3, persistence: 0.5 }
    }

    pub fn cheese_cave() -> CaveChannelParams {
        CaveChannelParams { scale: 60.0, octaves: 2, threshold: 0.45, seed_offset: 20 }
    }
    pub fn spaghetti_cave() -> CaveChannelParams {
        CaveChannelParams { scale: 30.0, octaves: 3, threshold: 0.65, seed_offset: 30 }
    }

    // Per-field fallbacks for a partially-specified [caves.*] sub-table;
    // mirror cheese_cave()'s values since a field default can't vary by
    // which parent table (cheese vs. spaghetti) it's missing from.
    pub fn cave_scale() -> f64 { 60.0 }
    pub fn cave_octaves() -> u32 { 2 }
    pub fn cave_threshold() -> f64 { 0.45 }
    pub fn cave_seed_offset() -> u32 { 20 }

    pub fn ravine() -> CarverChannelParams {
        CarverChannelParams {
            path_noise_scale: 800.0,
            octaves: 3,
            threshold: 0.85,
            seed_offset: 40,
            width_noise_scale: 50.0,
            width_octaves: 2,
            width_min: 3.0,
            width_max: 7.0,
            depth_min: 40.0,
            depth_max: 80.0,
            edge_falloff: 0.3,
        }
    }
    pub fn river() -> CarverChannelParams {
        CarverChannelParams {
            path_noise_scale: 600.0,
            octaves: 3,
            threshold: 0.70,
            seed_offset: 50,
            width_noise_scale: 40.0,
            width_octaves: 2,
            width_min: 5.0,
            width_max: 12.0,
            depth_min: 3.0,
            depth_max: 8.0,
            edge_falloff: 0.4,
        }
    }

    // Per-field fallbacks for a partially-specified [carvers.*] sub-table;
    // mirror ravine()'s values for the same reason as the cave fields above.
    pub fn carver_path_noise_scale() -> f64 { 800.0 }
    pub fn carver_octaves() -> u32 { 3 }
    pub fn carver_threshold() -> f64 { 0.85 }
    pub fn carver_seed_offset() -> u32 { 40 }
    pub fn carver_width_noise_scale() -> f64 { 50.0 }
    pub fn carver_width_octaves() -> u32 { 2 }
    pub fn carver_width_min() -> f64 { 3.0 }
    pub fn carver_width_max() -> f64 { 7.0 }
    pub fn carver_depth_min() -> f64 { 40.0 }
    pub fn carver_depth_max() -> f64 { 80.0 }
    pub fn carver_edge_falloff() -> f64 { 0.3 }

    pub fn f_200() -> f64 { 200.0 }
    pub fn f_0_10() -> f64 { 0.10 }
    pub fn f_100() -> f64 { 100.0 }
    pub fn f_120() -> f64 { 120.0 }
    pub fn f_0() -> f64 { 0.0 }
    pub fn f_20() -> f64 { 20.0 }
    pub fn f_80() -> f64 { 80.0 }
    pub fn neg_30() -> f64 { -30.0 }
    pub fn f_40() -> f64 { 40.0 }
    pub fn f_0_3() -> f64 { 0.3 }
    pub fn f_2_5() -> f64 { 2.5 }
    pub fn neg_15() -> f64 { -15.0 }
    pub fn f_25() -> f64 { 25.0 }
    pub fn f_10() -> f64 { 10.0 }
    pub fn f_0_45() -> f64 { 0.45 }
    pub fn three() -> u32 { 3 }
    pub fn two() -> u32 { 2 }
    pub fn five() -> i32 { 5 }
    pub fn three_i() -> i32 { 3 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_interpolates_between_points() {
        let curve = PiecewiseCurve1D::new(vec![
            CurvePoint { t: 0.0, value: 0.0 },
            CurvePoint { t: 1.0, value: 10.0 },
        ]);
        assert_eq!(curve.sample(0.5), 5.0);
        assert_eq!(curve.sample(-5.0), 0.0);
        assert_eq!(curve.sample(5.0), 10.0);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = WorldGenConfig::load_from_path(Path::new("/nonexistent/path/worldgen.toml"));
        assert_eq!(config.density.sea_level, 80.0);
        assert_eq!(config.trees.min_tree_spacing, 3);
    }

    #[test]
    fn partially_specified_cave_table_keeps_its_own_fields_and_defaults_the_rest() {
        let toml_text = r#"
            [caves.cheese]
            threshold = 0.9
        "#;
        let config: WorldGenConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.caves.cheese.threshold, 0.9);
        assert_eq!(config.caves.cheese.scale, 60.0);
        assert_eq!(config.caves.cheese.octaves, 2);
        assert_eq!(config.caves.cheese.seed_offset, 20);
        assert_eq!(config.caves.spaghetti.threshold, 0.65);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = WorldGenConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worldgen.toml");
        config.save_to_path(&path).unwrap();
        let reloaded = WorldGenConfig::load_from_path(&path);
        assert_eq!(reloaded.density.sea_level, config.density.sea_level);
        assert_eq!(reloaded.caves.cheese.threshold, config.caves.cheese.threshold);
    }
}
