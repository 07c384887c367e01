//! Procedural terrain generation: the pure function from
//! `(chunk_coord, seed, config)` to a filled block array.
//!
//! Grounded in the teacher's single-noise-field `TerrainGenerator` (see
//! `get_base_height`/`get_surface_block`/`get_stone_block` in the
//! original `terrain/generator.rs`), generalized to the five-channel
//! biome model and shaping curves from `WorldGenConfig`.

use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::block::{Block, BlockRegistry};
use crate::chunk::{ChunkCoord, BLOCKS_PER_CHUNK, SIZE_X, SIZE_Y, SIZE_Z};
use crate::terrain::config::{NoiseParams, WorldGenConfig};
use crate::terrain::trees::{default_oak_stamp, CrossChunkTree, TreeStamp};
use crate::chunk::Cardinal;

/// Temperature threshold (in the noise channel's own `[-1, 1]` range)
/// below which the surface block becomes an ice variant instead of snow.
const ICE_TEMPERATURE_MAX: f64 = -0.55;
const SNOW_TEMPERATURE_MAX: f64 = -0.2;
const SAND_TEMPERATURE_MIN: f64 = 0.35;
const DIRT_BAND: i32 = 4;

/// Resolved block-type indices the generator needs, looked up once per
/// world (not per column) from the registry by name so the generator
/// stays decoupled from a hardcoded type-index table.
#[derive(Debug, Clone, Copy)]
pub struct BlockPalette {
    pub bedrock: u8,
    pub stone: u8,
    pub dirt: u8,
    pub grass: u8,
    pub sand: u8,
    pub snow: u8,
    pub ice: u8,
    pub water: u8,
    pub coal_ore: u8,
    pub iron_ore: u8,
    pub gold_ore: u8,
    pub diamond_ore: u8,
    pub oak_log: u8,
    pub oak_leaves: u8,
}

impl BlockPalette {
    pub fn resolve(registry: &BlockRegistry) -> Self {
        let lookup = |name: &str, fallback: u8| registry.index_of(name).unwrap_or(fallback);
        BlockPalette {
            bedrock: lookup("bedrock", 1),
            stone: lookup("stone", 1),
            dirt: lookup("dirt", 2),
            grass: lookup("grass", 3),
            sand: lookup("sand", 4),
            snow: lookup("snow", 5),
            ice: lookup("ice", 6),
            water: lookup("water", 7),
            coal_ore: lookup("coal_ore", 8),
            iron_ore: lookup("iron_ore", 9),
            gold_ore: lookup("gold_ore", 10),
            diamond_ore: lookup("diamond_ore", 11),
            oak_log: lookup("oak_log", 12),
            oak_leaves: lookup("oak_leaves", 13),
        }
    }
}

/// The five fractal-noise biome channels plus the derived peaks-&-valleys
/// channel, sampled at one world column.
#[derive(Debug, Clone, Copy)]
struct BiomeSample {
    temperature: f64,
    humidity: f64,
    continentalness: f64,
    erosion: f64,
    weirdness: f64,
    peaks_valleys: f64,
}

struct NoiseChannels {
    temperature: Perlin,
    humidity: Perlin,
    continentalness: Perlin,
    erosion: Perlin,
    weirdness: Perlin,
    density: Perlin,
    cheese_cave: Perlin,
    spaghetti_cave: Perlin,
    tree: Perlin,
    ravine: Perlin,
    ravine_width: Perlin,
    river: Perlin,
    river_width: Perlin,
}

impl NoiseChannels {
    fn new(seed: u64, config: &WorldGenConfig) -> Self {
        let base = seed as u32;
        NoiseChannels {
            temperature: Perlin::new(base.wrapping_add(1)),
            humidity: Perlin::new(base.wrapping_add(2)),
            continentalness: Perlin::new(base.wrapping_add(3)),
            erosion: Perlin::new(base.wrapping_add(4)),
            weirdness: Perlin::new(base.wrapping_add(5)),
            density: Perlin::new(base.wrapping_add(6)),
            cheese_cave: Perlin::new(base.wrapping_add(config.caves.cheese.seed_offset)),
            spaghetti_cave: Perlin::new(base.wrapping_add(config.caves.spaghetti.seed_offset)),
            tree: Perlin::new(base.wrapping_add(7)),
            ravine: Perlin::new(base.wrapping_add(config.carvers.ravine.seed_offset)),
            ravine_width: Perlin::new(base.wrapping_add(config.carvers.ravine.seed_offset + 1)),
            river: Perlin::new(base.wrapping_add(config.carvers.river.seed_offset)),
            river_width: Perlin::new(base.wrapping_add(config.carvers.river.seed_offset + 1)),
        }
    }
}

/// Fractal-sum (octave-summed) 2D noise normalized to roughly `[-1, 1]`.
fn fractal2(noise: &Perlin, x: f64, y: f64, params: NoiseParams) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0 / params.scale;
    let mut max_amplitude = 0.0;
    for _ in 0..params.octaves.max(1) {
        total += noise.get([x * frequency, y * frequency]) * amplitude;
        max_amplitude += amplitude;
        amplitude *= params.persistence;
        frequency *= 2.0;
    }
    if max_amplitude > 0.0 {
        total / max_amplitude
    } else {
        0.0
    }
}

fn fractal3(noise: &Perlin, x: f64, y: f64, z: f64, scale: f64, octaves: u32) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0 / scale;
    let mut max_amplitude = 0.0;
    for _ in 0..octaves.max(1) {
        total += noise.get([x * frequency, y * frequency, z * frequency]) * amplitude;
        max_amplitude += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }
    if max_amplitude > 0.0 {
        total / max_amplitude
    } else {
        0.0
    }
}

fn sample_biome(channels: &NoiseChannels, config: &WorldGenConfig, gx: i32, gy: i32) -> BiomeSample {
    let (x, y) = (gx as f64, gy as f64);
    let temperature = fractal2(&channels.temperature, x, y, config.biome_noise.temperature);
    let humidity = fractal2(&channels.humidity, x, y, config.biome_noise.humidity);
    let continentalness =
        fractal2(&channels.continentalness, x, y, config.biome_noise.continentalness);
    let erosion = fractal2(&channels.erosion, x, y, config.biome_noise.erosion);
    let weirdness = fractal2(&channels.weirdness, x, y, config.biome_noise.weirdness);
    let peaks_valleys = 1.0 - (3.0 * weirdness.abs() - 2.0).abs();

    BiomeSample { temperature, humidity, continentalness, erosion, weirdness, peaks_valleys }
}

/// Target terrain height for one column, step 4 of the column pipeline.
fn target_height(config: &WorldGenConfig, biome: &BiomeSample) -> f64 {
    let ranges = &config.curve_ranges;
    let continental_term = config.continentalness_curve.sample(biome.continentalness)
        * (ranges.continentalness_height_max - ranges.continentalness_height_min);
    let erosion_scale = config.erosion_curve.sample(biome.erosion);
    let pv_term = config.peaks_valleys_curve.sample(biome.peaks_valleys)
        * (ranges.pv_height_max - ranges.pv_height_min);

    config.density.default_terrain_height + continental_term * erosion_scale + pv_term
}

fn surface_block(palette: &BlockPalette, biome: &BiomeSample) -> u8 {
    if biome.temperature < ICE_TEMPERATURE_MAX {
        palette.ice
    } else if biome.temperature < SNOW_TEMPERATURE_MAX {
        palette.snow
    } else if biome.temperature > SAND_TEMPERATURE_MIN && biome.humidity < 0.0 {
        palette.sand
    } else {
        palette.grass
    }
}

/// Deterministic per-column RNG: a splitmix64-style mix of the world
/// seed and column coordinates, independent of generation order so
/// columns (and chunks) can be generated in parallel with bit-identical
/// results regardless of scheduling.
fn column_rng(seed: u64, gx: i32, gy: i32) -> ChaCha8Rng {
    let mut z = seed
        ^ (gx as i64 as u64).wrapping_mul(0x9E3779B97F4A7C15)
        ^ (gy as i64 as u64).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^= z >> 31;
    ChaCha8Rng::seed_from_u64(z)
}

/// Ore roll order is rarest-first, first match wins, matching the single
/// per-block roll pattern in the source generator's simplified ore
/// placement. Percentages are this crate's own defaults (not specified
/// by the parameters this generator otherwise reads from config):
/// diamond 1%, gold 2%, iron 4%, coal 8% of stone blocks.
fn roll_ore(rng: &mut ChaCha8Rng, palette: &BlockPalette, stone: u8) -> u8 {
    let roll: f64 = rng.gen_range(0.0..100.0);
    if roll < 1.0 {
        palette.diamond_ore
    } else if roll < 3.0 {
        palette.gold_ore
    } else if roll < 7.0 {
        palette.iron_ore
    } else if roll < 15.0 {
        palette.coal_ore
    } else {
        stone
    }
}

/// Whether the 3D density field carves this block to air. Cheese caves
/// are large rounded voids; spaghetti caves are thin winding tunnels.
/// Both respect the surface and lava-adjacency guards from config.
fn should_carve_cave(
    channels: &NoiseChannels,
    config: &WorldGenConfig,
    gx: i32,
    gy: i32,
    z: i32,
    height: f64,
) -> bool {
    let depth_from_surface = height - z as f64;
    if depth_from_surface < config.caves.min_cave_depth_from_surface as f64 {
        return false;
    }
    if z < config.caves.min_cave_height_above_lava {
        return false;
    }

    let cheese = fractal3(
        &channels.cheese_cave,
        gx as f64,
        gy as f64,
        z as f64,
        config.caves.cheese.scale,
        config.caves.cheese.octaves,
    );
    if cheese.abs() < 1.0 - config.caves.cheese.threshold {
        return true;
    }

    let spaghetti = fractal3(
        &channels.spaghetti_cave,
        gx as f64,
        gy as f64,
        z as f64,
        config.caves.spaghetti.scale,
        config.caves.spaghetti.octaves,
    );
    spaghetti.abs() > config.caves.spaghetti.threshold
}

/// Carves rivers/ravines: a 2D path noise picks a winding centerline,
/// width noise varies the trench width, and columns within the trench
/// get cleared from the surface down to a noise-chosen depth.
fn carver_depth(
    path_noise: &Perlin,
    width_noise: &Perlin,
    config_channel: &crate::terrain::config::CarverChannelParams,
    gx: i32,
    gy: i32,
) -> Option<f64> {
    let path = fractal2(
        path_noise,
        gx as f64,
        gy as f64,
        NoiseParams { scale: config_channel.path_noise_scale, octaves: config_channel.octaves, persistence: 0.5 },
    );
    if path.abs() > config_channel.threshold {
        return None;
    }

    let width_sample = fractal2(
        width_noise,
        gx as f64,
        gy as f64,
        NoiseParams {
            scale: config_channel.width_noise_scale,
            octaves: config_channel.width_octaves,
            persistence: 0.5,
        },
    );
    let width_t = (width_sample + 1.0) / 2.0;
    let width = config_channel.width_min + width_t * (config_channel.width_max - config_channel.width_min);

    let edge_distance = config_channel.threshold - path.abs();
    let falloff = (edge_distance / (config_channel.threshold * config_channel.edge_falloff.max(1e-6))).min(1.0);
    if falloff <= 0.0 || width <= 0.0 {
        return None;
    }

    Some(config_channel.depth_min + falloff * (config_channel.depth_max - config_channel.depth_min))
}

/// Generates one chunk's block array plus any cross-chunk tree overflow.
/// Pure and deterministic: identical `(coord, seed, config)` always
/// produces bit-identical output, independent of thread scheduling.
pub fn generate(
    coord: ChunkCoord,
    seed: u64,
    config: &WorldGenConfig,
    palette: &BlockPalette,
    registry: &BlockRegistry,
) -> (Box<[Block; BLOCKS_PER_CHUNK]>, Vec<CrossChunkTree>) {
    let channels = NoiseChannels::new(seed, config);
    let mut blocks = Box::new([Block::AIR; BLOCKS_PER_CHUNK]);
    let mut cross_chunk_trees = Vec::new();

    for ly in 0..SIZE_Y {
        for lx in 0..SIZE_X {
            let gx = coord.cx * SIZE_X + lx;
            let gy = coord.cy * SIZE_Y + ly;

            let biome = sample_biome(&channels, config, gx, gy);
            let height = target_height(config, &biome);
            let height_i = height.round() as i32;
            let sea_level = config.density.sea_level.round() as i32;
            let surface = surface_block(palette, &biome);
            let mut rng = column_rng(seed, gx, gy);

            for z in 0..SIZE_Z {
                let mut block = if z == 0 {
                    Block::new(palette.bedrock)
                } else if z < height_i - DIRT_BAND {
                    let ore = roll_ore(&mut rng, palette, palette.stone);
                    Block::new(ore)
                } else if z < height_i {
                    Block::new(palette.dirt)
                } else if z == height_i {
                    Block::new(surface)
                } else if z <= sea_level {
                    Block::new(palette.water)
                } else {
                    Block::AIR
                };

                if z > 0 && z < height_i && should_carve_cave(&channels, config, gx, gy, z, height) {
                    block = Block::AIR;
                }

                blocks[crate::chunk::coords_to_index(lx, ly, z)] = block;
            }

            if let Some(depth) =
                carver_depth(&channels.ravine, &channels.ravine_width, &config.carvers.ravine, gx, gy)
            {
                carve_trench(&mut blocks, lx, ly, height_i, depth);
            } else if let Some(depth) =
                carver_depth(&channels.river, &channels.river_width, &config.carvers.river, gx, gy)
            {
                carve_trench(&mut blocks, lx, ly, height_i, depth);
                fill_with_water(&mut blocks, lx, ly, height_i, palette.water);
            }

            maybe_place_tree(
                &channels,
                config,
                palette,
                seed,
                coord,
                lx,
                ly,
                height_i,
                sea_level,
                &mut blocks,
                &mut cross_chunk_trees,
            );
        }
    }

    registry.seed_indoor_lighting(blocks.as_mut_slice());
    (blocks, cross_chunk_trees)
}

fn carve_trench(blocks: &mut [Block; BLOCKS_PER_CHUNK], lx: i32, ly: i32, surface_z: i32, depth: f64) {
    let bottom = (surface_z as f64 - depth).max(1.0) as i32;
    for z in bottom..=surface_z {
        if z > 0 && z < SIZE_Z {
            blocks[crate::chunk::coords_to_index(lx, ly, z)] = Block::AIR;
        }
    }
}

fn fill_with_water(blocks: &mut [Block; BLOCKS_PER_CHUNK], lx: i32, ly: i32, surface_z: i32, water: u8) {
    let bottom = (surface_z - 4).max(1);
    for z in bottom..surface_z {
        blocks[crate::chunk::coords_to_index(lx, ly, z)] = Block::new(water);
    }
}

/// Step 9 of the column pipeline: place a tree when the tree-placement
/// noise clears the threshold and this column is the chosen site within
/// its spacing cell. Stamps that extend past this chunk's bounds are
/// recorded as [`CrossChunkTree`] entries rather than written directly.
#[allow(clippy::too_many_arguments)]
fn maybe_place_tree(
    channels: &NoiseChannels,
    config: &WorldGenConfig,
    palette: &BlockPalette,
    seed: u64,
    coord: ChunkCoord,
    lx: i32,
    ly: i32,
    surface_z: i32,
    sea_level: i32,
    blocks: &mut [Block; BLOCKS_PER_CHUNK],
    cross_chunk_trees: &mut Vec<CrossChunkTree>,
) {
    if surface_z <= sea_level || surface_z + 8 >= SIZE_Z {
        return;
    }
    let gx = coord.cx * SIZE_X + lx;
    let gy = coord.cy * SIZE_Y + ly;
    let spacing = config.trees.min_tree_spacing.max(1);

    let cell_x = gx.div_euclid(spacing);
    let cell_y = gy.div_euclid(spacing);
    let mut cell_rng = column_rng(seed ^ 0xA11CE, cell_x, cell_y);
    let site_x = cell_x * spacing + cell_rng.gen_range(0..spacing);
    let site_y = cell_y * spacing + cell_rng.gen_range(0..spacing);
    if site_x != gx || site_y != gy {
        return;
    }

    let noise = fractal2(
        &channels.tree,
        gx as f64,
        gy as f64,
        NoiseParams { scale: config.trees.tree_noise_scale, octaves: config.trees.octaves, persistence: 0.5 },
    );
    if noise <= config.trees.tree_placement_threshold {
        return;
    }

    let stamp = default_oak_stamp(palette.oak_log, palette.oak_leaves);
    place_stamp(lx, ly, surface_z + 1, stamp, blocks, cross_chunk_trees);
}

fn place_stamp(
    trunk_lx: i32,
    trunk_ly: i32,
    trunk_lz: i32,
    stamp: TreeStamp,
    blocks: &mut [Block; BLOCKS_PER_CHUNK],
    cross_chunk_trees: &mut Vec<CrossChunkTree>,
) {
    let origin_x = trunk_lx - stamp.trunk_offset_x;
    let origin_y = trunk_ly - stamp.trunk_offset_y;

    let mut directions = Vec::new();
    if origin_x < 0 {
        directions.push(Cardinal::West);
    }
    if origin_x + stamp.size_x > SIZE_X {
        directions.push(Cardinal::East);
    }
    if origin_y < 0 {
        directions.push(Cardinal::South);
    }
    if origin_y + stamp.size_y > SIZE_Y {
        directions.push(Cardinal::North);
    }

    for sz in 0..stamp.size_z {
        for sy in 0..stamp.size_y {
            for sx in 0..stamp.size_x {
                let Some(block) = stamp.block_at(sx, sy, sz) else { continue };
                if block.is_air() {
                    continue;
                }
                let (x, y, z) = (origin_x + sx, origin_y + sy, trunk_lz + sz);
                if (0..SIZE_X).contains(&x) && (0..SIZE_Y).contains(&y) && (0..SIZE_Z).contains(&z) {
                    blocks[crate::chunk::coords_to_index(x, y, z)] = block;
                }
            }
        }
    }

    if !directions.is_empty() {
        cross_chunk_trees.push(CrossChunkTree {
            local_x: trunk_lx,
            local_y: trunk_ly,
            local_z: trunk_lz,
            stamp,
            directions,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_deterministic_for_fixed_inputs() {
        let registry = BlockRegistry::empty();
        let palette = BlockPalette::resolve(&registry);
        let config = WorldGenConfig::default();
        let coord = ChunkCoord::new(3, -2);

        let (a, _) = generate(coord, 42, &config, &palette, &registry);
        let (b, _) = generate(coord, 42, &config, &palette, &registry);
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn different_seeds_usually_differ() {
        let registry = BlockRegistry::empty();
        let palette = BlockPalette::resolve(&registry);
        let config = WorldGenConfig::default();
        let coord = ChunkCoord::new(0, 0);

        let (a, _) = generate(coord, 1, &config, &palette, &registry);
        let (b, _) = generate(coord, 2, &config, &palette, &registry);
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn bedrock_at_z_zero() {
        let registry = BlockRegistry::empty();
        let palette = BlockPalette::resolve(&registry);
        let config = WorldGenConfig::default();
        let (blocks, _) = generate(ChunkCoord::new(0, 0), 7, &config, &palette, &registry);
        assert_eq!(blocks[crate::chunk::coords_to_index(0, 0, 0)].type_index, palette.bedrock);
    }

    #[test]
    fn indoor_lighting_is_seeded_from_the_registry_definition() {
        let json = r#"{
            "blocks": [
                { "name": "bedrock", "isVisible": true, "isSolid": true, "isOpaque": true,
                  "topSpriteCoords": [0,0], "bottomSpriteCoords": [0,0],
                  "sideSpriteCoords": [0,0], "indoorLighting": 6 }
            ]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, json.as_bytes()).unwrap();
        let registry = crate::block::BlockRegistry::load_from_json(file.path()).unwrap();
        let palette = BlockPalette::resolve(&registry);
        let config = WorldGenConfig::default();
        let (blocks, _) = generate(ChunkCoord::new(0, 0), 7, &config, &palette, &registry);
        let bedrock = blocks[crate::chunk::coords_to_index(0, 0, 0)];
        assert_eq!(bedrock.type_index, palette.bedrock);
        assert_eq!(bedrock.indoor_light(), 6);
    }
}
