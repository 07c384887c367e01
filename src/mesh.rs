//! Mesh builder: hidden-surface removal with per-vertex RGBA-encoded
//! lighting and UV atlas mapping.
//!
//! The face-visibility rule, lighting source, ambient floor, and UV
//! Y-flip are all grounded directly on the authoritative
//! `ChunkMeshJob.cpp` this crate's mesh pass descends from.

use glam::Vec3;

use crate::block::{BlockRegistry, SpriteCoords};
use crate::chunk::{coords_to_index, in_bounds, Chunk, SIZE_X, SIZE_Y, SIZE_Z};

/// Size (in cells) of the square texture atlas the block definitions'
/// sprite coordinates index into.
pub const ATLAS_SIZE: f32 = 8.0;
const SPRITE_SIZE: f32 = 1.0 / ATLAS_SIZE;

/// Below this outdoor/indoor combination, the indoor channel is floored
/// so night-shadowed faces stay faintly visible without being brightened
/// by sunlight that isn't there.
const MIN_AMBIENT_LIGHT: u8 = 4;

/// One mesh vertex: position, normal, UV, and the lighting-encoded RGBA8
/// color described in `SPEC_FULL.md` §4.4. `#[repr(C)]` + `bytemuck::Pod`
/// so it uploads directly into a GPU vertex buffer without a renderer
/// dependency in this crate.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [u8; 4],
}

/// Vertex/index data for one emitted mesh: the lit surface mesh and,
/// separately, an optional debug wireframe of the chunk's bounding box.
#[derive(Debug, Default, Clone)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub debug_vertices: Vec<Vertex>,
    pub debug_indices: Vec<u32>,
}

/// The six axis-aligned face directions a block can expose, cache-order
/// matched to the original mesh job: top, bottom, then the four sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Top,
    Bottom,
    North,
    South,
    East,
    West,
}

impl Face {
    const ALL: [Face; 6] = [Face::Top, Face::Bottom, Face::North, Face::South, Face::East, Face::West];

    fn offset(self) -> (i32, i32, i32) {
        match self {
            Face::Top => (0, 0, 1),
            Face::Bottom => (0, 0, -1),
            Face::North => (0, 1, 0),
            Face::South => (0, -1, 0),
            Face::East => (1, 0, 0),
            Face::West => (-1, 0, 0),
        }
    }

    fn normal(self) -> Vec3 {
        let (x, y, z) = self.offset();
        Vec3::new(x as f32, y as f32, z as f32)
    }

    /// Baked per-face brightness factor for the vertex color's blue
    /// channel: top brightest, bottom darkest, sides in between.
    fn directional_shade(self) -> f32 {
        match self {
            Face::Top => 1.0,
            Face::Bottom => 0.6,
            Face::North | Face::South | Face::East | Face::West => 0.8,
        }
    }

    fn sprite_for(self, top: SpriteCoords, bottom: SpriteCoords, side: SpriteCoords) -> SpriteCoords {
        match self {
            Face::Top => top,
            Face::Bottom => bottom,
            _ => side,
        }
    }

    /// The four corner offsets of this face's quad, in
    /// (bottom-left, bottom-right, top-left, top-right) order, for a
    /// unit cube spanning `[0,1]^3`.
    fn corners(self) -> [Vec3; 4] {
        match self {
            Face::Top => [
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
            ],
            Face::Bottom => [
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
            Face::North => [
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
            ],
            Face::South => [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
            ],
            Face::East => [
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
            ],
            Face::West => [
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
        }
    }
}

/// What the mesh pass needs from the block a face's neighbor occupies:
/// whether the position even exists (and if not, whether that's because
/// it's out of vertical world bounds vs. an unloaded horizontal
/// neighbor), whether the occupying block is opaque, and its light
/// levels for the lighting-encoding step.
pub enum NeighborBlock {
    /// No chunk is loaded at this position and it's within the
    /// horizontal world — treated as opaque (face hidden) per spec.
    UnloadedHorizontal,
    /// Outside `[0, SIZE_Z)` — treated as not opaque (face visible).
    OutOfVerticalBounds,
    Present { opaque: bool, outdoor_light: u8, indoor_light: u8 },
}

/// Resolves a face's neighbor block, spanning chunk boundaries via
/// `(cx, cy)` lookups rather than raw pointers. Implemented by `World`
/// for real meshing; a plain in-memory stub is provided for tests.
pub trait NeighborAccess {
    fn neighbor_block(&self, chunk: &Chunk, local_x: i32, local_y: i32, local_z: i32) -> NeighborBlock;
}

fn encode_color(outdoor: u8, indoor: u8, shade: f32) -> [u8; 4] {
    let mut indoor = indoor;
    if outdoor < 4 && indoor == 0 {
        indoor = MIN_AMBIENT_LIGHT;
    }
    let scale = |level: u8| ((level.min(15) as f32 / 15.0) * 255.0).round() as u8;
    [scale(outdoor), scale(indoor), (shade * 255.0).round() as u8, 255]
}

fn sprite_uv(sprite: SpriteCoords, corner_uv: (f32, f32)) -> [f32; 2] {
    // The atlas's cell (u, v) maps to a unit rect; the renderer's
    // coordinate system requires a Y-flip applied twice (once for the
    // cell row, once for the corner's own V), matching the source mesh
    // job's `spriteUVs` construction.
    let min_u = sprite.u as f32 * SPRITE_SIZE;
    let min_v = 1.0 - (sprite.v as f32 + 1.0) * SPRITE_SIZE;
    let (du, dv) = corner_uv;
    [min_u + du * SPRITE_SIZE, 1.0 - (min_v + (1.0 - dv) * SPRITE_SIZE)]
}

const CORNER_UVS: [(f32, f32); 4] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];

/// Builds the lit surface mesh (and a debug wireframe of the chunk's
/// bounds) for one chunk. Pure over `(chunk, neighbor-resolver,
/// registry)`; never mutates the chunk.
pub fn build_mesh(chunk: &Chunk, neighbors: &dyn NeighborAccess, registry: &BlockRegistry) -> MeshData {
    let mut mesh = MeshData::default();

    for index in 0..chunk.blocks().len() {
        let block = chunk.blocks()[index];
        let def = registry.definition(block.type_index);
        if !def.is_visible {
            continue;
        }
        let (x, y, z) = crate::chunk::index_to_coords(index);

        for face in Face::ALL {
            let (dx, dy, dz) = face.offset();
            let (nx, ny, nz) = (x + dx, y + dy, z + dz);

            let (opaque, outdoor, indoor) = if in_bounds(nx, ny, nz) {
                let neighbor = chunk.get_block(nx, ny, nz).expect("in-bounds lookup cannot fail");
                let neighbor_def = registry.definition(neighbor.type_index);
                (neighbor_def.is_opaque, neighbor.outdoor_light(), neighbor.indoor_light())
            } else {
                match neighbors.neighbor_block(chunk, nx, ny, nz) {
                    NeighborBlock::OutOfVerticalBounds => (false, 15, 0),
                    NeighborBlock::UnloadedHorizontal => (true, 15, 0),
                    NeighborBlock::Present { opaque, outdoor_light, indoor_light } => {
                        (opaque, outdoor_light, indoor_light)
                    }
                }
            };

            if opaque {
                continue;
            }

            emit_quad(&mut mesh, face, x, y, z, def, outdoor, indoor, registry);
        }
    }

    emit_debug_wireframe(&mut mesh);
    mesh
}

#[allow(clippy::too_many_arguments)]
fn emit_quad(
    mesh: &mut MeshData,
    face: Face,
    x: i32,
    y: i32,
    z: i32,
    def: &crate::block::BlockDefinition,
    outdoor: u8,
    indoor: u8,
    _registry: &BlockRegistry,
) {
    let base = Vec3::new(x as f32, y as f32, z as f32);
    let corners = face.corners();
    let normal = face.normal();
    let color = encode_color(outdoor, indoor, face.directional_shade());
    let sprite = face.sprite_for(def.top_sprite, def.bottom_sprite, def.side_sprite);

    let start_index = mesh.vertices.len() as u32;
    for (corner, corner_uv) in corners.iter().zip(CORNER_UVS) {
        mesh.vertices.push(Vertex {
            position: (base + *corner).to_array(),
            normal: normal.to_array(),
            uv: sprite_uv(sprite, corner_uv),
            color,
        });
    }
    // bottom-left, bottom-right, top-left, top-right -> two triangles
    // sharing the BL-TR diagonal.
    mesh.indices.extend_from_slice(&[
        start_index,
        start_index + 1,
        start_index + 3,
        start_index,
        start_index + 3,
        start_index + 2,
    ]);
}

fn emit_debug_wireframe(mesh: &mut MeshData) {
    let (sx, sy, sz) = (SIZE_X as f32, SIZE_Y as f32, SIZE_Z as f32);
    let corners = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(sx, 0.0, 0.0),
        Vec3::new(sx, sy, 0.0),
        Vec3::new(0.0, sy, 0.0),
        Vec3::new(0.0, 0.0, sz),
        Vec3::new(sx, 0.0, sz),
        Vec3::new(sx, sy, sz),
        Vec3::new(0.0, sy, sz),
    ];
    let edges: [(u32, u32); 12] = [
        (0, 1), (1, 2), (2, 3), (3, 0),
        (4, 5), (5, 6), (6, 7), (7, 4),
        (0, 4), (1, 5), (2, 6), (3, 7),
    ];

    let start = mesh.debug_vertices.len() as u32;
    for corner in corners {
        mesh.debug_vertices.push(Vertex {
            position: corner.to_array(),
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 0.0],
            color: [255, 255, 255, 255],
        });
    }
    for (a, b) in edges {
        mesh.debug_indices.push(start + a);
        mesh.debug_indices.push(start + b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockRegistry};
    use crate::chunk::{ChunkCoord, ChunkState};

    struct AlwaysOutOfBounds;
    impl NeighborAccess for AlwaysOutOfBounds {
        fn neighbor_block(&self, _chunk: &Chunk, _x: i32, _y: i32, z: i32) -> NeighborBlock {
            if z < 0 || z >= SIZE_Z {
                NeighborBlock::OutOfVerticalBounds
            } else {
                NeighborBlock::UnloadedHorizontal
            }
        }
    }

    fn registry_with_stone() -> BlockRegistry {
        let json = r#"{
            "blocks": [
                { "name": "stone", "isVisible": true, "isSolid": true, "isOpaque": true,
                  "topSpriteCoords": [1,0], "bottomSpriteCoords": [1,0],
                  "sideSpriteCoords": [1,0], "indoorLighting": 0 }
            ]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, json.as_bytes()).unwrap();
        BlockRegistry::load_from_json(file.path()).unwrap()
    }

    fn complete_chunk_with_single_block(block: Block) -> Chunk {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert!(chunk.try_transition(ChunkState::Constructing, ChunkState::Activating));
        assert!(chunk.try_transition(ChunkState::Activating, ChunkState::TerrainGenerating));
        assert!(chunk.try_transition(ChunkState::TerrainGenerating, ChunkState::LightingInitializing));
        assert!(chunk.try_transition(ChunkState::LightingInitializing, ChunkState::Complete));
        chunk.blocks_mut()[coords_to_index(5, 5, 50)] = block;
        chunk
    }

    #[test]
    fn isolated_block_surrounded_by_air_emits_all_six_faces() {
        let registry = registry_with_stone();
        let chunk = complete_chunk_with_single_block(Block::new(1));
        let mesh = build_mesh(&chunk, &AlwaysOutOfBounds, &registry);
        // The block sits at (5,5,50), away from every chunk edge, so all
        // six neighbor lookups resolve in-chunk to air rather than
        // through the (unloaded-horizontal) resolver: all six faces are
        // visible.
        assert_eq!(mesh.vertices.len(), 6 * 4);
        assert_eq!(mesh.indices.len(), 6 * 6);
    }

    #[test]
    fn block_on_chunk_edge_hides_face_toward_unloaded_neighbor() {
        let registry = registry_with_stone();
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert!(chunk.try_transition(ChunkState::Constructing, ChunkState::Activating));
        assert!(chunk.try_transition(ChunkState::Activating, ChunkState::TerrainGenerating));
        assert!(chunk.try_transition(ChunkState::TerrainGenerating, ChunkState::LightingInitializing));
        assert!(chunk.try_transition(ChunkState::LightingInitializing, ChunkState::Complete));
        chunk.blocks_mut()[coords_to_index(0, 5, 50)] = Block::new(1);
        let mesh = build_mesh(&chunk, &AlwaysOutOfBounds, &registry);
        // West neighbor is unloaded (opaque per spec), so only the
        // remaining five faces (top, bottom, north, south, east) emit.
        assert_eq!(mesh.vertices.len(), 5 * 4);
    }

    #[test]
    fn quad_color_blue_channel_matches_directional_shade() {
        let registry = registry_with_stone();
        let chunk = complete_chunk_with_single_block(Block::new(1));
        let mesh = build_mesh(&chunk, &AlwaysOutOfBounds, &registry);
        let top_color = mesh.vertices[0].color;
        assert_eq!(top_color[2], 255);
    }

    #[test]
    fn debug_wireframe_has_eight_corners_twelve_edges() {
        let registry = BlockRegistry::empty();
        let chunk = Chunk::new(ChunkCoord::new(0, 0));
        let mesh = build_mesh(&chunk, &AlwaysOutOfBounds, &registry);
        assert_eq!(mesh.debug_vertices.len(), 8);
        assert_eq!(mesh.debug_indices.len(), 24);
    }

    #[test]
    fn ambient_floor_raises_dark_indoor_channel() {
        let color = encode_color(0, 0, 0.8);
        assert_eq!(color[1], ((MIN_AMBIENT_LIGHT as f32 / 15.0) * 255.0).round() as u8);
    }
}
