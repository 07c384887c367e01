//! Tree stamps and the cross-chunk tree queue.
//!
//! A tree stamp is a small flattened block cuboid applied at a trunk
//! origin. When a stamp's bounding box exits the chunk that placed it,
//! the overflow is recorded as a [`CrossChunkTree`] and drained into the
//! neighboring chunk once that neighbor reaches `Complete` (see
//! `world.rs`'s neighbor-linking step).

use crate::block::Block;
use crate::chunk::{coords_to_index, in_bounds, Cardinal, BLOCKS_PER_CHUNK, SIZE_X, SIZE_Y};

/// A fixed block cuboid stamped into the world at a trunk origin.
#[derive(Debug, Clone)]
pub struct TreeStamp {
    pub size_x: i32,
    pub size_y: i32,
    pub size_z: i32,
    pub trunk_offset_x: i32,
    pub trunk_offset_y: i32,
    /// Flattened `size_x * size_y * size_z` blocks, x fastest.
    pub blocks: Vec<Block>,
}

impl TreeStamp {
    fn index(&self, x: i32, y: i32, z: i32) -> usize {
        (x + y * self.size_x + z * self.size_x * self.size_y) as usize
    }

    pub fn block_at(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        if x < 0 || x >= self.size_x || y < 0 || y >= self.size_y || z < 0 || z >= self.size_z {
            return None;
        }
        self.blocks.get(self.index(x, y, z)).copied()
    }
}

/// A classic "plus trunk, spherical-ish canopy" oak stamp, 5x5 footprint,
/// 7 tall, trunk centered.
pub fn default_oak_stamp(log_type: u8, leaves_type: u8) -> TreeStamp {
    let (sx, sy, sz) = (5, 5, 7);
    let mut blocks = vec![Block::AIR; (sx * sy * sz) as usize];
    let stamp_index = |x: i32, y: i32, z: i32| (x + y * sx + z * sx * sy) as usize;

    let (trunk_x, trunk_y) = (2, 2);
    for z in 0..5 {
        blocks[stamp_index(trunk_x, trunk_y, z)] = Block::new(log_type);
    }
    for z in 3..7 {
        let radius = if z >= 6 { 1 } else { 2 };
        for x in 0..sx {
            for y in 0..sy {
                let dx = x - trunk_x;
                let dy = y - trunk_y;
                if dx * dx + dy * dy <= radius * radius && blocks[stamp_index(x, y, z)].is_air() {
                    blocks[stamp_index(x, y, z)] = Block::new(leaves_type);
                }
            }
        }
    }

    TreeStamp {
        size_x: sx,
        size_y: sy,
        size_z: sz,
        trunk_offset_x: trunk_x,
        trunk_offset_y: trunk_y,
        blocks,
    }
}

/// A tree whose stamp bounding box exits its originating chunk,
/// recorded for deferred application once the bordering neighbor is
/// `Complete`. `directions` marks which of the four chunk faces the
/// stamp overflows.
#[derive(Debug, Clone)]
pub struct CrossChunkTree {
    pub local_x: i32,
    pub local_y: i32,
    pub local_z: i32,
    pub stamp: TreeStamp,
    pub directions: Vec<Cardinal>,
}

/// Clips and writes the portion of `tree`'s stamp that overflowed
/// toward `dir` into `target_blocks`, the neighbor chunk sitting in
/// that direction. Called by the streamer after linking two `Complete`
/// chunks, once per queued tree whose `directions` includes `dir`.
pub fn apply_cross_chunk_tree(tree: &CrossChunkTree, dir: Cardinal, target_blocks: &mut [Block; BLOCKS_PER_CHUNK]) {
    let origin_x = tree.local_x - tree.stamp.trunk_offset_x;
    let origin_y = tree.local_y - tree.stamp.trunk_offset_y;

    for sz in 0..tree.stamp.size_z {
        for sy in 0..tree.stamp.size_y {
            for sx in 0..tree.stamp.size_x {
                let Some(block) = tree.stamp.block_at(sx, sy, sz) else { continue };
                if block.is_air() {
                    continue;
                }
                let (wx, wy) = (origin_x + sx, origin_y + sy);
                let (tx, ty) = match dir {
                    Cardinal::East => (wx - SIZE_X, wy),
                    Cardinal::West => (wx + SIZE_X, wy),
                    Cardinal::North => (wx, wy - SIZE_Y),
                    Cardinal::South => (wx, wy + SIZE_Y),
                };
                let tz = tree.local_z + sz;
                if in_bounds(tx, ty, tz) {
                    target_blocks[coords_to_index(tx, ty, tz)] = block;
                }
            }
        }
    }
}
