//! The chunk: block storage, lifecycle state machine, and the bookkeeping
//! (dirty flags, neighbor keys, cross-chunk tree queue) the streamer and
//! job pipeline need to drive it.

use std::sync::atomic::{AtomicU8, Ordering};

use bitflags::bitflags;

use crate::block::Block;
use crate::mesh::MeshData;
use crate::terrain::trees::CrossChunkTree;

bitflags! {
    /// Per-chunk bookkeeping bits the streamer consults every tick.
    /// Grounded on `src/world/block_flags.rs`'s bitflags pattern, applied
    /// here to chunk-level rather than block-level state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct ChunkFlags: u8 {
        const NEEDS_SAVING = 1 << 0;
        const MESH_DIRTY = 1 << 1;
    }
}

pub const CHUNK_BITS_X: u32 = 5;
pub const CHUNK_BITS_Y: u32 = 5;
pub const CHUNK_BITS_Z: u32 = 8;

pub const SIZE_X: i32 = 1 << CHUNK_BITS_X;
pub const SIZE_Y: i32 = 1 << CHUNK_BITS_Y;
pub const SIZE_Z: i32 = 1 << CHUNK_BITS_Z;

pub const MASK_X: i32 = SIZE_X - 1;
pub const MASK_Y: i32 = SIZE_Y - 1;
pub const MASK_Z: i32 = SIZE_Z - 1;

pub const BLOCKS_PER_CHUNK: usize = (SIZE_X * SIZE_Y * SIZE_Z) as usize;

/// Integer 2D chunk coordinate. Chunks never stack in Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
}

impl ChunkCoord {
    pub fn new(cx: i32, cy: i32) -> Self {
        ChunkCoord { cx, cy }
    }

    pub fn north(self) -> Self {
        ChunkCoord::new(self.cx, self.cy + 1)
    }
    pub fn south(self) -> Self {
        ChunkCoord::new(self.cx, self.cy - 1)
    }
    pub fn east(self) -> Self {
        ChunkCoord::new(self.cx + 1, self.cy)
    }
    pub fn west(self) -> Self {
        ChunkCoord::new(self.cx - 1, self.cy)
    }

    /// Which chunk a world-space column `(gx, gy)` falls in.
    pub fn from_world_xy(gx: i32, gy: i32) -> Self {
        ChunkCoord::new(gx.div_euclid(SIZE_X), gy.div_euclid(SIZE_Y))
    }
}

/// Local-space index arithmetic, `index = x | (y << BITS_X) | (z << (BITS_X+BITS_Y))`.
#[inline]
pub fn coords_to_index(x: i32, y: i32, z: i32) -> usize {
    debug_assert!((0..SIZE_X).contains(&x));
    debug_assert!((0..SIZE_Y).contains(&y));
    debug_assert!((0..SIZE_Z).contains(&z));
    (x | (y << CHUNK_BITS_X) | (z << (CHUNK_BITS_X + CHUNK_BITS_Y))) as usize
}

#[inline]
pub fn index_to_coords(index: usize) -> (i32, i32, i32) {
    let index = index as i32;
    let x = index & MASK_X;
    let y = (index >> CHUNK_BITS_X) & MASK_Y;
    let z = index >> (CHUNK_BITS_X + CHUNK_BITS_Y);
    (x, y, z)
}

#[inline]
pub fn in_bounds(x: i32, y: i32, z: i32) -> bool {
    (0..SIZE_X).contains(&x) && (0..SIZE_Y).contains(&y) && (0..SIZE_Z).contains(&z)
}

/// The per-chunk lifecycle state. Transitions are compare-and-set; the
/// set of legal transitions is exhaustive and enforced by
/// [`Chunk::try_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkState {
    Constructing = 0,
    Activating = 1,
    Loading = 2,
    LoadComplete = 3,
    TerrainGenerating = 4,
    LightingInitializing = 5,
    Complete = 6,
    Deactivating = 7,
    Saving = 8,
    SaveComplete = 9,
    Deconstructing = 10,
}

impl ChunkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ChunkState::Constructing,
            1 => ChunkState::Activating,
            2 => ChunkState::Loading,
            3 => ChunkState::LoadComplete,
            4 => ChunkState::TerrainGenerating,
            5 => ChunkState::LightingInitializing,
            6 => ChunkState::Complete,
            7 => ChunkState::Deactivating,
            8 => ChunkState::Saving,
            9 => ChunkState::SaveComplete,
            10 => ChunkState::Deconstructing,
            other => unreachable!("invalid chunk state byte {other}"),
        }
    }

    /// Whether `(from, to)` is one of the acyclic transitions the state
    /// machine allows. Re-entering Complete from a mesh rebuild is not a
    /// transition at all — mesh rebuilds never touch this field.
    fn is_legal(from: ChunkState, to: ChunkState) -> bool {
        use ChunkState::*;
        matches!(
            (from, to),
            (Constructing, Activating)
                | (Activating, Loading)
                | (Activating, TerrainGenerating)
                | (Loading, LoadComplete)
                // A failed LoadJob falls back to generation on the same
                // chunk (spec.md 4.1 "Failure semantics") rather than
                // retrying the load.
                | (Loading, TerrainGenerating)
                | (LoadComplete, LightingInitializing)
                | (TerrainGenerating, LightingInitializing)
                | (LightingInitializing, Complete)
                | (Complete, Deactivating)
                | (Deactivating, Saving)
                | (Deactivating, Deconstructing)
                | (Saving, SaveComplete)
                | (SaveComplete, Deconstructing)
        )
    }
}

/// Atomic wrapper around [`ChunkState`] with a CAS-only transition API.
#[derive(Debug)]
pub struct ChunkStateCell(AtomicU8);

impl ChunkStateCell {
    pub fn new(initial: ChunkState) -> Self {
        ChunkStateCell(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> ChunkState {
        ChunkState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempts `expected -> next`. Returns `false` if the current state
    /// isn't `expected`, or if the transition isn't in the legal table —
    /// an illegal transition is a programmer error and never silently
    /// accepted.
    pub fn try_transition(&self, expected: ChunkState, next: ChunkState) -> bool {
        debug_assert!(
            ChunkState::is_legal(expected, next),
            "illegal chunk state transition {:?} -> {:?}",
            expected,
            next
        );
        self.0
            .compare_exchange(
                expected as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Which cardinal neighbor slot, used by mesh face direction and
/// neighbor-linking code alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinal {
    North,
    South,
    East,
    West,
}

impl Cardinal {
    pub const ALL: [Cardinal; 4] = [Cardinal::North, Cardinal::South, Cardinal::East, Cardinal::West];

    pub fn opposite(self) -> Cardinal {
        match self {
            Cardinal::North => Cardinal::South,
            Cardinal::South => Cardinal::North,
            Cardinal::East => Cardinal::West,
            Cardinal::West => Cardinal::East,
        }
    }

    pub fn offset(self, coord: ChunkCoord) -> ChunkCoord {
        match self {
            Cardinal::North => coord.north(),
            Cardinal::South => coord.south(),
            Cardinal::East => coord.east(),
            Cardinal::West => coord.west(),
        }
    }
}

/// One vertical column of blocks. Neighbor relationships are kept as
/// `(cx, cy)` keys rather than pointers — resolved through the world's
/// active-set map on demand — so no chunk can alias another's block
/// array across threads.
pub struct Chunk {
    pub coord: ChunkCoord,
    state: ChunkStateCell,
    blocks: Box<[Block; BLOCKS_PER_CHUNK]>,
    neighbors: [Option<ChunkCoord>; 4],
    flags: ChunkFlags,
    pub cross_chunk_trees: Vec<CrossChunkTree>,
    mesh: MeshData,
}

impl Chunk {
    pub fn new(coord: ChunkCoord) -> Self {
        Chunk {
            coord,
            state: ChunkStateCell::new(ChunkState::Constructing),
            blocks: Box::new([Block::AIR; BLOCKS_PER_CHUNK]),
            neighbors: [None; 4],
            flags: ChunkFlags::MESH_DIRTY,
            cross_chunk_trees: Vec::new(),
            mesh: MeshData::default(),
        }
    }

    pub fn state(&self) -> ChunkState {
        self.state.load()
    }

    pub fn try_transition(&self, expected: ChunkState, next: ChunkState) -> bool {
        self.state.try_transition(expected, next)
    }

    pub fn is_complete(&self) -> bool {
        self.state() == ChunkState::Complete
    }

    pub fn needs_saving(&self) -> bool {
        self.flags.contains(ChunkFlags::NEEDS_SAVING)
    }

    pub fn mesh_dirty(&self) -> bool {
        self.flags.contains(ChunkFlags::MESH_DIRTY)
    }

    pub fn mark_mesh_dirty(&mut self) {
        self.flags.insert(ChunkFlags::MESH_DIRTY);
    }

    pub fn clear_mesh_dirty(&mut self) {
        self.flags.remove(ChunkFlags::MESH_DIRTY);
    }

    pub fn clear_needs_saving(&mut self) {
        self.flags.remove(ChunkFlags::NEEDS_SAVING);
    }

    pub fn neighbor(&self, dir: Cardinal) -> Option<ChunkCoord> {
        self.neighbors[dir as usize]
    }

    pub fn set_neighbor(&mut self, dir: Cardinal, coord: Option<ChunkCoord>) {
        self.neighbors[dir as usize] = coord;
    }

    pub fn clear_neighbors(&mut self) {
        self.neighbors = [None; 4];
    }

    /// Safe without locking only when the caller already has an
    /// exclusive or consistent view: the main thread on a `Complete`
    /// chunk, or a worker owning the chunk during `Loading`,
    /// `TerrainGenerating`, or `Saving`.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        if !in_bounds(x, y, z) {
            return None;
        }
        Some(self.blocks[coords_to_index(x, y, z)])
    }

    /// Main-thread operation, only legal while `Complete`. Sets both
    /// dirty flags; the caller is responsible for propagating
    /// `mesh_dirty` to a neighbor when `(x, y)` lies on a chunk face.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) -> bool {
        if !in_bounds(x, y, z) {
            return false;
        }
        self.blocks[coords_to_index(x, y, z)] = block;
        self.flags.insert(ChunkFlags::NEEDS_SAVING | ChunkFlags::MESH_DIRTY);
        true
    }

    /// Whether `(x, y)` sits on one of the four vertical chunk faces,
    /// and if so which neighbor direction it borders.
    pub fn face_neighbor_for(x: i32, y: i32) -> Option<Cardinal> {
        if y == SIZE_Y - 1 {
            Some(Cardinal::North)
        } else if y == 0 {
            Some(Cardinal::South)
        } else if x == SIZE_X - 1 {
            Some(Cardinal::East)
        } else if x == 0 {
            Some(Cardinal::West)
        } else {
            None
        }
    }

    pub fn blocks(&self) -> &[Block; BLOCKS_PER_CHUNK] {
        &self.blocks
    }

    /// Only called from the job that owns the chunk during
    /// `TerrainGenerating`/`Loading` — the exclusivity is the state
    /// machine's contract, not a lock.
    pub fn blocks_mut(&mut self) -> &mut [Block; BLOCKS_PER_CHUNK] {
        &mut self.blocks
    }

    /// The most recently built mesh, empty until the first rebuild
    /// after this chunk reaches `Complete`.
    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn set_mesh(&mut self, mesh: MeshData) {
        self.mesh = mesh;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_bijection_coords_then_index() {
        for x in 0..SIZE_X {
            for y in [0, 1, SIZE_Y - 1] {
                for z in [0, 1, SIZE_Z - 1] {
                    let idx = coords_to_index(x, y, z);
                    assert_eq!(index_to_coords(idx), (x, y, z));
                }
            }
        }
    }

    #[test]
    fn index_bijection_index_then_coords() {
        for idx in (0..BLOCKS_PER_CHUNK).step_by(997) {
            let (x, y, z) = index_to_coords(idx);
            assert_eq!(coords_to_index(x, y, z), idx);
        }
    }

    #[test]
    fn legal_transition_succeeds_illegal_fails() {
        let chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert_eq!(chunk.state(), ChunkState::Constructing);
        assert!(chunk.try_transition(ChunkState::Constructing, ChunkState::Activating));
        assert_eq!(chunk.state(), ChunkState::Activating);
        // Wrong `expected` -> CAS simply fails, no panic.
        assert!(!chunk.try_transition(ChunkState::Constructing, ChunkState::TerrainGenerating));
        assert_eq!(chunk.state(), ChunkState::Activating);
    }

    #[test]
    fn set_block_marks_dirty_flags() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert!(chunk.set_block(0, 0, 0, Block::new(3)));
        assert!(chunk.needs_saving());
        assert!(chunk.mesh_dirty());
        assert_eq!(chunk.get_block(0, 0, 0).unwrap().type_index, 3);
    }

    #[test]
    fn out_of_bounds_access_returns_none_never_panics() {
        let chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert_eq!(chunk.get_block(-1, 0, 0), None);
        assert_eq!(chunk.get_block(0, 0, SIZE_Z), None);
    }

    #[test]
    fn face_neighbor_detects_all_four_edges() {
        assert_eq!(Chunk::face_neighbor_for(SIZE_X - 1, 5), Some(Cardinal::East));
        assert_eq!(Chunk::face_neighbor_for(0, 5), Some(Cardinal::West));
        assert_eq!(Chunk::face_neighbor_for(5, SIZE_Y - 1), Some(Cardinal::North));
        assert_eq!(Chunk::face_neighbor_for(5, 0), Some(Cardinal::South));
        assert_eq!(Chunk::face_neighbor_for(5, 5), None);
    }
}
