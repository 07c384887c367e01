//! The world streamer: the active-chunk map, the per-tick priority
//! algorithm that drives chunks through activation/meshing/deactivation,
//! and the external block-query/raycast surface.
//!
//! Grounded on `original_source/Code/Game/Gameplay/World.hpp`'s
//! `m_activeChunks`/`m_nonActiveChunks` split, its
//! `FindNearestMissingChunkInRange`/`FindFarthestActiveChunkOutsideDeactivationRange`/
//! `FindNearestDirtyChunk` method names, and its distance constants,
//! generalized from the original's 16-wide chunk to this crate's 32-wide
//! one. Chunks are owned by a single `parking_lot::RwLock`-guarded map
//! rather than individually locked, matching spec.md 5's "single-writer,
//! main-thread-owned" active set.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use glam::{IVec3, Vec3};
use parking_lot::{Mutex, RwLock};

use crate::block::{Block, BlockRegistry};
use crate::chunk::{
    Cardinal, Chunk, ChunkCoord, ChunkState, BLOCKS_PER_CHUNK, SIZE_X, SIZE_Y, SIZE_Z,
};
use crate::job::{Job, JobContext, JobOutcome, JobPipeline, NeighborSnapshot};
use crate::mesh;
use crate::terrain::trees::apply_cross_chunk_tree;
use crate::terrain::{BlockPalette, WorldGenConfig};

/// XY distance under which a missing chunk should be activated.
pub const ACTIVATION_RANGE: f32 = 320.0;
/// XY distance above which an active chunk should be deactivated; one
/// chunk-width wider than `ACTIVATION_RANGE` in each axis so a chunk
/// hovering near the boundary cannot thrash between the two passes.
pub const DEACTIVATION_RANGE: f32 = ACTIVATION_RANGE + SIZE_X as f32 + SIZE_Y as f32;

const ACTIVATION_RADIUS_X: i32 = 1 + (ACTIVATION_RANGE as i32 / SIZE_X);
const ACTIVATION_RADIUS_Y: i32 = 1 + (ACTIVATION_RANGE as i32 / SIZE_Y);
/// Upper bound on resident chunks, derived from the activation radius
/// the same way the streamer's search window is, rather than pulled
/// from thin air.
pub const MAX_ACTIVE: usize = (2 * ACTIVATION_RADIUS_X as usize) * (2 * ACTIVATION_RADIUS_Y as usize) * 2;

fn chunk_center_xy(coord: ChunkCoord) -> (f32, f32) {
    let cx = coord.cx as f32 * SIZE_X as f32 + SIZE_X as f32 / 2.0;
    let cy = coord.cy as f32 * SIZE_Y as f32 + SIZE_Y as f32 / 2.0;
    (cx, cy)
}

fn distance_xy(observer: (f32, f32), coord: ChunkCoord) -> f32 {
    let (cx, cy) = chunk_center_xy(coord);
    ((cx - observer.0).powi(2) + (cy - observer.1).powi(2)).sqrt()
}

/// A raycast hit against the voxel grid. `hit = false` means the ray
/// traveled `max_distance` without finding a solid block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub hit: bool,
    pub impact_point: Vec3,
    pub impact_normal: Vec3,
    pub impact_block: IVec3,
}

impl RaycastHit {
    fn miss() -> Self {
        RaycastHit { hit: false, impact_point: Vec3::ZERO, impact_normal: Vec3::ZERO, impact_block: IVec3::ZERO }
    }
}

/// Which bookkeeping state a coordinate not present in the active map is
/// in: either dispatched to a job and awaited, or untouched.
#[derive(Default)]
struct PendingSet(HashSet<ChunkCoord>);

impl PendingSet {
    fn insert(&mut self, coord: ChunkCoord) {
        self.0.insert(coord);
    }
    fn remove(&mut self, coord: ChunkCoord) {
        self.0.remove(&coord);
    }
    fn contains(&self, coord: ChunkCoord) -> bool {
        self.0.contains(&coord)
    }
}

/// The resident voxel world: an infinite 2D grid of chunk columns,
/// streamed in and out around a moving observer.
pub struct World {
    registry: Arc<BlockRegistry>,
    active: RwLock<std::collections::HashMap<ChunkCoord, Chunk>>,
    pending: Mutex<PendingSet>,
    pipeline: JobPipeline,
    saves_dir: PathBuf,
    observer_pos: Mutex<Vec3>,
    observer_vel: Mutex<Vec3>,
    debug_wireframe: std::sync::atomic::AtomicBool,
}

impl World {
    pub fn new(
        registry: Arc<BlockRegistry>,
        config: WorldGenConfig,
        seed: u64,
        saves_dir: PathBuf,
        worker_count: usize,
    ) -> Self {
        let palette = BlockPalette::resolve(&registry);
        let ctx = JobContext { saves_dir: saves_dir.clone(), seed, config, palette, registry: Arc::clone(&registry) };
        World {
            registry,
            active: RwLock::new(std::collections::HashMap::new()),
            pending: Mutex::new(PendingSet::default()),
            pipeline: JobPipeline::new(worker_count, ctx),
            saves_dir,
            observer_pos: Mutex::new(Vec3::ZERO),
            observer_vel: Mutex::new(Vec3::ZERO),
            debug_wireframe: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_observer(&self, position: Vec3, velocity: Vec3) {
        *self.observer_pos.lock() = position;
        *self.observer_vel.lock() = velocity;
    }

    pub fn toggle_debug_wireframe(&self) {
        use std::sync::atomic::Ordering;
        self.debug_wireframe.fetch_xor(true, Ordering::Relaxed);
    }

    pub fn debug_wireframe_enabled(&self) -> bool {
        use std::sync::atomic::Ordering;
        self.debug_wireframe.load(Ordering::Relaxed)
    }

    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    /// Advances the world by one frame: first folds in every job outcome
    /// that has completed since the last tick (bounded, never blocks),
    /// then performs at most one streaming action in priority order:
    /// rebuild a dirty mesh, else activate a missing chunk, else
    /// deactivate a far one (spec.md 4.1).
    pub fn tick(&self, _dt: f32) {
        self.drain_job_outcomes();

        if self.rebuild_nearest_dirty_mesh() {
            return;
        }
        if self.activate_nearest_missing_chunk() {
            return;
        }
        self.deactivate_farthest_chunk();
    }

    fn observer_xy(&self) -> (f32, f32) {
        let pos = *self.observer_pos.lock();
        (pos.x, pos.y)
    }

    // -- step 1: mesh rebuild -------------------------------------------------

    fn rebuild_nearest_dirty_mesh(&self) -> bool {
        let observer = self.observer_xy();
        let target = {
            let active = self.active.read();
            active
                .values()
                .filter(|chunk| chunk.mesh_dirty() && chunk.is_complete())
                .map(|chunk| chunk.coord)
                .min_by(|a, b| distance_xy(observer, *a).total_cmp(&distance_xy(observer, *b)))
        };
        let Some(coord) = target else { return false };
        self.rebuild_mesh_inline(coord);
        true
    }

    /// Builds a chunk's mesh on the calling (main) thread, per spec.md
    /// 4.5's "or run the mesh pass inline" alternative to offloading a
    /// `MeshJob`. Snapshots whichever neighbors are resident under one
    /// read-lock hold, then re-acquires for write to store the result —
    /// never holds the lock across `mesh::build_mesh` itself.
    fn rebuild_mesh_inline(&self, coord: ChunkCoord) {
        let (mesh_data, had_target) = {
            let active = self.active.read();
            match active.get(&coord) {
                Some(target) => {
                    let mut neighbor_blocks: [Option<Box<[Block; BLOCKS_PER_CHUNK]>>; 4] = Default::default();
                    for dir in Cardinal::ALL {
                        if let Some(ncoord) = target.neighbor(dir) {
                            if let Some(nchunk) = active.get(&ncoord) {
                                let mut boxed = Box::new([Block::AIR; BLOCKS_PER_CHUNK]);
                                boxed.copy_from_slice(nchunk.blocks());
                                neighbor_blocks[dir as usize] = Some(boxed);
                            }
                        }
                    }
                    let snapshot = NeighborSnapshot::new(neighbor_blocks, Arc::clone(&self.registry));
                    (Some(mesh::build_mesh(target, &snapshot, &self.registry)), true)
                }
                None => (None, false),
            }
        };
        if !had_target {
            return;
        }
        if let Some(mesh_data) = mesh_data {
            let mut active = self.active.write();
            if let Some(chunk) = active.get_mut(&coord) {
                chunk.set_mesh(mesh_data);
                chunk.clear_mesh_dirty();
            }
        }
    }

    // -- step 2: activation ---------------------------------------------------

    fn activate_nearest_missing_chunk(&self) -> bool {
        if self.active_count() >= MAX_ACTIVE {
            return false;
        }
        let observer = self.observer_xy();
        let observer_chunk = ChunkCoord::from_world_xy(observer.0 as i32, observer.1 as i32);

        let candidate = {
            let active = self.active.read();
            let pending = self.pending.lock();
            let mut best: Option<(ChunkCoord, f32)> = None;
            for dy in -ACTIVATION_RADIUS_Y..=ACTIVATION_RADIUS_Y {
                for dx in -ACTIVATION_RADIUS_X..=ACTIVATION_RADIUS_X {
                    let coord = ChunkCoord::new(observer_chunk.cx + dx, observer_chunk.cy + dy);
                    if active.contains_key(&coord) || pending.contains(coord) {
                        continue;
                    }
                    let dist = distance_xy(observer, coord);
                    if dist > ACTIVATION_RANGE {
                        continue;
                    }
                    if best.map(|(_, best_dist)| dist < best_dist).unwrap_or(true) {
                        best = Some((coord, dist));
                    }
                }
            }
            best.map(|(coord, _)| coord)
        };

        let Some(coord) = candidate else { return false };

        let mut chunk = Box::new(Chunk::new(coord));
        let activated = chunk.try_transition(ChunkState::Constructing, ChunkState::Activating);
        debug_assert!(activated, "freshly constructed chunk must accept Activating");

        let has_save_file = crate::save::save_path(&self.saves_dir, coord).exists();
        let job = if has_save_file {
            let loading = chunk.try_transition(ChunkState::Activating, ChunkState::Loading);
            debug_assert!(loading);
            Job::Load(chunk)
        } else {
            let generating = chunk.try_transition(ChunkState::Activating, ChunkState::TerrainGenerating);
            debug_assert!(generating);
            Job::Generate(chunk)
        };

        match self.pipeline.submit(job) {
            Ok(()) => {
                self.pending.lock().insert(coord);
                true
            }
            // Queue is full this frame; the chunk itself was dropped with
            // the rejected job. The streamer simply retries next tick
            // (spec.md 7's queue-full contract) once it is picked again.
            Err(_) => false,
        }
    }

    // -- step 3: deactivation --------------------------------------------------

    fn deactivate_farthest_chunk(&self) -> bool {
        let observer = self.observer_xy();
        let farthest = {
            let active = self.active.read();
            active
                .values()
                .filter(|chunk| chunk.is_complete())
                .map(|chunk| chunk.coord)
                .filter(|coord| distance_xy(observer, *coord) > DEACTIVATION_RANGE)
                .max_by(|a, b| distance_xy(observer, *a).total_cmp(&distance_xy(observer, *b)))
        };
        let Some(coord) = farthest else { return false };

        let mut chunk = {
            let mut active = self.active.write();
            let Some(mut chunk) = active.remove(&coord) else { return false };
            for dir in Cardinal::ALL {
                if let Some(ncoord) = chunk.neighbor(dir) {
                    if let Some(neighbor) = active.get_mut(&ncoord) {
                        neighbor.set_neighbor(dir.opposite(), None);
                        neighbor.mark_mesh_dirty();
                    }
                }
                chunk.set_neighbor(dir, None);
            }
            chunk
        };

        let deactivating = chunk.try_transition(ChunkState::Complete, ChunkState::Deactivating);
        debug_assert!(deactivating);

        if chunk.needs_saving() {
            let saving = chunk.try_transition(ChunkState::Deactivating, ChunkState::Saving);
            debug_assert!(saving);
            match self.pipeline.submit(Job::Save(Box::new(chunk))) {
                Ok(()) => {
                    self.pending.lock().insert(coord);
                }
                Err(job) => {
                    // Save queue momentarily full. Treated the same as an
                    // I/O save failure (spec.md 4.1): logged, chunk freed
                    // regardless rather than left stuck in `Saving` with
                    // no job ever outstanding to bring it out of it.
                    log::warn!("save queue full while deactivating chunk {coord:?}; dropping unsaved");
                    let Job::Save(mut chunk) = job else { unreachable!("submit returns the same job kind") };
                    let freed = chunk.try_transition(ChunkState::Saving, ChunkState::SaveComplete);
                    debug_assert!(freed);
                    let deconstructed = chunk.try_transition(ChunkState::SaveComplete, ChunkState::Deconstructing);
                    debug_assert!(deconstructed);
                }
            }
        } else {
            let deconstructing = chunk.try_transition(ChunkState::Deactivating, ChunkState::Deconstructing);
            debug_assert!(deconstructing);
            // Dropped: no save needed, chunk is simply freed.
        }
        true
    }

    // -- job outcome draining --------------------------------------------------

    fn drain_job_outcomes(&self) {
        for outcome in self.pipeline.drain_completed() {
            match outcome {
                JobOutcome::Generated { chunk } => self.finish_generation_or_load(chunk),
                JobOutcome::Loaded { chunk, ok: true } => self.finish_generation_or_load(chunk),
                JobOutcome::Loaded { mut chunk, ok: false } => {
                    let coord = chunk.coord;
                    let fallback = chunk.try_transition(ChunkState::Loading, ChunkState::TerrainGenerating);
                    debug_assert!(fallback, "Loading -> TerrainGenerating fallback must be legal");
                    if self.pipeline.submit(Job::Generate(chunk)).is_err() {
                        // Generate queue momentarily full; the chunk (and
                        // its in-flight fallback) is lost for this tick.
                        // The streamer will see the coordinate as neither
                        // active nor pending and retry activation later.
                        self.pending.lock().remove(coord);
                    }
                }
                JobOutcome::Saved { chunk, .. } => {
                    let coord = chunk.coord;
                    let finished = chunk.try_transition(ChunkState::SaveComplete, ChunkState::Deconstructing);
                    debug_assert!(finished);
                    self.pending.lock().remove(coord);
                    // `chunk` drops here: freed after saving, whether or
                    // not the save itself succeeded (spec.md 4.1).
                }
            }
        }
    }

    fn finish_generation_or_load(&self, mut chunk: Box<Chunk>) {
        let coord = chunk.coord;
        // `execute_generate`/`execute_load` (job.rs) already perform the
        // TerrainGenerating/LoadComplete -> LightingInitializing leg
        // before handing back the outcome; lighting itself has no
        // separate pass in this crate (ambient-only lighting, spec.md
        // 9), so the streamer's job is just the final step into Complete.
        debug_assert_eq!(chunk.state(), ChunkState::LightingInitializing);
        let completed = chunk.try_transition(ChunkState::LightingInitializing, ChunkState::Complete);
        debug_assert!(completed, "state-machine violation entering Complete");

        chunk.mark_mesh_dirty();
        self.link_neighbors_and_drain_trees(&mut chunk);

        self.pending.lock().remove(coord);
        self.active.write().insert(coord, *chunk);
    }

    /// For each cardinal direction with an already-`Complete` neighbor:
    /// links both sides, marks both dirty, and drains each side's
    /// queued cross-chunk trees into the other (spec.md 4.3).
    fn link_neighbors_and_drain_trees(&self, chunk: &mut Chunk) {
        let mut active = self.active.write();
        for dir in Cardinal::ALL {
            let ncoord = dir.offset(chunk.coord);
            let Some(neighbor) = active.get_mut(&ncoord) else { continue };
            if !neighbor.is_complete() {
                continue;
            }
            chunk.set_neighbor(dir, Some(ncoord));
            neighbor.set_neighbor(dir.opposite(), Some(chunk.coord));
            neighbor.mark_mesh_dirty();

            // Neighbor's trees overflowing toward `chunk` (i.e. toward
            // `dir.opposite()` as seen from the neighbor) land here.
            let mut drained = Vec::new();
            neighbor.cross_chunk_trees.retain(|tree| {
                if tree.directions.contains(&dir.opposite()) {
                    drained.push(tree.clone());
                    false
                } else {
                    true
                }
            });
            for tree in &drained {
                apply_cross_chunk_tree(tree, dir.opposite(), chunk.blocks_mut());
            }

            // This chunk's own trees overflowing toward the neighbor
            // land there, symmetrically.
            let mut drained_here = Vec::new();
            chunk.cross_chunk_trees.retain(|tree| {
                if tree.directions.contains(&dir) {
                    drained_here.push(tree.clone());
                    false
                } else {
                    true
                }
            });
            if !drained_here.is_empty() {
                for tree in &drained_here {
                    apply_cross_chunk_tree(tree, dir, neighbor.blocks_mut());
                }
                neighbor.mark_mesh_dirty();
            }
        }
    }

    // -- external query API -----------------------------------------------------

    /// Which chunk a global block coordinate falls in, and its local
    /// offset within that chunk.
    fn locate(global: IVec3) -> (ChunkCoord, i32, i32, i32) {
        let coord = ChunkCoord::from_world_xy(global.x, global.y);
        let lx = global.x.rem_euclid(SIZE_X);
        let ly = global.y.rem_euclid(SIZE_Y);
        (coord, lx, ly, global.z)
    }

    pub fn get_block_type(&self, global: IVec3) -> u8 {
        if global.z < 0 || global.z >= SIZE_Z {
            return 0;
        }
        let (coord, lx, ly, lz) = Self::locate(global);
        let active = self.active.read();
        active
            .get(&coord)
            .and_then(|chunk| chunk.get_block(lx, ly, lz))
            .map(|block| block.type_index)
            .unwrap_or(0)
    }

    pub fn is_block_solid(&self, global: IVec3) -> bool {
        self.registry.is_solid(self.get_block_type(global))
    }

    /// Writes a block into a resident, `Complete` chunk; propagates
    /// `mesh_dirty` to the bordering neighbor when `(lx, ly)` sits on a
    /// chunk face. Returns `false` if the chunk isn't resident.
    pub fn set_block_type(&self, global: IVec3, type_index: u8) -> bool {
        if global.z < 0 || global.z >= SIZE_Z {
            return false;
        }
        let (coord, lx, ly, lz) = Self::locate(global);
        let mut active = self.active.write();
        let Some(chunk) = active.get_mut(&coord) else { return false };
        if !chunk.is_complete() {
            return false;
        }
        if !chunk.set_block(lx, ly, lz, Block::new(type_index)) {
            return false;
        }
        if let Some(dir) = Chunk::face_neighbor_for(lx, ly) {
            if let Some(ncoord) = chunk.neighbor(dir) {
                if let Some(neighbor) = active.get_mut(&ncoord) {
                    neighbor.mark_mesh_dirty();
                }
            }
        }
        true
    }

    /// Amanatides-Woo DDA voxel stepper: walks `origin + t*dir` one
    /// cell at a time up to `max_distance`, stopping at the first solid
    /// block.
    pub fn raycast_voxel(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> RaycastHit {
        let dir = dir.normalize_or_zero();
        if dir == Vec3::ZERO {
            return RaycastHit::miss();
        }

        let mut x = origin.x.floor() as i32;
        let mut y = origin.y.floor() as i32;
        let mut z = origin.z.floor() as i32;

        let step_x = dir.x.signum() as i32;
        let step_y = dir.y.signum() as i32;
        let step_z = dir.z.signum() as i32;

        let t_delta_x = if dir.x != 0.0 { (1.0 / dir.x).abs() } else { f32::INFINITY };
        let t_delta_y = if dir.y != 0.0 { (1.0 / dir.y).abs() } else { f32::INFINITY };
        let t_delta_z = if dir.z != 0.0 { (1.0 / dir.z).abs() } else { f32::INFINITY };

        let next_boundary_frac = |pos: f32, step: i32| -> f32 {
            if step > 0 {
                pos.floor() + 1.0 - pos
            } else if step < 0 {
                pos - pos.floor()
            } else {
                f32::INFINITY
            }
        };
        let mut t_max_x = next_boundary_frac(origin.x, step_x) * t_delta_x;
        let mut t_max_y = next_boundary_frac(origin.y, step_y) * t_delta_y;
        let mut t_max_z = next_boundary_frac(origin.z, step_z) * t_delta_z;

        let mut last_normal = Vec3::ZERO;
        let mut t = 0.0f32;

        while t <= max_distance {
            if self.is_block_solid(IVec3::new(x, y, z)) {
                return RaycastHit {
                    hit: true,
                    impact_point: origin + dir * t,
                    impact_normal: last_normal,
                    impact_block: IVec3::new(x, y, z),
                };
            }

            if t_max_x < t_max_y && t_max_x < t_max_z {
                x += step_x;
                t = t_max_x;
                t_max_x += t_delta_x;
                last_normal = Vec3::new(-step_x as f32, 0.0, 0.0);
            } else if t_max_y < t_max_z {
                y += step_y;
                t = t_max_y;
                t_max_y += t_delta_y;
                last_normal = Vec3::new(0.0, -step_y as f32, 0.0);
            } else {
                z += step_z;
                t = t_max_z;
                t_max_z += t_delta_z;
                last_normal = Vec3::new(0.0, 0.0, -step_z as f32);
            }
        }
        RaycastHit::miss()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockRegistry;

    fn test_world(worker_count: usize) -> (World, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(BlockRegistry::empty());
        let world = World::new(registry, WorldGenConfig::default(), 42, dir.path().to_path_buf(), worker_count);
        (world, dir)
    }

    /// S1 (spec.md 8): ticking enough times activates every chunk within
    /// range and never exceeds `MAX_ACTIVE`.
    #[test]
    fn streaming_activates_chunks_in_range_and_respects_max_active() {
        let (world, _dir) = test_world(3);
        world.set_observer(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO);
        for _ in 0..4000 {
            world.tick(0.016);
            std::thread::yield_now();
        }
        assert!(world.active_count() > 0);
        assert!(world.active_count() <= MAX_ACTIVE);

        let origin_coord = ChunkCoord::from_world_xy(0, 0);
        let active = world.active.read();
        let origin_chunk = active.get(&origin_coord).expect("origin chunk should have activated");
        assert!(origin_chunk.is_complete());
    }

    /// Property 5 (spec.md 8): each tick performs at most one streaming
    /// action, so `active_count` changes by at most one chunk per tick
    /// once the job pipeline has drained (no partially-applied ticks).
    #[test]
    fn tick_performs_at_most_one_new_activation_while_jobs_are_in_flight() {
        let (world, _dir) = test_world(1);
        world.set_observer(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO);

        world.tick(0.016);
        let pending_after_one_tick = world.pending.lock().0.len();
        assert!(pending_after_one_tick <= 1);
    }

    /// Property 7 (spec.md 8): neighbor links are always symmetric once
    /// two adjacent chunks are both `Complete`.
    #[test]
    fn neighbor_links_are_symmetric_once_both_chunks_are_complete() {
        let (world, _dir) = test_world(3);
        world.set_observer(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO);
        for _ in 0..6000 {
            world.tick(0.016);
            std::thread::yield_now();
        }

        let active = world.active.read();
        for chunk in active.values() {
            if !chunk.is_complete() {
                continue;
            }
            for dir in Cardinal::ALL {
                if let Some(ncoord) = chunk.neighbor(dir) {
                    let neighbor = active.get(&ncoord).expect("linked neighbor must be resident");
                    assert_eq!(neighbor.neighbor(dir.opposite()), Some(chunk.coord));
                }
            }
        }
    }

    #[test]
    fn get_and_set_block_round_trip_on_a_complete_chunk() {
        let (world, _dir) = test_world(2);
        world.set_observer(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO);
        for _ in 0..2000 {
            world.tick(0.016);
            std::thread::yield_now();
            if world.get_block_type(IVec3::new(0, 0, 1)) != 0 || world.active_count() > 0 {
                let coord = ChunkCoord::from_world_xy(0, 0);
                let is_complete = world.active.read().get(&coord).map(|c| c.is_complete()).unwrap_or(false);
                if is_complete {
                    break;
                }
            }
        }

        let set_ok = world.set_block_type(IVec3::new(1, 1, 10), 1);
        assert!(set_ok);
        assert_eq!(world.get_block_type(IVec3::new(1, 1, 10)), 1);
    }

    #[test]
    fn raycast_returns_miss_with_zero_direction() {
        let (world, _dir) = test_world(1);
        let hit = world.raycast_voxel(Vec3::ZERO, Vec3::ZERO, 100.0);
        assert!(!hit.hit);
    }
}
