//! Voxel world streaming runtime: chunk lifecycle, terrain generation,
//! meshing, and save format.

pub mod block;
pub mod chunk;
pub mod job;
pub mod mesh;
pub mod save;
pub mod terrain;
pub mod world;

/// Commonly used types, re-exported for binaries and integration tests.
pub mod prelude {
    pub use crate::block::{Block, BlockDefinition, BlockRegistry};
    pub use crate::chunk::{Cardinal, Chunk, ChunkCoord, ChunkState};
    pub use crate::job::{Job, JobContext, JobOutcome, JobPipeline};
    pub use crate::mesh::{MeshData, Vertex};
    pub use crate::terrain::{BlockPalette, WorldGenConfig};
    pub use crate::world::World;

    pub use glam::{IVec3, Vec2, Vec3, Vec4};
    pub use parking_lot::{Mutex, RwLock};
}

/// Current crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
