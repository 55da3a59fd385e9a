pub mod topology;
pub mod geometry;
pub mod obj_writer;

pub use topology::{SimplexElement, SimplexMesh};
pub use geometry::Grid;
pub use obj_writer::{FrameExporter, ObjExporter, MemoryExporter, NullExporter};
