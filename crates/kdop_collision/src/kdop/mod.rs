//! kDOP bounding volume hierarchy
//!
//! A static tree of axis-aligned volumes over a triangle mesh. Nodes live in
//! one flat array and refer to their children by index; leaves own contiguous
//! runs of the triangle array. Queries run through per-query contexts that
//! move their inputs into the mesh's local space once up front.
//!
//! | Query   | Result                  | Pruning                      | Leaf test              |
//! |---------|-------------------------|------------------------------|------------------------|
//! | Line    | nearest or any hit      | slab test                    | plane and edges        |
//! | Box     | nearest or any hit      | slab test on widened volumes | separating axes        |
//! | Point   | smallest push-out       | widened volume containment   | separating axes        |
//! | Sphere  | candidate triangles     | box overlap                  | none                   |
//! | Frustum | intersecting leaves     | planes against box           | none                   |

pub mod archive;
pub mod bounds;
pub mod check;
pub mod index;
pub mod node;
pub mod provider;
pub mod sat;
pub mod tree;
pub mod triangle;

#[cfg(test)]
mod tests;

pub use archive::FormatVersion;
pub use bounds::Kdop;
pub use check::{
    BoxCollisionCheck, CheckResult, FrustumQuery, LineCollisionCheck, LocalSegment, PointCollisionCheck, QueryStats,
    SphereQuery, TraceFlags,
};
pub use index::KdopIndex;
pub use node::{KdopNode, NodeKind};
pub use provider::{CollisionDataProvider, LineHit, PointHit, StaticMeshCollision};
pub use tree::{KdopTree, TreeStats};
pub use triangle::{BuildTriangle, CollisionTriangle};
