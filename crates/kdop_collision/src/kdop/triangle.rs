//! Triangle records stored in the tree and the transient build triangles

use super::index::KdopIndex;
use crate::error::KdopResult;
use crate::foundation::math::Vec3;

/// One source triangle: three vertex indices and a material index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CollisionTriangle<I: KdopIndex> {
    /// First vertex index
    pub v1: I,
    /// Second vertex index
    pub v2: I,
    /// Third vertex index
    pub v3: I,
    /// Material index
    pub material_index: I,
}

impl<I: KdopIndex> CollisionTriangle<I> {
    /// Create a triangle record
    pub const fn new(v1: I, v2: I, v3: I, material_index: I) -> Self {
        Self {
            v1,
            v2,
            v3,
            material_index,
        }
    }

    /// Create a triangle record from `usize` indices, checking each fits
    pub fn from_usize(vertices: [usize; 3], material_index: usize) -> KdopResult<Self> {
        Ok(Self {
            v1: I::checked("vertex index", vertices[0])?,
            v2: I::checked("vertex index", vertices[1])?,
            v3: I::checked("vertex index", vertices[2])?,
            material_index: I::checked("material index", material_index)?,
        })
    }

    /// Vertex indices widened to `usize`
    #[inline]
    pub fn vertex_indices(&self) -> [usize; 3] {
        [self.v1.to_usize(), self.v2.to_usize(), self.v3.to_usize()]
    }
}

/// A triangle with its resolved positions, alive only while building
#[derive(Debug, Clone, Copy)]
pub struct BuildTriangle<I: KdopIndex> {
    /// The record that ends up in the tree
    pub triangle: CollisionTriangle<I>,
    /// Vertex positions in the tree's local space
    pub vertices: [Vec3; 3],
    /// Mean of the three vertices
    pub centroid: Vec3,
}

impl<I: KdopIndex> BuildTriangle<I> {
    /// Resolve a build triangle, computing its centroid
    pub fn new(triangle: CollisionTriangle<I>, vertices: [Vec3; 3]) -> Self {
        let centroid = (vertices[0] + vertices[1] + vertices[2]) / 3.0;
        Self {
            triangle,
            vertices,
            centroid,
        }
    }
}
