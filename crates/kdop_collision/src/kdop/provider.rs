//! Geometry providers
//!
//! The tree stores only indices. A [`CollisionDataProvider`] resolves them to
//! positions and materials and supplies the transform between the tree's
//! local space and the world. [`StaticMeshCollision`] is the stock provider
//! for a mesh that owns its own vertices.

use super::check::{
    BoxCollisionCheck, FrustumQuery, LineCollisionCheck, PointCollisionCheck, SphereQuery, TraceFlags,
};
use super::index::KdopIndex;
use super::tree::KdopTree;
use super::triangle::{BuildTriangle, CollisionTriangle};
use crate::config::KdopConfig;
use crate::error::{KdopError, KdopResult};
use crate::foundation::geometry::{BoundingSphere, Frustum};
use crate::foundation::math::{determinant3, transpose_adjoint, Mat3, Mat4, Vec3};

/// Access to the mesh data behind a tree
pub trait CollisionDataProvider {
    /// Index width of the tree
    type Index: KdopIndex;
    /// Material handle returned with hits
    type Material: Copy;

    /// Local-space position of a vertex
    fn vertex(&self, index: Self::Index) -> Vec3;

    /// Material for a material index
    fn material(&self, index: Self::Index) -> Self::Material;

    /// The tree to query
    fn tree(&self) -> &KdopTree<Self::Index>;

    /// Local to world transform
    fn local_to_world(&self) -> Mat4;

    /// World to local transform
    fn world_to_local(&self) -> Mat4;

    /// Transpose-adjoint of the local to world transform, for normals
    fn local_to_world_transpose_adjoint(&self) -> Mat3;

    /// Determinant of the local to world transform; negative when mirrored
    fn determinant(&self) -> f32;
}

/// Nearest (or first) hit of a line or swept box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineHit<M> {
    /// Parametric time along the trace
    pub time: f32,
    /// World-space location of the trace at `time`
    pub location: Vec3,
    /// World-space surface normal
    pub normal: Vec3,
    /// Material of the hit triangle
    pub material: M,
}

/// Encroachment of a point with extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointHit<M> {
    /// World-space location that resolves the encroachment
    pub location: Vec3,
    /// World-space push-out direction
    pub normal: Vec3,
    /// Push-out distance in local units
    pub penetration: f32,
    /// Material of the encroached triangle
    pub material: M,
}

/// A static mesh with its own vertices, materials, tree and world transform
#[derive(Debug, Clone)]
pub struct StaticMeshCollision<I: KdopIndex, M: Copy> {
    vertices: Vec<Vec3>,
    materials: Vec<M>,
    tree: KdopTree<I>,
    local_to_world: Mat4,
    world_to_local: Mat4,
    transpose_adjoint: Mat3,
    determinant: f32,
}

impl<I: KdopIndex, M: Copy> StaticMeshCollision<I, M> {
    /// Build the tree for an indexed triangle mesh
    ///
    /// `material_per_triangle[i]` indexes `materials` for `triangles[i]`.
    /// The mesh starts at the identity transform.
    pub fn build(
        vertices: Vec<Vec3>,
        triangles: &[[u32; 3]],
        material_per_triangle: &[u32],
        materials: Vec<M>,
        config: KdopConfig,
    ) -> KdopResult<Self> {
        if material_per_triangle.len() != triangles.len() {
            return Err(KdopError::InvalidConfig(format!(
                "{} triangles but {} material assignments",
                triangles.len(),
                material_per_triangle.len()
            )));
        }

        let build_triangles = triangles
            .iter()
            .zip(material_per_triangle)
            .map(|(corners, &material)| {
                let indices = corners.map(|v| v as usize);
                let mut positions = [Vec3::zeros(); 3];
                for (position, &index) in positions.iter_mut().zip(&indices) {
                    *position = *vertices.get(index).ok_or(KdopError::VertexOutOfRange {
                        index,
                        count: vertices.len(),
                    })?;
                }
                let material = material as usize;
                if material >= materials.len() {
                    return Err(KdopError::InvalidConfig(format!(
                        "material index {material} out of range ({} materials)",
                        materials.len()
                    )));
                }
                Ok(BuildTriangle::new(CollisionTriangle::from_usize(indices, material)?, positions))
            })
            .collect::<KdopResult<Vec<_>>>()?;

        let tree = KdopTree::build(build_triangles, config)?;
        Ok(Self::with_identity(vertices, materials, tree))
    }

    /// Wrap an existing tree, checking its triangles reference valid data
    pub fn from_tree(vertices: Vec<Vec3>, materials: Vec<M>, tree: KdopTree<I>) -> KdopResult<Self> {
        for triangle in tree.triangles() {
            for index in triangle.vertex_indices() {
                if index >= vertices.len() {
                    return Err(KdopError::VertexOutOfRange {
                        index,
                        count: vertices.len(),
                    });
                }
            }
            if triangle.material_index.to_usize() >= materials.len() {
                return Err(KdopError::Corrupt(format!(
                    "material index {} out of range ({} materials)",
                    triangle.material_index.to_usize(),
                    materials.len()
                )));
            }
        }
        Ok(Self::with_identity(vertices, materials, tree))
    }

    fn with_identity(vertices: Vec<Vec3>, materials: Vec<M>, tree: KdopTree<I>) -> Self {
        Self {
            vertices,
            materials,
            tree,
            local_to_world: Mat4::identity(),
            world_to_local: Mat4::identity(),
            transpose_adjoint: Mat3::identity(),
            determinant: 1.0,
        }
    }

    /// Place the mesh in the world; singular transforms are rejected
    pub fn set_local_to_world(&mut self, local_to_world: Mat4) -> KdopResult<()> {
        let world_to_local = local_to_world
            .try_inverse()
            .ok_or_else(|| KdopError::InvalidConfig("local to world transform is singular".into()))?;
        self.local_to_world = local_to_world;
        self.world_to_local = world_to_local;
        self.transpose_adjoint = transpose_adjoint(&local_to_world);
        self.determinant = determinant3(&local_to_world);
        Ok(())
    }

    /// Builder form of [`Self::set_local_to_world`]
    pub fn with_local_to_world(mut self, local_to_world: Mat4) -> KdopResult<Self> {
        self.set_local_to_world(local_to_world)?;
        Ok(self)
    }

    /// Local-space vertices
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Material table
    pub fn materials(&self) -> &[M] {
        &self.materials
    }

    /// Trace a world-space segment
    pub fn line_check(&self, start: Vec3, end: Vec3, trace_flags: TraceFlags) -> Option<LineHit<M>> {
        let mut check = LineCollisionCheck::new(self, start, end, trace_flags);
        if !check.run() {
            return None;
        }
        Some(LineHit {
            time: check.result.time,
            location: check.hit_location(),
            normal: check.hit_normal(),
            material: check.result.material?,
        })
    }

    /// Sweep a world-aligned box of half-size `extent`
    pub fn box_check(&self, start: Vec3, end: Vec3, extent: Vec3, trace_flags: TraceFlags) -> Option<LineHit<M>> {
        let mut check = BoxCollisionCheck::new(self, start, end, extent, trace_flags);
        if !check.run() {
            return None;
        }
        Some(LineHit {
            time: check.line.result.time,
            location: check.hit_location(),
            normal: check.hit_normal(),
            material: check.line.result.material?,
        })
    }

    /// Test a world-aligned box of half-size `extent` at `location`
    pub fn point_check(&self, location: Vec3, extent: Vec3) -> Option<PointHit<M>> {
        let mut check = PointCollisionCheck::new(self, location, extent);
        if !check.run() {
            return None;
        }
        Some(PointHit {
            location: check.hit_location(),
            normal: check.hit_normal(),
            penetration: check.best_distance,
            material: check.box_check.line.result.material?,
        })
    }

    /// Candidate triangles (indices into the tree's triangle array) near a sphere
    pub fn sphere_query(&self, sphere: &BoundingSphere) -> Vec<usize> {
        let mut query = SphereQuery::new(self, sphere);
        query.run();
        query.triangles
    }

    /// Leaf node indices intersecting a world-space frustum
    pub fn frustum_query(&self, frustum: &Frustum) -> Vec<usize> {
        let mut query = FrustumQuery::new(self, frustum);
        query.run();
        query.leaves
    }

    /// Triangle indices held by the leaves intersecting a frustum
    pub fn frustum_triangles(&self, frustum: &Frustum) -> Vec<usize> {
        let mut query = FrustumQuery::new(self, frustum);
        if !query.run() {
            return Vec::new();
        }
        let mut triangles = Vec::with_capacity(query.triangle_count);
        for &leaf in &query.leaves {
            triangles.extend(self.tree.nodes()[leaf].triangle_range());
        }
        triangles
    }
}

impl<I: KdopIndex, M: Copy> CollisionDataProvider for StaticMeshCollision<I, M> {
    type Index = I;
    type Material = M;

    #[inline]
    fn vertex(&self, index: I) -> Vec3 {
        self.vertices[index.to_usize()]
    }

    #[inline]
    fn material(&self, index: I) -> M {
        self.materials[index.to_usize()]
    }

    fn tree(&self) -> &KdopTree<I> {
        &self.tree
    }

    fn local_to_world(&self) -> Mat4 {
        self.local_to_world
    }

    fn world_to_local(&self) -> Mat4 {
        self.world_to_local
    }

    fn local_to_world_transpose_adjoint(&self) -> Mat3 {
        self.transpose_adjoint
    }

    fn determinant(&self) -> f32 {
        self.determinant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad() -> StaticMeshCollision<u16, &'static str> {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ];
        StaticMeshCollision::build(
            vertices,
            &[[0, 1, 2], [0, 2, 3]],
            &[0, 1],
            vec!["stone", "grass"],
            KdopConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_line_check_reports_material_and_location() {
        let mesh = quad();
        let hit = mesh
            .line_check(Vec3::new(2.0, 7.0, 4.0), Vec3::new(2.0, 7.0, -4.0), TraceFlags::empty())
            .unwrap();
        assert_eq!(hit.material, "grass");
        assert_relative_eq!(hit.time, 0.5, epsilon = 1e-5);
        assert_relative_eq!(hit.location, Vec3::new(2.0, 7.0, 0.0), epsilon = 1e-4);
        assert_relative_eq!(hit.normal.z.abs(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_translated_mesh_is_hit_in_world_space() {
        let mesh = quad()
            .with_local_to_world(Mat4::new_translation(&Vec3::new(100.0, 0.0, 0.0)))
            .unwrap();
        assert!(mesh
            .line_check(Vec3::new(2.0, 2.0, 4.0), Vec3::new(2.0, 2.0, -4.0), TraceFlags::empty())
            .is_none());
        let hit = mesh
            .line_check(Vec3::new(102.0, 2.0, 4.0), Vec3::new(102.0, 2.0, -4.0), TraceFlags::empty())
            .unwrap();
        assert_relative_eq!(hit.location, Vec3::new(102.0, 2.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_box_check_stops_above_surface() {
        let mesh = quad();
        let hit = mesh
            .box_check(
                Vec3::new(5.0, 5.0, 10.0),
                Vec3::new(5.0, 5.0, -10.0),
                Vec3::repeat(1.0),
                TraceFlags::empty(),
            )
            .unwrap();
        assert_relative_eq!(hit.time, 0.45, epsilon = 1e-4);
        assert_relative_eq!(hit.location.z, 1.0, epsilon = 1e-3);
        assert_relative_eq!(hit.normal, Vec3::z(), epsilon = 1e-4);
    }

    #[test]
    fn test_point_check_pushes_out_of_surface() {
        let mesh = quad();
        let hit = mesh.point_check(Vec3::new(5.0, 5.0, 0.5), Vec3::repeat(1.0)).unwrap();
        assert_relative_eq!(hit.penetration, 0.5, epsilon = 1e-4);
        assert_relative_eq!(hit.normal, Vec3::z(), epsilon = 1e-4);
        assert_relative_eq!(hit.location, Vec3::new(5.0, 5.0, 1.0), epsilon = 1e-3);
        assert!(mesh.point_check(Vec3::new(5.0, 5.0, 3.0), Vec3::repeat(1.0)).is_none());
    }

    #[test]
    fn test_singular_transform_rejected() {
        let mut mesh = quad();
        let flat = Mat4::new_nonuniform_scaling(&Vec3::new(1.0, 1.0, 0.0));
        assert!(matches!(mesh.set_local_to_world(flat), Err(KdopError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_rejects_bad_indices() {
        let vertices = vec![Vec3::zeros(), Vec3::x(), Vec3::y()];
        let out_of_range = StaticMeshCollision::<u16, u8>::build(
            vertices.clone(),
            &[[0, 1, 3]],
            &[0],
            vec![0],
            KdopConfig::default(),
        );
        assert!(matches!(out_of_range, Err(KdopError::VertexOutOfRange { index: 3, count: 3 })));

        let bad_material =
            StaticMeshCollision::<u16, u8>::build(vertices, &[[0, 1, 2]], &[4], vec![0], KdopConfig::default());
        assert!(matches!(bad_material, Err(KdopError::InvalidConfig(_))));
    }
}
