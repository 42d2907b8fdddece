//! Geometric value types used as query inputs
//!
//! Boxes, planes, frustums and spheres in whatever space the caller works in.
//! None of these types know about the tree; they are converted to the tree's
//! local space once per query by the query contexts.

use super::math::{box_push_out, safe_normal, transform_point, Mat3, Mat4, Vec3, SMALL_NUMBER};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given half-size
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point (boundary inclusive)
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Smallest AABB enclosing this box after an affine transform.
    pub fn transform_by(&self, matrix: &Mat4) -> Self {
        let center = transform_point(matrix, &self.center());
        let extents = self.extents();
        let linear = matrix.fixed_view::<3, 3>(0, 0).abs();
        Self::from_center_extents(center, linear * extents)
    }
}

/// Plane stored as `normal · p = w`
///
/// Points with a positive [`Plane::plane_dot`] lie on the side the normal
/// points to; frustum planes face outward, so positive means outside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Unit normal
    pub normal: Vec3,
    /// Distance from the origin along the normal
    pub w: f32,
}

impl Plane {
    /// Create a plane from a normal (normalized here) and distance
    pub fn new(normal: Vec3, w: f32) -> Self {
        let length = normal.norm();
        if length > 0.0 {
            Self { normal: normal / length, w: w / length }
        } else {
            Self { normal, w }
        }
    }

    /// Create a plane passing through `point` with the given unit normal
    pub fn from_point_normal(point: &Vec3, normal: &Vec3) -> Self {
        Self {
            normal: *normal,
            w: normal.dot(point),
        }
    }

    /// Signed distance from the plane to a point
    #[inline]
    pub fn plane_dot(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) - self.w
    }

    /// Distance an axis-aligned box of half-size `extent` reaches along the normal
    #[inline]
    pub fn push_out(&self, extent: &Vec3) -> f32 {
        box_push_out(&self.normal, extent)
    }

    /// Transform the plane by `matrix`, given its determinant and transpose-adjoint.
    ///
    /// The normal goes through the transpose-adjoint (flipped for mirroring
    /// transforms); a point on the plane goes through the matrix itself.
    pub fn transform_by_adjoint(&self, matrix: &Mat4, determinant: f32, transpose_adjoint: &Mat3) -> Self {
        let mut normal = safe_normal(&(transpose_adjoint * self.normal), SMALL_NUMBER);
        if determinant < 0.0 {
            normal = -normal;
        }
        // Closest point to the origin, valid for a normal of any length
        let length_squared = self.normal.norm_squared();
        let on_plane = if length_squared > 0.0 {
            self.normal * (self.w / length_squared)
        } else {
            Vec3::zeros()
        };
        Self::from_point_normal(&transform_point(matrix, &on_plane), &normal)
    }
}

/// Convex region bounded by outward-facing planes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    /// Bounding planes; an empty list bounds nothing
    pub planes: Vec<Plane>,
}

impl Frustum {
    /// Create a frustum from planes
    pub fn new(planes: Vec<Plane>) -> Self {
        Self { planes }
    }

    /// A frustum with no planes, containing all of space
    pub fn infinite() -> Self {
        Self::default()
    }

    /// Extract the six frustum planes from a view-projection matrix
    ///
    /// Uses the Gribb-Hartmann method for column-vector matrices with a
    /// `[0, 1]` clip depth range. Planes come out normalized and facing outward.
    /// A `[-1, 1]` projection such as `Mat4::new_perspective` pushes the near
    /// plane out to about twice its distance; remap its depth first.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let row = |i: usize| view_projection.row(i).transpose();
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        // Each combination c is >= 0 inside; flip it so positive means outside
        let outward = |c: nalgebra::Vector4<f32>| Plane::new(-c.xyz(), c.w);
        Self {
            planes: vec![
                outward(r3 + r0), // left
                outward(r3 - r0), // right
                outward(r3 + r1), // bottom
                outward(r3 - r1), // top
                outward(r2),      // near
                outward(r3 - r2), // far
            ],
        }
    }

    /// Conservative box test: false only if the box is fully outside some plane
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let center = aabb.center();
        let extents = aabb.extents();
        self.planes
            .iter()
            .all(|plane| plane.plane_dot(&center) <= plane.push_out(&extents))
    }
}

/// A bounding sphere for region queries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    /// The center position of the sphere
    pub center: Vec3,
    /// The radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// The cube circumscribing the sphere
    pub fn to_aabb(&self) -> Aabb {
        Aabb::from_center_extents(self.center, Vec3::repeat(self.radius))
    }
}
