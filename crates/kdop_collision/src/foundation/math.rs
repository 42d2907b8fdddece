//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the handful of matrix helpers the collision
//! code needs: affine point/vector transforms, the transpose-adjoint used to
//! move normals and planes, and the box push-out distance.

pub use nalgebra::{Matrix3, Matrix4, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Squared length below which a vector is treated as having no direction.
pub const SMALL_NUMBER: f32 = 1e-8;

/// Transform a position by an affine matrix (translation included).
#[inline]
pub fn transform_point(matrix: &Mat4, point: &Vec3) -> Vec3 {
    matrix.transform_point(&Point3::from(*point)).coords
}

/// Transform a direction by the linear part of a matrix (translation ignored).
#[inline]
pub fn transform_vector(matrix: &Mat4, vector: &Vec3) -> Vec3 {
    matrix.transform_vector(vector)
}

/// Cofactor matrix of the upper 3x3 block, `det(A) * A^-T`.
///
/// Multiplying a surface normal by this keeps it perpendicular to the
/// transformed surface under non-uniform scale, and unlike the inverse
/// transpose it stays finite for singular matrices.
pub fn transpose_adjoint(matrix: &Mat4) -> Mat3 {
    let a0 = Vec3::new(matrix.m11, matrix.m21, matrix.m31);
    let a1 = Vec3::new(matrix.m12, matrix.m22, matrix.m32);
    let a2 = Vec3::new(matrix.m13, matrix.m23, matrix.m33);
    Mat3::from_columns(&[a1.cross(&a2), a2.cross(&a0), a0.cross(&a1)])
}

/// Determinant of the upper 3x3 block.
pub fn determinant3(matrix: &Mat4) -> f32 {
    matrix.fixed_view::<3, 3>(0, 0).determinant()
}

/// Normalize `vector`, or return zero if its squared length is below `tolerance`.
#[inline]
pub fn safe_normal(vector: &Vec3, tolerance: f32) -> Vec3 {
    let length_squared = vector.norm_squared();
    if length_squared < tolerance {
        Vec3::zeros()
    } else {
        vector / length_squared.sqrt()
    }
}

/// Distance a box with half-size `extent` reaches along `normal`.
#[inline]
pub fn box_push_out(normal: &Vec3, extent: &Vec3) -> f32 {
    (normal.x * extent.x).abs() + (normal.y * extent.y).abs() + (normal.z * extent.z).abs()
}

/// Component-wise reciprocal, mapping zero components to zero.
#[inline]
pub fn reciprocal_or_zero(vector: &Vec3) -> Vec3 {
    vector.map(|c| if c == 0.0 { 0.0 } else { 1.0 / c })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transpose_adjoint_matches_scaled_inverse_transpose() {
        let matrix = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 3.0, 4.0))
            * Mat4::from_axis_angle(&Vec3::z_axis(), 0.7);
        let ta = transpose_adjoint(&matrix);
        let det = determinant3(&matrix);
        let expected = matrix
            .fixed_view::<3, 3>(0, 0)
            .clone_owned()
            .try_inverse()
            .unwrap()
            .transpose()
            * det;
        assert_relative_eq!(ta, expected, epsilon = 1e-4);
    }

    #[test]
    fn test_normal_stays_perpendicular_under_nonuniform_scale() {
        let matrix = Mat4::new_nonuniform_scaling(&Vec3::new(1.0, 5.0, 1.0));
        // Plane x + y = 0 contains the direction (1, -1, 0)
        let tangent = transform_vector(&matrix, &Vec3::new(1.0, -1.0, 0.0));
        let normal = transpose_adjoint(&matrix) * Vec3::new(1.0, 1.0, 0.0);
        assert_relative_eq!(tangent.dot(&normal), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_safe_normal_degenerate() {
        assert_eq!(safe_normal(&Vec3::zeros(), SMALL_NUMBER), Vec3::zeros());
        assert_relative_eq!(safe_normal(&Vec3::new(0.0, 3.0, 0.0), SMALL_NUMBER), Vec3::y());
    }

    #[test]
    fn test_mirror_has_negative_determinant() {
        let mirror = Mat4::new_nonuniform_scaling(&Vec3::new(-1.0, 1.0, 1.0));
        assert!(determinant3(&mirror) < 0.0);
        assert_relative_eq!(transform_point(&mirror, &Vec3::new(2.0, 1.0, 0.0)), Vec3::new(-2.0, 1.0, 0.0));
    }

    #[test]
    fn test_box_push_out() {
        assert_relative_eq!(box_push_out(&Vec3::new(0.0, -1.0, 0.0), &Vec3::new(1.0, 2.0, 3.0)), 2.0);
        assert_eq!(reciprocal_or_zero(&Vec3::new(0.0, 2.0, -4.0)), Vec3::new(0.0, 0.5, -0.25));
    }
}
