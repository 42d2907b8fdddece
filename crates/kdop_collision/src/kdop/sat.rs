//! Separating axis tests between a triangle and an oriented box
//!
//! The box is given by its half-size and its three axes, both in the
//! triangle's space. Candidate axes are the triangle normal, the box axes and
//! the cross products of triangle edges with box axes; a sweep additionally
//! tests the sweep direction crossed with every edge of both shapes.

use crate::foundation::math::{safe_normal, Vec3, SMALL_NUMBER};

/// Tolerances for the separating axis tests
#[derive(Debug, Clone, Copy)]
pub struct SatTolerance {
    /// Axes with a squared length below this are skipped
    pub axis_epsilon: f32,
    /// Projected sweep lengths below this count as parallel to the axis
    pub parallel_epsilon: f32,
}

/// A box swept from `start` to `end`
#[derive(Debug, Clone, Copy)]
pub struct SweptBox<'a> {
    /// Box center at time zero
    pub start: Vec3,
    /// Box center at time one
    pub end: Vec3,
    /// Half-size along each box axis
    pub extent: Vec3,
    /// Box axes
    pub axes: &'a [Vec3; 3],
}

/// First contact of a swept box with a triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepContact {
    /// Parametric contact time, zero when already touching at the start
    pub time: f32,
    /// Unit normal of the contact, facing the box
    pub normal: Vec3,
}

/// Minimal push-out of a box-extended point from a triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPenetration {
    /// Push-out distance
    pub distance: f32,
    /// Unit push-out direction, zero if no axis beat the starting distance
    pub normal: Vec3,
}

#[inline]
fn projected_extent(axis: &Vec3, extent: &Vec3, box_axes: &[Vec3; 3]) -> f32 {
    extent.x * axis.dot(&box_axes[0]).abs()
        + extent.y * axis.dot(&box_axes[1]).abs()
        + extent.z * axis.dot(&box_axes[2]).abs()
}

#[inline]
fn projected_triangle(axis: &Vec3, triangle: &[Vec3; 3]) -> (f32, f32) {
    let p0 = axis.dot(&triangle[0]);
    let p1 = axis.dot(&triangle[1]);
    let p2 = axis.dot(&triangle[2]);
    (p0.min(p1).min(p2), p0.max(p1).max(p2))
}

fn edges(triangle: &[Vec3; 3]) -> [Vec3; 3] {
    [
        triangle[1] - triangle[0],
        triangle[2] - triangle[1],
        triangle[0] - triangle[2],
    ]
}

/// Overlap interval of a sweep, narrowed one axis at a time
struct SweepInterval {
    min_time: f32,
    max_time: f32,
    normal: Vec3,
    /// Shallowest way out of the triangle at the sweep start
    start_depth: f32,
    /// Unit direction of that way out, facing the box
    start_normal: Vec3,
}

impl SweepInterval {
    /// Narrow the interval by one axis; false once the axis separates the shapes
    fn test_axis(&mut self, axis: &Vec3, triangle: &[Vec3; 3], sweep: &SweptBox<'_>, tolerance: &SatTolerance) -> bool {
        if axis.norm_squared() < tolerance.axis_epsilon {
            return true;
        }

        let start = axis.dot(&sweep.start);
        let dir = axis.dot(&(sweep.end - sweep.start));
        let reach = projected_extent(axis, &sweep.extent, sweep.axes);
        let (low, high) = projected_triangle(axis, triangle);
        let (low, high) = (low - reach, high + reach);

        let inv_length = 1.0 / axis.norm();
        let below = (start - low) * inv_length;
        let above = (high - start) * inv_length;
        if below.min(above) < self.start_depth {
            self.start_depth = below.min(above);
            self.start_normal = if below < above { -axis * inv_length } else { axis * inv_length };
        }

        if dir.abs() < tolerance.parallel_epsilon {
            return start >= low && start <= high;
        }

        let inv_dir = 1.0 / dir;
        let (entry, exit, normal) = if dir > 0.0 {
            ((low - start) * inv_dir, (high - start) * inv_dir, -axis)
        } else {
            ((high - start) * inv_dir, (low - start) * inv_dir, *axis)
        };

        if entry > self.min_time {
            self.min_time = entry;
            self.normal = normal;
        }
        self.max_time = self.max_time.min(exit);

        self.max_time >= self.min_time && self.min_time <= 1.0 && self.max_time >= 0.0
    }
}

/// Sweep a box against a triangle.
///
/// Returns the earliest contact in `[0, 1]`, or `None` if some axis keeps the
/// shapes apart for the whole sweep. A box that already overlaps the triangle
/// at the start is only blocked, at time zero, when it moves deeper along its
/// shallowest way out; otherwise it is free to leave.
pub fn find_separating_axis(triangle: &[Vec3; 3], sweep: &SweptBox<'_>, tolerance: &SatTolerance) -> Option<SweepContact> {
    let triangle_edges = edges(triangle);
    let triangle_normal = triangle_edges[0].cross(&triangle_edges[1]);
    let sweep_dir = sweep.end - sweep.start;

    let mut interval = SweepInterval {
        min_time: f32::MIN,
        max_time: f32::MAX,
        normal: Vec3::zeros(),
        start_depth: f32::MAX,
        start_normal: Vec3::zeros(),
    };

    let mut axes = Vec::with_capacity(19);
    axes.push(triangle_normal);
    axes.extend(sweep.axes.iter().copied());
    for edge in &triangle_edges {
        for box_axis in sweep.axes {
            axes.push(edge.cross(box_axis));
        }
    }
    for edge in triangle_edges.iter().chain(sweep.axes.iter()) {
        axes.push(edge.cross(&sweep_dir));
    }

    for axis in &axes {
        if !interval.test_axis(axis, triangle, sweep, tolerance) {
            return None;
        }
    }

    if interval.min_time < 0.0 {
        // Already overlapping at the start
        let normal = interval.start_normal;
        if normal == Vec3::zeros() || sweep_dir.dot(&normal) >= 0.0 {
            return None;
        }
        return Some(SweepContact { time: 0.0, normal });
    }

    Some(SweepContact {
        time: interval.min_time,
        normal: safe_normal(&interval.normal, SMALL_NUMBER),
    })
}

/// Smallest push-out of a point with box extent that is encroaching a triangle.
///
/// `best_distance` seeds the search; the returned distance only beats it when
/// an axis offered a shorter way out. Returns `None` if any axis separates the
/// point from the triangle.
pub fn point_penetration(
    triangle: &[Vec3; 3],
    point: &Vec3,
    extent: &Vec3,
    box_axes: &[Vec3; 3],
    best_distance: f32,
    tolerance: &SatTolerance,
) -> Option<PointPenetration> {
    let triangle_edges = edges(triangle);
    let mut best = PointPenetration {
        distance: best_distance,
        normal: Vec3::zeros(),
    };

    let mut axes = Vec::with_capacity(13);
    axes.push(triangle_edges[0].cross(&triangle_edges[1]));
    axes.extend(box_axes.iter().copied());
    for edge in &triangle_edges {
        for box_axis in box_axes {
            axes.push(edge.cross(box_axis));
        }
    }

    for axis in &axes {
        let length_squared = axis.norm_squared();
        if length_squared < tolerance.axis_epsilon {
            continue;
        }

        let projected = axis.dot(point);
        let reach = projected_extent(axis, extent, box_axes);
        let (low, high) = projected_triangle(axis, triangle);
        let (low, high) = (low - reach, high + reach);
        if projected < low || projected > high {
            return None;
        }

        let inv_length = 1.0 / length_squared.sqrt();
        let below = (projected - low) * inv_length;
        let above = (high - projected) * inv_length;
        if below < best.distance && below <= above {
            best = PointPenetration {
                distance: below,
                normal: -axis * inv_length,
            };
        } else if above < best.distance {
            best = PointPenetration {
                distance: above,
                normal: axis * inv_length,
            };
        }
    }

    Some(best)
}
