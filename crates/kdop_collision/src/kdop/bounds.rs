//! Axis-aligned bounding volume (a 6-DOP)
//!
//! One min/max interval per coordinate axis. An empty volume stores
//! `min = +inf`, `max = -inf` so that adding any point makes it valid.

use super::check::LocalSegment;
use super::index::KdopIndex;
use super::triangle::BuildTriangle;
use crate::foundation::geometry::{Aabb, Plane};
use crate::foundation::math::{box_push_out, Vec3};

/// Bounding volume of a tree node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kdop {
    /// Per-axis minimum
    pub min: Vec3,
    /// Per-axis maximum
    pub max: Vec3,
}

impl Default for Kdop {
    fn default() -> Self {
        Self::empty()
    }
}

impl Kdop {
    /// An empty volume that contains nothing
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// A volume from explicit bounds
    pub const fn from_bounds(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Minkowski sum of `other` with a box of half-size `extent`
    pub fn expanded(other: &Self, extent: &Vec3) -> Self {
        Self {
            min: other.min - extent,
            max: other.max + extent,
        }
    }

    /// Reset to the empty state
    pub fn init(&mut self) {
        *self = Self::empty();
    }

    /// Whether `min <= max` on every axis
    pub fn is_valid(&self) -> bool {
        (0..3).all(|axis| self.min[axis] <= self.max[axis])
    }

    /// Grow to include `point`
    #[inline]
    pub fn add_point(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Reset, then grow to cover every vertex of `triangles`
    pub fn add_triangles<I: KdopIndex>(&mut self, triangles: &[BuildTriangle<I>]) {
        self.init();
        for triangle in triangles {
            for vertex in &triangle.vertices {
                self.add_point(vertex);
            }
        }
    }

    /// Slab test of a local-space segment against this volume.
    ///
    /// Returns the parametric entry time in `[0, 1]`, or zero when the segment
    /// starts inside. The entry point is confirmed against the bounds widened
    /// by `fudge` so rounding at a face does not reject a grazing segment.
    pub fn line_check(&self, segment: &LocalSegment, fudge: f32) -> Option<f32> {
        let mut times = Vec3::zeros();
        let mut inside = true;

        for axis in 0..3 {
            let start = segment.start[axis];
            let dir = segment.dir[axis];
            if start < self.min[axis] {
                if dir <= 0.0 {
                    return None;
                }
                inside = false;
                times[axis] = (self.min[axis] - start) * segment.inv_dir[axis];
            } else if start > self.max[axis] {
                if dir >= 0.0 {
                    return None;
                }
                inside = false;
                times[axis] = (self.max[axis] - start) * segment.inv_dir[axis];
            }
        }

        if inside {
            return Some(0.0);
        }

        let hit_time = times.max();
        if !(0.0..=1.0).contains(&hit_time) {
            return None;
        }

        let hit = segment.start + segment.dir * hit_time;
        let within = (0..3).all(|axis| {
            hit[axis] > self.min[axis] - fudge && hit[axis] < self.max[axis] + fudge
        });
        within.then_some(hit_time)
    }

    /// Boundary-inclusive containment of a local point
    #[inline]
    pub fn point_check(&self, point: &Vec3) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    /// Boundary-inclusive overlap with a local-space box
    #[inline]
    pub fn aabb_overlap_check(&self, aabb: &Aabb) -> bool {
        (0..3).all(|axis| self.min[axis] <= aabb.max[axis] && aabb.min[axis] <= self.max[axis])
    }

    /// Conservative test against outward-facing planes.
    ///
    /// Fails only when the box lies entirely on the outside of some plane.
    /// An empty volume never passes.
    pub fn frustum_check(&self, planes: &[Plane]) -> bool {
        if !self.is_valid() {
            return false;
        }
        let extent = (self.max - self.min) * 0.5;
        let center = self.min + extent;
        planes
            .iter()
            .all(|plane| plane.plane_dot(&center) <= box_push_out(&plane.normal, &extent))
    }

    /// Whether `other` lies within this volume on every axis
    pub fn contains(&self, other: &Self) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.min[axis] && other.max[axis] <= self.max[axis])
    }

    /// The volume as a box, `None` when empty
    pub fn to_aabb(&self) -> Option<Aabb> {
        self.is_valid().then(|| Aabb::new(self.min, self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdop::triangle::CollisionTriangle;
    use approx::assert_relative_eq;

    fn unit_box() -> Kdop {
        Kdop::from_bounds(Vec3::zeros(), Vec3::repeat(1.0))
    }

    #[test]
    fn test_empty_volume_becomes_valid_after_one_point() {
        let mut volume = Kdop::empty();
        assert!(!volume.is_valid());
        volume.add_point(&Vec3::new(1.0, -2.0, 3.0));
        assert!(volume.is_valid());
        assert_eq!(volume.min, volume.max);
    }

    #[test]
    fn test_add_triangles_resets_first() {
        let mut volume = Kdop::from_bounds(Vec3::repeat(-100.0), Vec3::repeat(100.0));
        let triangle = BuildTriangle::new(
            CollisionTriangle::<u16>::default(),
            [Vec3::zeros(), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 1.0)],
        );
        volume.add_triangles(&[triangle]);
        assert_eq!(volume.min, Vec3::zeros());
        assert_eq!(volume.max, Vec3::new(2.0, 3.0, 1.0));
    }

    #[test]
    fn test_line_check_enters_from_outside() {
        let segment = LocalSegment::new(Vec3::new(-1.0, 0.5, 0.5), Vec3::new(3.0, 0.5, 0.5));
        let time = unit_box().line_check(&segment, 0.1).unwrap();
        assert_relative_eq!(time, 0.25);
    }

    #[test]
    fn test_line_check_inside_start_is_time_zero() {
        let segment = LocalSegment::new(Vec3::repeat(0.5), Vec3::repeat(5.0));
        assert_eq!(unit_box().line_check(&segment, 0.1), Some(0.0));
    }

    #[test]
    fn test_line_check_moving_away_misses() {
        let segment = LocalSegment::new(Vec3::new(-1.0, 0.5, 0.5), Vec3::new(-3.0, 0.5, 0.5));
        assert_eq!(unit_box().line_check(&segment, 0.1), None);
    }

    #[test]
    fn test_line_check_short_segment_misses() {
        let segment = LocalSegment::new(Vec3::new(-3.0, 0.5, 0.5), Vec3::new(-2.0, 0.5, 0.5));
        assert_eq!(unit_box().line_check(&segment, 0.1), None);
    }

    #[test]
    fn test_line_check_passing_beside_misses() {
        // Reaches x = 0 at y = 3, well outside the fudge band
        let segment = LocalSegment::new(Vec3::new(-1.0, 3.5, 0.5), Vec3::new(1.0, 2.5, 0.5));
        assert_eq!(unit_box().line_check(&segment, 0.1), None);
    }

    #[test]
    fn test_point_check_is_boundary_inclusive() {
        let volume = unit_box();
        assert!(volume.point_check(&Vec3::new(0.0, 0.5, 1.0)));
        assert!(!volume.point_check(&Vec3::new(-0.0001, 0.5, 0.5)));
    }

    #[test]
    fn test_expanded_is_minkowski_sum() {
        let volume = Kdop::expanded(&unit_box(), &Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(volume.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(volume.max, Vec3::new(2.0, 3.0, 1.0));
    }

    #[test]
    fn test_aabb_overlap_touching_faces() {
        let touching = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let apart = Aabb::new(Vec3::new(1.5, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(unit_box().aabb_overlap_check(&touching));
        assert!(!unit_box().aabb_overlap_check(&apart));
    }

    #[test]
    fn test_frustum_check_against_single_plane() {
        let keep_below_two = [Plane::new(Vec3::x(), 2.0)];
        let keep_below_minus_one = [Plane::new(Vec3::x(), -1.0)];
        assert!(unit_box().frustum_check(&keep_below_two));
        assert!(!unit_box().frustum_check(&keep_below_minus_one));
        assert!(unit_box().frustum_check(&[]));
        assert!(!Kdop::empty().frustum_check(&[]));
    }

    #[test]
    fn test_empty_volume_rejects_every_query() {
        let empty = Kdop::empty();
        let segment = LocalSegment::new(Vec3::repeat(-10.0), Vec3::repeat(10.0));
        assert_eq!(empty.line_check(&segment, 0.1), None);
        assert!(!empty.point_check(&Vec3::zeros()));
        assert!(!empty.aabb_overlap_check(&Aabb::new(Vec3::repeat(-1e6), Vec3::repeat(1e6))));
        assert!(empty.to_aabb().is_none());
    }
}
