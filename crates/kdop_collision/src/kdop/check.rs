//! Query contexts
//!
//! Each context moves its world-space inputs into the tree's local space once,
//! then carries the derived values and the running best hit through the
//! recursive traversal. A context lives for exactly one query.

use super::provider::CollisionDataProvider;
use crate::config::KdopConfig;
use crate::foundation::geometry::{Aabb, BoundingSphere, Frustum, Plane};
use crate::foundation::math::{
    reciprocal_or_zero, safe_normal, transform_point, transform_vector, transpose_adjoint, Vec3, SMALL_NUMBER,
};
use bitflags::bitflags;

bitflags! {
    /// Flags modifying how a trace searches the tree
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TraceFlags: u32 {
        /// Accept the first hit found instead of searching for the nearest
        const STOP_AT_ANY_HIT = 1 << 0;
    }
}

/// Best hit found so far by a trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckResult<M> {
    /// Parametric hit time along the trace, `f32::MAX` until something is hit
    pub time: f32,
    /// Material of the hit triangle
    pub material: Option<M>,
}

impl<M> Default for CheckResult<M> {
    fn default() -> Self {
        Self {
            time: f32::MAX,
            material: None,
        }
    }
}

/// Work counters for one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Nodes whose children or triangles were examined
    pub nodes_visited: usize,
    /// Exact triangle tests performed
    pub triangles_tested: usize,
}

/// A segment in the tree's local space with its derived direction terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalSegment {
    /// Segment start
    pub start: Vec3,
    /// Segment end
    pub end: Vec3,
    /// `end - start`
    pub dir: Vec3,
    /// Component-wise reciprocal of `dir`, zero where `dir` is zero
    pub inv_dir: Vec3,
}

impl LocalSegment {
    /// Derive the direction terms of a segment
    pub fn new(start: Vec3, end: Vec3) -> Self {
        let dir = end - start;
        Self {
            start,
            end,
            dir,
            inv_dir: reciprocal_or_zero(&dir),
        }
    }

    /// Point at parametric `time`
    #[inline]
    pub fn at(&self, time: f32) -> Vec3 {
        self.start + self.dir * time
    }
}

/// Move a local normal to world space, flipping it for mirrored transforms
fn world_normal<P: CollisionDataProvider>(provider: &P, local_normal: &Vec3) -> Vec3 {
    let normal = safe_normal(
        &(provider.local_to_world_transpose_adjoint() * local_normal),
        SMALL_NUMBER,
    );
    if provider.determinant() < 0.0 {
        -normal
    } else {
        normal
    }
}

/// Line (ray segment) check against a provider's tree
pub struct LineCollisionCheck<'a, P: CollisionDataProvider> {
    /// Geometry the tree indexes
    pub provider: &'a P,
    /// Tolerances read from the tree
    pub config: KdopConfig,
    /// World-space start
    pub start: Vec3,
    /// World-space end
    pub end: Vec3,
    /// Search modifiers
    pub trace_flags: TraceFlags,
    /// The segment in local space
    pub segment: LocalSegment,
    /// Normal of the best hit in local space
    pub local_hit_normal: Vec3,
    /// Best hit so far
    pub result: CheckResult<P::Material>,
    /// Work counters
    pub stats: QueryStats,
}

impl<'a, P: CollisionDataProvider> LineCollisionCheck<'a, P> {
    /// Set up a line check from world-space endpoints
    pub fn new(provider: &'a P, start: Vec3, end: Vec3, trace_flags: TraceFlags) -> Self {
        let world_to_local = provider.world_to_local();
        let segment = LocalSegment::new(
            transform_point(&world_to_local, &start),
            transform_point(&world_to_local, &end),
        );
        Self {
            provider,
            config: *provider.tree().config(),
            start,
            end,
            trace_flags,
            segment,
            local_hit_normal: Vec3::zeros(),
            result: CheckResult::default(),
            stats: QueryStats::default(),
        }
    }

    /// Run the check against the provider's tree
    pub fn run(&mut self) -> bool {
        let provider = self.provider;
        provider.tree().line_check(self)
    }

    /// Whether the search may stop at the first hit
    #[inline]
    pub fn stop_at_any_hit(&self) -> bool {
        self.trace_flags.contains(TraceFlags::STOP_AT_ANY_HIT)
    }

    /// Whether anything has been hit
    #[inline]
    pub fn has_hit(&self) -> bool {
        self.result.time <= 1.0
    }

    /// World-space normal of the best hit
    pub fn hit_normal(&self) -> Vec3 {
        world_normal(self.provider, &self.local_hit_normal)
    }

    /// World-space location of the best hit
    pub fn hit_location(&self) -> Vec3 {
        self.start + (self.end - self.start) * self.result.time
    }
}

/// Swept box check; the box is axis aligned in world space
pub struct BoxCollisionCheck<'a, P: CollisionDataProvider> {
    /// The sweep as a line check
    pub line: LineCollisionCheck<'a, P>,
    /// World-space half-size of the box
    pub extent: Vec3,
    /// Half-size of the local box enclosing the transformed box
    pub local_extent: Vec3,
    /// World box axes in local space
    pub local_box_axes: [Vec3; 3],
}

impl<'a, P: CollisionDataProvider> BoxCollisionCheck<'a, P> {
    /// Set up a swept box check from world-space endpoints and half-size
    pub fn new(provider: &'a P, start: Vec3, end: Vec3, extent: Vec3, trace_flags: TraceFlags) -> Self {
        let line = LineCollisionCheck::new(provider, start, end, trace_flags);
        let world_to_local = provider.world_to_local();
        let local_extent = Aabb::new(-extent, extent).transform_by(&world_to_local).extents();
        let local_box_axes = [
            transform_vector(&world_to_local, &Vec3::x()),
            transform_vector(&world_to_local, &Vec3::y()),
            transform_vector(&world_to_local, &Vec3::z()),
        ];
        Self {
            line,
            extent,
            local_extent,
            local_box_axes,
        }
    }

    /// Run the check against the provider's tree
    pub fn run(&mut self) -> bool {
        let provider = self.line.provider;
        provider.tree().box_check(self)
    }

    /// World-space normal of the best hit
    pub fn hit_normal(&self) -> Vec3 {
        self.line.hit_normal()
    }

    /// World-space location of the box center at the best hit
    pub fn hit_location(&self) -> Vec3 {
        self.line.hit_location()
    }
}

/// Point plus extent encroachment check
pub struct PointCollisionCheck<'a, P: CollisionDataProvider> {
    /// The point as a zero-length box sweep
    pub box_check: BoxCollisionCheck<'a, P>,
    /// Smallest push-out distance found so far
    pub best_distance: f32,
}

impl<'a, P: CollisionDataProvider> PointCollisionCheck<'a, P> {
    /// Set up a point check at a world-space location
    pub fn new(provider: &'a P, location: Vec3, extent: Vec3) -> Self {
        let box_check = BoxCollisionCheck::new(provider, location, location, extent, TraceFlags::empty());
        let best_distance = box_check.line.config.initial_push_out_distance;
        Self {
            box_check,
            best_distance,
        }
    }

    /// Run the check against the provider's tree
    pub fn run(&mut self) -> bool {
        let provider = self.box_check.line.provider;
        provider.tree().point_check(self)
    }

    /// World-space push-out direction of the best hit
    pub fn hit_normal(&self) -> Vec3 {
        self.box_check.line.hit_normal()
    }

    /// World-space location the point must move to in order to stop encroaching
    pub fn hit_location(&self) -> Vec3 {
        let line = &self.box_check.line;
        transform_point(
            &line.provider.local_to_world(),
            &(line.segment.start + line.local_hit_normal * self.best_distance),
        )
    }
}

/// Collects candidate triangles near a sphere
pub struct SphereQuery<'a, P: CollisionDataProvider> {
    /// Geometry the tree indexes
    pub provider: &'a P,
    /// Local box enclosing the sphere
    pub local_box: Aabb,
    /// Indices into the tree's triangle array
    pub triangles: Vec<usize>,
    /// Work counters
    pub stats: QueryStats,
}

impl<'a, P: CollisionDataProvider> SphereQuery<'a, P> {
    /// Set up a query for a world-space sphere
    pub fn new(provider: &'a P, sphere: &BoundingSphere) -> Self {
        Self {
            provider,
            local_box: sphere.to_aabb().transform_by(&provider.world_to_local()),
            triangles: Vec::new(),
            stats: QueryStats::default(),
        }
    }

    /// Run the query against the provider's tree
    pub fn run(&mut self) -> bool {
        let provider = self.provider;
        provider.tree().sphere_query(self);
        !self.triangles.is_empty()
    }
}

/// Collects leaves that intersect a frustum
pub struct FrustumQuery<'a, P: CollisionDataProvider> {
    /// Geometry the tree indexes
    pub provider: &'a P,
    /// Frustum planes in local space
    pub local_planes: Vec<Plane>,
    /// Indices of intersecting leaf nodes
    pub leaves: Vec<usize>,
    /// Total triangles held by the returned leaves
    pub triangle_count: usize,
    /// Work counters
    pub stats: QueryStats,
}

impl<'a, P: CollisionDataProvider> FrustumQuery<'a, P> {
    /// Set up a query for a world-space frustum
    pub fn new(provider: &'a P, frustum: &Frustum) -> Self {
        let world_to_local = provider.world_to_local();
        let world_to_local_ta = transpose_adjoint(&world_to_local);
        let determinant = provider.determinant();
        let local_planes = frustum
            .planes
            .iter()
            .map(|plane| plane.transform_by_adjoint(&world_to_local, determinant, &world_to_local_ta))
            .collect();
        Self {
            provider,
            local_planes,
            leaves: Vec::new(),
            triangle_count: 0,
            stats: QueryStats::default(),
        }
    }

    /// Run the query against the provider's tree
    pub fn run(&mut self) -> bool {
        let provider = self.provider;
        provider.tree().frustum_query(self)
    }

    /// Record an intersecting leaf
    pub(crate) fn add_leaf(&mut self, node_index: usize, num_triangles: usize) {
        self.leaves.push(node_index);
        self.triangle_count += num_triangles;
    }
}
