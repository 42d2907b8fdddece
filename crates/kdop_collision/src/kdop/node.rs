//! Tree nodes: the recursive build and the per-node query traversals

use super::bounds::Kdop;
use super::check::{BoxCollisionCheck, FrustumQuery, LineCollisionCheck, PointCollisionCheck, SphereQuery};
use super::index::KdopIndex;
use super::provider::CollisionDataProvider;
use super::sat::{find_separating_axis, point_penetration, SatTolerance, SweptBox};
use super::tree::KdopTree;
use super::triangle::BuildTriangle;
use crate::error::KdopResult;
use crate::foundation::geometry::Plane;
use crate::foundation::math::{safe_normal, Vec3, SMALL_NUMBER};

/// What a node holds besides its volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind<I: KdopIndex> {
    /// A contiguous run of the tree's triangles
    Leaf {
        /// Number of triangles in the run
        num_triangles: I,
        /// First triangle of the run
        start_index: I,
    },
    /// Two children in the tree's node array
    Internal {
        /// Left child node index
        left: I,
        /// Right child node index
        right: I,
    },
}

/// A node of the tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KdopNode<I: KdopIndex> {
    /// Union of everything below this node
    pub bounding_volume: Kdop,
    /// Leaf run or child links
    pub kind: NodeKind<I>,
}

impl<I: KdopIndex> Default for KdopNode<I> {
    fn default() -> Self {
        Self::empty_leaf()
    }
}

/// Children of an internal node ordered by volume entry time
type NearFar = (Option<(usize, f32)>, Option<(usize, f32)>);

fn order_children(left: (usize, Option<f32>), right: (usize, Option<f32>)) -> NearFar {
    match (left, right) {
        ((l, Some(lt)), (r, Some(rt))) if rt < lt => (Some((r, rt)), Some((l, lt))),
        ((l, Some(lt)), (r, Some(rt))) => (Some((l, lt)), Some((r, rt))),
        ((l, Some(lt)), (_, None)) => (Some((l, lt)), None),
        ((_, None), (r, Some(rt))) => (Some((r, rt)), None),
        _ => (None, None),
    }
}

/// Choose the split axis and value: the axis of largest centroid variance, at its mean
fn splatter_split<I: KdopIndex>(triangles: &[BuildTriangle<I>]) -> (usize, f32) {
    let count = triangles.len() as f32;
    let mut best_axis = 0;
    let mut best_mean = 0.0;
    let mut best_variance = 0.0;

    for axis in 0..3 {
        let mean = triangles.iter().map(|t| t.centroid[axis]).sum::<f32>() / count;
        let variance = triangles
            .iter()
            .map(|t| {
                let d = t.centroid[axis] - mean;
                d * d
            })
            .sum::<f32>()
            / count;
        if variance >= best_variance {
            best_axis = axis;
            best_variance = variance;
            best_mean = mean;
        }
    }

    (best_axis, best_mean)
}

/// Partition in place so centroids `<= split` come first; returns the first index of the upper group
fn partition<I: KdopIndex>(triangles: &mut [BuildTriangle<I>], axis: usize, split: f32) -> usize {
    let mut left = 0;
    let mut right = triangles.len();
    while left < right {
        if triangles[left].centroid[axis] <= split {
            left += 1;
        } else {
            right -= 1;
            triangles.swap(left, right);
        }
    }
    left
}

impl<I: KdopIndex> KdopNode<I> {
    /// A leaf with no triangles and an empty volume
    pub fn empty_leaf() -> Self {
        Self {
            bounding_volume: Kdop::empty(),
            kind: NodeKind::Leaf {
                num_triangles: I::default(),
                start_index: I::default(),
            },
        }
    }

    /// Whether this node holds triangles directly
    #[inline]
    pub const fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Triangle run of a leaf as `start..end`, empty for internal nodes
    pub fn triangle_range(&self) -> std::ops::Range<usize> {
        match self.kind {
            NodeKind::Leaf {
                num_triangles,
                start_index,
            } => {
                let start = start_index.to_usize();
                start..start + num_triangles.to_usize()
            }
            NodeKind::Internal { .. } => 0..0,
        }
    }

    /// Recursively split `build[start..start + count]` below the node at `index`.
    ///
    /// Children are appended to `nodes` as a consecutive pair. Returns the
    /// depth of the deepest leaf created.
    pub(crate) fn split_triangle_list(
        nodes: &mut Vec<Self>,
        index: usize,
        start: usize,
        count: usize,
        build: &mut [BuildTriangle<I>],
        leaf_threshold: usize,
        depth: usize,
    ) -> KdopResult<usize> {
        let run = &mut build[start..start + count];
        nodes[index].bounding_volume.add_triangles(run);

        if count <= leaf_threshold {
            nodes[index].kind = NodeKind::Leaf {
                num_triangles: I::checked("leaf triangle count", count)?,
                start_index: I::checked("triangle start index", start)?,
            };
            return Ok(depth);
        }

        let (axis, mean) = splatter_split(run);
        let mut split = partition(run, axis, mean);
        if split == 0 || split == count {
            log::trace!(
                "Forced midpoint split of {count} triangles at depth {depth} (axis {axis}, mean {mean})"
            );
            split = count / 2;
        }

        let left = nodes.len();
        let right = left + 1;
        nodes[index].kind = NodeKind::Internal {
            left: I::checked("node index", left)?,
            right: I::checked("node index", right)?,
        };
        nodes.push(Self::empty_leaf());
        nodes.push(Self::empty_leaf());

        let left_depth = Self::split_triangle_list(nodes, left, start, split, build, leaf_threshold, depth + 1)?;
        let right_depth =
            Self::split_triangle_list(nodes, right, start + split, count - split, build, leaf_threshold, depth + 1)?;
        Ok(left_depth.max(right_depth))
    }

    /// Line check below this node, nearest child first
    pub(crate) fn line_check<P>(&self, tree: &KdopTree<I>, check: &mut LineCollisionCheck<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        check.stats.nodes_visited += 1;
        let NodeKind::Internal { left, right } = self.kind else {
            return self.line_check_triangles(tree, check);
        };

        let fudge = check.config.fudge_size;
        let (left, right) = (left.to_usize(), right.to_usize());
        let nodes = tree.nodes();
        let (near, far) = order_children(
            (left, nodes[left].bounding_volume.line_check(&check.segment, fudge)),
            (right, nodes[right].bounding_volume.line_check(&check.segment, fudge)),
        );

        let mut hit = false;
        if let Some((near, near_time)) = near {
            if check.result.time > near_time {
                hit = nodes[near].line_check(tree, check);
            }
        }
        if let Some((far, far_time)) = far {
            if (check.result.time > far_time || !hit) && (!hit || !check.stop_at_any_hit()) {
                hit |= nodes[far].line_check(tree, check);
            }
        }
        hit
    }

    fn line_check_triangles<P>(&self, tree: &KdopTree<I>, check: &mut LineCollisionCheck<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        let mut hit = false;
        for triangle in &tree.triangles()[self.triangle_range()] {
            if hit && check.stop_at_any_hit() {
                break;
            }
            let provider = check.provider;
            let vertices = [
                provider.vertex(triangle.v1),
                provider.vertex(triangle.v2),
                provider.vertex(triangle.v3),
            ];
            hit |= line_check_triangle(check, &vertices, triangle.material_index);
        }
        hit
    }

    /// Swept box check below this node; volumes are widened by the box extent
    pub(crate) fn box_check<P>(&self, tree: &KdopTree<I>, check: &mut BoxCollisionCheck<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        check.line.stats.nodes_visited += 1;
        let NodeKind::Internal { left, right } = self.kind else {
            return self.box_check_triangles(tree, check);
        };

        let fudge = check.line.config.fudge_size;
        let (left, right) = (left.to_usize(), right.to_usize());
        let nodes = tree.nodes();
        let entry_time = |node: usize| {
            Kdop::expanded(&nodes[node].bounding_volume, &check.local_extent).line_check(&check.line.segment, fudge)
        };
        let (near, far) = order_children((left, entry_time(left)), (right, entry_time(right)));

        let mut hit = false;
        if let Some((near, near_time)) = near {
            if check.line.result.time > near_time {
                hit = nodes[near].box_check(tree, check);
            }
        }
        if let Some((far, far_time)) = far {
            if (check.line.result.time > far_time || !hit) && (!hit || !check.line.stop_at_any_hit()) {
                hit |= nodes[far].box_check(tree, check);
            }
        }
        hit
    }

    fn box_check_triangles<P>(&self, tree: &KdopTree<I>, check: &mut BoxCollisionCheck<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        let tolerance = SatTolerance {
            axis_epsilon: check.line.config.separating_axis_epsilon,
            parallel_epsilon: check.line.config.parallel_epsilon,
        };
        let mut hit = false;
        for triangle in &tree.triangles()[self.triangle_range()] {
            if hit && check.line.stop_at_any_hit() {
                break;
            }
            check.line.stats.triangles_tested += 1;
            let provider = check.line.provider;
            let vertices = [
                provider.vertex(triangle.v1),
                provider.vertex(triangle.v2),
                provider.vertex(triangle.v3),
            ];
            let sweep = SweptBox {
                start: check.line.segment.start,
                end: check.line.segment.end,
                extent: check.extent,
                axes: &check.local_box_axes,
            };
            if let Some(contact) = find_separating_axis(&vertices, &sweep, &tolerance) {
                if contact.time < check.line.result.time {
                    check.line.result.time = contact.time;
                    check.line.result.material = Some(provider.material(triangle.material_index));
                    check.line.local_hit_normal = contact.normal;
                    hit = true;
                }
            }
        }
        hit
    }

    /// Point check below this node; every overlapping child is searched
    pub(crate) fn point_check<P>(&self, tree: &KdopTree<I>, check: &mut PointCollisionCheck<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        check.box_check.line.stats.nodes_visited += 1;
        let NodeKind::Internal { left, right } = self.kind else {
            return self.point_check_triangles(tree, check);
        };

        let nodes = tree.nodes();
        let point = check.box_check.line.segment.start;
        let local_extent = check.box_check.local_extent;
        let mut hit = false;
        for child in [left.to_usize(), right.to_usize()] {
            if Kdop::expanded(&nodes[child].bounding_volume, &local_extent).point_check(&point) {
                hit |= nodes[child].point_check(tree, check);
            }
        }
        hit
    }

    fn point_check_triangles<P>(&self, tree: &KdopTree<I>, check: &mut PointCollisionCheck<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        let config = check.box_check.line.config;
        let tolerance = SatTolerance {
            axis_epsilon: config.separating_axis_epsilon,
            parallel_epsilon: config.parallel_epsilon,
        };
        let mut hit = false;
        for triangle in &tree.triangles()[self.triangle_range()] {
            check.box_check.line.stats.triangles_tested += 1;
            let provider = check.box_check.line.provider;
            let vertices = [
                provider.vertex(triangle.v1),
                provider.vertex(triangle.v2),
                provider.vertex(triangle.v3),
            ];
            let penetration = point_penetration(
                &vertices,
                &check.box_check.line.segment.start,
                &check.box_check.extent,
                &check.box_check.local_box_axes,
                check.best_distance,
                &tolerance,
            );
            if let Some(penetration) = penetration {
                if penetration.distance < check.best_distance {
                    check.box_check.line.result.material = Some(provider.material(triangle.material_index));
                    check.box_check.line.local_hit_normal = penetration.normal;
                    check.best_distance = penetration.distance;
                    hit = true;
                }
            }
        }
        hit
    }

    /// Collect the triangles of every leaf overlapping the query box
    pub(crate) fn sphere_query<P>(&self, tree: &KdopTree<I>, query: &mut SphereQuery<'_, P>)
    where
        P: CollisionDataProvider<Index = I>,
    {
        query.stats.nodes_visited += 1;
        match self.kind {
            NodeKind::Internal { left, right } => {
                let nodes = tree.nodes();
                for child in [left.to_usize(), right.to_usize()] {
                    if nodes[child].bounding_volume.aabb_overlap_check(&query.local_box) {
                        nodes[child].sphere_query(tree, query);
                    }
                }
            }
            NodeKind::Leaf { .. } => query.triangles.extend(self.triangle_range()),
        }
    }

    /// Collect every leaf below this node that passes the frustum planes
    pub(crate) fn frustum_query<P>(&self, tree: &KdopTree<I>, query: &mut FrustumQuery<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        query.stats.nodes_visited += 1;
        if !self.bounding_volume.frustum_check(&query.local_planes) {
            return false;
        }
        let NodeKind::Internal { left, right } = self.kind else {
            return true;
        };

        let nodes = tree.nodes();
        for child in [left.to_usize(), right.to_usize()] {
            let node = &nodes[child];
            if node.is_leaf() {
                if node.bounding_volume.frustum_check(&query.local_planes) {
                    query.add_leaf(child, node.triangle_range().len());
                }
            } else {
                node.frustum_query(tree, query);
            }
        }
        true
    }
}

/// Exact segment test against one triangle, updating the check on a closer hit
fn line_check_triangle<P: CollisionDataProvider>(
    check: &mut LineCollisionCheck<'_, P>,
    vertices: &[Vec3; 3],
    material_index: P::Index,
) -> bool {
    check.stats.triangles_tested += 1;
    let epsilon = check.config.plane_epsilon;
    let [v1, v2, v3] = vertices;

    let local_normal = safe_normal(&(v2 - v3).cross(&(v1 - v3)), SMALL_NUMBER);
    let plane = Plane::from_point_normal(v1, &local_normal);
    let start_dist = plane.plane_dot(&check.segment.start);
    let end_dist = plane.plane_dot(&check.segment.end);
    if (start_dist > -epsilon && end_dist > -epsilon) || (start_dist < epsilon && end_dist < epsilon) {
        return false;
    }

    let time = -start_dist / (end_dist - start_dist);
    if time >= check.result.time {
        return false;
    }

    let intersection = check.segment.at(time);
    for side in 0..3 {
        let side_direction = local_normal.cross(&(vertices[(side + 1) % 3] - vertices[side]));
        let side_w = side_direction.dot(&vertices[side]);
        if side_direction.dot(&intersection) - side_w >= epsilon {
            return false;
        }
    }

    check.local_hit_normal = local_normal;
    check.result.time = time;
    check.result.material = Some(check.provider.material(material_index));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdop::triangle::CollisionTriangle;

    fn build_triangle_at(x: f32, index: u16) -> BuildTriangle<u16> {
        BuildTriangle::new(
            CollisionTriangle::new(index, index, index, 0),
            [
                Vec3::new(x, 0.0, 0.0),
                Vec3::new(x + 1.0, 0.0, 0.0),
                Vec3::new(x, 1.0, 0.0),
            ],
        )
    }

    #[test]
    fn test_splatter_picks_widest_axis() {
        let triangles: Vec<_> = (0..4).map(|i| build_triangle_at(i as f32 * 10.0, i)).collect();
        let (axis, mean) = splatter_split(&triangles);
        assert_eq!(axis, 0);
        assert!((mean - (15.0 + 1.0 / 3.0)).abs() < 1e-4);
    }

    #[test]
    fn test_partition_orders_by_split() {
        let mut triangles: Vec<_> = [30.0, 0.0, 20.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, &x)| build_triangle_at(x, i as u16))
            .collect();
        let split = partition(&mut triangles, 0, 15.0);
        assert_eq!(split, 2);
        assert!(triangles[..split].iter().all(|t| t.centroid.x <= 15.0));
        assert!(triangles[split..].iter().all(|t| t.centroid.x > 15.0));
    }

    #[test]
    fn test_coincident_centroids_force_midpoint_split() {
        crate::foundation::logging::init_for_tests();
        let mut nodes = vec![KdopNode::<u16>::empty_leaf()];
        let mut triangles: Vec<_> = (0..8).map(|i| build_triangle_at(0.0, i)).collect();
        let depth = KdopNode::split_triangle_list(&mut nodes, 0, 0, 8, &mut triangles, 2, 0).unwrap();

        assert_eq!(depth, 2);
        assert_eq!(nodes.len(), 7);
        let leaves: Vec<_> = nodes.iter().filter(|n| n.is_leaf()).map(|n| n.triangle_range().len()).collect();
        assert_eq!(leaves, vec![2, 2, 2, 2]);
    }

    #[test]
    fn test_order_children_swaps_when_right_is_nearer() {
        let (near, far) = order_children((1, Some(0.6)), (2, Some(0.2)));
        assert_eq!(near, Some((2, 0.2)));
        assert_eq!(far, Some((1, 0.6)));
        assert_eq!(order_children((1, None), (2, Some(0.3))), (Some((2, 0.3)), None));
        assert_eq!(order_children((1, None), (2, None)), (None, None));
    }
}
