//! The kDOP tree: flat node and triangle arrays plus the query entry points

use super::bounds::Kdop;
use super::check::{BoxCollisionCheck, FrustumQuery, LineCollisionCheck, PointCollisionCheck, SphereQuery};
use super::index::KdopIndex;
use super::node::{KdopNode, NodeKind};
use super::provider::CollisionDataProvider;
use super::triangle::{BuildTriangle, CollisionTriangle};
use crate::config::KdopConfig;
use crate::error::{KdopError, KdopResult};
use crate::foundation::geometry::Aabb;
use crate::foundation::math::Vec3;

/// Shape summary of a built tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Total nodes
    pub node_count: usize,
    /// Leaf nodes
    pub leaf_count: usize,
    /// Triangle records
    pub triangle_count: usize,
    /// Depth of the deepest leaf, root at zero
    pub max_depth: usize,
    /// Largest leaf run
    pub max_leaf_size: usize,
}

/// Bounding volume hierarchy over a triangle mesh
///
/// Node 0 is the root. Children always sit after their parent in the node
/// array, and leaves own disjoint runs of the triangle array that together
/// cover it exactly. The tree never changes after it is built or loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct KdopTree<I: KdopIndex> {
    nodes: Vec<KdopNode<I>>,
    triangles: Vec<CollisionTriangle<I>>,
    config: KdopConfig,
}

impl<I: KdopIndex> KdopTree<I> {
    /// A tree over no triangles; every query misses
    pub fn empty(config: KdopConfig) -> Self {
        Self {
            nodes: vec![KdopNode::empty_leaf()],
            triangles: Vec::new(),
            config,
        }
    }

    /// Build a tree from resolved triangles
    ///
    /// The triangles are reordered so each leaf owns a contiguous run, then
    /// stored without their positions.
    pub fn build(mut build_triangles: Vec<BuildTriangle<I>>, config: KdopConfig) -> KdopResult<Self> {
        config.validate().map_err(KdopError::InvalidConfig)?;
        I::checked("triangle count", build_triangles.len())?;

        let count = build_triangles.len();
        let mut nodes = Vec::with_capacity(count * 2);
        nodes.push(KdopNode::empty_leaf());
        let depth = KdopNode::split_triangle_list(
            &mut nodes,
            0,
            0,
            count,
            &mut build_triangles,
            config.leaf_threshold,
            0,
        )?;
        nodes.shrink_to_fit();

        let triangles = build_triangles.iter().map(|t| t.triangle).collect();
        let tree = Self {
            nodes,
            triangles,
            config,
        };

        let stats = tree.stats();
        log::debug!(
            "Built kDOP tree: {} triangles, {} nodes, {} leaves, depth {}",
            stats.triangle_count,
            stats.node_count,
            stats.leaf_count,
            depth
        );
        Ok(tree)
    }

    /// Assemble a tree from stored arrays, checking its structure
    pub fn from_parts(
        nodes: Vec<KdopNode<I>>,
        triangles: Vec<CollisionTriangle<I>>,
        config: KdopConfig,
    ) -> KdopResult<Self> {
        config.validate().map_err(KdopError::InvalidConfig)?;
        let tree = Self {
            nodes,
            triangles,
            config,
        };
        tree.check_structure()?;
        Ok(tree)
    }

    /// Rebuild the hierarchy from the stored triangles
    ///
    /// `vertex` resolves a vertex index to its local position.
    pub fn rebuild(&self, vertex: impl Fn(I) -> Vec3) -> KdopResult<Self> {
        let build_triangles = self
            .triangles
            .iter()
            .map(|t| BuildTriangle::new(*t, [vertex(t.v1), vertex(t.v2), vertex(t.v3)]))
            .collect();
        Self::build(build_triangles, self.config)
    }

    /// Node array; index 0 is the root
    pub fn nodes(&self) -> &[KdopNode<I>] {
        &self.nodes
    }

    /// Triangle records in leaf order
    pub fn triangles(&self) -> &[CollisionTriangle<I>] {
        &self.triangles
    }

    /// Build parameters and query tolerances
    pub const fn config(&self) -> &KdopConfig {
        &self.config
    }

    /// Whether the tree holds no triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// The triangles of a leaf node, empty for internal or unknown nodes
    pub fn leaf_triangles(&self, node_index: usize) -> &[CollisionTriangle<I>] {
        self.nodes
            .get(node_index)
            .and_then(|node| self.triangles.get(node.triangle_range()))
            .unwrap_or(&[])
    }

    /// Root bounds, `None` for an empty tree
    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().and_then(|root| root.bounding_volume.to_aabb())
    }

    /// Shape summary
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            node_count: self.nodes.len(),
            triangle_count: self.triangles.len(),
            ..TreeStats::default()
        };
        if self.nodes.is_empty() {
            return stats;
        }

        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            match self.nodes[index].kind {
                NodeKind::Leaf { num_triangles, .. } => {
                    stats.leaf_count += 1;
                    stats.max_depth = stats.max_depth.max(depth);
                    stats.max_leaf_size = stats.max_leaf_size.max(num_triangles.to_usize());
                }
                NodeKind::Internal { left, right } => {
                    stack.push((left.to_usize(), depth + 1));
                    stack.push((right.to_usize(), depth + 1));
                }
            }
        }
        stats
    }

    /// Check the arrays describe a tree: children after their parent and
    /// referenced once, leaf runs in range and covering every triangle once
    pub fn check_structure(&self) -> KdopResult<()> {
        if self.nodes.is_empty() {
            return Err(KdopError::Corrupt("tree has no root node".into()));
        }

        let mut referenced = vec![false; self.nodes.len()];
        let mut covered = vec![false; self.triangles.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            match node.kind {
                NodeKind::Internal { left, right } => {
                    for child in [left.to_usize(), right.to_usize()] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(KdopError::Corrupt(format!(
                                "node {index} has invalid child {child}"
                            )));
                        }
                        if std::mem::replace(&mut referenced[child], true) {
                            return Err(KdopError::Corrupt(format!("node {child} has two parents")));
                        }
                    }
                }
                NodeKind::Leaf { .. } => {
                    let range = node.triangle_range();
                    if range.end > self.triangles.len() {
                        return Err(KdopError::Corrupt(format!(
                            "leaf {index} run {range:?} exceeds {} triangles",
                            self.triangles.len()
                        )));
                    }
                    for slot in &mut covered[range] {
                        if std::mem::replace(slot, true) {
                            return Err(KdopError::Corrupt(format!("leaf {index} overlaps another leaf")));
                        }
                    }
                }
            }
        }

        if let Some(orphan) = referenced.iter().skip(1).position(|r| !r) {
            return Err(KdopError::Corrupt(format!("node {} is unreachable", orphan + 1)));
        }
        if let Some(missing) = covered.iter().position(|c| !c) {
            return Err(KdopError::Corrupt(format!("triangle {missing} is in no leaf")));
        }
        Ok(())
    }

    /// Check the full set of tree invariants against the mesh vertices
    ///
    /// Beyond [`Self::check_structure`]: every leaf's volume holds its
    /// triangles' vertices, every internal volume holds both children, and no
    /// leaf exceeds the configured leaf threshold.
    pub fn validate(&self, vertex: impl Fn(I) -> Vec3) -> KdopResult<()> {
        self.check_structure()?;
        let slack = Vec3::repeat(self.config.plane_epsilon);

        for (index, node) in self.nodes.iter().enumerate() {
            let volume = Kdop::expanded(&node.bounding_volume, &slack);
            match node.kind {
                NodeKind::Internal { left, right } => {
                    for child in [left.to_usize(), right.to_usize()] {
                        let child_volume = &self.nodes[child].bounding_volume;
                        if child_volume.is_valid() && !node.bounding_volume.contains(child_volume) {
                            return Err(KdopError::Corrupt(format!(
                                "node {index} does not contain child {child}"
                            )));
                        }
                    }
                }
                NodeKind::Leaf { num_triangles, .. } => {
                    if num_triangles.to_usize() > self.config.leaf_threshold {
                        return Err(KdopError::Corrupt(format!(
                            "leaf {index} holds {} triangles, above the threshold of {}",
                            num_triangles.to_usize(),
                            self.config.leaf_threshold
                        )));
                    }
                    for triangle in &self.triangles[node.triangle_range()] {
                        for v in [triangle.v1, triangle.v2, triangle.v3] {
                            if !volume.point_check(&vertex(v)) {
                                return Err(KdopError::Corrupt(format!(
                                    "vertex {v:?} lies outside leaf {index}"
                                )));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Trace a line; only descends if the root volume is entered
    pub fn line_check<P>(&self, check: &mut LineCollisionCheck<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        let Some(root) = self.nodes.first() else {
            return false;
        };
        root.bounding_volume
            .line_check(&check.segment, check.config.fudge_size)
            .is_some()
            && root.line_check(self, check)
    }

    /// Sweep a box; only descends if the widened root volume is entered
    pub fn box_check<P>(&self, check: &mut BoxCollisionCheck<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        let Some(root) = self.nodes.first() else {
            return false;
        };
        Kdop::expanded(&root.bounding_volume, &check.local_extent)
            .line_check(&check.line.segment, check.line.config.fudge_size)
            .is_some()
            && root.box_check(self, check)
    }

    /// Point with extent; only descends if the widened root volume holds the point
    pub fn point_check<P>(&self, check: &mut PointCollisionCheck<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        let Some(root) = self.nodes.first() else {
            return false;
        };
        Kdop::expanded(&root.bounding_volume, &check.box_check.local_extent)
            .point_check(&check.box_check.line.segment.start)
            && root.point_check(self, check)
    }

    /// Collect candidate triangles for a sphere
    pub fn sphere_query<P>(&self, query: &mut SphereQuery<'_, P>)
    where
        P: CollisionDataProvider<Index = I>,
    {
        if let Some(root) = self.nodes.first() {
            if root.bounding_volume.aabb_overlap_check(&query.local_box) {
                root.sphere_query(self, query);
            }
        }
    }

    /// Collect leaves intersecting a frustum; true if any were found
    pub fn frustum_query<P>(&self, query: &mut FrustumQuery<'_, P>) -> bool
    where
        P: CollisionDataProvider<Index = I>,
    {
        match self.nodes.first() {
            Some(root) if root.is_leaf() => {
                query.stats.nodes_visited += 1;
                if root.bounding_volume.frustum_check(&query.local_planes) {
                    query.add_leaf(0, root.triangle_range().len());
                }
            }
            Some(root) => {
                root.frustum_query(self, query);
            }
            None => {}
        }
        !query.leaves.is_empty()
    }
}
