//! Structural and query properties that must hold for any built tree

use super::{brute_force_line, flat_grid, random_soup};
use crate::config::KdopConfig;
use crate::foundation::geometry::BoundingSphere;
use crate::foundation::math::Vec3;
use crate::kdop::{
    BoxCollisionCheck, CollisionDataProvider, FormatVersion, KdopIndex, KdopTree, LineCollisionCheck, NodeKind,
    PointCollisionCheck, SphereQuery, TraceFlags,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Same node shapes, leaf runs and triangle records, compared at `usize` width
fn assert_isomorphic<A: KdopIndex, B: KdopIndex>(a: &KdopTree<A>, b: &KdopTree<B>) {
    assert_eq!(a.nodes().len(), b.nodes().len());
    assert_eq!(a.triangles().len(), b.triangles().len());
    for (left, right) in a.nodes().iter().zip(b.nodes()) {
        assert_eq!(left.bounding_volume, right.bounding_volume);
        match (left.kind, right.kind) {
            (NodeKind::Leaf { .. }, NodeKind::Leaf { .. }) => {
                assert_eq!(left.triangle_range(), right.triangle_range());
            }
            (NodeKind::Internal { left: l1, right: r1 }, NodeKind::Internal { left: l2, right: r2 }) => {
                assert_eq!((l1.to_usize(), r1.to_usize()), (l2.to_usize(), r2.to_usize()));
            }
            other => panic!("node kinds differ: {other:?}"),
        }
    }
    for (left, right) in a.triangles().iter().zip(b.triangles()) {
        assert_eq!(left.vertex_indices(), right.vertex_indices());
        assert_eq!(left.material_index.to_usize(), right.material_index.to_usize());
    }
}

#[test]
fn test_every_triangle_in_exactly_one_leaf() {
    let mesh = random_soup(1, 600, KdopConfig::default());
    let tree = mesh.tree();
    tree.validate(|v| mesh.vertex(v)).unwrap();

    let mut owners = vec![0usize; tree.triangles().len()];
    for node in tree.nodes().iter().filter(|n| n.is_leaf()) {
        for slot in node.triangle_range() {
            owners[slot] += 1;
            let triangle = tree.triangles()[slot];
            for v in [triangle.v1, triangle.v2, triangle.v3] {
                assert!(node.bounding_volume.point_check(&mesh.vertex(v)));
            }
        }
    }
    assert!(owners.iter().all(|&count| count == 1));

    // Reordering keeps the same set of source triangles
    let mut firsts: Vec<_> = tree.triangles().iter().map(|t| t.v1).collect();
    firsts.sort_unstable();
    assert_eq!(firsts, (0..600).map(|i| i * 3).collect::<Vec<u32>>());
}

#[test]
fn test_internal_volumes_contain_children() {
    let mesh = random_soup(2, 400, KdopConfig::default());
    let nodes = mesh.tree().nodes();
    for node in nodes {
        if let NodeKind::Internal { left, right } = node.kind {
            assert!(node.bounding_volume.contains(&nodes[left as usize].bounding_volume));
            assert!(node.bounding_volume.contains(&nodes[right as usize].bounding_volume));
        }
    }
}

#[test]
fn test_leaves_respect_threshold() {
    for threshold in [1, 3, 5, 8] {
        let config = KdopConfig::default().with_leaf_threshold(threshold);
        let mesh = random_soup(3, 250, config);
        assert!(mesh.tree().stats().max_leaf_size <= threshold);
    }

    let small = random_soup(4, 4, KdopConfig::default());
    assert_eq!(small.tree().nodes().len(), 1);
    assert_eq!(small.tree().stats().max_leaf_size, 4);
}

#[test]
fn test_rays_through_centroids_never_miss() {
    let mesh = random_soup(5, 300, KdopConfig::default());
    let mut rng = StdRng::seed_from_u64(99);
    let triangles: Vec<[usize; 3]> = mesh.tree().triangles().iter().map(|t| t.vertex_indices()).collect();

    for _ in 0..200 {
        let [a, b, c] = triangles[rng.gen_range(0..triangles.len())];
        let (v0, v1, v2) = (mesh.vertex(a as u32), mesh.vertex(b as u32), mesh.vertex(c as u32));
        let centroid = (v0 + v1 + v2) / 3.0;
        let normal = (v1 - v0).cross(&(v2 - v0)).normalize();
        let lateral = Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0));
        let start = centroid + normal * 20.0 + lateral;
        let end = centroid * 2.0 - start;

        let hit = mesh.line_check(start, end, TraceFlags::empty()).expect("ray through a centroid hits");
        assert!(hit.time <= 0.5 + 1e-4, "hit at {} beyond the centroid", hit.time);

        let nearest = brute_force_line(mesh.vertices(), &triangles, start, end).expect("brute force agrees");
        assert!((hit.time - nearest).abs() < 1e-3, "tree {} vs brute force {}", hit.time, nearest);
    }
}

#[test]
fn test_queries_outside_root_touch_nothing() {
    let mesh = random_soup(6, 200, KdopConfig::default());
    let away = Vec3::new(1000.0, 0.0, 0.0);

    let mut line = LineCollisionCheck::new(&mesh, away + Vec3::z() * 60.0, away - Vec3::z() * 60.0, TraceFlags::empty());
    assert!(!line.run());
    assert_eq!(line.stats.nodes_visited, 0);
    assert_eq!(line.stats.triangles_tested, 0);

    let mut swept = BoxCollisionCheck::new(&mesh, away, away + Vec3::y() * 50.0, Vec3::repeat(2.0), TraceFlags::empty());
    assert!(!swept.run());
    assert_eq!(swept.line.stats.nodes_visited, 0);

    let mut point = PointCollisionCheck::new(&mesh, away, Vec3::repeat(2.0));
    assert!(!point.run());
    assert_eq!(point.box_check.line.stats.nodes_visited, 0);

    let mut sphere = SphereQuery::new(&mesh, &BoundingSphere::new(away, 10.0));
    assert!(!sphere.run());
    assert_eq!(sphere.stats.nodes_visited, 0);
}

#[test]
fn test_repeated_queries_agree() {
    let mesh = random_soup(7, 300, KdopConfig::default());
    let start = Vec3::new(-60.0, 3.0, 1.0);
    let end = Vec3::new(60.0, -2.0, 4.0);
    assert_eq!(
        mesh.line_check(start, end, TraceFlags::empty()),
        mesh.line_check(start, end, TraceFlags::empty())
    );
    assert_eq!(
        mesh.box_check(start, end, Vec3::repeat(1.5), TraceFlags::empty()),
        mesh.box_check(start, end, Vec3::repeat(1.5), TraceFlags::empty())
    );
    let sphere = BoundingSphere::new(Vec3::zeros(), 20.0);
    assert_eq!(mesh.sphere_query(&sphere), mesh.sphere_query(&sphere));
}

#[test]
fn test_archive_round_trip_is_isomorphic() {
    let mesh = random_soup(8, 350, KdopConfig::default());
    let tree = mesh.tree();

    let mut bytes = Vec::new();
    tree.write_to(&mut bytes, FormatVersion::Current).unwrap();
    let loaded = KdopTree::<u32>::read_from(&mut bytes.as_slice(), *tree.config()).unwrap();
    assert_eq!(&loaded, tree);
}

#[test]
fn test_legacy_archive_migrates_to_narrow_indices() {
    let grid = flat_grid(12, KdopConfig::default());
    let tree = grid.tree();

    let mut legacy = Vec::new();
    tree.write_to(&mut legacy, FormatVersion::Legacy).unwrap();
    let mut current = Vec::new();
    tree.write_to(&mut current, FormatVersion::Current).unwrap();
    assert!(legacy.len() > current.len());

    let migrated = KdopTree::<u16>::read_from(&mut legacy.as_slice(), KdopConfig::default()).unwrap();
    assert_eq!(&migrated, tree);

    let widened = KdopTree::<u32>::read_from(&mut current.as_slice(), KdopConfig::default()).unwrap();
    assert_isomorphic(&widened, tree);
}

#[test]
fn test_narrowing_overflow_is_an_error() {
    // One triangle whose vertices sit past the 16-bit range
    let mut vertices = vec![Vec3::zeros(); 70_000];
    vertices.extend_from_slice(&[Vec3::zeros(), Vec3::x(), Vec3::y()]);
    let mesh = crate::kdop::StaticMeshCollision::<u32, u8>::build(
        vertices,
        &[[70_000, 70_001, 70_002]],
        &[0],
        vec![0],
        KdopConfig::default(),
    )
    .unwrap();

    let mut bytes = Vec::new();
    mesh.tree().write_to(&mut bytes, FormatVersion::Current).unwrap();
    let narrowed = KdopTree::<u16>::read_from(&mut bytes.as_slice(), KdopConfig::default());
    assert!(matches!(narrowed, Err(crate::error::KdopError::IndexOverflow { .. })));
}
