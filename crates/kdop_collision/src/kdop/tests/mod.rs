//! Whole-tree tests: structural properties and end-to-end query scenarios
//!
//! Shared mesh fixtures live here.

mod properties;

use crate::config::KdopConfig;
use crate::foundation::math::Vec3;
use crate::kdop::StaticMeshCollision;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random well-shaped triangles scattered through a 100 unit cube
pub(super) fn random_soup(seed: u64, count: usize, config: KdopConfig) -> StaticMeshCollision<u32, u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut vertices = Vec::with_capacity(count * 3);
    let mut triangles = Vec::with_capacity(count);
    let mut materials = Vec::with_capacity(count);

    while triangles.len() < count {
        let origin = Vec3::new(
            rng.gen_range(-50.0..50.0),
            rng.gen_range(-50.0..50.0),
            rng.gen_range(-50.0..50.0),
        );
        let a = Vec3::new(rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0));
        let b = Vec3::new(rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0));
        if a.cross(&b).norm() < 2.0 {
            continue;
        }
        let base = vertices.len() as u32;
        vertices.extend_from_slice(&[origin, origin + a, origin + b]);
        triangles.push([base, base + 1, base + 2]);
        materials.push(rng.gen_range(0..4));
    }

    StaticMeshCollision::build(vertices, &triangles, &materials, vec![10, 11, 12, 13], config)
        .expect("random soup builds")
}

/// A flat `cells x cells` grid of unit squares on the z = 0 plane
pub(super) fn flat_grid(cells: u16, config: KdopConfig) -> StaticMeshCollision<u16, u32> {
    let side = cells + 1;
    let mut vertices = Vec::new();
    for y in 0..side {
        for x in 0..side {
            vertices.push(Vec3::new(f32::from(x), f32::from(y), 0.0));
        }
    }

    let mut triangles = Vec::new();
    for y in 0..u32::from(cells) {
        for x in 0..u32::from(cells) {
            let corner = y * u32::from(side) + x;
            let right = corner + 1;
            let up = corner + u32::from(side);
            triangles.push([corner, right, up + 1]);
            triangles.push([corner, up + 1, up]);
        }
    }
    let materials = vec![0; triangles.len()];

    StaticMeshCollision::build(vertices, &triangles, &materials, vec![1], config).expect("grid builds")
}

/// Nearest crossing of a segment with any triangle, by brute force
pub(super) fn brute_force_line(vertices: &[Vec3], triangles: &[[usize; 3]], start: Vec3, end: Vec3) -> Option<f32> {
    let dir = end - start;
    triangles
        .iter()
        .filter_map(|&[a, b, c]| {
            let (v0, v1, v2) = (vertices[a], vertices[b], vertices[c]);
            let e1 = v1 - v0;
            let e2 = v2 - v0;
            let p = dir.cross(&e2);
            let det = e1.dot(&p);
            if det.abs() < 1e-9 {
                return None;
            }
            let s = start - v0;
            let u = s.dot(&p) / det;
            let q = s.cross(&e1);
            let v = dir.dot(&q) / det;
            let t = e2.dot(&q) / det;
            (u >= 0.0 && v >= 0.0 && u + v <= 1.0 && (0.0..=1.0).contains(&t)).then_some(t)
        })
        .min_by(f32::total_cmp)
}
