//! kDOP probe
//!
//! Builds a collision tree over a procedural mesh, runs a batch of every
//! query kind against it, round-trips the tree through the archive format and
//! logs what it found along the way.
//!
//! ```text
//! mesh_probe [config.toml | config.ron]
//! ```

use kdop_collision::foundation::logging;
use kdop_collision::foundation::math::Point3;
use kdop_collision::foundation::time::Stopwatch;
use kdop_collision::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::path::PathBuf;

/// Errors that end a probe run
#[derive(thiserror::Error, Debug)]
enum ProbeError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("collision: {0}")]
    Kdop(#[from] KdopError),

    #[error("invalid probe settings: {0}")]
    Settings(String),

    #[error("round-tripped tree differs from the built tree")]
    RoundTripMismatch,
}

/// Procedural mesh to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ProbeShape {
    /// Flat square grid on the z = 0 plane
    Grid,
    /// Closed UV sphere around the origin
    Sphere,
}

/// Probe settings, loadable from TOML or RON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ProbeConfig {
    shape: ProbeShape,
    /// Grid cells per side, or sphere rings (twice as many segments)
    resolution: u32,
    /// Grid side length or sphere radius
    size: f32,
    /// Queries issued per kind
    query_count: usize,
    seed: u64,
    /// Half-size of swept and point-check boxes
    box_extent: f32,
    /// Where to write the archive; kept in memory when unset
    archive_path: Option<PathBuf>,
    tree: KdopConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            shape: ProbeShape::Sphere,
            resolution: 48,
            size: 50.0,
            query_count: 2_000,
            seed: 7,
            box_extent: 1.5,
            archive_path: None,
            tree: KdopConfig::default(),
        }
    }
}

impl Config for ProbeConfig {}

/// Triangle soup ready to hand to the builder
struct MeshData {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    materials: Vec<u32>,
}

fn grid_mesh(cells: u32, size: f32) -> MeshData {
    let side = cells + 1;
    let step = size / cells as f32;
    let half = size * 0.5;
    let mut vertices = Vec::with_capacity((side * side) as usize);
    for y in 0..side {
        for x in 0..side {
            vertices.push(Vec3::new(x as f32 * step - half, y as f32 * step - half, 0.0));
        }
    }

    let mut triangles = Vec::with_capacity((cells * cells * 2) as usize);
    let mut materials = Vec::with_capacity(triangles.capacity());
    for y in 0..cells {
        for x in 0..cells {
            let corner = y * side + x;
            let up = corner + side;
            triangles.push([corner, corner + 1, up + 1]);
            triangles.push([corner, up + 1, up]);
            // Checkerboard of two materials
            let material = (x + y) % 2;
            materials.extend_from_slice(&[material, material]);
        }
    }
    MeshData { vertices, triangles, materials }
}

fn sphere_mesh(rings: u32, radius: f32) -> MeshData {
    let segments = rings * 2;
    let mut vertices = vec![Vec3::new(0.0, 0.0, radius)];
    for ring in 1..rings {
        let polar = PI * ring as f32 / rings as f32;
        for segment in 0..segments {
            let azimuth = TAU * segment as f32 / segments as f32;
            vertices.push(
                Vec3::new(polar.sin() * azimuth.cos(), polar.sin() * azimuth.sin(), polar.cos()) * radius,
            );
        }
    }
    let south = vertices.len() as u32;
    vertices.push(Vec3::new(0.0, 0.0, -radius));

    let ring_start = |ring: u32| 1 + (ring - 1) * segments;
    let mut triangles = Vec::new();
    let mut materials = Vec::new();
    for segment in 0..segments {
        let next = (segment + 1) % segments;
        triangles.push([0, ring_start(1) + segment, ring_start(1) + next]);
        materials.push(0);
        for ring in 1..rings - 1 {
            let (upper, lower) = (ring_start(ring), ring_start(ring + 1));
            triangles.push([upper + segment, lower + segment, lower + next]);
            triangles.push([upper + segment, lower + next, upper + next]);
            // Northern and southern hemispheres
            let material = u32::from(ring >= rings / 2);
            materials.extend_from_slice(&[material, material]);
        }
        let last = ring_start(rings - 1);
        triangles.push([south, last + next, last + segment]);
        materials.push(1);
    }
    MeshData { vertices, triangles, materials }
}

/// A random point in the cube `[-reach, reach]^3`
fn random_point(rng: &mut StdRng, reach: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-reach..reach),
        rng.gen_range(-reach..reach),
        rng.gen_range(-reach..reach),
    )
}

/// Right-handed perspective with a `[0, 1]` clip depth, looking down -z
#[rustfmt::skip]
fn perspective_zero_to_one(aspect: f32, fovy: f32, near: f32, far: f32) -> Mat4 {
    let focal = 1.0 / (fovy * 0.5).tan();
    let depth = far / (near - far);
    Mat4::new(
        focal / aspect, 0.0, 0.0, 0.0,
        0.0, focal, 0.0, 0.0,
        0.0, 0.0, depth, near * depth,
        0.0, 0.0, -1.0, 0.0,
    )
}

fn log_timing(name: &str, stopwatch: &Stopwatch, hits: usize, total: usize) {
    log::info!(
        "{name:<8} {hits:>6}/{total:<6} hits, {:>8.2} us per query, {:>8.2} ms total",
        stopwatch.mean_lap_micros(),
        stopwatch.elapsed_millis()
    );
}

fn run(config: &ProbeConfig) -> Result<(), ProbeError> {
    let minimum = match config.shape {
        ProbeShape::Grid => 1,
        ProbeShape::Sphere => 3,
    };
    if config.resolution < minimum || config.size <= 0.0 {
        return Err(ProbeError::Settings(format!(
            "{:?} needs resolution >= {minimum} and a positive size",
            config.shape
        )));
    }

    let mesh_data = match config.shape {
        ProbeShape::Grid => grid_mesh(config.resolution, config.size),
        ProbeShape::Sphere => sphere_mesh(config.resolution, config.size),
    };
    log::info!(
        "Probing {:?} mesh: {} vertices, {} triangles",
        config.shape,
        mesh_data.vertices.len(),
        mesh_data.triangles.len()
    );

    let mut build_timer = Stopwatch::new();
    let mesh = build_timer.measure(|| {
        StaticMeshCollision::<u32, &'static str>::build(
            mesh_data.vertices,
            &mesh_data.triangles,
            &mesh_data.materials,
            vec!["stone", "grass"],
            config.tree,
        )
    })?;
    let stats = mesh.tree().stats();
    log::info!(
        "Built in {:.2} ms: {} nodes, {} leaves, depth {}, largest leaf {}",
        build_timer.elapsed_millis(),
        stats.node_count,
        stats.leaf_count,
        stats.max_depth,
        stats.max_leaf_size
    );
    mesh.tree().validate(|v| mesh.vertex(v))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let reach = config.size * 1.5;
    let extent = Vec3::repeat(config.box_extent);
    let count = config.query_count;

    let mut timer = Stopwatch::new();
    let mut hits = 0;
    let mut nearest_material = std::collections::HashMap::new();
    for _ in 0..count {
        let (start, end) = (random_point(&mut rng, reach), random_point(&mut rng, reach));
        if let Some(hit) = timer.measure(|| mesh.line_check(start, end, TraceFlags::empty())) {
            hits += 1;
            *nearest_material.entry(hit.material).or_insert(0usize) += 1;
        }
    }
    log_timing("line", &timer, hits, count);
    log::debug!("Line hits by material: {nearest_material:?}");

    let mut timer = Stopwatch::new();
    let mut hits = 0;
    for _ in 0..count {
        let (start, end) = (random_point(&mut rng, reach), random_point(&mut rng, reach));
        if timer
            .measure(|| mesh.line_check(start, end, TraceFlags::STOP_AT_ANY_HIT))
            .is_some()
        {
            hits += 1;
        }
    }
    log_timing("any-hit", &timer, hits, count);

    let mut timer = Stopwatch::new();
    let mut hits = 0;
    for _ in 0..count {
        let (start, end) = (random_point(&mut rng, reach), random_point(&mut rng, reach));
        if let Some(hit) = timer.measure(|| mesh.box_check(start, end, extent, TraceFlags::empty())) {
            hits += 1;
            log::trace!("Box stopped at t={:.4} n={:?}", hit.time, hit.normal);
        }
    }
    log_timing("box", &timer, hits, count);

    let mut timer = Stopwatch::new();
    let mut hits = 0;
    let mut deepest = 0.0f32;
    for _ in 0..count {
        let location = random_point(&mut rng, config.size * 1.1);
        if let Some(hit) = timer.measure(|| mesh.point_check(location, extent)) {
            hits += 1;
            deepest = deepest.max(hit.penetration);
        }
    }
    log_timing("point", &timer, hits, count);
    log::debug!("Deepest point encroachment: {deepest:.4}");

    let mut timer = Stopwatch::new();
    let mut candidates = 0;
    for _ in 0..count {
        let radius = rng.gen_range(0.5..(config.size * 0.25).max(1.0));
        let sphere = BoundingSphere::new(random_point(&mut rng, reach), radius);
        candidates += timer.measure(|| mesh.sphere_query(&sphere)).len();
    }
    log_timing("sphere", &timer, candidates, count * stats.triangle_count);

    let eye = Point3::new(config.size * 2.0, config.size * 0.5, config.size);
    let view = Mat4::look_at_rh(&eye, &Point3::origin(), &Vec3::z());
    let projection = perspective_zero_to_one(16.0 / 9.0, 0.6, 0.5, config.size * 4.0);
    let frustum = Frustum::from_view_projection(&(projection * view));
    let mut timer = Stopwatch::new();
    let leaves = timer.measure(|| mesh.frustum_query(&frustum));
    let visible = mesh.frustum_triangles(&frustum).len();
    log_timing("frustum", &timer, leaves.len(), stats.leaf_count);
    log::info!("Frustum keeps {visible} of {} triangles", stats.triangle_count);

    round_trip(&mesh, config)
}

/// Write the tree out and read it back at both index widths
fn round_trip(mesh: &StaticMeshCollision<u32, &'static str>, config: &ProbeConfig) -> Result<(), ProbeError> {
    let tree = mesh.tree();
    let loaded = match &config.archive_path {
        Some(path) => {
            tree.save_to_file(path, FormatVersion::Current)?;
            log::info!("Archive written to {}", path.display());
            KdopTree::<u32>::load_from_file(path, config.tree)?
        }
        None => {
            let mut bytes = Vec::new();
            tree.write_to(&mut bytes, FormatVersion::Current)?;
            log::info!("Archive is {} bytes", bytes.len());
            KdopTree::<u32>::read_from(&mut bytes.as_slice(), config.tree)?
        }
    };
    if &loaded != tree {
        return Err(ProbeError::RoundTripMismatch);
    }

    let mut legacy = Vec::new();
    tree.write_to(&mut legacy, FormatVersion::Legacy)?;
    match KdopTree::<u16>::read_from(&mut legacy.as_slice(), config.tree) {
        Ok(narrow) => log::info!("Legacy archive narrows to 16-bit indices ({} nodes)", narrow.nodes().len()),
        Err(KdopError::IndexOverflow { what, value, max }) => {
            log::warn!("Mesh too large for 16-bit indices: {what} {value} exceeds {max}");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn main() {
    logging::init("info");

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            log::info!("Loading probe config from {}", path.display());
            ProbeConfig::load_from_file(&path)
        }
        None => Ok(ProbeConfig::default()),
    };

    let result = config.map_err(ProbeError::from).and_then(|config| run(&config));
    if let Err(e) = result {
        log::error!("Probe failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kdop_collision::foundation::math::transform_point;

    #[test]
    fn test_perspective_depth_runs_from_near_to_far() {
        let projection = perspective_zero_to_one(1.5, 0.8, 0.5, 40.0);
        let depth = |distance: f32| transform_point(&projection, &Vec3::new(0.0, 0.0, -distance)).z;
        assert_relative_eq!(depth(0.5), 0.0, epsilon = 1e-5);
        assert_relative_eq!(depth(40.0), 1.0, epsilon = 1e-5);

        let frustum = Frustum::from_view_projection(&projection);
        let just_past_near = Aabb::from_center_extents(Vec3::new(0.0, 0.0, -0.6), Vec3::repeat(0.01));
        let behind_camera = Aabb::from_center_extents(Vec3::new(0.0, 0.0, 0.2), Vec3::repeat(0.01));
        let past_far = Aabb::from_center_extents(Vec3::new(0.0, 0.0, -41.0), Vec3::repeat(0.01));
        assert!(frustum.intersects_aabb(&just_past_near));
        assert!(!frustum.intersects_aabb(&behind_camera));
        assert!(!frustum.intersects_aabb(&past_far));
    }
}
