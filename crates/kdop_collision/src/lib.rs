//! # kDOP Collision
//!
//! A static, read-mostly bounding volume hierarchy over a triangle mesh.
//!
//! ## Features
//!
//! - **Splatter build**: recursive mean/variance split into a flat node arena
//! - **Line checks**: nearest-hit or any-hit ray/segment traces
//! - **Box checks**: swept axis-aligned boxes resolved with the separating axis theorem
//! - **Point checks**: point plus extent encroachment with push-out distance
//! - **Region queries**: sphere candidate triangles and frustum leaf culling
//! - **Persistence**: versioned bulk archive with index width migration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kdop_collision::prelude::*;
//!
//! fn main() -> Result<(), KdopError> {
//!     let vertices = vec![
//!         Vec3::new(0.0, 0.0, 0.0),
//!         Vec3::new(10.0, 0.0, 0.0),
//!         Vec3::new(0.0, 10.0, 0.0),
//!     ];
//!     let mesh = StaticMeshCollision::<u16, u32>::build(
//!         vertices,
//!         &[[0, 1, 2]],
//!         &[0],
//!         vec![7],
//!         KdopConfig::default(),
//!     )?;
//!
//!     let hit = mesh.line_check(
//!         Vec3::new(2.0, 2.0, 5.0),
//!         Vec3::new(2.0, 2.0, -5.0),
//!         TraceFlags::empty(),
//!     );
//!     assert!(hit.is_some());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod error;
pub mod foundation;
pub mod kdop;

pub use error::{KdopError, KdopResult};

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, KdopConfig},
        error::{KdopError, KdopResult},
        foundation::{
            geometry::{Aabb, BoundingSphere, Frustum, Plane},
            math::{Mat3, Mat4, Vec3},
        },
        kdop::{
            BoxCollisionCheck, CheckResult, CollisionDataProvider, FormatVersion, FrustumQuery,
            KdopIndex, KdopTree, LineCollisionCheck, LineHit, PointCollisionCheck, PointHit,
            SphereQuery, StaticMeshCollision, TraceFlags, TreeStats,
        },
    };
}
