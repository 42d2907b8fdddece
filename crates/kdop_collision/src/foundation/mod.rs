//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and matrix helpers
//! - Geometric value types (boxes, planes, frustums, spheres)
//! - Time measurement
//! - Logging utilities

pub mod geometry;
pub mod logging;
pub mod math;
pub mod time;
