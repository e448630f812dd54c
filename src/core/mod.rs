//! Core constants, spatial types, and the top-level error.

pub mod constants;
mod error;
mod math;

pub use error::{MeshError, MeshResult};
pub use math::{Quat, Transform, Vec3};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
