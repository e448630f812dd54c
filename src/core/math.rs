//! Minimal spatial types carried on the wire.

use serde::{Deserialize, Serialize};

/// A 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a vector.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Linear interpolation towards `other`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

/// An orientation quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quat {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
    /// W component.
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    /// The identity rotation.
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create a quaternion from raw components.
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    fn is_unit(self) -> bool {
        (self.dot(self) - 1.0).abs() <= 1e-3
    }

    fn mix(self, other: Self, t: f32) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
            self.w + (other.w - self.w) * t,
        )
    }

    /// Normalized linear interpolation along the shortest arc.
    ///
    /// Unless both ends are unit quaternions the result is a plain
    /// component-wise lerp with no sign flip (e.g. peers that send a zero
    /// `w` with Euler angles in `x/y/z`).
    pub fn nlerp(self, other: Self, t: f32) -> Self {
        if !(self.is_unit() && other.is_unit()) {
            return self.mix(other, t);
        }

        let other = if self.dot(other) < 0.0 {
            Self::new(-other.x, -other.y, -other.z, -other.w)
        } else {
            other
        };
        let mixed = self.mix(other, t);
        let len = mixed.dot(mixed).sqrt();
        if len <= f32::EPSILON {
            return mixed;
        }
        Self::new(mixed.x / len, mixed.y / len, mixed.z / len, mixed.w / len)
    }
}

/// Position and orientation of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub rotation: Quat,
}

impl Transform {
    /// Create a transform.
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_lerp() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(10.0, -4.0, 2.0);
        assert_eq!(a.lerp(b, 0.5), Vec3::new(5.0, -2.0, 1.0));
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }

    #[test]
    fn test_nlerp_euler_angles_blend_without_flip() {
        let a = Quat::new(0.1, 0.0, 0.0, 0.0);
        let b = Quat::new(-0.1, 0.0, 0.0, 0.0);
        let mid = a.nlerp(b, 0.5);
        assert!(mid.x.abs() < 1e-6);
        assert_eq!(a.nlerp(b, 1.0), b);

        let c = Quat::new(0.0, 1.5, -0.4, 0.0);
        assert_eq!(c.nlerp(c, 0.3), c);
    }

    #[test]
    fn test_nlerp_identity_is_stable() {
        let q = Quat::IDENTITY.nlerp(Quat::IDENTITY, 0.3);
        assert_eq!(q, Quat::IDENTITY);
    }

    #[test]
    fn test_nlerp_takes_shortest_arc() {
        let flipped = Quat::new(0.0, 0.0, 0.0, -1.0);
        let q = Quat::IDENTITY.nlerp(flipped, 0.5);
        assert!((q.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nlerp_unit_result() {
        let a = Quat::IDENTITY;
        let b = Quat::new(0.0, 0.70710677, 0.0, 0.70710677);
        let q = a.nlerp(b, 0.5);
        let len = (q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w).sqrt();
        assert!((len - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_nlerp_euler_fallback() {
        let a = Quat::new(0.0, 0.0, 0.0, 0.0);
        let b = Quat::new(1.0, 2.0, 0.0, 0.0);
        assert_eq!(a.nlerp(b, 0.5), Quat::new(0.5, 1.0, 0.0, 0.0));
    }
}
