//! Rigid transforms used for link poses and attachment offsets.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// A rigid transform (rotation followed by translation).
///
/// Serialized as the 7-element array `[qw, qx, qy, qz, tx, ty, tz]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 7]", into = "[f32; 7]")]
pub struct Pose {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation,
        }
    }

    /// Transforms a point from this frame into the parent frame.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: rotation * -self.translation,
        }
    }

    /// Returns `true` when the two transforms agree within `epsilon`.
    ///
    /// `q` and `-q` describe the same rotation and compare equal.
    pub fn approx_eq(&self, other: &Pose, epsilon: f32) -> bool {
        let same_rotation = self.rotation.abs_diff_eq(other.rotation, epsilon)
            || self.rotation.abs_diff_eq(-other.rotation, epsilon);
        same_rotation && self.translation.abs_diff_eq(other.translation, epsilon)
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        Pose {
            rotation: self.rotation * rhs.rotation,
            translation: self.transform_point(rhs.translation),
        }
    }
}

impl From<[f32; 7]> for Pose {
    fn from(v: [f32; 7]) -> Self {
        Self {
            rotation: Quat::from_xyzw(v[1], v[2], v[3], v[0]),
            translation: Vec3::new(v[4], v[5], v[6]),
        }
    }
}

impl From<Pose> for [f32; 7] {
    fn from(p: Pose) -> Self {
        let q = p.rotation;
        let t = p.translation;
        [q.w, q.x, q.y, q.z, t.x, t.y, t.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn composition_applies_left_frame_last() {
        let parent = Pose::new(
            Quat::from_rotation_z(FRAC_PI_2),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let child = Pose::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let world = parent * child;
        assert!(world.translation.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn negated_quaternion_is_same_pose() {
        let a = Pose::new(Quat::from_rotation_x(0.3), Vec3::ONE);
        let b = Pose::new(-a.rotation, Vec3::ONE);
        assert!(a.approx_eq(&b, 1e-6));
        assert!((a * a.inverse()).approx_eq(&Pose::IDENTITY, 1e-5));
    }

    #[test]
    fn json_layout_is_wxyz_then_translation() {
        let pose = Pose::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let json = serde_json::to_value(pose).unwrap();
        assert_eq!(json, serde_json::json!([1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0]));
    }
}
