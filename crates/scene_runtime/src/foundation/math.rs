//! Math utilities and types
//!
//! Provides the vector, quaternion and matrix aliases used by the scene graph,
//! plus [`AffineTransform`], the position/rotation/scale value that spatial
//! caches compose up the parent chain.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Smallest scale magnitude we are willing to divide by when inverting.
const MIN_SCALE: f32 = 1e-8;

/// Position, rotation and scale of a node relative to some reference space.
///
/// Transforms are plain values. Combining two of them never mutates either
/// input; see [`AffineTransform::combine`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    /// Translation
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Per-axis scale factors
    pub scale: Vec3,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl AffineTransform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Create a transform from all three parts
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Convert to a transformation matrix (TRS order)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Create a transform from a transformation matrix
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
        let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
        let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
        let scale = Vec3::new(scale_x, scale_y, scale_z);

        let rotation_matrix = Mat3::new(
            matrix.m11 / scale_x, matrix.m12 / scale_y, matrix.m13 / scale_z,
            matrix.m21 / scale_x, matrix.m22 / scale_y, matrix.m23 / scale_z,
            matrix.m31 / scale_x, matrix.m32 / scale_y, matrix.m33 / scale_z,
        );
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Map `child`, expressed in `parent`'s space, into the space `parent`
    /// itself is expressed in.
    pub fn combine(parent: &Self, child: &Self) -> Self {
        Self {
            position: parent.transform_point(child.position),
            rotation: parent.rotation * child.rotation,
            scale: parent.scale.component_mul(&child.scale),
        }
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * self.scale.component_mul(&point)
    }

    /// Map a point from the outer space back into this transform's space.
    ///
    /// Exact inverse of [`transform_point`](Self::transform_point). Zero scale
    /// axes collapse to zero instead of producing infinities.
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        let unrotated = self.rotation.inverse() * (point - self.position);
        unrotated.component_mul(&safe_reciprocal(&self.scale))
    }

    /// Rotation that, composed under this transform, yields `rotation`
    pub fn inverse_transform_rotation(&self, rotation: Quat) -> Quat {
        self.rotation.inverse() * rotation
    }

    /// Scale that, composed under this transform, yields `scale`
    pub fn inverse_transform_scale(&self, scale: Vec3) -> Vec3 {
        scale.component_mul(&safe_reciprocal(&self.scale))
    }

    /// Get the inverse transform
    pub fn inverse(&self) -> Self {
        let inv_scale = safe_reciprocal(&self.scale);
        let inv_rotation = self.rotation.inverse();
        let inv_position = (inv_rotation * -self.position).component_mul(&inv_scale);

        Self {
            position: inv_position,
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }
}

fn safe_reciprocal(v: &Vec3) -> Vec3 {
    v.map(|s| if s.abs() < MIN_SCALE { 0.0 } else { 1.0 / s })
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use constants::{HALF_PI, PI};

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_identity_combine_is_neutral() {
        let child = AffineTransform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Vec3::y_axis(), 0.3),
            Vec3::new(2.0, 2.0, 2.0),
        );

        let combined = AffineTransform::combine(&AffineTransform::identity(), &child);
        assert_relative_eq!(combined.position, child.position, epsilon = EPSILON);
        assert_relative_eq!(combined.scale, child.scale, epsilon = EPSILON);
        assert_relative_eq!(combined.rotation, child.rotation, epsilon = EPSILON);
    }

    #[test]
    fn test_combine_rotates_and_translates_child() {
        let parent = AffineTransform::from_position_rotation(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::y_axis(), HALF_PI),
        );
        let child = AffineTransform::from_position(Vec3::new(0.0, 0.0, 1.0));

        let combined = AffineTransform::combine(&parent, &child);

        // (0,0,1) rotated 90 degrees about Y lands on (1,0,0), then offset by the parent.
        assert_relative_eq!(combined.position, Vec3::new(2.0, 0.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_combine_applies_parent_scale_to_child_offset() {
        let parent = AffineTransform::new(
            Vec3::new(0.0, 1.0, 0.0),
            Quat::identity(),
            Vec3::new(2.0, 3.0, 4.0),
        );
        let child = AffineTransform::from_position(Vec3::new(1.0, 1.0, 1.0));

        let combined = AffineTransform::combine(&parent, &child);
        assert_relative_eq!(combined.position, Vec3::new(2.0, 4.0, 4.0), epsilon = EPSILON);
        assert_relative_eq!(combined.scale, Vec3::new(2.0, 3.0, 4.0), epsilon = EPSILON);
    }

    #[test]
    fn test_inverse_transform_point_round_trip() {
        let transform = AffineTransform::new(
            Vec3::new(-3.0, 0.5, 7.0),
            Quat::from_axis_angle(&Unit::new_normalize(Vec3::new(1.0, 1.0, 0.0)), PI / 3.0),
            Vec3::new(0.5, 2.0, 1.5),
        );
        let point = Vec3::new(4.0, -1.0, 2.5);

        let local = transform.inverse_transform_point(point);
        assert_relative_eq!(transform.transform_point(local), point, epsilon = 1e-4);
    }

    #[test]
    fn test_inverse_with_uniform_scale_undoes_combine() {
        let transform = AffineTransform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Vec3::z_axis(), 0.7),
            Vec3::new(2.0, 2.0, 2.0),
        );

        let undone = AffineTransform::combine(&transform.inverse(), &transform);
        assert_relative_eq!(undone.position, Vec3::zeros(), epsilon = 1e-4);
        assert_relative_eq!(undone.scale, Vec3::new(1.0, 1.0, 1.0), epsilon = EPSILON);
        assert_relative_eq!(undone.rotation, Quat::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_zero_scale_does_not_produce_infinities() {
        let flat = AffineTransform::new(Vec3::zeros(), Quat::identity(), Vec3::new(1.0, 0.0, 1.0));
        let local = flat.inverse_transform_point(Vec3::new(1.0, 5.0, 1.0));

        assert!(local.iter().all(|c| c.is_finite()));
        assert_relative_eq!(local, Vec3::new(1.0, 0.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_matrix_roundtrip_consistency() {
        let original = AffineTransform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Unit::new_normalize(Vec3::new(1.0, 1.0, 1.0)), 0.5),
            Vec3::new(2.0, 1.5, 0.8),
        );

        let reconstructed = AffineTransform::from_matrix(&original.to_matrix());

        assert_relative_eq!(reconstructed.position, original.position, epsilon = EPSILON);
        assert_relative_eq!(reconstructed.scale, original.scale, epsilon = EPSILON);

        // Quaternions might flip sign but represent same rotation
        let dot = original.rotation.coords.dot(&reconstructed.rotation.coords);
        assert!(dot.abs() > 0.999, "Quaternion rotation mismatch: dot product = {}", dot);
    }
}
