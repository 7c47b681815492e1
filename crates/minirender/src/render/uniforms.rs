//! Per-frame uniform data
//!
//! Model, view and projection matrices for the vertex shader, computed from
//! wall-clock time so the animation speed does not depend on frame rate.

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Point3, Vector3};

/// Spin rate of the model around +Z, in degrees per second
pub const ROTATION_DEGREES_PER_SECOND: f32 = 90.0;

const EYE: [f32; 3] = [2.0, 2.0, 2.0];
const FOV_Y_DEGREES: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 10.0;

/// Uniform block at binding 0, three column-major 4x4 matrices
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    /// Model-to-world transform
    pub model: [[f32; 4]; 4],
    /// World-to-camera transform
    pub view: [[f32; 4]; 4],
    /// Camera-to-clip transform with Vulkan's Y direction
    pub proj: [[f32; 4]; 4],
}

impl UniformBufferObject {
    /// Matrices for `elapsed_secs` since start at the given framebuffer extent
    pub fn at(elapsed_secs: f32, extent: (u32, u32)) -> Self {
        let model = Matrix4::from_axis_angle(&Vector3::z_axis(), rotation_angle(elapsed_secs));

        let view = Matrix4::look_at_rh(
            &Point3::new(EYE[0], EYE[1], EYE[2]),
            &Point3::origin(),
            &Vector3::z(),
        );

        let (width, height) = extent;
        let aspect = if height == 0 { 1.0 } else { width as f32 / height as f32 };
        let mut proj = Matrix4::new_perspective(aspect, FOV_Y_DEGREES.to_radians(), Z_NEAR, Z_FAR);
        // Vulkan clip space has +Y pointing down
        proj[(1, 1)] *= -1.0;

        Self {
            model: model.into(),
            view: view.into(),
            proj: proj.into(),
        }
    }

    /// Model rotation as a matrix, for inspection
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::from(self.model)
    }
}

/// Rotation about +Z after `elapsed_secs`, in radians
pub fn rotation_angle(elapsed_secs: f32) -> f32 {
    elapsed_secs * ROTATION_DEGREES_PER_SECOND.to_radians()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn model_angle(ubo: &UniformBufferObject) -> f32 {
        let m = ubo.model_matrix();
        m[(1, 0)].atan2(m[(0, 0)])
    }

    #[test]
    fn quarter_turn_per_second() {
        assert_relative_eq!(rotation_angle(1.0), FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(rotation_angle(0.0), 0.0);

        let ubo = UniformBufferObject::at(1.0, (800, 600));
        assert_relative_eq!(model_angle(&ubo), FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn rotation_grows_with_time() {
        let times = [0.1_f32, 0.5, 1.0, 1.5, 1.9];
        let angles: Vec<f32> = times
            .iter()
            .map(|&t| model_angle(&UniformBufferObject::at(t, (800, 600))))
            .collect();
        for pair in angles.windows(2) {
            assert!(pair[0] < pair[1], "angles not increasing: {:?}", angles);
        }
    }

    #[test]
    fn rotation_keeps_z_axis_fixed() {
        let m = UniformBufferObject::at(0.7, (800, 600)).model_matrix();
        let z = m.transform_vector(&Vector3::z());
        assert_relative_eq!(z, Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn projection_is_flipped_for_vulkan() {
        let ubo = UniformBufferObject::at(0.0, (800, 600));
        assert!(ubo.proj[1][1] < 0.0);
        // Column-major: proj[0][0] is f / aspect, proj[1][1] is -f
        assert_relative_eq!(ubo.proj[0][0] * 800.0 / 600.0, -ubo.proj[1][1], epsilon = 1e-5);
    }

    #[test]
    fn zero_height_does_not_produce_nan() {
        let ubo = UniformBufferObject::at(0.5, (800, 0));
        assert!(ubo.proj.iter().flatten().all(|v| v.is_finite()));
    }
}
