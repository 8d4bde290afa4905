use glam::{Mat4, Quat, Vec3};
use crate::renderer::shader_data::CameraUniform;
use crate::renderer::util;

/// Free-flying camera. Orientation is yaw about world up composed with pitch
/// about the camera's right axis; roll is never introduced.
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    world_up: Vec3,
    fov_y_deg: f32,
    near: f32,
    far: f32,
}

impl Camera {
    const DEFAULT_FOV_Y_DEG: f32 = 45.0;
    /// Keeps the view direction away from the poles where `look_to` degenerates
    pub const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;

    pub fn new(position: Vec3) -> Self {
        let mut camera = Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            world_up: Vec3::Y,
            fov_y_deg: Self::DEFAULT_FOV_Y_DEG,
            near: 0.1,
            far: 100.0,
        };
        camera.look_at(Vec3::ZERO);
        camera
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    pub fn look_at(&mut self, target: Vec3) {
        if target == self.position {
            return;
        }
        let forward = target - self.position;
        self.yaw = util::calculate_yaw(forward);
        self.set_pitch(util::calculate_pitch(forward));
    }

    /// Adds to yaw and pitch, clamping pitch to [`Self::MAX_PITCH`]
    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw = (self.yaw + delta_yaw) % std::f32::consts::TAU;
        self.set_pitch(self.pitch + delta_pitch);
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
    }

    pub fn get_orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }

    pub fn get_forward(&self) -> Vec3 {
        util::calculate_direction(self.pitch, self.yaw)
    }

    pub fn get_right(&self) -> Vec3 {
        self.get_orientation() * Vec3::X
    }

    pub fn get_view_mat(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.get_forward(), self.world_up)
    }

    /// Vulkan's clip space points Y down, so the projection flips it
    pub fn get_proj_mat(&self, aspect_ratio: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            aspect_ratio,
            self.near,
            self.far,
        );
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn uniform(&self, aspect_ratio: f32) -> CameraUniform {
        let view = self.get_view_mat();
        let proj = self.get_proj_mat(aspect_ratio);
        CameraUniform {
            view,
            proj,
            view_proj: proj * view,
        }
    }

    pub fn get_position(&self) -> Vec3 {
        self.position
    }

    pub fn get_pitch(&self) -> f32 {
        self.pitch
    }

    pub fn get_world_up(&self) -> Vec3 {
        self.world_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn pitch_is_clamped_both_ways() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0));
        camera.rotate(0.0, 10.0);
        assert_relative_eq!(camera.get_pitch(), Camera::MAX_PITCH);
        camera.rotate(0.0, -20.0);
        assert_relative_eq!(camera.get_pitch(), -Camera::MAX_PITCH);
        assert!(camera.get_forward().y > -1.0);
    }

    #[test]
    fn new_camera_faces_the_origin() {
        let camera = Camera::new(Vec3::new(3.0, 4.0, 5.0));
        let expected = (-camera.get_position()).normalize();
        let forward = camera.get_forward();
        assert_relative_eq!(forward.x, expected.x, epsilon = 1e-5);
        assert_relative_eq!(forward.y, expected.y, epsilon = 1e-5);
        assert_relative_eq!(forward.z, expected.z, epsilon = 1e-5);
    }

    #[test]
    fn projection_flips_y() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0));
        let proj = camera.get_proj_mat(4.0 / 3.0);
        assert!(proj.y_axis.y < 0.0);

        // A point above the view axis lands in the upper half of Vulkan clip space (negative y)
        let clip = camera.uniform(4.0 / 3.0).view_proj * Vec4::new(0.0, 1.0, 0.0, 1.0);
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn view_proj_is_proj_times_view() {
        let mut camera = Camera::new(Vec3::new(1.0, 2.0, 3.0));
        camera.rotate(0.4, -0.2);
        let uniform = camera.uniform(16.0 / 9.0);
        assert_eq!(uniform.view_proj, uniform.proj * uniform.view);
    }

    #[test]
    fn orientation_has_no_roll() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0));
        camera.rotate(1.1, 0.6);
        assert_relative_eq!(camera.get_right().y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn forward_follows_orientation() {
        let mut camera = Camera::new(Vec3::new(-2.0, 1.0, 4.0));
        camera.rotate(0.9, 0.3);
        let rotated = camera.get_orientation() * Vec3::NEG_Z;
        let forward = camera.get_forward();
        assert_relative_eq!(forward.x, rotated.x, epsilon = 1e-5);
        assert_relative_eq!(forward.y, rotated.y, epsilon = 1e-5);
        assert_relative_eq!(forward.z, rotated.z, epsilon = 1e-5);
    }
}
