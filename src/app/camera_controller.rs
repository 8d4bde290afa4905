use std::f32::consts::PI;
use glam::{Vec2, Vec3};
use winit::keyboard::KeyCode;
use crate::app::input_state::InputState;
use crate::renderer::camera::Camera;

/// Fly-through controls: right-drag to look around, WASD to move on the view
/// plane, Space and Shift to move along world up.
pub struct CameraController {
    rotation_sensitivity: f32,
    move_speed: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            rotation_sensitivity: 1.0,
            move_speed: 3.0,
        }
    }
}

impl CameraController {
    pub fn process_input(
        &self,
        camera: &mut Camera,
        input_state: &InputState,
        viewport_size: Vec2,
        delta_time: f32,
    ) {
        self.rotate(camera, input_state.drag_delta(), viewport_size);

        let axis = |positive: KeyCode, negative: KeyCode| {
            input_state.is_held(positive) as i32 as f32 - input_state.is_held(negative) as i32 as f32
        };
        let direction = camera.get_forward() * axis(KeyCode::KeyW, KeyCode::KeyS)
            + camera.get_right() * axis(KeyCode::KeyD, KeyCode::KeyA)
            + camera.get_world_up() * axis(KeyCode::Space, KeyCode::ShiftLeft);

        let direction = direction.normalize_or_zero();
        if direction != Vec3::ZERO {
            camera.translate(direction * self.move_speed * delta_time);
        }
    }

    fn rotate(&self, camera: &mut Camera, drag: Vec2, viewport_size: Vec2) {
        if drag == Vec2::ZERO || viewport_size.min_element() <= 0.0 {
            return;
        }

        // Left to right = 2*PI, top to bottom = PI
        let delta_angle_x = 2.0 * PI / viewport_size.x;
        let delta_angle_y = PI / viewport_size.y;
        camera.rotate(
            -drag.x * delta_angle_x * self.rotation_sensitivity,
            -drag.y * delta_angle_y * self.rotation_sensitivity,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use winit::event::{ElementState, MouseButton};

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

    fn camera() -> Camera {
        Camera::new(Vec3::new(0.0, 0.0, 5.0))
    }

    #[test]
    fn forward_key_moves_along_view_direction() {
        let mut camera = camera();
        let mut input = InputState::default();
        input.on_key(KeyCode::KeyW, ElementState::Pressed);

        let controller = CameraController::default();
        controller.process_input(&mut camera, &input, VIEWPORT, 0.5);

        let moved = camera.get_position() - Vec3::new(0.0, 0.0, 5.0);
        assert_relative_eq!(moved.length(), controller.move_speed * 0.5, epsilon = 1e-5);
        assert_relative_eq!(moved.normalize().dot(camera.get_forward()), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut camera = camera();
        let mut input = InputState::default();
        input.on_key(KeyCode::KeyA, ElementState::Pressed);
        input.on_key(KeyCode::KeyD, ElementState::Pressed);

        CameraController::default().process_input(&mut camera, &input, VIEWPORT, 1.0);
        assert_eq!(camera.get_position(), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn space_rises_along_world_up() {
        let mut camera = camera();
        camera.rotate(0.0, 0.7);
        let mut input = InputState::default();
        input.on_key(KeyCode::Space, ElementState::Pressed);

        CameraController::default().process_input(&mut camera, &input, VIEWPORT, 1.0);
        let position = camera.get_position();
        assert_relative_eq!(position.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(position.y, 3.0, epsilon = 1e-5);
        assert_relative_eq!(position.z, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn dragging_right_turns_right() {
        let mut camera = camera();
        let mut input = InputState::default();
        input.on_cursor(400.0, 300.0);
        input.reset_frame();
        input.on_mouse_button(MouseButton::Right, ElementState::Pressed);
        input.on_cursor(500.0, 300.0);

        CameraController::default().process_input(&mut camera, &input, VIEWPORT, 0.016);
        assert!(camera.get_forward().x > 0.0);
        assert_relative_eq!(camera.get_pitch(), 0.0, epsilon = 1e-5);
        assert_eq!(camera.get_position(), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn dragging_far_down_stops_at_pitch_limit() {
        let mut camera = camera();
        let mut input = InputState::default();
        input.on_mouse_button(MouseButton::Right, ElementState::Pressed);
        input.on_cursor(0.0, 5000.0);

        CameraController::default().process_input(&mut camera, &input, VIEWPORT, 0.016);
        assert_relative_eq!(camera.get_pitch(), -Camera::MAX_PITCH, epsilon = 1e-6);
    }
}
