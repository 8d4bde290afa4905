use std::collections::HashSet;
use glam::Vec2;
use winit::event::{ElementState, MouseButton};
use winit::keyboard::KeyCode;

/// Input gathered from window callbacks between two frames
#[derive(Default)]
pub struct InputState {
    pub mouse_curr_pos: Vec2,
    pub mouse_prev_pos: Vec2,
    pub mouse_right_down: bool,
    held_keys: HashSet<KeyCode>,

    pub resized: bool,
    pub close_requested: bool,
}

impl InputState {
    pub fn on_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if key == KeyCode::Escape {
                    self.close_requested = true;
                }
                self.held_keys.insert(key);
            }
            ElementState::Released => {
                self.held_keys.remove(&key);
            }
        }
    }

    pub fn on_cursor(&mut self, x: f64, y: f64) {
        self.mouse_curr_pos = Vec2::new(x as f32, y as f32);
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Right {
            self.mouse_right_down = state.is_pressed();
            // Drags start where the button went down
            self.mouse_prev_pos = self.mouse_curr_pos;
        }
    }

    pub fn on_resize(&mut self, _width: u32, _height: u32) {
        self.resized = true;
    }

    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held_keys.contains(&key)
    }

    /// Cursor movement since the last frame while the right button is held
    pub fn drag_delta(&self) -> Vec2 {
        if self.mouse_right_down {
            self.mouse_curr_pos - self.mouse_prev_pos
        } else {
            Vec2::ZERO
        }
    }

    /// Reset the per-frame input states for the next frame.
    pub fn reset_frame(&mut self) {
        self.mouse_prev_pos = self.mouse_curr_pos;
        self.resized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_only_counts_while_right_button_is_held() {
        let mut input = InputState::default();
        input.on_cursor(10.0, 10.0);
        input.reset_frame();
        input.on_cursor(30.0, 5.0);
        assert_eq!(input.drag_delta(), Vec2::ZERO);

        input.on_mouse_button(MouseButton::Right, ElementState::Pressed);
        input.on_cursor(35.0, 15.0);
        assert_eq!(input.drag_delta(), Vec2::new(5.0, 10.0));

        input.reset_frame();
        assert_eq!(input.drag_delta(), Vec2::ZERO);

        input.on_mouse_button(MouseButton::Right, ElementState::Released);
        input.on_cursor(100.0, 100.0);
        assert_eq!(input.drag_delta(), Vec2::ZERO);
    }

    #[test]
    fn keys_are_held_until_released() {
        let mut input = InputState::default();
        input.on_key(KeyCode::KeyW, ElementState::Pressed);
        input.reset_frame();
        assert!(input.is_held(KeyCode::KeyW));
        input.on_key(KeyCode::KeyW, ElementState::Released);
        assert!(!input.is_held(KeyCode::KeyW));
        assert!(!input.close_requested);
    }

    #[test]
    fn escape_requests_close() {
        let mut input = InputState::default();
        input.on_key(KeyCode::Escape, ElementState::Pressed);
        assert!(input.close_requested);
    }

    #[test]
    fn resize_flag_lasts_one_frame() {
        let mut input = InputState::default();
        input.on_resize(1024, 768);
        assert!(input.resized);
        input.reset_frame();
        assert!(!input.resized);
    }
}
