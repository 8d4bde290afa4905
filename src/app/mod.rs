mod camera_controller;
mod input_state;
mod platform;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};
use color_eyre::Result;
use glam::{Vec2, Vec3};
use crate::app::camera_controller::CameraController;
use crate::app::input_state::InputState;
use crate::app::platform::Platform;
use crate::renderer::camera::Camera;
use crate::renderer::config::{RenderConfig, SCENE_PATH, WINDOW_HEIGHT, WINDOW_TITLE, WINDOW_WIDTH};
use crate::renderer::{FrameStatus, RenderWindow, Renderer};
use crate::scene::Scene;

/// Field order is drop order: the renderer's surface must go before the window.
pub struct App {
    renderer: Renderer,
    platform: Platform,
    scene: Scene,
    camera: Camera,
    camera_controller: CameraController,

    // State
    input_state: Rc<RefCell<InputState>>,
    prev_frame_time: Instant,
    sim_time_secs: f32,
    frame_counter: FrameCounter,
}

impl App {
    const DEFAULT_CAMERA_EYE: Vec3 = Vec3::new(0.0, 2.0, 6.0);

    pub fn new() -> Result<Self> {
        let scene = Scene::load(Path::new(SCENE_PATH))?;
        let mut platform = Platform::new(WINDOW_TITLE, WINDOW_WIDTH, WINDOW_HEIGHT)?;

        let input_state = Rc::new(RefCell::new(InputState::default()));
        {
            let input = Rc::clone(&input_state);
            platform.on_resize(move |width, height| input.borrow_mut().on_resize(width, height));
            let input = Rc::clone(&input_state);
            platform.on_key(move |key, state| input.borrow_mut().on_key(key, state));
            let input = Rc::clone(&input_state);
            platform.on_cursor(move |x, y| input.borrow_mut().on_cursor(x, y));
            let input = Rc::clone(&input_state);
            platform.on_mouse_button(move |button, state| {
                input.borrow_mut().on_mouse_button(button, state)
            });
        }

        let renderer = Renderer::new(&platform, &scene, RenderConfig::default())?;
        log::info!("Rendering with {}", renderer.device_name());

        let camera = Camera::new(scene.camera_eye.unwrap_or(Self::DEFAULT_CAMERA_EYE));

        Ok(Self {
            renderer,
            platform,
            scene,
            camera,
            camera_controller: CameraController::default(),

            input_state,
            prev_frame_time: Instant::now(),
            sim_time_secs: 0.0,
            frame_counter: FrameCounter::new(Instant::now()),
        })
    }

    pub fn run(&mut self) -> Result<()> {
        self.prev_frame_time = Instant::now();

        loop {
            self.platform.poll_events();
            if self.input_state.borrow().close_requested {
                self.platform.request_close();
            }
            if self.platform.should_close() {
                break;
            }

            let curr_frame_time = Instant::now();
            let delta_time_secs = curr_frame_time.duration_since(self.prev_frame_time).as_secs_f32();
            self.prev_frame_time = curr_frame_time;
            self.sim_time_secs += delta_time_secs;

            {
                let input_state = self.input_state.borrow();
                if input_state.resized {
                    self.renderer.request_resize();
                }
                let extent = self.platform.drawable_extent();
                self.camera_controller.process_input(
                    &mut self.camera,
                    &input_state,
                    Vec2::new(extent.width as f32, extent.height as f32),
                    delta_time_secs,
                );
            }

            let objects = self.scene.object_uniforms(self.sim_time_secs);
            let status = self.renderer.draw_frame(&mut self.platform, &self.camera, &objects)?;
            if status != FrameStatus::Recreated {
                if let Some(fps) = self.frame_counter.tick(Instant::now()) {
                    log::info!("FPS: {fps:.1}");
                }
            }

            self.input_state.borrow_mut().reset_frame();
        }

        log::info!("Closing after {:.1}s of simulation", self.sim_time_secs);
        Ok(())
    }
}

/// Counts presented frames and reports the rate once per interval
struct FrameCounter {
    frames: u32,
    interval_start: Instant,
}

impl FrameCounter {
    const INTERVAL: Duration = Duration::from_secs(1);

    fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            interval_start: now,
        }
    }

    fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.duration_since(self.interval_start);
        if elapsed < Self::INTERVAL {
            return None;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.interval_start = now;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn frame_counter_reports_once_per_second() {
        let start = Instant::now();
        let mut counter = FrameCounter::new(start);
        for i in 1..60 {
            assert_eq!(counter.tick(start + Duration::from_millis(i * 16)), None);
        }
        let fps = counter.tick(start + Duration::from_secs(1));
        assert_relative_eq!(fps.unwrap_or_default(), 60.0, epsilon = 1e-3);
        assert_eq!(counter.tick(start + Duration::from_millis(1016)), None);
    }
}
