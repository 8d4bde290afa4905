use std::ffi::c_char;
use std::time::Duration;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::{eyre, OptionExt, WrapErr};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};
use crate::renderer::RenderWindow;

type ResizeHandler = Box<dyn FnMut(u32, u32)>;
type KeyHandler = Box<dyn FnMut(KeyCode, ElementState)>;
type CursorHandler = Box<dyn FnMut(f64, f64)>;
type MouseButtonHandler = Box<dyn FnMut(MouseButton, ElementState)>;

#[derive(Default)]
struct Subscriptions {
    resize: Vec<ResizeHandler>,
    key: Vec<KeyHandler>,
    cursor: Vec<CursorHandler>,
    mouse_button: Vec<MouseButtonHandler>,
}

struct WindowState {
    title: String,
    size: PhysicalSize<u32>,
    window: Option<Window>,
    creation_error: Option<winit::error::OsError>,
    close_requested: bool,
    subscriptions: Subscriptions,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(self.size);
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(e) => self.creation_error = Some(e),
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(Window::id) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                for handler in &mut self.subscriptions.resize {
                    handler(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state,
                    repeat: false,
                    ..
                },
                ..
            } => {
                for handler in &mut self.subscriptions.key {
                    handler(code, state);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                for handler in &mut self.subscriptions.cursor {
                    handler(position.x, position.y);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                for handler in &mut self.subscriptions.mouse_button {
                    handler(button, state);
                }
            }
            _ => {}
        }
    }
}

/// Window and event source driven from the application's own loop.
///
/// Events are pumped on demand instead of handing control to `EventLoop::run_app`,
/// so the frame loop stays in charge. Handlers run synchronously inside
/// [`Platform::poll_events`] and [`Platform::wait_events`].
pub struct Platform {
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl Platform {
    const STARTUP_ATTEMPTS: usize = 100;

    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let event_loop = EventLoop::new().wrap_err("Failed to create event loop")?;
        let mut platform = Self {
            state: WindowState {
                title: title.to_owned(),
                size: PhysicalSize::new(width, height),
                window: None,
                creation_error: None,
                close_requested: false,
                subscriptions: Subscriptions::default(),
            },
            event_loop,
        };

        // The window is created by the first `resumed` event
        for _ in 0..Self::STARTUP_ATTEMPTS {
            platform.pump(Some(Duration::from_millis(10)));
            if let Some(e) = platform.state.creation_error.take() {
                return Err(e).wrap_err("Failed to create window");
            }
            if platform.state.window.is_some() {
                return Ok(platform);
            }
        }
        Err(eyre!("Event loop never resumed; no window was created"))
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        let status = self.event_loop.pump_app_events(timeout, &mut self.state);
        if let PumpStatus::Exit(code) = status {
            log::debug!("Event loop exited with code {code}");
            self.state.close_requested = true;
        }
    }

    fn window(&self) -> Result<&Window> {
        self.state.window.as_ref().ok_or_eyre("Window does not exist")
    }

    /// Dispatches pending events without blocking
    pub fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    pub fn request_close(&mut self) {
        self.state.close_requested = true;
    }

    pub fn on_resize(&mut self, handler: impl FnMut(u32, u32) + 'static) {
        self.state.subscriptions.resize.push(Box::new(handler));
    }

    pub fn on_key(&mut self, handler: impl FnMut(KeyCode, ElementState) + 'static) {
        self.state.subscriptions.key.push(Box::new(handler));
    }

    pub fn on_cursor(&mut self, handler: impl FnMut(f64, f64) + 'static) {
        self.state.subscriptions.cursor.push(Box::new(handler));
    }

    pub fn on_mouse_button(&mut self, handler: impl FnMut(MouseButton, ElementState) + 'static) {
        self.state.subscriptions.mouse_button.push(Box::new(handler));
    }
}

impl RenderWindow for Platform {
    fn required_instance_extensions(&self) -> Result<Vec<*const c_char>> {
        let display = self.window()?.display_handle()?.as_raw();
        let extensions = ash_window::enumerate_required_extensions(display)
            .wrap_err("Window system is not supported by Vulkan")?;
        Ok(extensions.to_vec())
    }

    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<vk::SurfaceKHR> {
        let window = self.window()?;
        let surface = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                window.display_handle()?.as_raw(),
                window.window_handle()?.as_raw(),
                None,
            )?
        };
        Ok(surface)
    }

    fn drawable_extent(&self) -> vk::Extent2D {
        let size = self
            .state
            .window
            .as_ref()
            .map_or(PhysicalSize::new(0, 0), Window::inner_size);
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }
}
