use std::time::Duration;

pub const WINDOW_WIDTH: u32 = 800;
pub const WINDOW_HEIGHT: u32 = 600;
pub const WINDOW_TITLE: &str = "vkscene";

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Upper bound of the variable-count texture array declared in the fragment shader
pub const MAX_TEXTURES: u32 = 16;

pub const SHADER_NAME: &str = "scene";
pub const SHADERS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders-built");

pub const SCENE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/scene.txt");

/// Texture slots referenced by index from the scene file
pub const TEXTURE_PATHS: &[&str] = &[
    concat!(env!("CARGO_MANIFEST_DIR"), "/assets/textures/checker.png"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/assets/textures/stripes.png"),
];

/// Contains configuration options for the renderer like vsync and the fence timeout
pub struct RenderConfig {
    pub vsync: bool,
    /// How long a fence wait may block before the device is considered hung
    pub fence_timeout: Duration,
    pub clear_color: [f32; 4],
    pub enable_validation: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vsync: false,
            fence_timeout: Duration::from_secs(5),
            clear_color: [0.02, 0.02, 0.04, 1.0],
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl RenderConfig {
    pub fn fence_timeout_ns(&self) -> u64 {
        u64::try_from(self.fence_timeout.as_nanos()).unwrap_or(u64::MAX)
    }
}
