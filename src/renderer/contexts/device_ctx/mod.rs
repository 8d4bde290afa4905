pub mod device;
pub mod instance;
pub mod queue;
pub mod target;
pub mod transfer_ctx;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crate::renderer::RenderWindow;
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::device_ctx::instance::RenderInstance;
use crate::renderer::contexts::device_ctx::target::RenderTarget;

/// Responsibilities:
/// - Manage the Vulkan instance, device, and queue
/// - Own the presentation surface and swapchain
///
/// Field order is drop order: swapchain and surface, then device, then instance.
pub struct RenderDeviceContext {
    pub target: RenderTarget,
    pub device: RenderDevice,
    pub instance: RenderInstance,
}

impl RenderDeviceContext {
    pub fn new(
        window: &impl RenderWindow,
        config: &RenderConfig,
    ) -> Result<Self> {
        let extensions = window.required_instance_extensions()?;
        let instance = RenderInstance::new(&extensions, config.enable_validation)?;
        let surface = window
            .create_surface(&instance.entry, &instance.instance)
            .wrap_err("Failed to create window surface")?;

        let device_and_target = RenderDevice::new(&instance, surface, config.fence_timeout_ns())
            .and_then(|device| {
                let target = RenderTarget::new(
                    surface,
                    window.drawable_extent(),
                    config.vsync,
                    &instance,
                    &device,
                )?;
                Ok((device, target))
            });
        let (device, target) = match device_and_target {
            Ok(pair) => pair,
            Err(e) => {
                unsafe { instance.surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        Ok(Self {
            target,
            device,
            instance,
        })
    }
}
