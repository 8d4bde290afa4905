pub mod camera;
pub mod config;
pub mod resources;
pub mod shader_data;
pub mod util;

mod contexts;
mod internals;

use std::ffi::c_char;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::{eyre, OptionExt, WrapErr};
use crate::renderer::camera::Camera;
use crate::renderer::config::{RenderConfig, MAX_FRAMES_IN_FLIGHT, TEXTURE_PATHS};
use crate::renderer::contexts::device_ctx::RenderDeviceContext;
use crate::renderer::contexts::frame_ctx::sync::FrameSync;
use crate::renderer::contexts::frame_ctx::{
    AcquireOutcome,
    FrameBackend,
    FrameScheduler,
    PresentOutcome,
};
use crate::renderer::contexts::resource_ctx::{DrawItem, SceneResources, SizeDependentResources};
use crate::renderer::shader_data::ObjectUniform;
use crate::scene::Scene;

pub use crate::renderer::contexts::frame_ctx::FrameStatus;

/// What the renderer needs from the window system
pub trait RenderWindow {
    /// Instance extensions required to present to this window
    fn required_instance_extensions(&self) -> Result<Vec<*const c_char>>;
    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<vk::SurfaceKHR>;
    /// Current framebuffer size in pixels; zero while minimized
    fn drawable_extent(&self) -> vk::Extent2D;
    /// Blocks until at least one window event arrived
    fn wait_events(&mut self);
    fn should_close(&self) -> bool;
}

/// Field order is drop order. Everything is released before the device context.
pub struct Renderer {
    scheduler: FrameScheduler,
    size_dependent: Option<SizeDependentResources>,
    frame_sync: FrameSync,
    scene_resources: SceneResources,
    config: RenderConfig,
    device_ctx: RenderDeviceContext,
}

impl Renderer {
    pub fn new(window: &impl RenderWindow, scene: &Scene, config: RenderConfig) -> Result<Self> {
        let device_ctx = RenderDeviceContext::new(window, &config)?;
        let dev = &device_ctx.device;

        let draws = scene
            .entities
            .iter()
            .map(|entity| DrawItem {
                geometry: entity.geometry,
                texture: entity.texture,
            })
            .collect();
        let scene_resources = SceneResources::new(&scene.vertex_sets, draws, TEXTURE_PATHS, dev)?;
        let frame_sync = FrameSync::new(
            MAX_FRAMES_IN_FLIGHT,
            config.fence_timeout_ns(),
            dev.logical.clone(),
        )?;
        let size_dependent = SizeDependentResources::new(
            dev,
            device_ctx.target.swapchain()?,
            &scene_resources,
            config.clear_color,
        )?;
        let scheduler = FrameScheduler::new(device_ctx.target.swapchain()?.image_count());

        Ok(Self {
            scheduler,
            size_dependent: Some(size_dependent),
            frame_sync,
            scene_resources,
            config,
            device_ctx,
        })
    }

    /// Rebuild the size-dependent resources after the next present
    pub fn request_resize(&mut self) {
        self.scheduler.request_resize();
    }

    pub fn device_name(&self) -> &str {
        &self.device_ctx.device.name
    }

    /// Renders one frame. `objects` holds one uniform per scene entity, in scene order.
    pub fn draw_frame<W: RenderWindow>(
        &mut self,
        window: &mut W,
        camera: &Camera,
        objects: &[ObjectUniform],
    ) -> Result<FrameStatus> {
        if self.size_dependent.is_none() {
            // A previous rebuild was abandoned while the window was minimized
            let image_count = rebuild(
                &mut self.device_ctx,
                &mut self.size_dependent,
                &self.scene_resources,
                &self.config,
                window,
            )?;
            self.scheduler.reset(image_count);
            return Ok(FrameStatus::Recreated);
        }

        let mut backend = VulkanFrame {
            device_ctx: &mut self.device_ctx,
            size_dependent: &mut self.size_dependent,
            sync: &self.frame_sync,
            scene: &self.scene_resources,
            config: &self.config,
            window,
            camera,
            objects,
        };
        self.scheduler.draw_frame(&mut backend)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device_ctx.device.wait_idle() {
            log::error!("Failed to drain the device before shutdown: {e:?}");
        }
    }
}

/// Drains the device, then rebuilds the swapchain and everything sized by it.
/// Returns the new image count, or 0 if the window closed while minimized.
fn rebuild<W: RenderWindow>(
    device_ctx: &mut RenderDeviceContext,
    size_dependent: &mut Option<SizeDependentResources>,
    scene: &SceneResources,
    config: &RenderConfig,
    window: &mut W,
) -> Result<usize> {
    device_ctx.device.wait_idle()?;
    *size_dependent = None;

    let mut extent = window.drawable_extent();
    while extent.width == 0 || extent.height == 0 {
        if window.should_close() {
            return Ok(0);
        }
        window.wait_events();
        extent = window.drawable_extent();
    }

    device_ctx
        .target
        .resize(extent, &device_ctx.instance, &device_ctx.device)
        .wrap_err("Failed to recreate swapchain")?;
    let swapchain = device_ctx.target.swapchain()?;
    *size_dependent = Some(SizeDependentResources::new(
        &device_ctx.device,
        swapchain,
        scene,
        config.clear_color,
    )?);
    Ok(swapchain.image_count())
}

/// Binds the scheduler's steps to the Vulkan objects of one frame
struct VulkanFrame<'a, W: RenderWindow> {
    device_ctx: &'a mut RenderDeviceContext,
    size_dependent: &'a mut Option<SizeDependentResources>,
    sync: &'a FrameSync,
    scene: &'a SceneResources,
    config: &'a RenderConfig,
    window: &'a mut W,
    camera: &'a Camera,
    objects: &'a [ObjectUniform],
}

impl<W: RenderWindow> VulkanFrame<'_, W> {
    fn resources(&mut self) -> Result<&mut SizeDependentResources> {
        self.size_dependent
            .as_mut()
            .ok_or_eyre("Size-dependent resources are missing")
    }
}

impl<W: RenderWindow> FrameBackend for VulkanFrame<'_, W> {
    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        self.sync.wait(slot)
    }

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let swapchain = self.device_ctx.target.swapchain()?;
        let result = unsafe {
            swapchain.swapchain_loader.acquire_next_image(
                swapchain.swapchain,
                self.config.fence_timeout_ns(),
                self.sync.image_available(slot)?,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index: image_index as usize,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
                Err(eyre!("Device hang: no swapchain image became available"))
            }
            Err(e) => Err(e).wrap_err("Failed to acquire swapchain image"),
        }
    }

    fn write_uniforms(&mut self, image_index: usize) -> Result<()> {
        let camera = self.camera;
        let objects = self.objects;
        let resources = self.resources()?;
        let extent = resources.extent;
        let aspect_ratio = extent.width as f32 / extent.height.max(1) as f32;
        resources.write_uniforms(image_index, &camera.uniform(aspect_ratio), objects)
    }

    fn submit(&mut self, slot: usize, image_index: usize) -> Result<()> {
        let command_buffers = [self.resources()?.command_buffer(image_index)?];
        let wait_semaphores = [self.sync.image_available(slot)?];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync.render_finished(slot)?];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        self.sync.reset(slot)?;
        let device = &self.device_ctx.device;
        unsafe {
            device
                .logical
                .queue_submit(device.graphics_queue.handle, &[submit_info], self.sync.in_flight(slot)?)
                .wrap_err("Failed to submit frame")
        }
    }

    fn present(&mut self, slot: usize, image_index: usize) -> Result<PresentOutcome> {
        let swapchain = self.device_ctx.target.swapchain()?;
        let wait_semaphores = [self.sync.render_finished(slot)?];
        let swapchains = [swapchain.swapchain];
        let image_indices = [u32::try_from(image_index)?];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            swapchain
                .swapchain_loader
                .queue_present(self.device_ctx.device.graphics_queue.handle, &present_info)
        };
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e).wrap_err("Failed to present swapchain image"),
        }
    }

    fn recreate(&mut self) -> Result<usize> {
        rebuild(
            self.device_ctx,
            self.size_dependent,
            self.scene,
            self.config,
            self.window,
        )
    }
}
