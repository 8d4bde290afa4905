use std::sync::Arc;
use ash::prelude::VkResult;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crate::renderer::internals::image::DEPTH_FORMAT;

/// Forward pass writing one color attachment (the swapchain image) and a depth attachment
pub struct RenderPass {
    pub render_pass: vk::RenderPass,
    device: Arc<ash::Device>,
}

impl RenderPass {
    pub fn new(color_format: vk::Format, device: Arc<ash::Device>) -> Result<Self> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(DEPTH_FORMAT)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_attachment_refs = [
            vk::AttachmentReference::default()
                .attachment(0)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        ];
        let depth_attachment_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let subpasses = [
            vk::SubpassDescription::default()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .color_attachments(&color_attachment_refs)
                .depth_stencil_attachment(&depth_attachment_ref),
        ];

        // Wait for the image-available semaphore (signaled at color output) and for the
        // previous frame's depth writes before touching the attachments
        let dependencies = [
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                )
                .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
                .dst_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                )
                .dst_access_mask(
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                ),
        ];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            device
                .create_render_pass(&render_pass_info, None)
                .wrap_err("Failed to create render pass")?
        };

        Ok(Self { render_pass, device })
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// One framebuffer per swapchain image, all sharing the depth attachment
pub struct Framebuffers {
    pub framebuffers: Vec<vk::Framebuffer>,
    device: Arc<ash::Device>,
}

impl Framebuffers {
    pub fn new(
        render_pass: &RenderPass,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let created = color_views
            .iter()
            .map(|color_view| {
                let attachments = [*color_view, depth_view];
                let info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass.render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                unsafe { device.create_framebuffer(&info, None) }
            })
            .collect::<Vec<VkResult<vk::Framebuffer>>>();

        let mut framebuffers = Vec::with_capacity(created.len());
        let mut failure = None;
        for result in created {
            match result {
                Ok(framebuffer) => framebuffers.push(framebuffer),
                Err(e) => failure = Some(e),
            }
        }
        let framebuffers = Self { framebuffers, device };
        if let Some(e) = failure {
            // Dropping `framebuffers` destroys the ones that were created
            return Err(e).wrap_err("Failed to create framebuffer");
        }
        Ok(framebuffers)
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}
