pub mod descriptors;

use std::path::Path;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::{eyre, WrapErr};
use crate::renderer::config::SHADER_NAME;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::resource_ctx::descriptors::{
    validate_texture_count,
    FrameDescriptors,
    SceneDescriptorLayout,
};
use crate::renderer::internals::command_pool::CommandPool;
use crate::renderer::internals::image::Image;
use crate::renderer::internals::render_pass::{Framebuffers, RenderPass};
use crate::renderer::internals::swapchain::Swapchain;
use crate::renderer::resources::geometry::{GeometryStore, VertexSet};
use crate::renderer::resources::pipeline::{GraphicsPipelineBuilder, Pipeline};
use crate::renderer::resources::shader::GraphicsShader;
use crate::renderer::resources::texture::{ColorTexture, Sampler};
use crate::renderer::resources::uniform_layout::{UniformArena, UniformLayout, VirtualBufferSlice};
use crate::renderer::shader_data::{CameraUniform, ObjectUniform};

/// What gets drawn, in draw order
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawItem {
    pub geometry: usize,
    pub texture: Option<usize>,
}

/// Content resources. Survive resizes and live until shutdown.
///
/// Field order is drop order: the set layout references the sampler.
pub struct SceneResources {
    pub descriptor_layout: SceneDescriptorLayout,
    pub shader: GraphicsShader,
    pub textures: Vec<ColorTexture>,
    /// Baked into the set layout as an immutable sampler; only held alive
    _sampler: Sampler,
    pub geometry: GeometryStore,
    pub draws: Vec<DrawItem>,
}

impl SceneResources {
    pub fn new(
        vertex_sets: &[VertexSet],
        draws: Vec<DrawItem>,
        texture_paths: &[&str],
        dev: &RenderDevice,
    ) -> Result<Self> {
        validate_texture_count(u32::try_from(texture_paths.len())?)?;
        validate_draws(&draws, vertex_sets.len(), texture_paths.len())?;

        let geometry = GeometryStore::new(
            vertex_sets,
            dev.memory_allocator(),
            dev.logical.clone(),
            dev.transfer_context(),
        )?;
        let textures = texture_paths
            .iter()
            .map(|path| {
                ColorTexture::load(
                    Path::new(path),
                    dev.memory_allocator(),
                    dev.logical.clone(),
                    dev.transfer_context(),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let sampler = Sampler::new_linear(dev.logical.clone())?;
        let shader = GraphicsShader::new(SHADER_NAME, dev.logical.clone())
            .wrap_err_with(|| format!("Failed to load shader '{SHADER_NAME}'"))?;
        let descriptor_layout = SceneDescriptorLayout::new(sampler.sampler, dev.logical.clone())?;

        log::info!(
            "Scene resources ready: {} vertex sets, {} textures, {} draws",
            geometry.records.len(),
            textures.len(),
            draws.len(),
        );

        Ok(Self {
            descriptor_layout,
            shader,
            textures,
            _sampler: sampler,
            geometry,
            draws,
        })
    }

    fn texture_views(&self) -> Vec<vk::ImageView> {
        self.textures.iter().map(ColorTexture::view).collect()
    }
}

pub fn validate_draws(draws: &[DrawItem], geometry_count: usize, texture_count: usize) -> Result<()> {
    for (i, draw) in draws.iter().enumerate() {
        if draw.geometry >= geometry_count {
            return Err(eyre!(
                "Entity {i} uses vertex set {} but only {geometry_count} exist",
                draw.geometry
            ));
        }
        if let Some(texture) = draw.texture {
            if texture >= texture_count {
                return Err(eyre!(
                    "Entity {i} uses texture {texture} but only {texture_count} are loaded"
                ));
            }
        }
    }
    Ok(())
}

/// Everything tied to the swapchain's extent or image count. Resize recovery drops
/// the whole group and builds a new one.
///
/// Field order is drop order.
pub struct SizeDependentResources {
    commands: CommandPool,
    pipeline: Pipeline,
    descriptors: FrameDescriptors,
    uniforms: UniformArena,
    framebuffers: Framebuffers,
    /// Only referenced through the framebuffers
    _depth_image: Image,
    render_pass: RenderPass,

    pub extent: vk::Extent2D,
    pub camera_slices: Vec<VirtualBufferSlice>,
    /// Indexed by draw, then by swapchain image
    pub model_slices: Vec<Vec<VirtualBufferSlice>>,
}

impl SizeDependentResources {
    pub fn new(
        dev: &RenderDevice,
        swapchain: &Swapchain,
        scene: &SceneResources,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        let device = dev.logical.clone();
        let extent = swapchain.swapchain_image_extent;
        let image_count = swapchain.image_count();

        let render_pass = RenderPass::new(swapchain.swapchain_image_format, device.clone())?;
        let depth_image = Image::new_depth_image(extent, dev.memory_allocator(), device.clone())
            .wrap_err("Failed to create depth image")?;
        let framebuffers = Framebuffers::new(
            &render_pass,
            &swapchain.swapchain_image_views,
            depth_image.view,
            extent,
            device.clone(),
        )?;

        let layout = UniformLayout::new(
            size_of::<CameraUniform>() as u64,
            size_of::<ObjectUniform>() as u64,
            dev.min_uniform_alignment,
            image_count,
            scene.draws.len(),
        );
        let uniforms = UniformArena::new(layout, dev.memory_allocator(), device.clone())?;
        let camera_slices = layout.camera_slices(uniforms.handle());
        let model_slices = (0..layout.model_count)
            .map(|m| layout.model_slices(uniforms.handle(), m))
            .collect();

        let descriptors = FrameDescriptors::new(
            &scene.descriptor_layout,
            &camera_slices,
            uniforms.handle(),
            layout.model_size,
            &scene.texture_views(),
            device.clone(),
        )?;

        let set_layouts = [scene.descriptor_layout.layout];
        let pipeline = GraphicsPipelineBuilder::new(device.clone())
            .with_shader(&scene.shader)
            .with_render_pass(render_pass.render_pass)
            .with_set_layouts(&set_layouts)
            .with_extent(extent)
            .with_cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
            .with_depth_test(vk::CompareOp::LESS)
            .build()?;

        let commands = CommandPool::new(&dev.graphics_queue, u32::try_from(image_count)?, device)?;

        let resources = Self {
            commands,
            pipeline,
            descriptors,
            uniforms,
            framebuffers,
            _depth_image: depth_image,
            render_pass,
            extent,
            camera_slices,
            model_slices,
        };
        for image_index in 0..image_count {
            resources
                .record(image_index, scene, clear_color, &dev.logical)
                .wrap_err_with(|| format!("Failed to record commands for image {image_index}"))?;
        }

        log::info!(
            "Built size-dependent resources for {}x{} with {} images",
            extent.width,
            extent.height,
            image_count,
        );
        Ok(resources)
    }

    pub fn command_buffer(&self, image_index: usize) -> Result<vk::CommandBuffer> {
        self.commands
            .command_buffers
            .get(image_index)
            .copied()
            .ok_or_else(|| eyre!("No command buffer for swapchain image {image_index}"))
    }

    /// Writes the camera and every object's data into the slices of `image_index`.
    /// The image's previous submission must have completed.
    pub fn write_uniforms(
        &mut self,
        image_index: usize,
        camera: &CameraUniform,
        objects: &[ObjectUniform],
    ) -> Result<()> {
        if objects.len() != self.model_slices.len() {
            return Err(eyre!(
                "Got {} object uniforms for {} draws",
                objects.len(),
                self.model_slices.len()
            ));
        }
        let camera_slice = self
            .camera_slices
            .get(image_index)
            .ok_or_else(|| eyre!("No camera slice for swapchain image {image_index}"))?;
        self.uniforms.write_slice(camera_slice, camera)?;
        for (slices, object) in self.model_slices.iter().zip(objects) {
            self.uniforms.write_slice(&slices[image_index], object)?;
        }
        Ok(())
    }

    fn record(
        &self,
        image_index: usize,
        scene: &SceneResources,
        clear_color: [f32; 4],
        device: &ash::Device,
    ) -> Result<()> {
        let cmd = self.command_buffer(image_index)?;
        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe {
            device.begin_command_buffer(cmd, &begin_info)?;
        }

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.render_pass)
            .framebuffer(self.framebuffers.framebuffers[image_index])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .clear_values(&clear_values);

        let geometry = &scene.geometry;
        unsafe {
            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            self.pipeline.bind(cmd);
            device.cmd_bind_vertex_buffers(cmd, 0, &[geometry.buffer.buffer], &[0]);
            device.cmd_bind_index_buffer(
                cmd,
                geometry.buffer.buffer,
                geometry.index_region_offset,
                vk::IndexType::UINT32,
            );
        }

        let set = self.descriptors.sets[image_index];
        for (m, draw) in scene.draws.iter().enumerate() {
            let record = geometry.records[draw.geometry];
            // Same arithmetic that placed this draw's slice
            let dynamic_offset = self.uniforms.layout.dynamic_offset(image_index, m)?;
            self.pipeline.bind_descriptor_set(cmd, set, &[dynamic_offset]);
            unsafe {
                device.cmd_draw_indexed(
                    cmd,
                    record.index_count,
                    1,
                    record.first_index,
                    record.vertex_offset,
                    0,
                );
            }
        }

        unsafe {
            device.cmd_end_render_pass(cmd);
            device.end_command_buffer(cmd)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_must_reference_loaded_content() {
        let ok = [
            DrawItem { geometry: 0, texture: Some(1) },
            DrawItem { geometry: 1, texture: None },
        ];
        assert!(validate_draws(&ok, 2, 2).is_ok());

        let missing_geometry = [DrawItem { geometry: 2, texture: None }];
        assert!(validate_draws(&missing_geometry, 2, 2).is_err());

        let missing_texture = [DrawItem { geometry: 0, texture: Some(2) }];
        assert!(validate_draws(&missing_texture, 2, 2).is_err());
    }
}
