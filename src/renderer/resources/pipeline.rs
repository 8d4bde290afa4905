use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::{eyre, OptionExt, WrapErr};
use crate::renderer::resources::shader::GraphicsShader;
use crate::renderer::shader_data::Vertex;

/// Graphics pipeline and its layout. Viewport and scissor are baked in, so both
/// are rebuilt together with the swapchain.
pub struct Pipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    device: Arc<ash::Device>,
}

impl Pipeline {
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }

    pub fn bind_descriptor_set(
        &self,
        command_buffer: vk::CommandBuffer,
        descriptor_set: vk::DescriptorSet,
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout,
                0,
                &[descriptor_set],
                dynamic_offsets,
            );
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

pub struct GraphicsPipelineBuilder<'a> {
    device: Arc<ash::Device>,

    shader: Option<&'a GraphicsShader>,
    render_pass: vk::RenderPass,
    set_layouts: &'a [vk::DescriptorSetLayout],
    extent: vk::Extent2D,
    topology: vk::PrimitiveTopology,
    polygon_mode: vk::PolygonMode,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    depth_compare: Option<vk::CompareOp>,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new(device: Arc<ash::Device>) -> Self {
        Self {
            device,

            shader: None,
            render_pass: vk::RenderPass::null(),
            set_layouts: &[],
            extent: vk::Extent2D::default(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_compare: None,
        }
    }

    pub fn with_shader(mut self, shader: &'a GraphicsShader) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn with_render_pass(mut self, render_pass: vk::RenderPass) -> Self {
        self.render_pass = render_pass;
        self
    }

    pub fn with_set_layouts(mut self, set_layouts: &'a [vk::DescriptorSetLayout]) -> Self {
        self.set_layouts = set_layouts;
        self
    }

    pub fn with_extent(mut self, extent: vk::Extent2D) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_cull_mode(
        mut self,
        cull_mode: vk::CullModeFlags,
        front_face: vk::FrontFace,
    ) -> Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    pub fn with_depth_test(mut self, compare: vk::CompareOp) -> Self {
        self.depth_compare = Some(compare);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let device = self.device;
        let shader = self
            .shader
            .ok_or_eyre("No shader provided for GraphicsPipelineBuilder")?;
        if self.render_pass == vk::RenderPass::null() {
            return Err(eyre!("No render pass provided for GraphicsPipelineBuilder"));
        }
        let shader_stages = shader.stages();

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(self.set_layouts);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .wrap_err("Failed to create pipeline layout")?
        };

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            // 1 sample per pixel means no multisampling
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0);

        let depth_stencil = match self.depth_compare {
            Some(compare) => vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(compare),
            None => vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_compare_op(vk::CompareOp::ALWAYS),
        }
        .depth_bounds_test_enable(false)
        .min_depth_bounds(0.0)
        .max_depth_bounds(1.0)
        .stencil_test_enable(false);

        // Opaque geometry only
        let color_blend_attachments = [
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false),
        ];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .layout(layout)
            .render_pass(self.render_pass)
            .subpass(0)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .depth_stencil_state(&depth_stencil);

        let pipeline = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        };
        let pipeline = match pipeline {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(eyre!("Failed to create graphics pipeline: {e}"));
            }
        };
        let Some(pipeline) = pipeline else {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            return Err(eyre!("Driver returned no graphics pipeline"));
        };

        Ok(Pipeline {
            pipeline,
            layout,
            device,
        })
    }
}
