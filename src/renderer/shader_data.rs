use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use std::mem::{offset_of, size_of};

/// Camera matrices, one copy per swapchain image
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
}

/// Per-object data read through the dynamic uniform binding.
/// A negative `texture_index` draws vertex colors only.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4,
    pub texture_index: i32,
    // WGSL rounds the struct up to a 16 byte multiple
    _padding: [i32; 3],
}

impl ObjectUniform {
    pub fn new(model: Mat4, texture_index: i32) -> Self {
        Self {
            model,
            texture_index,
            _padding: [0; 3],
        }
    }
}

impl Default for ObjectUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, -1)
    }
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Self, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Self, color) as u32),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(2)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(offset_of!(Self, uv) as u32),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_shader_layout() {
        assert_eq!(size_of::<CameraUniform>(), 192);
        assert_eq!(size_of::<ObjectUniform>(), 80);
        assert_eq!(size_of::<Vertex>(), 32);
    }

    #[test]
    fn vertex_attributes_are_packed_in_order() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
    }
}
