use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::{eyre, WrapErr};
use smallvec::{smallvec, SmallVec};
use crate::renderer::config::MAX_TEXTURES;
use crate::renderer::internals::descriptor_set_layout_builder::DescriptorSetLayoutBuilder;
use crate::renderer::resources::uniform_layout::VirtualBufferSlice;

pub const CAMERA_BINDING: u32 = 0;
pub const MODEL_BINDING: u32 = 1;
pub const SAMPLER_BINDING: u32 = 2;
pub const TEXTURE_BINDING: u32 = 3;

/// Set layout shared by every frame. Lives as long as the textures and sampler do.
pub struct SceneDescriptorLayout {
    pub layout: vk::DescriptorSetLayout,
    sampler: vk::Sampler,
    device: Arc<ash::Device>,
}

impl SceneDescriptorLayout {
    pub fn new(sampler: vk::Sampler, device: Arc<ash::Device>) -> Result<Self> {
        let samplers = [sampler];
        let layout = Self::builder(&samplers)
            .build(vk::DescriptorSetLayoutCreateFlags::empty(), &device)
            .wrap_err("Failed to create descriptor set layout")?;
        Ok(Self { layout, sampler, device })
    }

    fn builder(samplers: &[vk::Sampler]) -> DescriptorSetLayoutBuilder<'_> {
        DescriptorSetLayoutBuilder::new()
            .add_binding(
                CAMERA_BINDING,
                vk::DescriptorType::UNIFORM_BUFFER,
                1,
                vk::ShaderStageFlags::VERTEX,
                vk::DescriptorBindingFlags::empty(),
                None,
            )
            .add_binding(
                MODEL_BINDING,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                1,
                vk::ShaderStageFlags::VERTEX,
                vk::DescriptorBindingFlags::empty(),
                None,
            )
            .add_binding(
                SAMPLER_BINDING,
                vk::DescriptorType::SAMPLER,
                1,
                vk::ShaderStageFlags::FRAGMENT,
                vk::DescriptorBindingFlags::empty(),
                Some(samplers),
            )
            // Must stay the highest binding number to carry a variable count
            .add_binding(
                TEXTURE_BINDING,
                vk::DescriptorType::SAMPLED_IMAGE,
                MAX_TEXTURES,
                vk::ShaderStageFlags::FRAGMENT,
                vk::DescriptorBindingFlags::PARTIALLY_BOUND
                    | vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT,
                None,
            )
    }

    /// Exact pool capacity for one set per swapchain image
    pub fn pool_sizes(&self, image_count: u32, texture_count: u32) -> Vec<vk::DescriptorPoolSize> {
        Self::builder(&[self.sampler]).pool_sizes(image_count, texture_count)
    }
}

impl Drop for SceneDescriptorLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool plus one descriptor set per swapchain image; rebuilt on resize
pub struct FrameDescriptors {
    pub sets: Vec<vk::DescriptorSet>,
    pool: vk::DescriptorPool,
    device: Arc<ash::Device>,
}

impl FrameDescriptors {
    /// `model_buffer` is bound at offset 0 with a range of one model struct;
    /// draws select their entry through a dynamic offset
    pub fn new(
        layout: &SceneDescriptorLayout,
        camera_slices: &[VirtualBufferSlice],
        model_buffer: vk::Buffer,
        model_range: u64,
        texture_views: &[vk::ImageView],
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let image_count = u32::try_from(camera_slices.len())?;
        let texture_count = u32::try_from(texture_views.len())?;
        validate_texture_count(texture_count)?;

        let pool_sizes = layout.pool_sizes(image_count, texture_count);
        log::debug!("Descriptor pool for {image_count} sets: {pool_sizes:?}");
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(image_count)
            .pool_sizes(&pool_sizes);
        let pool = unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .wrap_err("Failed to create descriptor pool")?
        };
        // From here on `Drop` releases the pool if anything fails
        let mut descriptors = Self {
            sets: Vec::new(),
            pool,
            device,
        };

        // Swapchains rarely hold more than four images
        let set_layouts: SmallVec<[vk::DescriptorSetLayout; 4]> =
            smallvec![layout.layout; image_count as usize];
        let variable_counts: SmallVec<[u32; 4]> = smallvec![texture_count; image_count as usize];
        let mut variable_count_info =
            vk::DescriptorSetVariableDescriptorCountAllocateInfo::default()
                .descriptor_counts(&variable_counts);
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&set_layouts)
            .push_next(&mut variable_count_info);
        descriptors.sets = unsafe {
            match descriptors.device.allocate_descriptor_sets(&alloc_info) {
                Ok(sets) => sets,
                Err(e @ (vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL)) => {
                    return Err(eyre!("Descriptor pool exhausted, pool sizing is wrong: {e}"));
                }
                Err(e) => return Err(e).wrap_err("Failed to allocate descriptor sets"),
            }
        };

        let texture_infos = texture_views
            .iter()
            .map(|view| {
                vk::DescriptorImageInfo::default()
                    .image_view(*view)
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            })
            .collect::<Vec<_>>();
        let model_info = [
            vk::DescriptorBufferInfo::default()
                .buffer(model_buffer)
                .offset(0)
                .range(model_range),
        ];

        for (set, camera_slice) in descriptors.sets.iter().zip(camera_slices) {
            let camera_info = [camera_slice.descriptor_info()];
            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(*set)
                    .dst_binding(CAMERA_BINDING)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&camera_info),
                vk::WriteDescriptorSet::default()
                    .dst_set(*set)
                    .dst_binding(MODEL_BINDING)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                    .buffer_info(&model_info),
                vk::WriteDescriptorSet::default()
                    .dst_set(*set)
                    .dst_binding(TEXTURE_BINDING)
                    .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                    .image_info(&texture_infos),
            ];
            unsafe {
                descriptors.device.update_descriptor_sets(&writes, &[]);
            }
        }

        Ok(descriptors)
    }
}

impl Drop for FrameDescriptors {
    fn drop(&mut self) {
        // Sets are freed with their pool
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

pub fn validate_texture_count(texture_count: u32) -> Result<()> {
    if texture_count == 0 || texture_count > MAX_TEXTURES {
        return Err(eyre!(
            "Scene needs between 1 and {MAX_TEXTURES} textures, got {texture_count}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_sized_exactly_per_image() {
        let samplers = [vk::Sampler::null()];
        let sizes = SceneDescriptorLayout::builder(&samplers).pool_sizes(3, 2);
        let count = |ty| {
            sizes
                .iter()
                .find(|size| size.ty == ty)
                .map_or(0, |size| size.descriptor_count)
        };
        assert_eq!(count(vk::DescriptorType::UNIFORM_BUFFER), 3);
        assert_eq!(count(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC), 3);
        assert_eq!(count(vk::DescriptorType::SAMPLER), 3);
        assert_eq!(count(vk::DescriptorType::SAMPLED_IMAGE), 6);
    }

    #[test]
    fn texture_count_bounds() {
        assert!(validate_texture_count(0).is_err());
        assert!(validate_texture_count(1).is_ok());
        assert!(validate_texture_count(MAX_TEXTURES).is_ok());
        assert!(validate_texture_count(MAX_TEXTURES + 1).is_err());
    }
}
