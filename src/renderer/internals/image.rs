use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::Result;
use color_eyre::eyre::eyre;
use gpu_allocator::{
    vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator},
    MemoryLocation,
};
use crate::renderer::contexts::device_ctx::transfer_ctx::TransferContext;
use crate::renderer::internals::buffer::Buffer;

pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

pub struct ImageCreateInfo<'a> {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
    pub name: &'a str,
}

/// GPU-only 2D image with a single mip level and a matching view
pub struct Image {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent3D,
    pub aspect: vk::ImageAspectFlags,

    allocation: Option<Allocation>,
    memory_allocator: Arc<Mutex<Allocator>>,
    device: Arc<ash::Device>,
}

impl Image {
    // The returned image is uninitialized; color images are filled by `upload`
    fn new(
        create_info: &ImageCreateInfo,
        memory_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let image = {
            let info = vk::ImageCreateInfo::default()
                .format(create_info.format)
                .usage(create_info.usage)
                .extent(create_info.extent)
                .image_type(vk::ImageType::TYPE_2D)
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .initial_layout(vk::ImageLayout::UNDEFINED);
            unsafe { device.create_image(&info, None)? }
        };
        let reqs = unsafe { device.get_image_memory_requirements(image) };
        let allocation = memory_allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))?
            .allocate(&AllocationCreateDesc {
                name: create_info.name,
                requirements: reqs,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::DedicatedImage(image),
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(eyre!("Failed to allocate memory for {}: {e}", create_info.name));
            }
        };
        unsafe {
            device.bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }
        let view = {
            let info = vk::ImageViewCreateInfo::default()
                .view_type(vk::ImageViewType::TYPE_2D)
                .image(image)
                .format(create_info.format)
                .subresource_range(vk::ImageSubresourceRange {
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                    aspect_mask: create_info.aspect,
                });
            unsafe { device.create_image_view(&info, None)? }
        };

        Ok(Self {
            image,
            view,
            extent: create_info.extent,
            aspect: create_info.aspect,

            allocation: Some(allocation),
            memory_allocator,
            device,
        })
    }

    /// Create a 32-bit shader-readable image from RGBA8 pixels
    pub fn new_color_image(
        data: &[u8],
        width: u32,
        height: u32,
        name: &str,
        memory_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
        transfer_context: &TransferContext,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(eyre!(
                "{name}: expected {expected} bytes of RGBA8 pixels, got {}",
                data.len()
            ));
        }

        let create_info = ImageCreateInfo {
            format: vk::Format::R8G8B8A8_SRGB,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
            name,
        };
        let image = Self::new(&create_info, memory_allocator, device)?;
        image.upload(data, transfer_context)?;
        Ok(image)
    }

    /// Create a special type of image used for depth buffer
    pub fn new_depth_image(
        extent: vk::Extent2D,
        memory_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let create_info = ImageCreateInfo {
            format: DEPTH_FORMAT,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
            name: "Depth image",
        };
        Self::new(&create_info, memory_allocator, device)
    }

    fn upload(
        &self,
        data: &[u8],
        transfer_context: &TransferContext,
    ) -> Result<()> {
        let mut staging_buffer = Buffer::new(
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            "Image staging buffer",
            MemoryLocation::CpuToGpu,
            self.memory_allocator.clone(),
            self.device.clone(),
        )?;
        staging_buffer.write(data, 0)?;
        transfer_context.immediate_submit(
            |cmd: vk::CommandBuffer, device: &ash::Device| {
                let range = vk::ImageSubresourceRange {
                    aspect_mask: self.aspect,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                };

                let img_barrier_to_transfer = vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(self.image)
                    .subresource_range(range)
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);

                unsafe {
                    // Read more: https://gpuopen.com/learn/vulkan-barriers-explained/
                    device.cmd_pipeline_barrier(
                        cmd,
                        vk::PipelineStageFlags::TOP_OF_PIPE,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[img_barrier_to_transfer],
                    );
                }

                let copy_region = vk::BufferImageCopy::default()
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: self.aspect,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image_extent(self.extent);

                unsafe {
                    device.cmd_copy_buffer_to_image(
                        cmd,
                        staging_buffer.buffer,
                        self.image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[copy_region],
                    );
                }

                let img_barrier_to_readable = img_barrier_to_transfer
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ);

                unsafe {
                    device.cmd_pipeline_barrier(
                        cmd,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::FRAGMENT_SHADER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[img_barrier_to_readable],
                    )
                }

                Ok(())
            },
        )
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
        if let Some(allocation) = self.allocation.take() {
            match self.memory_allocator.lock() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        log::error!("Failed to free image memory: {e}");
                    }
                }
                Err(e) => log::error!("Memory allocator poisoned: {e}"),
            }
        }
        unsafe {
            self.device.destroy_image(self.image, None);
        }
    }
}
