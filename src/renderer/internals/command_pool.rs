use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crate::renderer::contexts::device_ctx::queue::Queue;

/// Command pool holding one primary command buffer per swapchain image.
/// The buffers are recorded once and resubmitted every frame.
pub struct CommandPool {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pool: vk::CommandPool,
    device: Arc<ash::Device>,
}

impl CommandPool {
    pub fn new(queue: &Queue, count: u32, device: Arc<ash::Device>) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue.family.index);
        let pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .wrap_err("Failed to create command pool")?
        };
        let mut command_pool = Self {
            command_buffers: Vec::new(),
            pool,
            device,
        };

        let command_buffer_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .command_buffer_count(count)
            .level(vk::CommandBufferLevel::PRIMARY);
        command_pool.command_buffers = unsafe {
            command_pool
                .device
                .allocate_command_buffers(&command_buffer_info)
                .wrap_err("Failed to allocate command buffers")?
        };

        Ok(command_pool)
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // Frees every buffer allocated from it
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
