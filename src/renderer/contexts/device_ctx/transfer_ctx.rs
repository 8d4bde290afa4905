use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, Result, WrapErr};
use crate::renderer::contexts::device_ctx::queue::Queue;

/// One-shot command submission used for staged uploads at load time
pub struct TransferContext {
    transfer_fence: vk::Fence,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence_timeout_ns: u64,

    queue: Arc<Queue>,
    device: Arc<ash::Device>,
}

impl TransferContext {
    pub fn new(
        queue: Arc<Queue>,
        fence_timeout_ns: u64,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let transfer_fence_info = vk::FenceCreateInfo::default();
        let transfer_fence =
            unsafe { device.create_fence(&transfer_fence_info, None)? };

        let command_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue.family.index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let command_pool =
            unsafe { device.create_command_pool(&command_pool_info, None)? };

        let command_buffer_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .command_buffer_count(1)
            .level(vk::CommandBufferLevel::PRIMARY);
        let command_buffer = unsafe {
            device
                .allocate_command_buffers(&command_buffer_info)?
                .into_iter()
                .next()
                .ok_or_else(|| eyre!("Driver returned no transfer command buffer"))?
        };

        Ok(Self {
            transfer_fence,
            command_pool,
            command_buffer,
            fence_timeout_ns,
            queue,
            device,
        })
    }

    /// Records `func` into a fresh command buffer, submits it and blocks until the GPU finishes
    pub fn immediate_submit<F>(
        &self,
        func: F,
    ) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer, &ash::Device) -> Result<()>,
    {
        let cmd = self.command_buffer;

        let cmd_begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device.begin_command_buffer(cmd, &cmd_begin_info)?;
        }

        func(cmd, &self.device)?;

        unsafe {
            self.device.end_command_buffer(cmd)?;
        }

        let cmds = [cmd];
        let submit = vk::SubmitInfo::default()
            .command_buffers(&cmds);
        unsafe {
            self.device
                .queue_submit(self.queue.handle, &[submit], self.transfer_fence)
                .wrap_err("Failed to submit transfer commands")?;
        }

        unsafe {
            match self.device.wait_for_fences(&[self.transfer_fence], true, self.fence_timeout_ns) {
                Ok(()) => {}
                Err(vk::Result::TIMEOUT) => return Err(eyre!("Device hang: transfer did not complete")),
                Err(e) => return Err(eyre!("Waiting for transfer fence failed: {e}")),
            }
            self.device.reset_fences(&[self.transfer_fence])?;
            self.device.reset_command_pool(
                self.command_pool,
                vk::CommandPoolResetFlags::empty(),
            )?;
        }

        Ok(())
    }
}

impl Drop for TransferContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_fence(self.transfer_fence, None);
        }
    }
}
