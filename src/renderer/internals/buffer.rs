use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::{OptionExt, Result};
use color_eyre::eyre::eyre;
use gpu_allocator::{
    vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator},
    MemoryLocation,
};
use crate::renderer::contexts::device_ctx::transfer_ctx::TransferContext;

pub struct Buffer {
    pub buffer: vk::Buffer,
    pub size: u64,

    allocation: Option<Allocation>,
    memory_allocator: Arc<Mutex<Allocator>>,
    device: Arc<ash::Device>,
}

impl Buffer {
    pub fn new(
        size: u64,
        usage: vk::BufferUsageFlags,
        name: &str,
        mem_loc: MemoryLocation,
        mem_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let buffer = {
            let buffer_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            unsafe { device.create_buffer(&buffer_info, None)? }
        };

        let requirements = unsafe {
            device.get_buffer_memory_requirements(buffer)
        };
        let allocation = mem_allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: mem_loc,
                linear: true,
                allocation_scheme: AllocationScheme::DedicatedBuffer(buffer),
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(eyre!("Failed to allocate {size} bytes for {name}: {e}"));
            }
        };

        unsafe {
            device.bind_buffer_memory(
                buffer,
                allocation.memory(),
                allocation.offset(),
            )?;
        }

        Ok(Self {
            buffer,
            size,

            allocation: Some(allocation),
            memory_allocator: mem_allocator,
            device,
        })
    }

    /// Creates a device-local buffer filled with `data` through a staging copy
    pub fn new_device_local(
        data: &[u8],
        usage: vk::BufferUsageFlags,
        name: &str,
        mem_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
        transfer_context: &TransferContext,
    ) -> Result<Self> {
        let size = data.len() as u64;
        let mut staging = Self::new(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            &format!("{name} (staging)"),
            MemoryLocation::CpuToGpu,
            mem_allocator.clone(),
            device.clone(),
        )?;
        staging.write(data, 0)?;

        let buffer = Self::new(
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            name,
            MemoryLocation::GpuOnly,
            mem_allocator,
            device,
        )?;

        transfer_context.immediate_submit(|cmd, device| {
            let region = vk::BufferCopy::default().size(size);
            unsafe {
                device.cmd_copy_buffer(cmd, staging.buffer, buffer.buffer, &[region]);
            }
            Ok(())
        })?;

        Ok(buffer)
    }

    pub fn write<T>(
        &mut self,
        data: &[T],
        start_offset: usize,
    ) -> Result<presser::CopyRecord>
    where
        T: Copy,
    {
        let mut slab = self
            .allocation
            .as_mut()
            .ok_or_eyre("Buffer has no backing allocation")?
            .try_as_mapped_slab()
            .ok_or_eyre("Buffer memory is not host visible")?;
        Ok(presser::copy_from_slice_to_offset(
            data,
            &mut slab,
            start_offset,
        )?)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.memory_allocator.lock() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        log::error!("Failed to free buffer memory: {e}");
                    }
                }
                Err(e) => log::error!("Memory allocator poisoned: {e}"),
            }
        }
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
        }
    }
}
