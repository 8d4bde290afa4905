use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::{eyre, WrapErr};

struct SlotSync {
    // Signals when the swapchain image can be rendered to
    image_available: vk::Semaphore,

    // Signals when rendering finished and the image can be presented
    render_finished: vk::Semaphore,

    // Signals when the slot's submission finished executing
    in_flight: vk::Fence,
}

/// Semaphores and fences of every frame-in-flight slot
pub struct FrameSync {
    slots: Vec<SlotSync>,
    fence_timeout_ns: u64,
    device: Arc<ash::Device>,
}

impl FrameSync {
    pub fn new(slot_count: usize, fence_timeout_ns: u64, device: Arc<ash::Device>) -> Result<Self> {
        let mut sync = Self {
            slots: Vec::with_capacity(slot_count),
            fence_timeout_ns,
            device,
        };
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        // Signaled so the first wait on every slot returns immediately
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        for _ in 0..slot_count {
            let slot = unsafe {
                let image_available = sync.device.create_semaphore(&semaphore_info, None)?;
                let render_finished = match sync.device.create_semaphore(&semaphore_info, None) {
                    Ok(semaphore) => semaphore,
                    Err(e) => {
                        sync.device.destroy_semaphore(image_available, None);
                        return Err(e).wrap_err("Failed to create semaphore");
                    }
                };
                let in_flight = match sync.device.create_fence(&fence_info, None) {
                    Ok(fence) => fence,
                    Err(e) => {
                        sync.device.destroy_semaphore(image_available, None);
                        sync.device.destroy_semaphore(render_finished, None);
                        return Err(e).wrap_err("Failed to create fence");
                    }
                };
                SlotSync { image_available, render_finished, in_flight }
            };
            sync.slots.push(slot);
        }

        Ok(sync)
    }

    fn slot(&self, slot: usize) -> Result<&SlotSync> {
        self.slots
            .get(slot)
            .ok_or_else(|| eyre!("Frame slot {slot} out of range"))
    }

    pub fn image_available(&self, slot: usize) -> Result<vk::Semaphore> {
        Ok(self.slot(slot)?.image_available)
    }

    pub fn render_finished(&self, slot: usize) -> Result<vk::Semaphore> {
        Ok(self.slot(slot)?.render_finished)
    }

    pub fn in_flight(&self, slot: usize) -> Result<vk::Fence> {
        Ok(self.slot(slot)?.in_flight)
    }

    /// Blocks until the slot's last submission completed
    pub fn wait(&self, slot: usize) -> Result<()> {
        let fence = self.in_flight(slot)?;
        unsafe {
            match self.device.wait_for_fences(&[fence], true, self.fence_timeout_ns) {
                Ok(()) => Ok(()),
                Err(vk::Result::TIMEOUT) => Err(eyre!(
                    "Device hang: frame slot {slot} did not complete within {} ms",
                    self.fence_timeout_ns / 1_000_000
                )),
                Err(e) => Err(e).wrap_err("Failed to wait for frame fence"),
            }
        }
    }

    pub fn reset(&self, slot: usize) -> Result<()> {
        let fence = self.in_flight(slot)?;
        unsafe {
            self.device
                .reset_fences(&[fence])
                .wrap_err("Failed to reset frame fence")
        }
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            for slot in self.slots.drain(..) {
                self.device.destroy_semaphore(slot.image_available, None);
                self.device.destroy_semaphore(slot.render_finished, None);
                self.device.destroy_fence(slot.in_flight, None);
            }
        }
    }
}
