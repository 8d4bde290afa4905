pub mod sync;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use crate::renderer::config::MAX_FRAMES_IN_FLIGHT;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: usize, suboptimal: bool },
    OutOfDate,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Presented, then rebuilt the size-dependent resources
    PresentedAndRecreated,
    /// Nothing was drawn; the swapchain was out of date and got rebuilt
    Recreated,
}

/// The GPU-facing half of a frame. Slots index the frames-in-flight sync objects.
pub trait FrameBackend {
    /// Blocks until the slot's fence is signaled
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;
    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome>;
    fn write_uniforms(&mut self, image_index: usize) -> Result<()>;
    /// Resets the slot's fence and submits the image's command buffer
    fn submit(&mut self, slot: usize, image_index: usize) -> Result<()>;
    fn present(&mut self, slot: usize, image_index: usize) -> Result<PresentOutcome>;
    /// Drains the device and rebuilds everything size-dependent. Returns the new image count.
    fn recreate(&mut self) -> Result<usize>;
}

/// Responsibilities:
/// - Cycle through the frames-in-flight slots
/// - Track which slot last rendered to each swapchain image
/// - Decide when resize recovery runs
pub struct FrameScheduler {
    current_slot: usize,
    images_in_flight: Vec<Option<usize>>,
    resize_requested: bool,
}

impl FrameScheduler {
    pub fn new(image_count: usize) -> Self {
        Self {
            current_slot: 0,
            images_in_flight: vec![None; image_count],
            resize_requested: false,
        }
    }

    #[cfg(test)]
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Recovery runs after the next present
    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> Result<FrameStatus> {
        let slot = self.current_slot;
        backend.wait_for_slot(slot)?;

        let (image_index, acquire_suboptimal) = match backend.acquire(slot)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire");
                self.recover(backend)?;
                return Ok(FrameStatus::Recreated);
            }
        };

        let owner = self
            .images_in_flight
            .get_mut(image_index)
            .ok_or_else(|| eyre!("Acquired image {image_index} is outside the swapchain"))?;
        if let Some(previous) = owner.replace(slot) {
            if previous != slot {
                backend.wait_for_slot(previous)?;
            }
        }

        backend.write_uniforms(image_index)?;
        backend.submit(slot, image_index)?;
        let presented = backend.present(slot, image_index)?;

        self.current_slot = (slot + 1) % MAX_FRAMES_IN_FLIGHT;

        let resize_requested = std::mem::take(&mut self.resize_requested);
        if acquire_suboptimal || resize_requested || presented != PresentOutcome::Presented {
            log::debug!(
                "Rebuilding after present ({presented:?}, suboptimal acquire: {acquire_suboptimal}, \
                 resize requested: {resize_requested})"
            );
            self.recover(backend)?;
            return Ok(FrameStatus::PresentedAndRecreated);
        }
        Ok(FrameStatus::Presented)
    }

    /// Forgets image ownership after the device drained and the swapchain was rebuilt
    pub fn reset(&mut self, image_count: usize) {
        self.images_in_flight = vec![None; image_count];
        self.resize_requested = false;
    }

    fn recover<B: FrameBackend>(&mut self, backend: &mut B) -> Result<()> {
        let image_count = backend.recreate()?;
        self.reset(image_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::resources::uniform_layout::UniformLayout;
    use crate::renderer::shader_data::{CameraUniform, ObjectUniform};

    /// Simulated GPU: a fence per slot modeled as a boolean, plus the submissions still executing
    struct MockBackend {
        fences: [bool; MAX_FRAMES_IN_FLIGHT],
        executing: Vec<(usize, usize)>,
        image_count: usize,
        extent: (u32, u32),
        pending_extent: Option<(u32, u32)>,
        pending_image_count: Option<usize>,
        model_count: usize,
        layout: UniformLayout,
        acquire_script: Vec<AcquireOutcome>,
        present_script: Vec<PresentOutcome>,
        rng: u64,

        waits: usize,
        waited_slots: Vec<usize>,
        submits: usize,
        presents: usize,
        recreates: usize,
    }

    impl MockBackend {
        fn new(image_count: usize) -> Self {
            let model_count = 3;
            Self {
                fences: [true; MAX_FRAMES_IN_FLIGHT],
                executing: Vec::new(),
                image_count,
                extent: (800, 600),
                pending_extent: None,
                pending_image_count: None,
                model_count,
                layout: Self::layout_for(image_count, model_count),
                acquire_script: Vec::new(),
                present_script: Vec::new(),
                rng: 0x2545_F491_4F6C_DD1D,
                waits: 0,
                waited_slots: Vec::new(),
                submits: 0,
                presents: 0,
                recreates: 0,
            }
        }

        fn layout_for(image_count: usize, model_count: usize) -> UniformLayout {
            UniformLayout::new(
                size_of::<CameraUniform>() as u64,
                size_of::<ObjectUniform>() as u64,
                256,
                image_count,
                model_count,
            )
        }

        fn next_random(&mut self) -> u64 {
            // Knuth's MMIX LCG
            self.rng = self
                .rng
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            self.rng >> 33
        }

        fn complete(&mut self, slot: usize) {
            self.executing.retain(|(s, _)| *s != slot);
            self.fences[slot] = true;
        }

        fn image_busy(&self, image_index: usize) -> bool {
            self.executing.iter().any(|(_, image)| *image == image_index)
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
            self.waits += 1;
            self.waited_slots.push(slot);
            self.complete(slot);
            Ok(())
        }

        fn acquire(&mut self, _slot: usize) -> Result<AcquireOutcome> {
            // The GPU finishes some work on its own between frames
            if self.next_random() % 3 == 0 {
                let slot = (self.next_random() % MAX_FRAMES_IN_FLIGHT as u64) as usize;
                self.complete(slot);
            }
            if !self.acquire_script.is_empty() {
                return Ok(self.acquire_script.remove(0));
            }
            let image_index = (self.next_random() % self.image_count as u64) as usize;
            Ok(AcquireOutcome::Acquired { image_index, suboptimal: false })
        }

        fn write_uniforms(&mut self, image_index: usize) -> Result<()> {
            assert!(
                !self.image_busy(image_index),
                "uniforms of image {image_index} written while the GPU reads them"
            );
            Ok(())
        }

        fn submit(&mut self, slot: usize, image_index: usize) -> Result<()> {
            assert!(self.fences[slot], "slot {slot} reset before its fence signaled");
            assert!(
                !self.image_busy(image_index),
                "image {image_index} submitted twice without a fence wait"
            );
            self.fences[slot] = false;
            self.executing.push((slot, image_index));
            self.submits += 1;
            assert!(self.executing.len() <= MAX_FRAMES_IN_FLIGHT);
            Ok(())
        }

        fn present(&mut self, _slot: usize, _image_index: usize) -> Result<PresentOutcome> {
            self.presents += 1;
            if !self.present_script.is_empty() {
                return Ok(self.present_script.remove(0));
            }
            Ok(PresentOutcome::Presented)
        }

        fn recreate(&mut self) -> Result<usize> {
            // Device idle
            for slot in 0..MAX_FRAMES_IN_FLIGHT {
                self.complete(slot);
            }
            if let Some(extent) = self.pending_extent.take() {
                self.extent = extent;
            }
            if let Some(image_count) = self.pending_image_count.take() {
                self.image_count = image_count;
            }
            self.layout = Self::layout_for(self.image_count, self.model_count);
            self.recreates += 1;
            Ok(self.image_count)
        }
    }

    #[test]
    fn fences_guard_every_image_across_many_frames() {
        for image_count in 2..=4 {
            let mut backend = MockBackend::new(image_count);
            let mut scheduler = FrameScheduler::new(image_count);
            for frame in 0..500 {
                let slot = scheduler.current_slot();
                assert_eq!(slot, frame % MAX_FRAMES_IN_FLIGHT);
                let status = scheduler.draw_frame(&mut backend).unwrap();
                assert_eq!(status, FrameStatus::Presented);
            }
            assert_eq!(backend.submits, 500);
            assert_eq!(backend.presents, 500);
            assert_eq!(backend.recreates, 0);
        }
    }

    #[test]
    fn out_of_date_acquire_recovers_without_drawing() {
        let mut backend = MockBackend::new(3);
        backend.acquire_script.push(AcquireOutcome::OutOfDate);
        let mut scheduler = FrameScheduler::new(3);

        let status = scheduler.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::Recreated);
        assert_eq!(backend.recreates, 1);
        assert_eq!(backend.submits, 0);
        assert_eq!(backend.presents, 0);
        assert_eq!(scheduler.current_slot(), 0);

        // The next frame draws normally on the same slot
        assert_eq!(scheduler.draw_frame(&mut backend).unwrap(), FrameStatus::Presented);
        assert_eq!(backend.submits, 1);
    }

    #[test]
    fn stale_present_recovers_after_presenting() {
        for outcome in [PresentOutcome::Suboptimal, PresentOutcome::OutOfDate] {
            let mut backend = MockBackend::new(3);
            backend.present_script.push(outcome);
            let mut scheduler = FrameScheduler::new(3);

            let status = scheduler.draw_frame(&mut backend).unwrap();

            assert_eq!(status, FrameStatus::PresentedAndRecreated);
            assert_eq!(backend.presents, 1);
            assert_eq!(backend.recreates, 1);
            assert_eq!(scheduler.current_slot(), 1);
        }
    }

    #[test]
    fn suboptimal_acquire_still_draws_then_recovers() {
        let mut backend = MockBackend::new(2);
        backend
            .acquire_script
            .push(AcquireOutcome::Acquired { image_index: 1, suboptimal: true });
        let mut scheduler = FrameScheduler::new(2);

        let status = scheduler.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::PresentedAndRecreated);
        assert_eq!((backend.submits, backend.presents, backend.recreates), (1, 1, 1));
    }

    #[test]
    fn resize_request_is_consumed_once() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3);
        scheduler.request_resize();

        assert_eq!(scheduler.draw_frame(&mut backend).unwrap(), FrameStatus::PresentedAndRecreated);
        assert_eq!(scheduler.draw_frame(&mut backend).unwrap(), FrameStatus::Presented);
        assert_eq!(backend.recreates, 1);
    }

    #[test]
    fn owner_of_reacquired_image_is_waited_on() {
        let mut backend = MockBackend::new(2);
        backend.acquire_script = vec![
            AcquireOutcome::Acquired { image_index: 0, suboptimal: false },
            AcquireOutcome::Acquired { image_index: 0, suboptimal: false },
        ];
        let mut scheduler = FrameScheduler::new(2);

        scheduler.draw_frame(&mut backend).unwrap();
        let waits_before = backend.waits;
        // Slot 1 gets image 0, still owned by slot 0
        scheduler.draw_frame(&mut backend).unwrap();
        assert_eq!(backend.waits - waits_before, 2);
    }

    #[test]
    fn acquired_image_outside_swapchain_is_fatal() {
        let mut backend = MockBackend::new(2);
        backend
            .acquire_script
            .push(AcquireOutcome::Acquired { image_index: 5, suboptimal: false });
        let mut scheduler = FrameScheduler::new(2);
        assert!(scheduler.draw_frame(&mut backend).is_err());
    }

    #[test]
    fn resize_recovery_restores_total_sizes() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3);
        let before = backend.layout;

        backend.pending_extent = Some((1024, 768));
        scheduler.request_resize();
        scheduler.draw_frame(&mut backend).unwrap();

        assert_eq!(backend.extent, (1024, 768));
        let after = backend.layout;
        assert_eq!(after, before);
        assert_eq!(
            after.total_size(),
            3 * after.camera_stride + 3 * 3 * after.model_stride,
        );
    }

    #[test]
    fn recovery_adopts_the_new_image_count() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3);
        backend.acquire_script = vec![
            AcquireOutcome::Acquired { image_index: 1, suboptimal: false },
            AcquireOutcome::Acquired { image_index: 1, suboptimal: false },
            AcquireOutcome::Acquired { image_index: 3, suboptimal: false },
        ];

        // Slot 0 draws image 1, then the swapchain shrinks to 2 images
        backend.present_script.push(PresentOutcome::OutOfDate);
        backend.pending_image_count = Some(2);
        assert_eq!(scheduler.draw_frame(&mut backend).unwrap(), FrameStatus::PresentedAndRecreated);
        assert_eq!(backend.image_count, 2);

        // Image 1 belongs to the new swapchain; the old owner is not waited on again
        backend.waited_slots.clear();
        backend.pending_image_count = Some(4);
        scheduler.request_resize();
        assert_eq!(scheduler.draw_frame(&mut backend).unwrap(), FrameStatus::PresentedAndRecreated);
        assert_eq!(backend.waited_slots, vec![1]);

        // Image 3 only exists after growing to 4 images
        assert_eq!(scheduler.draw_frame(&mut backend).unwrap(), FrameStatus::Presented);
        assert_eq!(backend.submits, 3);
        assert_eq!(backend.recreates, 2);
    }
}
