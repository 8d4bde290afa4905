//! Placement of camera and per-object uniform data inside one shared buffer.
//!
//! The buffer is split into a camera region followed by a model region:
//!
//! ```text
//! [cam 0][cam 1]..[cam N-1][img 0: m0 m1 .. mM-1][img 1: m0 m1 .. mM-1]..
//! ```
//!
//! Each entry starts on a multiple of the device's minimum uniform offset
//! alignment. Slice assignment and the dynamic offsets handed to
//! `cmd_bind_descriptor_sets` both go through [`UniformLayout::model_offset`],
//! so they cannot drift apart.

use std::sync::{Arc, Mutex};
use ash::vk;
use bytemuck::Pod;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::Allocator;
use crate::renderer::internals::buffer::Buffer;

/// Rounds `size` up to the next multiple of `alignment`. An alignment of 0 means unaligned.
pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

/// Non-owning view into a region of a shared buffer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VirtualBufferSlice {
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub size: u64,
}

impl VirtualBufferSlice {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn overlaps(&self, other: &VirtualBufferSlice) -> bool {
        self.buffer == other.buffer && self.offset < other.end() && other.offset < self.end()
    }

    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::default()
            .buffer(self.buffer)
            .offset(self.offset)
            .range(self.size)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    pub camera_size: u64,
    pub model_size: u64,
    pub camera_stride: u64,
    pub model_stride: u64,
    pub image_count: usize,
    pub model_count: usize,
}

impl UniformLayout {
    pub fn new(
        camera_size: u64,
        model_size: u64,
        min_alignment: u64,
        image_count: usize,
        model_count: usize,
    ) -> Self {
        Self {
            camera_size,
            model_size,
            camera_stride: aligned_stride(camera_size, min_alignment),
            model_stride: aligned_stride(model_size, min_alignment),
            image_count,
            model_count,
        }
    }

    pub fn camera_region_size(&self) -> u64 {
        self.image_count as u64 * self.camera_stride
    }

    pub fn total_size(&self) -> u64 {
        self.camera_region_size()
            + self.image_count as u64 * self.model_count as u64 * self.model_stride
    }

    pub fn camera_offset(&self, image_index: usize) -> u64 {
        debug_assert!(image_index < self.image_count);
        image_index as u64 * self.camera_stride
    }

    pub fn model_offset(&self, image_index: usize, model_index: usize) -> u64 {
        debug_assert!(image_index < self.image_count);
        debug_assert!(model_index < self.model_count);
        let entry = image_index as u64 * self.model_count as u64 + model_index as u64;
        self.camera_region_size() + entry * self.model_stride
    }

    /// Offset supplied at draw time for the dynamic model binding, whose base offset is 0
    pub fn dynamic_offset(&self, image_index: usize, model_index: usize) -> Result<u32> {
        let offset = self.model_offset(image_index, model_index);
        u32::try_from(offset).map_err(|_| eyre!("Dynamic uniform offset {offset} exceeds u32"))
    }

    pub fn camera_slices(&self, buffer: vk::Buffer) -> Vec<VirtualBufferSlice> {
        (0..self.image_count)
            .map(|i| VirtualBufferSlice {
                buffer,
                offset: self.camera_offset(i),
                size: self.camera_size,
            })
            .collect()
    }

    /// One slice per swapchain image for the given model
    pub fn model_slices(&self, buffer: vk::Buffer, model_index: usize) -> Vec<VirtualBufferSlice> {
        (0..self.image_count)
            .map(|i| VirtualBufferSlice {
                buffer,
                offset: self.model_offset(i, model_index),
                size: self.model_size,
            })
            .collect()
    }
}

/// Host-visible buffer laid out by a [`UniformLayout`]
pub struct UniformArena {
    pub layout: UniformLayout,
    buffer: Buffer,
}

impl UniformArena {
    pub fn new(
        layout: UniformLayout,
        memory_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let buffer = Buffer::new(
            layout.total_size(),
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            "Uniform arena",
            MemoryLocation::CpuToGpu,
            memory_allocator,
            device,
        ).wrap_err("Failed to allocate the uniform buffer")?;

        log::debug!(
            "Uniform arena: {} bytes (camera stride {}, model stride {}, {} images, {} models)",
            layout.total_size(),
            layout.camera_stride,
            layout.model_stride,
            layout.image_count,
            layout.model_count,
        );

        Ok(Self { layout, buffer })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.buffer
    }

    pub fn write_slice<T: Pod>(&mut self, slice: &VirtualBufferSlice, value: &T) -> Result<()> {
        let bytes = bytemuck::bytes_of(value);
        if slice.buffer != self.buffer.buffer {
            return Err(eyre!("Slice does not belong to this uniform buffer"));
        }
        if bytes.len() as u64 > slice.size || slice.end() > self.buffer.size {
            return Err(eyre!(
                "Write of {} bytes at {} overruns slice of {} bytes in a {} byte buffer",
                bytes.len(),
                slice.offset,
                slice.size,
                self.buffer.size,
            ));
        }
        self.buffer.write(bytes, slice.offset as usize)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use crate::renderer::shader_data::{CameraUniform, ObjectUniform};

    const ALIGNMENTS: [u64; 6] = [1, 4, 16, 64, 256, 1024];

    fn buffer() -> vk::Buffer {
        vk::Buffer::from_raw(0xB0FF)
    }

    fn layout(alignment: u64, image_count: usize, model_count: usize) -> UniformLayout {
        UniformLayout::new(
            size_of::<CameraUniform>() as u64,
            size_of::<ObjectUniform>() as u64,
            alignment,
            image_count,
            model_count,
        )
    }

    #[test]
    fn aligned_stride_bounds() {
        for alignment in ALIGNMENTS {
            for size in 1..=2048u64 {
                let stride = aligned_stride(size, alignment);
                assert!(stride >= size);
                assert_eq!(stride % alignment, 0);
                assert!(stride < size + alignment);
            }
        }
    }

    #[test]
    fn zero_alignment_is_unaligned() {
        assert_eq!(aligned_stride(80, 0), 80);
    }

    #[test]
    fn strides_differ_per_struct() {
        let l = layout(256, 3, 2);
        assert_eq!(l.camera_stride, 256);
        assert_eq!(l.model_stride, 256);

        let l = layout(64, 3, 2);
        assert_eq!(l.camera_stride, 192);
        assert_eq!(l.model_stride, 128);
    }

    #[test]
    fn slices_never_overlap() {
        for alignment in ALIGNMENTS {
            for image_count in 1..=4 {
                for model_count in 0..=5 {
                    let l = layout(alignment, image_count, model_count);
                    let mut slices = l.camera_slices(buffer());
                    for m in 0..model_count {
                        slices.extend(l.model_slices(buffer(), m));
                    }
                    assert_eq!(slices.len(), image_count * (model_count + 1));

                    for (i, a) in slices.iter().enumerate() {
                        assert!(a.end() <= l.total_size());
                        for b in &slices[i + 1..] {
                            assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn slices_stay_within_stride_and_alignment() {
        let l = layout(256, 3, 4);
        for s in l.camera_slices(buffer()) {
            assert_eq!(s.offset % 256, 0);
            assert!(s.size <= l.camera_stride);
        }
        for m in 0..4 {
            for s in l.model_slices(buffer(), m) {
                assert_eq!(s.offset % 256, 0);
                assert!(s.size <= l.model_stride);
                assert!(s.offset >= l.camera_region_size());
            }
        }
    }

    #[test]
    fn dynamic_offsets_match_slice_assignment() {
        let l = layout(64, 3, 4);
        for m in 0..4 {
            for (i, slice) in l.model_slices(buffer(), m).iter().enumerate() {
                assert_eq!(l.dynamic_offset(i, m).unwrap() as u64, slice.offset);
            }
        }
    }

    #[test]
    fn total_size_formula() {
        let l = layout(256, 3, 2);
        assert_eq!(l.total_size(), 3 * 256 + 3 * 2 * 256);
    }

    #[test]
    fn overlap_requires_same_buffer() {
        let a = VirtualBufferSlice { buffer: buffer(), offset: 0, size: 64 };
        let b = VirtualBufferSlice { buffer: vk::Buffer::from_raw(0xF00D), offset: 0, size: 64 };
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&VirtualBufferSlice { offset: 63, ..a }));
        assert!(!a.overlaps(&VirtualBufferSlice { offset: 64, ..a }));
    }
}
