//! All vertex sets packed into one device-local buffer: every vertex first, then every index.

use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::{eyre, WrapErr};
use gpu_allocator::vulkan::Allocator;
use crate::renderer::contexts::device_ctx::transfer_ctx::TransferContext;
use crate::renderer::internals::buffer::Buffer;
use crate::renderer::shader_data::Vertex;

/// Vertices and triangle-list indices of one mesh. Indices are local to the set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexSet {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Where a vertex set ended up inside the packed buffer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GeometryRecord {
    /// Added to every index by `cmd_draw_indexed`
    pub vertex_offset: i32,
    pub first_index: u32,
    pub vertex_count: u32,
    pub index_count: u32,
    pub vertex_byte_offset: u64,
    pub index_byte_offset: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackedGeometry {
    pub bytes: Vec<u8>,
    pub records: Vec<GeometryRecord>,
    /// Where the index region starts; the index buffer is bound here
    pub index_region_offset: u64,
}

pub fn pack(sets: &[VertexSet]) -> Result<PackedGeometry> {
    let total_vertices: usize = sets.iter().map(|set| set.vertices.len()).sum();
    let total_indices: usize = sets.iter().map(|set| set.indices.len()).sum();
    let vertex_region = total_vertices * size_of::<Vertex>();
    let index_region_offset = vertex_region as u64;

    let mut bytes = Vec::with_capacity(vertex_region + total_indices * size_of::<u32>());
    let mut records = Vec::with_capacity(sets.len());
    let mut vertex_cursor = 0u32;
    let mut index_cursor = 0u32;

    for (i, set) in sets.iter().enumerate() {
        let vertex_count = u32::try_from(set.vertices.len())?;
        let index_count = u32::try_from(set.indices.len())?;
        if let Some(bad) = set.indices.iter().find(|index| **index >= vertex_count) {
            return Err(eyre!(
                "Vertex set {i} references vertex {bad} but only has {vertex_count}"
            ));
        }

        records.push(GeometryRecord {
            vertex_offset: i32::try_from(vertex_cursor)?,
            first_index: index_cursor,
            vertex_count,
            index_count,
            vertex_byte_offset: vertex_cursor as u64 * size_of::<Vertex>() as u64,
            index_byte_offset: index_region_offset + index_cursor as u64 * size_of::<u32>() as u64,
        });
        bytes.extend_from_slice(bytemuck::cast_slice(&set.vertices));
        vertex_cursor += vertex_count;
        index_cursor += index_count;
    }

    for set in sets {
        bytes.extend_from_slice(bytemuck::cast_slice(&set.indices));
    }

    Ok(PackedGeometry {
        bytes,
        records,
        index_region_offset,
    })
}

#[cfg(test)]
impl PackedGeometry {
    /// Reads one vertex set back out of the packed bytes
    pub fn unpack(&self, record: &GeometryRecord) -> Result<VertexSet> {
        let vertex_start = record.vertex_byte_offset as usize;
        let vertex_end = vertex_start + record.vertex_count as usize * size_of::<Vertex>();
        let index_start = record.index_byte_offset as usize;
        let index_end = index_start + record.index_count as usize * size_of::<u32>();
        let vertex_bytes = self
            .bytes
            .get(vertex_start..vertex_end)
            .ok_or_else(|| eyre!("Vertex range {vertex_start}..{vertex_end} out of bounds"))?;
        let index_bytes = self
            .bytes
            .get(index_start..index_end)
            .ok_or_else(|| eyre!("Index range {index_start}..{index_end} out of bounds"))?;

        // The byte vector carries no alignment guarantee
        Ok(VertexSet {
            vertices: bytemuck::pod_collect_to_vec(vertex_bytes),
            indices: bytemuck::pod_collect_to_vec(index_bytes),
        })
    }
}

/// Device-local geometry buffer; persists across resizes
pub struct GeometryStore {
    pub buffer: Buffer,
    pub records: Vec<GeometryRecord>,
    pub index_region_offset: u64,
}

impl GeometryStore {
    pub fn new(
        sets: &[VertexSet],
        memory_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
        transfer_context: &TransferContext,
    ) -> Result<Self> {
        let packed = pack(sets)?;
        if packed.bytes.is_empty() {
            return Err(eyre!("Scene contains no geometry"));
        }
        let buffer = Buffer::new_device_local(
            &packed.bytes,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER,
            "Geometry",
            memory_allocator,
            device,
            transfer_context,
        ).wrap_err("Failed to upload geometry")?;

        log::info!(
            "Uploaded {} vertex sets ({} bytes)",
            packed.records.len(),
            packed.bytes.len(),
        );

        Ok(Self {
            buffer,
            records: packed.records,
            index_region_offset: packed.index_region_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn vertex(n: f32) -> Vertex {
        Vertex {
            position: Vec3::splat(n),
            color: Vec3::new(n, 0.0, 1.0),
            uv: Vec2::new(n, -n),
        }
    }

    fn sets() -> Vec<VertexSet> {
        vec![
            VertexSet {
                vertices: (0..3).map(|i| vertex(i as f32)).collect(),
                indices: vec![0, 1, 2],
            },
            VertexSet {
                vertices: (0..4).map(|i| vertex(10.0 + i as f32)).collect(),
                indices: vec![0, 1, 2, 2, 3, 0],
            },
            VertexSet {
                vertices: (0..5).map(|i| vertex(20.0 + i as f32)).collect(),
                indices: vec![4, 3, 2],
            },
        ]
    }

    #[test]
    fn round_trip_through_recorded_offsets() {
        let sets = sets();
        let packed = pack(&sets).unwrap();
        assert_eq!(packed.records.len(), sets.len());
        for (set, record) in sets.iter().zip(&packed.records) {
            assert_eq!(&packed.unpack(record).unwrap(), set);
        }
    }

    #[test]
    fn offsets_accumulate_in_pack_order() {
        let packed = pack(&sets()).unwrap();
        let r = &packed.records;
        assert_eq!((r[0].vertex_offset, r[0].first_index), (0, 0));
        assert_eq!((r[1].vertex_offset, r[1].first_index), (3, 3));
        assert_eq!((r[2].vertex_offset, r[2].first_index), (7, 9));
        assert_eq!(packed.index_region_offset, 12 * size_of::<Vertex>() as u64);
        assert_eq!(
            packed.bytes.len(),
            12 * size_of::<Vertex>() + 12 * size_of::<u32>(),
        );
    }

    #[test]
    fn draw_offsets_address_the_same_data() {
        // What cmd_draw_indexed reads: index = first_index + k, vertex = vertex_offset + index
        let sets = sets();
        let packed = pack(&sets).unwrap();
        let all_vertices: Vec<Vertex> = sets.iter().flat_map(|s| s.vertices.clone()).collect();
        let all_indices: Vec<u32> = sets.iter().flat_map(|s| s.indices.clone()).collect();
        for (set, record) in sets.iter().zip(&packed.records) {
            for k in 0..record.index_count {
                let local = all_indices[(record.first_index + k) as usize];
                let global = record.vertex_offset as usize + local as usize;
                assert_eq!(all_vertices[global], set.vertices[local as usize]);
            }
        }
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let bad = VertexSet {
            vertices: vec![vertex(0.0)],
            indices: vec![0, 1, 0],
        };
        assert!(pack(&[bad]).is_err());
    }
}
