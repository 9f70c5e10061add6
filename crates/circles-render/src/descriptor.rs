//! Fixed-layout descriptor table
//!
//! A single GPU-visible table describes every resource the compute kernel
//! reads: one slot per background image plus one slot for the particle
//! buffer. The table layout is fixed at 64 image slots regardless of how
//! many images are loaded, so the kernel indexes it without bounds data
//! and the table's byte size never changes across regenerations. Encoding
//! is pure (bytes in, bytes out) and tested without a device.

use crate::arena::{PlacedBuffer, PlacedImage, ResourceArena};
use bytemuck::{Pod, Zeroable};
use circles_core::{FrameState, Particle};
use thiserror::Error;

/// Image slots in every table, matching the kernel's fixed-size array.
pub const TABLE_IMAGE_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("{given} images exceed the table's {TABLE_IMAGE_CAPACITY}-slot capacity")]
    Capacity { given: usize },
}

/// One image entry: where in the array texture the image lives and its
/// level-0 extent. 16 bytes, mirrored by the WGSL `ImageSlot` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ImageSlot {
    pub layer: u32,
    pub mip_level_count: u32,
    pub width: u32,
    pub height: u32,
}

/// The particle buffer entry: how many elements the bound range holds and
/// their stride. 16 bytes, mirrored by the WGSL `BufferSlot` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct BufferSlot {
    pub element_count: u32,
    pub element_stride: u32,
    pub length_bytes: u32,
    pub _pad: u32,
}

/// Byte length of every encoded table.
pub const fn encoded_len() -> usize {
    TABLE_IMAGE_CAPACITY * std::mem::size_of::<ImageSlot>() + std::mem::size_of::<BufferSlot>()
}

/// Encode the table blob: 64 image slots (zero-filled past the loaded
/// images) followed by the buffer slot.
pub fn encode_table(images: &[PlacedImage], particles: PlacedBuffer) -> Result<Vec<u8>, TableError> {
    if images.len() > TABLE_IMAGE_CAPACITY {
        return Err(TableError::Capacity {
            given: images.len(),
        });
    }

    let mut slots = [ImageSlot::zeroed(); TABLE_IMAGE_CAPACITY];
    for (slot, placed) in slots.iter_mut().zip(images) {
        *slot = ImageSlot {
            layer: placed.layer,
            mip_level_count: placed.mip_level_count,
            width: placed.width,
            height: placed.height,
        };
    }

    let stride = std::mem::size_of::<Particle>() as u32;
    let buffer_slot = BufferSlot {
        element_count: (particles.size / stride as u64) as u32,
        element_stride: stride,
        length_bytes: particles.size as u32,
        _pad: 0,
    };

    let mut bytes = Vec::with_capacity(encoded_len());
    bytes.extend_from_slice(bytemuck::cast_slice(&slots));
    bytes.extend_from_slice(bytemuck::bytes_of(&buffer_slot));
    Ok(bytes)
}

/// The group-0 layout every descriptor table binds against. Created once
/// so tables rebuilt on regenerate stay compatible with the pipelines
/// compiled at startup.
pub fn scene_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Scene Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2Array,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// The table's device-side form: the encoded blob in a storage buffer plus
/// the bind group tying it to the frame uniform, the particle range, and
/// the image array. Group 0 for the compute kernel.
pub struct DescriptorTable {
    bind_group: wgpu::BindGroup,
    frame_buffer: wgpu::Buffer,
    table_buffer: wgpu::Buffer,
}

impl DescriptorTable {
    pub fn build(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        arena: &ResourceArena,
        images: &[PlacedImage],
        particles: PlacedBuffer,
    ) -> Result<Self, TableError> {
        let encoded = encode_table(images, particles)?;

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform"),
            size: std::mem::size_of::<FrameState>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let table_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Descriptor Table"),
            size: encoded_len() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&table_buffer, 0, &encoded);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Scene Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: table_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: arena.buffer(),
                        offset: particles.offset,
                        size: std::num::NonZeroU64::new(particles.size),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(arena.texture_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        Ok(Self {
            bind_group,
            frame_buffer,
            table_buffer,
        })
    }

    /// Upload this frame's uniform values.
    pub fn update_frame(&self, queue: &wgpu::Queue, state: FrameState) {
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&state));
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn table_buffer(&self) -> &wgpu::Buffer {
        &self.table_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_layouts_are_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<ImageSlot>(), 16);
        assert_eq!(std::mem::size_of::<BufferSlot>(), 16);
        assert_eq!(encoded_len(), 64 * 16 + 16);
    }

    fn placed(layer: u32) -> PlacedImage {
        PlacedImage {
            layer,
            width: 256,
            height: 256,
            mip_level_count: 9,
        }
    }

    #[test]
    fn encoded_length_is_constant() {
        let buf = PlacedBuffer {
            offset: 1024,
            size: 512 * 48,
        };
        let none = encode_table(&[], buf).unwrap();
        let four = encode_table(&[placed(0), placed(1), placed(2), placed(3)], buf).unwrap();
        assert_eq!(none.len(), encoded_len());
        assert_eq!(four.len(), encoded_len());
    }

    #[test]
    fn image_slots_encode_in_order_and_tail_is_zero() {
        let buf = PlacedBuffer { offset: 0, size: 48 };
        let bytes = encode_table(&[placed(0), placed(1)], buf).unwrap();
        let slots: &[ImageSlot] =
            bytemuck::cast_slice(&bytes[..TABLE_IMAGE_CAPACITY * 16]);
        assert_eq!(slots[0].layer, 0);
        assert_eq!(slots[1].layer, 1);
        assert_eq!(slots[1].width, 256);
        assert_eq!(slots[1].mip_level_count, 9);
        assert_eq!(slots[2], ImageSlot::zeroed());
        assert_eq!(slots[63], ImageSlot::zeroed());
    }

    #[test]
    fn buffer_slot_holds_count_and_stride() {
        let buf = PlacedBuffer {
            offset: 4096,
            size: 512 * 48,
        };
        let bytes = encode_table(&[], buf).unwrap();
        let slot: BufferSlot =
            *bytemuck::from_bytes(&bytes[TABLE_IMAGE_CAPACITY * 16..]);
        assert_eq!(slot.element_count, 512);
        assert_eq!(slot.element_stride, 48);
        assert_eq!(slot.length_bytes, 512 * 48);
    }

    #[test]
    fn encoding_is_idempotent() {
        let buf = PlacedBuffer {
            offset: 256,
            size: 512 * 48,
        };
        let images = [placed(0), placed(1), placed(2)];
        assert_eq!(
            encode_table(&images, buf).unwrap(),
            encode_table(&images, buf).unwrap()
        );
    }

    #[test]
    fn over_capacity_is_rejected() {
        let buf = PlacedBuffer { offset: 0, size: 48 };
        let too_many: Vec<PlacedImage> = (0..65).map(placed).collect();
        let err = encode_table(&too_many, buf).unwrap_err();
        assert!(matches!(err, TableError::Capacity { given: 65 }));
    }
}
