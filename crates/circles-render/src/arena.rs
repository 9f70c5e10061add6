//! Device-memory arena hosting every per-generation GPU resource
//!
//! One plan, one backing buffer, one array texture. Buffers are placed at
//! the plan's aligned offsets inside the backing buffer; images are placed
//! as array-texture layers with their plan regions serving as capacity
//! accounting (wgpu cannot suballocate texture memory from a buffer).
//! Dropping the arena drops every placed resource, so handles must not
//! outlive it — `PlacedImage`/`PlacedBuffer` are plain descriptors that are
//! only meaningful together with the arena that issued them.

use crate::images::ImageResource;
use crate::layout::{ArenaPlan, Region, ResourceKind, ResourceRequirement};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("device cannot satisfy arena of {needed} bytes (device limit {limit})")]
    ResourceExhausted { needed: u64, limit: u64 },
    #[error("placement failed: {0}")]
    PlacementFailed(String),
}

/// Handle to an image placed in the arena's array texture.
#[derive(Debug, Clone, Copy)]
pub struct PlacedImage {
    pub layer: u32,
    pub width: u32,
    pub height: u32,
    pub mip_level_count: u32,
}

/// Handle to a byte range placed in the arena's backing buffer.
#[derive(Debug, Clone, Copy)]
pub struct PlacedBuffer {
    pub offset: u64,
    pub size: u64,
}

pub struct ResourceArena {
    buffer: wgpu::Buffer,
    texture: wgpu::Texture,
    texture_view: wgpu::TextureView,
    extent: (u32, u32),
    layer_count: u32,
    mip_level_count: u32,
    plan: ArenaPlan,
    next_region: usize,
    next_layer: u32,
}

/// Build the arena requirements for a fixed image set plus the particle
/// buffer, in placement order. `storage_align` comes from
/// `device.limits().min_storage_buffer_offset_alignment`.
pub fn requirements(
    images: &[ImageResource],
    particle_bytes: u64,
    storage_align: u64,
) -> Vec<ResourceRequirement> {
    let row_align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;
    let mut reqs: Vec<ResourceRequirement> = images
        .iter()
        .map(|img| ResourceRequirement {
            size: img.plan_bytes(row_align),
            align: row_align,
            kind: ResourceKind::Image,
        })
        .collect();
    reqs.push(ResourceRequirement {
        size: particle_bytes,
        align: storage_align,
        kind: ResourceKind::Buffer,
    });
    reqs
}

impl ResourceArena {
    /// Reserve the arena for `plan`. The image side is an array texture of
    /// `layer_count` layers at `extent` with a full mip chain; the buffer
    /// side spans the plan's buffer regions. Surfaces `ResourceExhausted`
    /// when the device limits cannot satisfy the request — callers abort
    /// startup or the regenerate rather than degrade silently.
    pub fn allocate(
        device: &wgpu::Device,
        plan: ArenaPlan,
        extent: (u32, u32),
        layer_count: u32,
    ) -> Result<Self, ArenaError> {
        let limits = device.limits();

        if plan.total() > limits.max_buffer_size {
            return Err(ArenaError::ResourceExhausted {
                needed: plan.total(),
                limit: limits.max_buffer_size,
            });
        }
        if extent.0 > limits.max_texture_dimension_2d || extent.1 > limits.max_texture_dimension_2d
        {
            return Err(ArenaError::ResourceExhausted {
                needed: extent.0.max(extent.1) as u64,
                limit: limits.max_texture_dimension_2d as u64,
            });
        }
        if layer_count > limits.max_texture_array_layers {
            return Err(ArenaError::ResourceExhausted {
                needed: layer_count as u64,
                limit: limits.max_texture_array_layers as u64,
            });
        }

        let mip_level_count = crate::images::mip_level_count(extent.0, extent.1);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Arena Buffer"),
            size: plan.buffer_span().max(4),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Arena Image Array"),
            size: wgpu::Extent3d {
                width: extent.0,
                height: extent.1,
                depth_or_array_layers: layer_count.max(1),
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Arena Image Array View"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        Ok(Self {
            buffer,
            texture,
            texture_view,
            extent,
            layer_count,
            mip_level_count,
            plan,
            next_region: 0,
            next_layer: 0,
        })
    }

    /// Copy one image's full mip chain into the next array layer. The
    /// writes are flushed as a single submission, so the placed image is
    /// usable (all levels populated) as soon as this returns.
    pub fn place_image(
        &mut self,
        queue: &wgpu::Queue,
        image: &ImageResource,
    ) -> Result<PlacedImage, ArenaError> {
        let region = self.take_region(ResourceKind::Image, "image")?;

        if (image.width(), image.height()) != self.extent {
            return Err(ArenaError::PlacementFailed(format!(
                "image '{}' is {}x{}, arena layers are {}x{}",
                image.name(),
                image.width(),
                image.height(),
                self.extent.0,
                self.extent.1
            )));
        }
        if self.next_layer >= self.layer_count {
            return Err(ArenaError::PlacementFailed(format!(
                "no layer left for image '{}' ({} layers reserved)",
                image.name(),
                self.layer_count
            )));
        }

        let layer = self.next_layer;
        for (level, mip) in image.mip_chain().into_iter().enumerate() {
            let (w, h) = mip.dimensions();
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &self.texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                    aspect: wgpu::TextureAspect::All,
                },
                &mip,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(w * 4),
                    rows_per_image: Some(h),
                },
                wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
            );
        }
        queue.submit(std::iter::empty());

        debug_assert!(region.size >= 4 * image.width() as u64 * image.height() as u64);
        self.next_layer += 1;

        Ok(PlacedImage {
            layer,
            width: image.width(),
            height: image.height(),
            mip_level_count: self.mip_level_count,
        })
    }

    /// Copy raw bytes into the next planned buffer region.
    pub fn place_buffer(
        &mut self,
        queue: &wgpu::Queue,
        bytes: &[u8],
    ) -> Result<PlacedBuffer, ArenaError> {
        let region = self.take_region(ResourceKind::Buffer, "buffer")?;

        // A short region means the plan was computed for different contents;
        // refuse before touching the buffer so neighbours stay intact.
        if (bytes.len() as u64) > region.size {
            debug_assert!(
                false,
                "buffer placement of {} bytes into {}-byte region",
                bytes.len(),
                region.size
            );
            return Err(ArenaError::PlacementFailed(format!(
                "{} bytes do not fit the planned {}-byte region",
                bytes.len(),
                region.size
            )));
        }

        queue.write_buffer(&self.buffer, region.offset, bytes);
        queue.submit(std::iter::empty());

        Ok(PlacedBuffer {
            offset: region.offset,
            size: bytes.len() as u64,
        })
    }

    fn take_region(&mut self, kind: ResourceKind, what: &str) -> Result<Region, ArenaError> {
        let region = self
            .plan
            .regions()
            .get(self.next_region)
            .copied()
            .ok_or_else(|| {
                ArenaError::PlacementFailed(format!("no region left for {what} placement"))
            })?;
        if region.kind != kind {
            // Callers must place in plan order; the descriptor table depends
            // on it.
            return Err(ArenaError::PlacementFailed(format!(
                "out-of-order placement: expected {:?}, placing {what}",
                region.kind
            )));
        }
        self.next_region += 1;
        Ok(region)
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn texture_view(&self) -> &wgpu::TextureView {
        &self.texture_view
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ArenaPlan;
    use image::RgbaImage;

    #[test]
    fn requirements_follow_placement_order() {
        let images = vec![
            ImageResource::new("a", RgbaImage::new(4, 4)),
            ImageResource::new("b", RgbaImage::new(4, 4)),
        ];
        let reqs = requirements(&images, 512 * 48, 256);
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[0].kind, ResourceKind::Image);
        assert_eq!(reqs[1].kind, ResourceKind::Image);
        assert_eq!(reqs[2].kind, ResourceKind::Buffer);
        assert_eq!(reqs[2].size, 512 * 48);
        assert_eq!(reqs[2].align, 256);
    }

    #[test]
    fn plan_total_grows_with_image_count() {
        let one = vec![ImageResource::new("a", RgbaImage::new(16, 16))];
        let two = vec![
            ImageResource::new("a", RgbaImage::new(16, 16)),
            ImageResource::new("b", RgbaImage::new(16, 16)),
        ];
        let t1 = ArenaPlan::compute(&requirements(&one, 1024, 256)).total();
        let t2 = ArenaPlan::compute(&requirements(&two, 1024, 256)).total();
        assert!(t2 > t1);
    }
}
