//! Frame scheduler: compute dispatch, composite pass, admission control
//!
//! Owns the whole GPU side of a circle field: the arena and descriptor
//! table built at startup (and rebuilt on regenerate), the compute pipeline
//! that rasterizes circles into an offscreen storage texture, and the
//! composite pipeline that draws that texture over the animated clear
//! color. One `render` call is one frame; the in-flight guard decides
//! whether the frame is submitted or skipped.

use crate::arena::{self, ArenaError, PlacedImage, ResourceArena};
use crate::context::RenderContext;
use crate::descriptor::{self, DescriptorTable, TableError};
use crate::images::ImageResource;
use crate::inflight::InFlightGuard;
use crate::layout::ArenaPlan;
use bytemuck::{Pod, Zeroable};
use circles_core::{FrameState, FrameTiming, NoiseConfig, NoiseField, Particle, ParticleGenerator, MAX_CIRCLES};
use thiserror::Error;
use wgpu::util::DeviceExt;

/// Compute workgroup shape, matching the WGSL `@workgroup_size`.
pub const WORKGROUP_WIDTH: u32 = 64;
pub const WORKGROUP_HEIGHT: u32 = 4;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("image '{name}' is {got_w}x{got_h}, expected {want_w}x{want_h}")]
    ImageExtentMismatch {
        name: String,
        want_w: u32,
        want_h: u32,
        got_w: u32,
        got_h: u32,
    },
}

/// What became of one `render` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The previous frame's work has not signalled completion.
    InFlight,
    /// The presentation target could not be acquired this refresh.
    TargetUnavailable,
}

/// Background color for time `t` (seconds). The channels breathe at
/// different rates so dropped frames are visible immediately.
pub fn clear_color(t: f64) -> wgpu::Color {
    wgpu::Color {
        r: 0.0,
        g: (1.0 + t.sin()) * 0.5,
        b: (2.0 * t).cos().abs() * 0.25,
        a: 1.0,
    }
}

/// Workgroup grid covering a `width` x `height` target. The kernel bounds
/// checks, so rounding up never writes out of range.
pub fn dispatch_groups(width: u32, height: u32) -> (u32, u32) {
    (
        width.div_ceil(WORKGROUP_WIDTH),
        height.div_ceil(WORKGROUP_HEIGHT),
    )
}

/// All loaded images must share one extent (they become layers of a single
/// array texture). Returns that extent, (1, 1) for an empty set.
pub fn validate_extents(images: &[ImageResource]) -> Result<(u32, u32), SetupError> {
    let Some(first) = images.first() else {
        return Ok((1, 1));
    };
    let want = (first.width(), first.height());
    for img in images {
        if (img.width(), img.height()) != want {
            return Err(SetupError::ImageExtentMismatch {
                name: img.name().to_string(),
                want_w: want.0,
                want_h: want.1,
                got_w: img.width(),
                got_h: img.height(),
            });
        }
    }
    Ok(want)
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 3],
    uv: [f32; 2],
}

// A centered quad covering 80% of clip space, leaving a border of pure
// clear color around the composited field.
const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-0.8, -0.8, 0.0],
        uv: [0.0, 1.0],
    },
    QuadVertex {
        position: [0.8, -0.8, 0.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [-0.8, 0.8, 0.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [0.8, 0.8, 0.0],
        uv: [1.0, 0.0],
    },
];

/// The offscreen texture the kernel writes. Recreated only when the
/// presentation target's dimensions change.
struct ComputeTarget {
    size: (u32, u32),
    compute_bind_group: wgpu::BindGroup,
    composite_bind_group: wgpu::BindGroup,
}

/// Per-generation scene resources, swapped wholesale on regenerate.
struct SceneResources {
    _arena: ResourceArena,
    table: DescriptorTable,
}

pub struct FrameScheduler {
    images: Vec<ImageResource>,
    image_extent: (u32, u32),
    scene: SceneResources,
    guard: InFlightGuard,
    circle_count: u32,

    scene_layout: wgpu::BindGroupLayout,
    compute_pipeline: wgpu::ComputePipeline,
    composite_pipeline: wgpu::RenderPipeline,
    target_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    quad_buffer: wgpu::Buffer,
    target: Option<ComputeTarget>,
}

impl FrameScheduler {
    /// Build every startup resource: particle buffer and images packed into
    /// the arena, the descriptor table over them, and both pipelines.
    /// `surface_format` is the format the composite pass renders into.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        images: Vec<ImageResource>,
        noise: NoiseConfig,
        circle_count: u32,
    ) -> Result<Self, SetupError> {
        let image_extent = validate_extents(&images)?;
        let scene_layout = descriptor::scene_bind_group_layout(device);
        let scene = build_scene(device, queue, &scene_layout, &images, image_extent, noise)?;

        let circles_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Circles Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("circles.wgsl").into()),
        });
        let composite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Composite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("composite.wgsl").into()),
        });

        let target_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Compute Target Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            }],
        });

        let compute_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Circles Pipeline Layout"),
            bind_group_layouts: &[&scene_layout, &target_layout],
            push_constant_ranges: &[],
        });

        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Circles Compute Pipeline"),
            layout: Some(&compute_layout),
            module: &circles_shader,
            entry_point: Some("generate_circles"),
            compilation_options: Default::default(),
            cache: None,
        });

        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Composite Pipeline Layout"),
                bind_group_layouts: &[&composite_layout],
                push_constant_ranges: &[],
            });

        let composite_pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Composite Pipeline"),
                layout: Some(&composite_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &composite_shader,
                    entry_point: Some("vs_quad"),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &composite_shader,
                    entry_point: Some("fs_quad"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Composite Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(Self {
            images,
            image_extent,
            scene,
            guard: InFlightGuard::new(),
            circle_count: circle_count.min(MAX_CIRCLES),
            scene_layout,
            compute_pipeline,
            composite_pipeline,
            target_layout,
            composite_layout,
            sampler,
            quad_buffer,
            target: None,
        })
    }

    /// Circles drawn per frame.
    pub fn circle_count(&self) -> u32 {
        self.circle_count
    }

    /// Change the per-frame circle count. Takes effect on the next frame
    /// without touching the particle buffer.
    pub fn set_circle_count(&mut self, count: u32) {
        self.circle_count = count.min(MAX_CIRCLES);
    }

    /// Frames actually submitted so far.
    pub fn frames_submitted(&self) -> u64 {
        self.guard.submissions()
    }

    /// Rebuild the particle field from a new noise config. The old arena
    /// and table stay live until the replacements are complete, so a
    /// failure leaves the previous field rendering.
    pub fn regenerate(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        noise: NoiseConfig,
    ) -> Result<(), SetupError> {
        let scene = build_scene(
            device,
            queue,
            &self.scene_layout,
            &self.images,
            self.image_extent,
            noise,
        )?;
        self.scene = scene;
        Ok(())
    }

    /// Render one frame into `view`, a `pixel_size` color target of the
    /// format given at construction. Skips without encoding anything when
    /// the previous frame is still in flight.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        pixel_size: (u32, u32),
        timing: &FrameTiming,
    ) -> FrameOutcome {
        if !self.guard.try_begin() {
            log::trace!("frame {} skipped: previous frame in flight", timing.frame_index);
            return FrameOutcome::Skipped(SkipReason::InFlight);
        }

        self.ensure_target(device, pixel_size);
        let target = self
            .target
            .as_ref()
            .unwrap_or_else(|| unreachable!("ensure_target always installs a target"));

        self.scene
            .table
            .update_frame(queue, FrameState::new(timing.frame_index, self.circle_count));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Circles Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.compute_pipeline);
            pass.set_bind_group(0, self.scene.table.bind_group(), &[]);
            pass.set_bind_group(1, &target.compute_bind_group, &[]);
            let (gx, gy) = dispatch_groups(pixel_size.0, pixel_size.1);
            pass.dispatch_workgroups(gx, gy, 1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color(timing.time)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.composite_pipeline);
            pass.set_bind_group(0, &target.composite_bind_group, &[]);
            pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
            pass.draw(0..4, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
        let signal = self.guard.arm();
        queue.on_submitted_work_done(move || signal.finish());

        FrameOutcome::Rendered
    }

    /// Render a frame to the window surface and present it. Surface loss
    /// for one refresh is a skip, not an error.
    pub fn render_surface(
        &mut self,
        context: &RenderContext,
        timing: &FrameTiming,
    ) -> FrameOutcome {
        let frame = match context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(e) => {
                log::trace!(
                    "frame {} skipped: surface unavailable ({e})",
                    timing.frame_index
                );
                return FrameOutcome::Skipped(SkipReason::TargetUnavailable);
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let outcome = self.render(
            &context.device,
            &context.queue,
            &view,
            (context.config.width, context.config.height),
            timing,
        );
        if outcome == FrameOutcome::Rendered {
            frame.present();
        }
        outcome
    }

    /// Recreate the offscreen compute target if the presentation size
    /// changed; reuse it otherwise.
    fn ensure_target(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        if matches!(&self.target, Some(t) if t.size == size) {
            return;
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Compute Target"),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let compute_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Compute Target Bind Group"),
            layout: &self.target_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            }],
        });

        let composite_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout: &self.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        self.target = Some(ComputeTarget {
            size,
            compute_bind_group,
            composite_bind_group,
        });
    }
}

/// Generate the full-capacity particle sequence and pack everything into a
/// fresh arena with its descriptor table. Generating all 512 up front is
/// what lets `set_circle_count` take effect without regeneration.
fn build_scene(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    images: &[ImageResource],
    image_extent: (u32, u32),
    noise: NoiseConfig,
) -> Result<SceneResources, SetupError> {
    let generator = ParticleGenerator::new(NoiseField::new(noise));
    let particles = generator.generate(MAX_CIRCLES, images.len() as u32);
    let particle_bytes = (MAX_CIRCLES as usize * std::mem::size_of::<Particle>()) as u64;

    let storage_align = device.limits().min_storage_buffer_offset_alignment as u64;
    let reqs = arena::requirements(images, particle_bytes, storage_align);
    let plan = ArenaPlan::compute(&reqs);

    let mut arena = ResourceArena::allocate(device, plan, image_extent, images.len() as u32)?;

    let mut placed_images: Vec<PlacedImage> = Vec::with_capacity(images.len());
    for img in images {
        placed_images.push(arena.place_image(queue, img)?);
    }
    let placed_particles = arena.place_buffer(queue, bytemuck::cast_slice(&particles))?;

    let table =
        DescriptorTable::build(device, queue, layout, &arena, &placed_images, placed_particles)?;
    log::debug!(
        "scene built: {} images, {} particles, {} arena bytes",
        images.len(),
        particles.len(),
        placed_particles.offset + placed_particles.size
    );

    Ok(SceneResources {
        _arena: arena,
        table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn clear_color_tracks_time() {
        let c0 = clear_color(0.0);
        assert_eq!(c0.r, 0.0);
        assert!((c0.g - 0.5).abs() < 1e-9);
        assert!((c0.b - 0.25).abs() < 1e-9);
        assert_eq!(c0.a, 1.0);

        // Green peaks at t = pi/2, blue zeroes at t = pi/4.
        let peak = clear_color(std::f64::consts::FRAC_PI_2);
        assert!((peak.g - 1.0).abs() < 1e-9);
        let dark = clear_color(std::f64::consts::FRAC_PI_4);
        assert!(dark.b.abs() < 1e-9);

        for i in 0..100 {
            let c = clear_color(i as f64 * 0.37);
            assert!((0.0..=1.0).contains(&c.g));
            assert!((0.0..=0.25).contains(&c.b));
        }
    }

    #[test]
    fn dispatch_covers_target() {
        for (w, h) in [(1u32, 1u32), (63, 3), (64, 4), (65, 5), (1920, 1080)] {
            let (gx, gy) = dispatch_groups(w, h);
            assert!(gx * WORKGROUP_WIDTH >= w);
            assert!(gy * WORKGROUP_HEIGHT >= h);
            // Never a whole workgroup of pure overshoot
            assert!((gx - 1) * WORKGROUP_WIDTH < w);
            assert!((gy - 1) * WORKGROUP_HEIGHT < h);
        }
    }

    #[test]
    fn extent_validation() {
        let ok = vec![
            ImageResource::new("a", RgbaImage::new(8, 8)),
            ImageResource::new("b", RgbaImage::new(8, 8)),
        ];
        assert_eq!(validate_extents(&ok).unwrap(), (8, 8));

        let bad = vec![
            ImageResource::new("a", RgbaImage::new(8, 8)),
            ImageResource::new("b", RgbaImage::new(16, 8)),
        ];
        let err = validate_extents(&bad).unwrap_err();
        assert!(matches!(err, SetupError::ImageExtentMismatch { .. }));

        assert_eq!(validate_extents(&[]).unwrap(), (1, 1));
    }
}
