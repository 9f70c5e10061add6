//! Headless single-frame capture

use anyhow::{Context, Result};
use circles_core::{FieldConfig, FrameTiming};
use circles_render::{FrameOutcome, FrameScheduler, HeadlessContext, ImageResource};
use image::RgbaImage;

/// Render the field offscreen up to `frame` and return that frame's pixels.
/// Frames are stepped at a fixed 60 Hz so captures are reproducible.
pub fn capture(
    width: u32,
    height: u32,
    config: &FieldConfig,
    images: Vec<ImageResource>,
    frame: u32,
) -> Result<RgbaImage> {
    let context = pollster::block_on(HeadlessContext::new(width, height))?;
    let mut scheduler = FrameScheduler::new(
        &context.device,
        &context.queue,
        context.format,
        images,
        config.noise,
        config.circle_count,
    )?;

    let mut timing = FrameTiming::start(0.0);
    for i in 0..=frame {
        let outcome = scheduler.render(
            &context.device,
            &context.queue,
            &context.color_view,
            (width, height),
            &timing,
        );
        anyhow::ensure!(
            outcome == FrameOutcome::Rendered,
            "frame {i} was skipped during capture"
        );
        // Drain the submission so the in-flight guard admits the next frame.
        context.device.poll(wgpu::Maintain::Wait);
        timing = timing.advance(timing.time + 1.0 / 60.0);
    }

    let pixels = pollster::block_on(context.read_pixels())?;
    RgbaImage::from_raw(width, height, pixels).context("readback size mismatch")
}
