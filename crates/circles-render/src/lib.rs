//! Circles Render - wgpu compute renderer for the circle field
//!
//! This crate owns every device-facing piece of the demo: the resource
//! arena that packs the particle buffer and background images into shared
//! allocations, the fixed-layout descriptor table the kernel reads, the
//! compute pass that rasterizes circles into an offscreen texture, and the
//! composite pass that presents it. The frame scheduler ties them together
//! under a one-frame-in-flight admission policy.

pub mod arena;
mod context;
pub mod descriptor;
mod headless;
pub mod images;
pub mod inflight;
pub mod layout;
pub mod scheduler;

pub use arena::{ArenaError, PlacedBuffer, PlacedImage, ResourceArena};
pub use context::{RenderContext, RenderError};
pub use descriptor::{DescriptorTable, TableError, TABLE_IMAGE_CAPACITY};
pub use headless::HeadlessContext;
pub use images::ImageResource;
pub use inflight::{CompletionSignal, InFlightGuard};
pub use layout::{ArenaPlan, ResourceKind, ResourceRequirement};
pub use scheduler::{FrameOutcome, FrameScheduler, SetupError, SkipReason};

#[cfg(test)]
mod tests {
    #[test]
    fn circles_wgsl_parses() {
        let source = include_str!("circles.wgsl");
        naga::front::wgsl::parse_str(source).expect("circles.wgsl failed to parse");
    }

    #[test]
    fn composite_wgsl_parses() {
        let source = include_str!("composite.wgsl");
        naga::front::wgsl::parse_str(source).expect("composite.wgsl failed to parse");
    }
}
