//! Particle data shared with the compute kernel

use bytemuck::{Pod, Zeroable};

/// One simulated circle — matches the WGSL `Circle` struct layout.
/// 48 bytes, 16-byte aligned stride (vec4 + 2 x vec2 + u32 + f32 + pad).
///
/// Host-side this is immutable once generated; the kernel owns any motion
/// integration, so `velocity` is a per-frame displacement hint, not state.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// RGBA tint. Derived from noise, so channels may leave [0, 1];
    /// the kernel clamps when it composites.
    pub color: [f32; 4],
    /// Normalized position; wrap policy belongs to the kernel.
    pub origin: [f32; 2],
    /// Per-frame displacement hint, consumed by the kernel.
    pub velocity: [f32; 2],
    /// Index into the background image array, always < image count.
    pub texture_index: u32,
    /// Non-negative by construction (`abs` of a noise sample).
    pub radius: f32,
    pub _pad: [u32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_layout() {
        assert_eq!(std::mem::size_of::<Particle>(), 48);
        assert_eq!(std::mem::align_of::<Particle>(), 4);
        // WGSL array stride for this struct is 48; keep the Rust side equal
        // so a Vec<Particle> casts straight into the storage buffer.
        assert_eq!(std::mem::size_of::<[Particle; 4]>(), 192);
    }
}
