//! Circles Core - device-free particle field logic
//!
//! Everything the GPU renderer consumes but that does not itself touch a
//! device: the seeded noise field, the circle generator, the TOML field
//! config, and per-frame timing state. All of it is deterministic and
//! unit-testable without an adapter.

pub mod config;
pub mod frame;
pub mod generator;
pub mod noise;
pub mod particle;

pub use config::FieldConfig;
pub use frame::{FrameState, FrameTiming};
pub use generator::{ParticleGenerator, MAX_CIRCLES};
pub use noise::{NoiseConfig, NoiseField};
pub use particle::Particle;
