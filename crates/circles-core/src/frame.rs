//! Per-frame timing and the kernel-visible frame state

use bytemuck::{Pod, Zeroable};

/// Timing input supplied by the presentation driver once per refresh.
/// Each value is derived from the previous one plus elapsed wall time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Absolute time in seconds.
    pub time: f64,
    /// Seconds since the previous frame.
    pub time_delta: f64,
    /// Monotonically increasing frame counter.
    pub frame_index: u64,
}

impl FrameTiming {
    pub fn start(now: f64) -> Self {
        Self {
            time: now,
            time_delta: 0.0,
            frame_index: 0,
        }
    }

    /// The timing for the frame beginning at `now`, relative to this one.
    pub fn advance(&self, now: f64) -> Self {
        Self {
            time: now,
            time_delta: now - self.time,
            frame_index: self.frame_index + 1,
        }
    }
}

/// Inline parameters for one compute dispatch — rebuilt every frame, passed
/// by value, never persisted past the dispatch that consumes it.
/// Matches the WGSL `FrameState` struct (16 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameState {
    pub frame_index: u32,
    pub circle_count: u32,
    pub _pad: [u32; 2],
}

impl FrameState {
    pub fn new(frame_index: u64, circle_count: u32) -> Self {
        Self {
            // The kernel only needs low bits for animation phase.
            frame_index: frame_index as u32,
            circle_count,
            _pad: [0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_advances_monotonically() {
        let mut t = FrameTiming::start(100.0);
        for i in 1..10u64 {
            let next = t.advance(100.0 + i as f64 * 0.016);
            assert_eq!(next.frame_index, i);
            assert!(next.time > t.time);
            assert!((next.time_delta - 0.016).abs() < 1e-9);
            t = next;
        }
    }

    #[test]
    fn frame_state_layout() {
        assert_eq!(std::mem::size_of::<FrameState>(), 16);
    }
}
