//! In-flight frame guard
//!
//! Admission control for submissions: at most one frame's work may be on
//! the GPU at a time. The guard owns the receiving end of a channel; the
//! completion callback (queued after submit) owns the sender and fires it
//! when the device reports the work done. `try_begin` polls without
//! blocking, so a still-pending frame makes the caller skip rather than
//! stall.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// Handed to the GPU completion callback; signalling it (or dropping it)
/// marks the submission complete.
pub struct CompletionSignal {
    sender: Sender<()>,
}

impl CompletionSignal {
    pub fn finish(self) {
        // A send into a dropped receiver just means the guard is gone.
        let _ = self.sender.send(());
    }
}

#[derive(Default)]
pub struct InFlightGuard {
    pending: Option<Receiver<()>>,
    submissions: u64,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a frame may be submitted. Clears the pending slot when the
    /// previous submission has signalled completion (or its signal was
    /// dropped, which can only happen after the callback ran).
    pub fn try_begin(&mut self) -> bool {
        match &self.pending {
            None => true,
            Some(rx) => match rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    self.pending = None;
                    true
                }
                Err(TryRecvError::Empty) => false,
            },
        }
    }

    /// Record a submission and return the signal to hand to the completion
    /// callback. Must only be called after `try_begin` returned true.
    pub fn arm(&mut self) -> CompletionSignal {
        debug_assert!(self.pending.is_none(), "armed while a frame is in flight");
        let (tx, rx) = mpsc::channel();
        self.pending = Some(rx);
        self.submissions += 1;
        CompletionSignal { sender: tx }
    }

    /// Total frames submitted through this guard.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_guard_admits() {
        let mut guard = InFlightGuard::new();
        assert!(guard.try_begin());
        assert_eq!(guard.submissions(), 0);
    }

    #[test]
    fn armed_guard_blocks_until_signalled() {
        let mut guard = InFlightGuard::new();
        assert!(guard.try_begin());
        let signal = guard.arm();
        assert!(!guard.try_begin());
        assert!(!guard.try_begin());
        signal.finish();
        assert!(guard.try_begin());
        assert_eq!(guard.submissions(), 1);
    }

    #[test]
    fn dropped_signal_unblocks() {
        // The callback owning the signal ran but panicked or chose not to
        // send; the guard must not deadlock forever.
        let mut guard = InFlightGuard::new();
        let signal = guard.arm();
        drop(signal);
        assert!(guard.try_begin());
    }

    #[test]
    fn signal_from_another_thread() {
        let mut guard = InFlightGuard::new();
        let signal = guard.arm();
        assert!(!guard.try_begin());
        let handle = std::thread::spawn(move || signal.finish());
        handle.join().unwrap();
        assert!(guard.try_begin());
    }

    #[test]
    fn sequential_frames_each_need_a_signal() {
        let mut guard = InFlightGuard::new();
        for i in 0..3u64 {
            assert!(guard.try_begin());
            let signal = guard.arm();
            assert_eq!(guard.submissions(), i + 1);
            assert!(!guard.try_begin());
            signal.finish();
        }
        assert!(guard.try_begin());
    }
}
