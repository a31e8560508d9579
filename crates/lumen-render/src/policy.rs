//! Frame protocol and swapchain staleness tracking.
//!
//! The presentation engine can flag the swapchain suboptimal or out of date
//! at two points in a frame (acquire and present). Both paths funnel into
//! [`RebuildPolicy`]: the swapchain is marked stale and rebuilt once, before
//! the next acquire, no matter how many signals arrived in between.
//!
//! [`run_frame`] fixes the per-frame ordering — fence wait, pending rebuild,
//! acquire, reset/record, submit, present — over an abstract [`FrameOps`],
//! so the protocol is exercised without a device.

use lumen_gpu::swapchain::AcquireResult;
use lumen_gpu::Result;

/// Result of a completed frame iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was recorded, submitted, and presented.
    Rendered,
    /// No image could be acquired; the frame was skipped and a rebuild is
    /// pending.
    Skipped,
}

/// One frame's worth of device operations.
///
/// The renderer implements this over the real device; the ordering rules
/// live in [`run_frame`] and hold for any implementation.
pub trait FrameOps {
    /// Block until the previous submission retired.
    fn wait_fence(&mut self) -> Result<()>;
    /// Rebuild the swapchain and everything depending on it.
    fn rebuild(&mut self) -> Result<()>;
    /// Acquire the next presentable image.
    fn acquire(&mut self) -> Result<AcquireResult>;
    /// Reset the fence and command buffer, then re-record for the image.
    /// Only called after `wait_fence` returned in the same frame.
    fn reset_and_record(&mut self, image_index: u32) -> Result<()>;
    /// Submit the recorded work to the graphics queue.
    fn submit(&mut self) -> Result<()>;
    /// Present the image; `true` means a rebuild is needed.
    fn present(&mut self, image_index: u32) -> Result<bool>;
}

/// Run one frame of the acquire/record/submit/present protocol.
///
/// The fence wait always comes first, so the command buffer and fence are
/// only reset once the prior submission has provably retired. A pending
/// rebuild runs after the wait and before the acquire. An out-of-date
/// acquire skips the frame entirely; nothing is submitted.
pub fn run_frame<O: FrameOps>(ops: &mut O, policy: &mut RebuildPolicy) -> Result<FrameOutcome> {
    ops.wait_fence()?;

    if policy.take_rebuild() {
        ops.rebuild()?;
    }

    let (image_index, suboptimal) = match ops.acquire()? {
        AcquireResult::Ready {
            image_index,
            suboptimal,
        } => (image_index, suboptimal),
        AcquireResult::OutOfDate => {
            // Nothing was submitted; skip the frame and rebuild before
            // the next acquire
            policy.mark_stale();
            return Ok(FrameOutcome::Skipped);
        }
    };
    if suboptimal {
        tracing::warn!("Swapchain suboptimal at acquire; rebuild scheduled");
    }
    policy.note_acquire(suboptimal);

    ops.reset_and_record(image_index)?;
    ops.submit()?;

    let needs_rebuild = ops.present(image_index)?;
    if needs_rebuild {
        tracing::warn!("Swapchain out of date at present; rebuild scheduled");
    }
    policy.note_present(needs_rebuild);

    Ok(FrameOutcome::Rendered)
}

/// Tracks whether the swapchain must be rebuilt before the next acquire.
#[derive(Debug, Default)]
pub struct RebuildPolicy {
    stale: bool,
}

impl RebuildPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the swapchain stale. Idempotent: repeated marks coalesce into a
    /// single pending rebuild.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Record an acquire outcome.
    pub fn note_acquire(&mut self, suboptimal: bool) {
        if suboptimal {
            self.stale = true;
        }
    }

    /// Record a present outcome.
    pub fn note_present(&mut self, needs_rebuild: bool) {
        if needs_rebuild {
            self.stale = true;
        }
    }

    /// Whether a rebuild is pending.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Consume the pending rebuild, if any. Returns `true` at most once per
    /// staleness episode.
    pub fn take_rebuild(&mut self) -> bool {
        std::mem::take(&mut self.stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_gpu::GpuError;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Wait,
        Rebuild,
        Acquire,
        Reset,
        Submit,
        Present,
    }

    /// Scripted device stand-in recording the order of frame operations.
    #[derive(Default)]
    struct ScriptedOps {
        acquires: VecDeque<AcquireResult>,
        present_results: VecDeque<bool>,
        fail_wait: bool,
        events: Vec<Event>,
    }

    impl ScriptedOps {
        fn rebuild_count(&self) -> usize {
            self.events.iter().filter(|&&e| e == Event::Rebuild).count()
        }
    }

    impl FrameOps for ScriptedOps {
        fn wait_fence(&mut self) -> Result<()> {
            self.events.push(Event::Wait);
            if self.fail_wait {
                return Err(GpuError::DeviceLost("fence wait timed out"));
            }
            Ok(())
        }

        fn rebuild(&mut self) -> Result<()> {
            self.events.push(Event::Rebuild);
            Ok(())
        }

        fn acquire(&mut self) -> Result<AcquireResult> {
            self.events.push(Event::Acquire);
            Ok(self.acquires.pop_front().unwrap_or(AcquireResult::Ready {
                image_index: 0,
                suboptimal: false,
            }))
        }

        fn reset_and_record(&mut self, _image_index: u32) -> Result<()> {
            self.events.push(Event::Reset);
            Ok(())
        }

        fn submit(&mut self) -> Result<()> {
            self.events.push(Event::Submit);
            Ok(())
        }

        fn present(&mut self, _image_index: u32) -> Result<bool> {
            self.events.push(Event::Present);
            Ok(self.present_results.pop_front().unwrap_or(false))
        }
    }

    #[test]
    fn frame_steps_run_in_protocol_order() {
        let mut ops = ScriptedOps::default();
        let mut policy = RebuildPolicy::new();

        let outcome = run_frame(&mut ops, &mut policy).unwrap();

        assert_eq!(outcome, FrameOutcome::Rendered);
        assert_eq!(
            ops.events,
            vec![
                Event::Wait,
                Event::Acquire,
                Event::Reset,
                Event::Submit,
                Event::Present
            ]
        );
    }

    #[test]
    fn fence_wait_precedes_every_reset() {
        let mut ops = ScriptedOps::default();
        ops.acquires.push_back(AcquireResult::Ready {
            image_index: 0,
            suboptimal: true,
        });
        let mut policy = RebuildPolicy::new();

        for _ in 0..4 {
            run_frame(&mut ops, &mut policy).unwrap();
        }

        // Each reset must be covered by a wait that returned earlier in the
        // same frame; a wait covers at most one reset.
        let mut waited = false;
        for &event in &ops.events {
            match event {
                Event::Wait => waited = true,
                Event::Reset => {
                    assert!(waited, "fence reset without a completed wait");
                    waited = false;
                }
                _ => {}
            }
        }
    }

    #[test]
    fn slow_fence_blocks_frame_before_any_reset() {
        let mut ops = ScriptedOps {
            fail_wait: true,
            ..Default::default()
        };
        let mut policy = RebuildPolicy::new();

        let err = run_frame(&mut ops, &mut policy).unwrap_err();

        assert!(matches!(err, GpuError::DeviceLost(_)));
        // The frame never got past the wait: no reset, no submission
        assert_eq!(ops.events, vec![Event::Wait]);
    }

    #[test]
    fn out_of_date_acquire_skips_without_submission() {
        let mut ops = ScriptedOps::default();
        ops.acquires.push_back(AcquireResult::OutOfDate);
        let mut policy = RebuildPolicy::new();

        let outcome = run_frame(&mut ops, &mut policy).unwrap();

        assert_eq!(outcome, FrameOutcome::Skipped);
        assert_eq!(ops.events, vec![Event::Wait, Event::Acquire]);
        assert!(policy.is_stale());
    }

    #[test]
    fn suboptimal_frame_completes_then_rebuilds_exactly_once() {
        let mut ops = ScriptedOps::default();
        ops.acquires.push_back(AcquireResult::Ready {
            image_index: 0,
            suboptimal: true,
        });
        let mut policy = RebuildPolicy::new();

        let outcome = run_frame(&mut ops, &mut policy).unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered);
        assert_eq!(ops.rebuild_count(), 0);

        for _ in 0..4 {
            let outcome = run_frame(&mut ops, &mut policy).unwrap();
            assert_eq!(outcome, FrameOutcome::Rendered);
        }
        assert_eq!(ops.rebuild_count(), 1);

        // The rebuild ran between the wait and the acquire of its frame
        let rebuild = ops.events.iter().position(|&e| e == Event::Rebuild).unwrap();
        assert_eq!(ops.events[rebuild - 1], Event::Wait);
        assert_eq!(ops.events[rebuild + 1], Event::Acquire);
    }

    #[test]
    fn present_rebuild_signal_defers_to_next_frame() {
        let mut ops = ScriptedOps::default();
        ops.present_results.push_back(true);
        let mut policy = RebuildPolicy::new();

        run_frame(&mut ops, &mut policy).unwrap();
        assert_eq!(ops.rebuild_count(), 0);
        assert!(policy.is_stale());

        run_frame(&mut ops, &mut policy).unwrap();
        assert_eq!(ops.rebuild_count(), 1);
        assert!(!policy.is_stale());
    }

    #[test]
    fn fresh_policy_requests_no_rebuild() {
        let mut policy = RebuildPolicy::new();
        assert!(!policy.take_rebuild());
    }

    #[test]
    fn suboptimal_acquire_defers_rebuild_to_next_frame() {
        let mut policy = RebuildPolicy::new();
        // The suboptimal frame itself completes; the rebuild happens before
        // the next acquire
        policy.note_acquire(true);
        assert!(policy.is_stale());
        assert!(policy.take_rebuild());
        assert!(!policy.take_rebuild());
    }

    #[test]
    fn repeated_marks_coalesce() {
        let mut policy = RebuildPolicy::new();
        policy.note_acquire(true);
        policy.note_present(true);
        policy.mark_stale();
        assert!(policy.take_rebuild());
        assert!(!policy.take_rebuild());
    }
}
