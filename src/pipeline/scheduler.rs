//! Scheduler - cooperative deferral of state notifications and commits.
//!
//! Two queues stand in for the host's suspension boundaries:
//!
//! ```text
//! setter ──▶ microtask queue ──▶ subscriber notification ──▶ frame queue ──▶ commit
//! ```
//!
//! - **microtasks** batch every setter call made in one synchronous turn into
//!   a single notification pass.
//! - **frames** coalesce notification passes into one commit per instance.
//!
//! Nothing runs until the embedder drives the loop with [`Scheduler::tick`]
//! (one frame) or [`Scheduler::run_until_idle`]. Everything is single-threaded;
//! tasks are plain `FnOnce` closures.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::types::InstanceId;

/// Deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

/// Frames [`Scheduler::run_until_idle`] runs before giving up.
pub const MAX_IDLE_FRAMES: usize = 10_000;

#[derive(Default)]
struct SchedulerInner {
    microtasks: RefCell<VecDeque<Task>>,
    frames: RefCell<VecDeque<Task>>,
    frame: Cell<u64>,
}

/// Shared handle to the two task queues.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` at the end of the current turn.
    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.microtasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run `task` on the next frame.
    pub fn request_frame(&self, task: impl FnOnce() + 'static) {
        self.inner.frames.borrow_mut().push_back(Box::new(task));
    }

    /// Drain the microtask queue, including tasks queued while draining.
    ///
    /// Returns how many tasks ran.
    pub fn flush_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            // Release the borrow before running: tasks queue more tasks.
            let task = self.inner.microtasks.borrow_mut().pop_front();
            let Some(task) = task else { break };
            task();
            ran += 1;
        }
        ran
    }

    /// Run one frame.
    ///
    /// Drains microtasks, then runs every frame task queued before this frame
    /// started, draining microtasks after each one. Tasks queued during the
    /// frame wait for the next. Returns how many frame tasks ran.
    pub fn tick(&self) -> usize {
        self.flush_microtasks();

        let batch = std::mem::take(&mut *self.inner.frames.borrow_mut());
        self.inner.frame.set(self.inner.frame.get() + 1);
        tracing::trace!(frame = self.inner.frame.get(), tasks = batch.len(), "frame");

        let ran = batch.len();
        for task in batch {
            task();
            self.flush_microtasks();
        }
        ran
    }

    /// Tick until both queues are empty. Returns how many frames ran.
    pub fn run_until_idle(&self) -> usize {
        let mut frames = 0;
        while !self.is_idle() {
            if frames == MAX_IDLE_FRAMES {
                tracing::warn!(frames, "scheduler still busy, giving up");
                break;
            }
            self.tick();
            frames += 1;
        }
        frames
    }

    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtasks.borrow().len()
    }

    pub fn pending_frames(&self) -> usize {
        self.inner.frames.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_microtasks() == 0 && self.pending_frames() == 0
    }

    /// Frames started so far.
    pub fn frame(&self) -> u64 {
        self.inner.frame.get()
    }
}

// =============================================================================
// Render Gate
// =============================================================================

bitflags::bitflags! {
    /// Lifecycle flags of a mounted instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstanceFlags: u8 {
        /// A commit is queued and has not started.
        const SCHEDULED = 1 << 0;
        /// The render function is running.
        const RENDERING = 1 << 1;
        /// At least one commit has been applied.
        const COMMITTED = 1 << 2;
    }
}

/// Per-instance admission control for render requests.
///
/// A request is admitted when no commit is queued and the burst counter has
/// not passed the cap. The counter resets once the instance goes a frame
/// without a queued commit, so the cap bounds one cascade of self-triggered
/// renders, not the lifetime total.
#[derive(Debug, Clone, Default)]
pub struct RenderGate {
    flags: InstanceFlags,
    burst: u32,
}

impl RenderGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or drop a render request.
    pub fn try_schedule(&mut self, cap: u32, instance: &InstanceId) -> bool {
        if self.flags.contains(InstanceFlags::SCHEDULED) {
            tracing::trace!(%instance, "render already scheduled");
            return false;
        }
        if self.burst > cap {
            tracing::warn!(%instance, burst = self.burst, cap, "too many renders in one burst, possible update loop; dropping request");
            return false;
        }
        self.flags.insert(InstanceFlags::SCHEDULED);
        self.burst += 1;
        true
    }

    pub fn begin_render(&mut self) {
        self.flags.insert(InstanceFlags::RENDERING);
    }

    /// Close a commit attempt, successful or not.
    pub fn finish(&mut self, committed: bool) {
        self.flags.remove(InstanceFlags::SCHEDULED | InstanceFlags::RENDERING);
        if committed {
            self.flags.insert(InstanceFlags::COMMITTED);
        }
    }

    /// Reset the burst counter unless another commit is already queued.
    pub fn reset_burst_if_idle(&mut self) {
        if !self.flags.contains(InstanceFlags::SCHEDULED) {
            self.burst = 0;
        }
    }

    pub fn flags(&self) -> InstanceFlags {
        self.flags
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microtasks_run_before_frames() {
        let scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        scheduler.request_frame(move || l.borrow_mut().push("frame"));
        let l = log.clone();
        scheduler.queue_microtask(move || l.borrow_mut().push("micro"));

        assert_eq!(scheduler.tick(), 1);
        assert_eq!(*log.borrow(), vec!["micro", "frame"]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_frame_tasks_queued_during_frame_wait() {
        let scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));

        let s = scheduler.clone();
        let c = count.clone();
        scheduler.request_frame(move || {
            c.set(c.get() + 1);
            let c = c.clone();
            s.request_frame(move || c.set(c.get() + 1));
        });

        scheduler.tick();
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.pending_frames(), 1);

        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(count.get(), 2);
        assert_eq!(scheduler.frame(), 2);
    }

    #[test]
    fn test_microtasks_queued_by_microtasks_drain() {
        let scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));

        let s = scheduler.clone();
        let c = count.clone();
        scheduler.queue_microtask(move || {
            c.set(c.get() + 1);
            let c = c.clone();
            s.queue_microtask(move || c.set(c.get() + 1));
        });

        assert_eq!(scheduler.flush_microtasks(), 2);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_gate_coalesces() {
        let id = InstanceId::new("i0");
        let mut gate = RenderGate::new();

        assert!(gate.try_schedule(10, &id));
        assert!(!gate.try_schedule(10, &id));
        assert_eq!(gate.burst(), 1);

        gate.finish(true);
        assert!(gate.flags().contains(InstanceFlags::COMMITTED));
        assert!(gate.try_schedule(10, &id));
    }

    #[test]
    fn test_gate_burst_cap() {
        let id = InstanceId::new("i0");
        let mut gate = RenderGate::new();

        let mut admitted = 0;
        for _ in 0..20 {
            if gate.try_schedule(10, &id) {
                admitted += 1;
                gate.finish(true);
            }
        }
        assert_eq!(admitted, 11);

        gate.reset_burst_if_idle();
        assert!(gate.try_schedule(10, &id));
    }

    #[test]
    fn test_gate_reset_waits_for_queued_commit() {
        let id = InstanceId::new("i0");
        let mut gate = RenderGate::new();
        gate.try_schedule(10, &id);
        gate.reset_burst_if_idle();
        assert_eq!(gate.burst(), 1);
    }
}
