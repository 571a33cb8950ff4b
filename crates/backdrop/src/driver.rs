//! Frame scheduling.
//!
//! The host supplies a [`FrameScheduler`] (display refresh callbacks, a
//! winit redraw, or a manual queue in tests). [`RenderLoop`] keeps at most
//! one outstanding request and asks for exactly one more after every frame it
//! accepts, so a running loop renders once per scheduler callback until it is
//! stopped.

use std::collections::VecDeque;
use std::fmt;

/// Token identifying one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(u64);

impl FrameRequest {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Source of frame callbacks.
pub trait FrameScheduler {
    /// Asks for one callback. The returned token is handed back when it fires.
    fn request_frame(&mut self) -> FrameRequest;

    /// Withdraws a request. Cancelling a fired or unknown request is a no-op.
    fn cancel_frame(&mut self, request: FrameRequest);
}

impl<S: FrameScheduler + ?Sized> FrameScheduler for &mut S {
    fn request_frame(&mut self) -> FrameRequest {
        (**self).request_frame()
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        (**self).cancel_frame(request)
    }
}

/// Continuous frame loop state.
#[derive(Debug, Default)]
pub struct RenderLoop {
    pending: Option<FrameRequest>,
    frames: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    /// Frames accepted since the loop was created.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Requests the first frame. Starting a running loop does nothing.
    pub fn start<S: FrameScheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if self.pending.is_none() {
            self.pending = Some(scheduler.request_frame());
        }
    }

    /// Cancels the outstanding request. Safe to call repeatedly.
    pub fn stop<S: FrameScheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if let Some(request) = self.pending.take() {
            scheduler.cancel_frame(request);
        }
    }

    /// Claims a fired callback. Returns false for stale or foreign tokens,
    /// which must not render.
    pub fn accept(&mut self, request: FrameRequest) -> bool {
        if self.pending == Some(request) {
            self.pending = None;
            self.frames += 1;
            true
        } else {
            false
        }
    }

    /// Requests the next frame after an accepted one.
    pub fn reschedule<S: FrameScheduler + ?Sized>(&mut self, scheduler: &mut S) {
        self.start(scheduler);
    }
}

/// Scheduler driven by hand: requests queue up until [`ManualScheduler::fire`].
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    queued: VecDeque<FrameRequest>,
    cancelled: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops the oldest outstanding request.
    pub fn fire(&mut self) -> Option<FrameRequest> {
        self.queued.pop_front()
    }

    pub fn outstanding(&self) -> usize {
        self.queued.len()
    }

    /// Number of requests withdrawn so far.
    pub fn cancelled(&self) -> usize {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest::new(self.next_id);
        self.queued.push_back(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        let before = self.queued.len();
        self.queued.retain(|queued| *queued != request);
        if self.queued.len() != before {
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_requests_exactly_one_frame() {
        let mut scheduler = ManualScheduler::new();
        let mut render_loop = RenderLoop::new();
        render_loop.start(&mut scheduler);
        render_loop.start(&mut scheduler);
        assert_eq!(scheduler.outstanding(), 1);
        assert!(render_loop.is_running());
    }

    #[test]
    fn accepted_frame_reschedules_once() {
        let mut scheduler = ManualScheduler::new();
        let mut render_loop = RenderLoop::new();
        render_loop.start(&mut scheduler);
        let request = scheduler.fire().expect("first frame");
        assert!(render_loop.accept(request));
        render_loop.reschedule(&mut scheduler);
        assert_eq!(scheduler.outstanding(), 1);
        assert_eq!(render_loop.frames(), 1);
    }

    #[test]
    fn stop_is_idempotent_and_cancels() {
        let mut scheduler = ManualScheduler::new();
        let mut render_loop = RenderLoop::new();
        render_loop.start(&mut scheduler);
        render_loop.stop(&mut scheduler);
        render_loop.stop(&mut scheduler);
        assert_eq!(scheduler.outstanding(), 0);
        assert_eq!(scheduler.cancelled(), 1);
        assert!(!render_loop.is_running());
    }

    #[test]
    fn stale_requests_are_refused() {
        let mut scheduler = ManualScheduler::new();
        let mut render_loop = RenderLoop::new();
        render_loop.start(&mut scheduler);
        let stale = render_loop.pending().expect("pending");
        render_loop.stop(&mut scheduler);
        assert!(!render_loop.accept(stale));
        assert!(!render_loop.accept(FrameRequest::new(99)));
        assert_eq!(render_loop.frames(), 0);
    }
}
