//! Windowed preview host built on winit.
//!
//! The window plays the part of a music player: it owns the viewport events,
//! forwards resizes, and maps keys onto the backdrop's properties.
//!
//! | key         | action                     |
//! |-------------|----------------------------|
//! | Space       | toggle playback            |
//! | N / P       | next / previous effect     |
//! | 1-5         | select an effect           |
//! | Q           | cycle quality tier         |
//! | Escape      | close                      |

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, trace, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::backdrop::{Backdrop, BackdropOptions};
use crate::driver::{FrameRequest, FrameScheduler};
use crate::effects::EffectVariant;
use crate::gpu::{GraphicsDevice, WgpuDevice};
use crate::quality::{FramePacer, QualityTier};
use crate::surface::{SurfaceSize, ViewportEvents};
use crate::types::{AdapterProfile, RendererConfig};

/// Frame scheduler backed by winit redraw requests and a tier's pacer.
///
/// A request stays pending until a `RedrawRequested` event arrives at a time
/// the pacer allows.
#[derive(Debug)]
pub(crate) struct WinitScheduler {
    next_id: u64,
    pending: Option<FrameRequest>,
    pacer: FramePacer,
}

impl WinitScheduler {
    pub(crate) fn new(tier: QualityTier) -> Self {
        Self {
            next_id: 0,
            pending: None,
            pacer: FramePacer::for_tier(tier),
        }
    }

    pub(crate) fn set_tier(&mut self, tier: QualityTier) {
        self.pacer = FramePacer::for_tier(tier);
    }

    /// True when a frame is pending and the pacer allows it now.
    pub(crate) fn ready(&self, now: Instant) -> bool {
        self.pending.is_some() && self.pacer.ready_for_frame(now)
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pending.and(self.pacer.next_deadline())
    }

    /// Hands out the pending request if it may render at `now`.
    pub(crate) fn take_due(&mut self, now: Instant) -> Option<FrameRequest> {
        if !self.ready(now) {
            return None;
        }
        self.pacer.mark_rendered(now);
        self.pending.take()
    }
}

impl FrameScheduler for WinitScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest::new(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Exit,
}

/// Opens the preview window and runs until it closes.
///
/// When no GPU device can be created the window stays open and blank.
pub fn run_preview(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;

    let (width, height) = config.window_size;
    let window = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&event_loop)
        .context("failed to create preview window")?;
    let window = Arc::new(window);

    let inner = window.inner_size();
    let viewport = ViewportEvents::new(inner.width, inner.height);

    let device = match WgpuDevice::new(
        window.as_ref(),
        SurfaceSize::new(inner.width, inner.height),
        config.power,
    ) {
        Ok(device) => device,
        Err(err) => {
            error!("GPU unavailable, preview stays blank: {err:#}");
            return run_blank(event_loop, window);
        }
    };

    let profile = device.adapter_profile();
    let tier = config.quality.resolve(&profile);
    if profile.is_software() {
        warn!(adapter = %profile.name, %tier, "software rasterizer detected");
    }

    let options = BackdropOptions {
        effect: config.effect,
        colors: config.colors.clone(),
        playing: config.playing,
        quality: config.quality,
        fallback_to_previous: config.fallback_to_previous,
    };
    let mut backdrop = Backdrop::new(device, WinitScheduler::new(tier), viewport.clone(), options);
    if let Err(err) = backdrop.mount(Instant::now()) {
        error!(error = %err, "initial effect failed to build");
    }

    let loop_window = window.clone();
    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == loop_window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                backdrop.unmount();
                elwt.exit();
            }
            WindowEvent::Resized(size) => {
                backdrop.device_mut().resize_surface(size.width, size.height);
                viewport.notify(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                if handle_key(&mut backdrop, &event.logical_key, &profile) == KeyOutcome::Exit {
                    backdrop.unmount();
                    elwt.exit();
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                if let Some(request) = backdrop.scheduler_mut().take_due(now) {
                    backdrop.frame(request, now);
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            let scheduler = backdrop.scheduler();
            if scheduler.ready(now) {
                loop_window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = scheduler.next_deadline() {
                trace!(
                    wait_ms = deadline.saturating_duration_since(now).as_millis(),
                    "waiting for next frame"
                );
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    drop(window);
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

fn run_blank(event_loop: EventLoop<()>, window: Arc<Window>) -> Result<()> {
    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            if let Event::WindowEvent { window_id, event } = event {
                if window_id != window.id() {
                    return;
                }
                let escape = matches!(
                    &event,
                    WindowEvent::KeyboardInput { event, .. }
                        if event.logical_key == Key::Named(NamedKey::Escape)
                );
                if escape || matches!(event, WindowEvent::CloseRequested) {
                    elwt.exit();
                }
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

fn handle_key<D: GraphicsDevice>(
    backdrop: &mut Backdrop<D, WinitScheduler>,
    key: &Key,
    profile: &AdapterProfile,
) -> KeyOutcome {
    let now = Instant::now();
    match key {
        Key::Named(NamedKey::Escape) => return KeyOutcome::Exit,
        Key::Named(NamedKey::Space) => toggle_playback(backdrop),
        Key::Character(value) => match value.as_str() {
            " " => toggle_playback(backdrop),
            "n" | "N" => switch_effect(backdrop, backdrop.effect().next(), now),
            "p" | "P" => switch_effect(backdrop, backdrop.effect().previous(), now),
            "q" | "Q" => {
                let tier = backdrop.quality().resolve(profile).cycle();
                if let Err(err) = backdrop.set_quality(tier, now) {
                    error!(error = %err, %tier, "quality change failed");
                }
                backdrop.scheduler_mut().set_tier(tier);
                info!(%tier, "quality changed");
            }
            digits if digits.chars().all(|c| c.is_ascii_digit()) => {
                if let Ok(effect) = digits.parse::<EffectVariant>() {
                    switch_effect(backdrop, effect, now);
                }
            }
            _ => {}
        },
        _ => {}
    }
    KeyOutcome::Continue
}

fn toggle_playback<D: GraphicsDevice>(backdrop: &mut Backdrop<D, WinitScheduler>) {
    let playing = !backdrop.is_playing();
    backdrop.set_playing(playing);
    info!(playing, "playback toggled");
}

fn switch_effect<D: GraphicsDevice>(
    backdrop: &mut Backdrop<D, WinitScheduler>,
    effect: EffectVariant,
    now: Instant,
) {
    match backdrop.set_effect(effect, now) {
        Ok(()) => info!(%effect, "effect selected"),
        Err(err) => error!(error = %err, "effect switch failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn scheduler_hands_out_each_request_once() {
        let mut scheduler = WinitScheduler::new(QualityTier::High);
        let now = Instant::now();
        assert_eq!(scheduler.take_due(now), None);
        let request = scheduler.request_frame();
        assert!(scheduler.ready(now));
        assert_eq!(scheduler.take_due(now), Some(request));
        assert_eq!(scheduler.take_due(now), None);
    }

    #[test]
    fn cancelled_request_never_fires() {
        let mut scheduler = WinitScheduler::new(QualityTier::High);
        let request = scheduler.request_frame();
        scheduler.cancel_frame(request);
        assert_eq!(scheduler.take_due(Instant::now()), None);
    }

    #[test]
    fn low_tier_paces_frames() {
        let mut scheduler = WinitScheduler::new(QualityTier::Low);
        let start = Instant::now();
        scheduler.request_frame();
        assert!(scheduler.take_due(start).is_some());
        scheduler.request_frame();
        assert!(scheduler.take_due(start + Duration::from_millis(5)).is_none());
        assert!(scheduler.next_deadline().is_some());
        assert!(scheduler.take_due(start + Duration::from_millis(40)).is_some());
    }
}
