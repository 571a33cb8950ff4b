//! Host-facing façade.
//!
//! A [`Backdrop`] owns a device and a frame scheduler and reacts to the
//! host's properties. Palette and playing-state changes apply on the next
//! frame. Effect and quality changes tear the session down and build a new
//! one, so resources of the old effect are always released before the new
//! effect allocates anything.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::clock::PlaybackClock;
use crate::driver::{FrameRequest, FrameScheduler, RenderLoop};
use crate::effects::EffectVariant;
use crate::gpu::GraphicsDevice;
use crate::palette::{resolve_palette, Palette};
use crate::quality::QualityTier;
use crate::session::{RenderSession, SessionError};
use crate::surface::{SurfaceSize, ViewportEvents};

/// Initial host properties.
#[derive(Debug, Clone, PartialEq)]
pub struct BackdropOptions {
    pub effect: EffectVariant,
    pub colors: Vec<String>,
    pub playing: bool,
    pub quality: QualityTier,
    /// Rebuild the previous effect when a switch fails to build.
    pub fallback_to_previous: bool,
}

impl Default for BackdropOptions {
    fn default() -> Self {
        Self {
            effect: EffectVariant::default(),
            colors: Vec::new(),
            playing: true,
            quality: QualityTier::default(),
            fallback_to_previous: false,
        }
    }
}

/// What happened to a frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    /// The draw failed; the loop keeps running.
    DrawFailed,
    /// The callback was not the loop's outstanding request.
    Stale,
}

/// Background renderer bound to one device and scheduler.
pub struct Backdrop<D: GraphicsDevice, S: FrameScheduler> {
    device: D,
    scheduler: S,
    viewport: ViewportEvents,
    effect: EffectVariant,
    colors: Vec<String>,
    palette: Palette,
    playing: bool,
    quality: QualityTier,
    fallback_to_previous: bool,
    session: Option<RenderSession>,
    render_loop: RenderLoop,
    mounted: bool,
}

impl<D: GraphicsDevice, S: FrameScheduler> Backdrop<D, S> {
    pub fn new(device: D, scheduler: S, viewport: ViewportEvents, options: BackdropOptions) -> Self {
        let palette = resolve_palette(&options.colors, &options.effect.default_palette());
        Self {
            device,
            scheduler,
            viewport,
            effect: options.effect,
            colors: options.colors,
            palette,
            playing: options.playing,
            quality: options.quality,
            fallback_to_previous: options.fallback_to_previous,
            session: None,
            render_loop: RenderLoop::new(),
            mounted: false,
        }
    }

    /// Builds the current effect and starts the frame loop.
    ///
    /// On a build failure nothing stays allocated and no frame is scheduled;
    /// the backdrop remains mounted so a later effect change can retry.
    pub fn mount(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.mounted {
            return Ok(());
        }
        self.mounted = true;
        self.open_session(now, None)
    }

    /// Stops the loop and releases the session. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.teardown();
    }

    /// Handles a fired frame callback.
    pub fn frame(&mut self, request: FrameRequest, now: Instant) -> FrameOutcome {
        if !self.render_loop.accept(request) {
            return FrameOutcome::Stale;
        }
        let Some(session) = self.session.as_mut() else {
            return FrameOutcome::Stale;
        };
        let outcome = match session.tick(&mut self.device, self.playing, &self.palette, now) {
            Ok(()) => FrameOutcome::Rendered,
            Err(err) => {
                debug!(effect = %self.effect, error = %err, "frame draw failed");
                FrameOutcome::DrawFailed
            }
        };
        self.render_loop.reschedule(&mut self.scheduler);
        outcome
    }

    /// Toggles the playback clock. Takes effect on the next frame.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Replaces the host colors. Takes effect on the next frame.
    pub fn set_colors<T: AsRef<str>>(&mut self, colors: &[T]) {
        self.colors = colors.iter().map(|color| color.as_ref().to_owned()).collect();
        self.palette = resolve_palette(&self.colors, &self.effect.default_palette());
    }

    /// Switches effects, rebuilding the session if mounted.
    ///
    /// With `fallback_to_previous`, a failed build reopens the previous effect
    /// before the error is returned.
    pub fn set_effect(&mut self, effect: EffectVariant, now: Instant) -> Result<(), SessionError> {
        if effect == self.effect && (self.session.is_some() || !self.mounted) {
            return Ok(());
        }
        let previous = self.effect;
        self.select_effect(effect);
        if !self.mounted {
            return Ok(());
        }

        self.teardown();
        match self.open_session(now, None) {
            Ok(()) => Ok(()),
            Err(err) if self.fallback_to_previous && previous != effect => {
                warn!(failed = %effect, %previous, "effect build failed; restoring previous effect");
                self.select_effect(previous);
                if let Err(fallback) = self.open_session(now, None) {
                    warn!(effect = %previous, error = %fallback, "previous effect failed to rebuild");
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Changes the quality tier, rebuilding the session if mounted.
    ///
    /// The effect stays the same, so its playback clock carries over.
    pub fn set_quality(&mut self, quality: QualityTier, now: Instant) -> Result<(), SessionError> {
        if quality == self.quality {
            return Ok(());
        }
        self.quality = quality;
        if !self.mounted {
            return Ok(());
        }
        let clock = self.session.as_ref().map(|session| session.clock().clone());
        self.teardown();
        self.open_session(now, clock)
    }

    pub fn effect(&self) -> EffectVariant {
        self.effect
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Requested tier, possibly `Auto`.
    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// True while a session is live and a frame is scheduled.
    pub fn is_rendering(&self) -> bool {
        self.session.is_some() && self.render_loop.is_running()
    }

    pub fn session(&self) -> Option<&RenderSession> {
        self.session.as_ref()
    }

    pub fn surface_size(&self) -> Option<SurfaceSize> {
        self.session.as_ref().map(RenderSession::surface_size)
    }

    pub fn viewport(&self) -> &ViewportEvents {
        &self.viewport
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    fn select_effect(&mut self, effect: EffectVariant) {
        self.effect = effect;
        self.palette = resolve_palette(&self.colors, &effect.default_palette());
    }

    fn open_session(
        &mut self,
        now: Instant,
        clock: Option<PlaybackClock>,
    ) -> Result<(), SessionError> {
        let tier = self.quality.resolve(&self.device.adapter_profile());
        let clock = clock.unwrap_or_else(|| PlaybackClock::new(now));
        let session = RenderSession::open_with_clock(
            &mut self.device,
            &self.viewport,
            self.effect,
            tier.sizing(),
            clock,
        )?;
        info!(effect = %self.effect, quality = %tier, palette = %self.palette, "effect mounted");
        self.session = Some(session);
        self.render_loop.start(&mut self.scheduler);
        Ok(())
    }

    /// Cancels the pending frame before releasing GPU resources.
    fn teardown(&mut self) {
        self.render_loop.stop(&mut self.scheduler);
        if let Some(mut session) = self.session.take() {
            session.close(&mut self.device);
        }
    }
}

impl<D: GraphicsDevice, S: FrameScheduler> Drop for Backdrop<D, S> {
    fn drop(&mut self) {
        self.unmount();
    }
}
