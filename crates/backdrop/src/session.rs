//! Render session: everything one mounted effect owns on the device.
//!
//! Opening a session builds the effect's program, uploads the quad, mounts
//! the surface, and starts the playback clock. Closing releases the program
//! and buffer exactly once. A session that fails to open allocates nothing.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::PlaybackClock;
use crate::compile::{wrap_effect_fragment, VERTEX_SHADER_GLSL};
use crate::effects::EffectVariant;
use crate::geometry::QuadGeometry;
use crate::gpu::{DrawError, GraphicsDevice};
use crate::palette::Palette;
use crate::program::{build_program, BuildError, LinkedProgram};
use crate::surface::{RenderSurface, SurfaceSize, SurfaceSizing, ViewportEvents};

/// Opaque black, drawn under every effect.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to build the {effect} program")]
    Build {
        effect: EffectVariant,
        #[source]
        source: BuildError,
    },
    #[error("failed to upload quad geometry for {effect}: {reason}")]
    Geometry {
        effect: EffectVariant,
        reason: String,
    },
}

/// Resources of one mounted effect.
#[derive(Debug)]
pub struct RenderSession {
    effect: EffectVariant,
    program: Option<LinkedProgram>,
    geometry: Option<QuadGeometry>,
    surface: RenderSurface,
    clock: PlaybackClock,
}

impl RenderSession {
    /// Builds `effect` with a fresh clock starting at `now`.
    pub fn open<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        viewport: &ViewportEvents,
        effect: EffectVariant,
        sizing: SurfaceSizing,
        now: Instant,
    ) -> Result<Self, SessionError> {
        Self::open_with_clock(device, viewport, effect, sizing, PlaybackClock::new(now))
    }

    /// Builds `effect` and keeps counting on `clock`, so a rebuild of the same
    /// effect continues where the previous session left off.
    pub fn open_with_clock<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        viewport: &ViewportEvents,
        effect: EffectVariant,
        sizing: SurfaceSizing,
        clock: PlaybackClock,
    ) -> Result<Self, SessionError> {
        let fragment = wrap_effect_fragment(effect.fragment_source());
        let program = build_program(device, VERTEX_SHADER_GLSL, &fragment).map_err(|source| {
            source.report(effect.name());
            SessionError::Build { effect, source }
        })?;

        let geometry = match QuadGeometry::upload(device) {
            Ok(geometry) => geometry,
            Err(reason) => {
                program.release(device);
                warn!(%effect, %reason, "quad upload failed");
                return Err(SessionError::Geometry { effect, reason });
            }
        };

        let surface = RenderSurface::mount(viewport, sizing);
        let size = surface.size();
        info!(
            %effect,
            width = size.width,
            height = size.height,
            scale = sizing.scale(),
            "render session opened"
        );

        Ok(Self {
            effect,
            program: Some(program),
            geometry: Some(geometry),
            surface,
            clock,
        })
    }

    pub fn effect(&self) -> EffectVariant {
        self.effect
    }

    pub fn is_open(&self) -> bool {
        self.program.is_some()
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn surface_size(&self) -> SurfaceSize {
        self.surface.size()
    }

    /// Renders one frame: time and resolution come from the session, colors
    /// from `palette`. Draw failures are returned, not retried.
    pub fn tick<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        playing: bool,
        palette: &Palette,
        now: Instant,
    ) -> Result<(), DrawError> {
        let (Some(program), Some(geometry)) = (self.program.as_ref(), self.geometry.as_ref()) else {
            return Ok(());
        };

        if self.clock.sync(playing, now) {
            debug!(effect = %self.effect, playing, "playback state changed");
        }
        let size = self.surface.sync_viewport(device);
        let time = self.clock.elapsed_seconds(now);

        device.use_program(program.id());
        program.apply_uniforms(device, time, size, palette);
        device.clear(CLEAR_COLOR);
        let drawn = device.draw_triangle_strip(
            geometry.buffer(),
            program.position_attribute(),
            geometry.vertex_count(),
        );
        device.present();
        drawn
    }

    /// Releases the program and quad. Safe to call repeatedly.
    pub fn close<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        self.surface.release();
        let program = self.program.take();
        let geometry = self.geometry.take();
        if program.is_none() && geometry.is_none() {
            return;
        }
        if let Some(program) = program {
            program.release(device);
        }
        if let Some(geometry) = geometry {
            geometry.release(device);
        }
        info!(effect = %self.effect, "render session closed");
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if self.is_open() {
            warn!(
                effect = %self.effect,
                "render session dropped while open; device resources stay allocated"
            );
        }
    }
}
