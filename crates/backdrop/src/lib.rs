//! Shader backgrounds for music players.
//!
//! The crate renders one of five fragment-shader effects behind a player UI.
//! The host feeds it two inputs (whether audio is playing and up to three
//! `rgb(R, G, B)` colors, usually derived from cover art) and the engine keeps
//! the shader's time cursor in step with the transport:
//!
//! ```text
//!   host { playing, colors }
//!          │
//!          ▼
//!   Backdrop::mount ──▶ RenderSession::open ──▶ build_program / QuadGeometry
//!          │                    │
//!          │                    └─▶ RenderSurface (resize registration)
//!          ▼
//!   FrameScheduler ──▶ Backdrop::frame ──▶ PlaybackClock ──▶ uniforms ──▶ draw
//! ```
//!
//! Everything GPU-facing goes through [`GraphicsDevice`]. [`WgpuDevice`] drives
//! a real surface; [`HeadlessDevice`] compiles the same shaders without a GPU
//! and records draws, which is what the tests observe. [`Renderer`] is the
//! windowed preview used by the `coverglow` binary.

pub mod artwork;
pub mod backdrop;
pub mod clock;
pub mod compile;
pub mod driver;
pub mod effects;
pub mod geometry;
pub mod gpu;
pub mod palette;
pub mod program;
pub mod quality;
pub mod session;
pub mod surface;
mod types;
mod window;

use anyhow::Result;

pub use artwork::{palette_from_artwork, ColorTemperature, MusicFeatures, PaletteMode};
pub use backdrop::{Backdrop, BackdropOptions, FrameOutcome};
pub use clock::{PlaybackClock, PlaybackState};
pub use driver::{FrameRequest, FrameScheduler, ManualScheduler, RenderLoop};
pub use effects::{EffectVariant, UnknownEffect};
pub use gpu::{
    DrawError, DrawRecord, GraphicsDevice, HeadlessDevice, ResourceCounts, UniformValue,
    WgpuDevice,
};
pub use palette::{parse_rgb, resolve_palette, Palette, Rgb};
pub use program::BuildError;
pub use quality::{FramePacer, QualityTier, UnknownQuality};
pub use session::{RenderSession, SessionError};
pub use surface::{SurfaceSize, ViewportEvents};
pub use types::{AdapterKind, AdapterProfile, GpuPowerPreference, RendererConfig};

/// Entry point for the windowed preview.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Opens the preview window and blocks until it is closed.
    ///
    /// Fails only when no window can be created. A missing GPU or a broken
    /// effect leaves the window blank instead.
    pub fn run(&mut self) -> Result<()> {
        window::run_preview(self.config.clone())
    }
}
