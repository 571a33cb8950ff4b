//! Quality tiers and frame pacing.
//!
//! A tier trades resolution and frame rate for GPU load: it scales the
//! backing surface relative to the viewport and optionally caps how often
//! frames are produced. `Auto` picks a tier from the adapter profile.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::surface::SurfaceSizing;
use crate::types::{AdapterKind, AdapterProfile};

/// Largest backing surface dimension of a scaled tier, in pixels.
pub const MAX_CANVAS_DIMENSION: u32 = 3840;

/// Rendering quality requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityTier {
    /// Choose from the adapter: software gets `Low`, integrated `Medium`.
    Auto,
    Low,
    Medium,
    #[default]
    High,
}

impl QualityTier {
    /// Replaces `Auto` with a concrete tier for `profile`.
    pub fn resolve(self, profile: &AdapterProfile) -> QualityTier {
        match self {
            QualityTier::Auto => match profile.kind {
                AdapterKind::Software => QualityTier::Low,
                AdapterKind::Integrated => QualityTier::Medium,
                _ => QualityTier::High,
            },
            tier => tier,
        }
    }

    /// Backing surface size relative to the viewport.
    pub fn canvas_scale(self) -> f32 {
        match self {
            QualityTier::Low => 0.5,
            QualityTier::Medium => 0.75,
            QualityTier::High | QualityTier::Auto => 1.0,
        }
    }

    /// Frame rate cap; `None` renders on every frame callback.
    pub fn target_fps(self) -> Option<f32> {
        match self {
            QualityTier::Low => Some(30.0),
            QualityTier::Medium => Some(45.0),
            QualityTier::High | QualityTier::Auto => None,
        }
    }

    /// `High` maps the viewport 1:1; scaled tiers are also capped.
    pub fn sizing(self) -> SurfaceSizing {
        match self {
            QualityTier::High | QualityTier::Auto => SurfaceSizing::native(),
            QualityTier::Low | QualityTier::Medium => {
                SurfaceSizing::new(self.canvas_scale(), MAX_CANVAS_DIMENSION)
            }
        }
    }

    /// Next concrete tier in the Low -> Medium -> High cycle.
    pub fn cycle(self) -> QualityTier {
        match self {
            QualityTier::Low => QualityTier::Medium,
            QualityTier::Medium => QualityTier::High,
            QualityTier::High | QualityTier::Auto => QualityTier::Low,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QualityTier::Auto => "auto",
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quality '{0}' (expected auto, low, medium, or high)")]
pub struct UnknownQuality(pub String);

impl FromStr for QualityTier {
    type Err = UnknownQuality;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(QualityTier::Auto),
            "low" => Ok(QualityTier::Low),
            "medium" | "med" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            _ => Err(UnknownQuality(value.to_owned())),
        }
    }
}

/// Enforces a tier's frame rate cap.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl FramePacer {
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self {
            interval,
            last_frame: None,
        }
    }

    pub fn for_tier(tier: QualityTier) -> Self {
        Self::new(tier.target_fps())
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }

    /// Earliest instant the next frame may be produced, if capped.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.last_frame = None;
    }
}
