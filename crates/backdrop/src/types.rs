use crate::effects::EffectVariant;
use crate::quality::QualityTier;

/// Broad class of the GPU adapter backing a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterKind {
    Discrete,
    Integrated,
    Virtual,
    /// CPU rasterizer such as llvmpipe or WARP.
    Software,
    #[default]
    Unknown,
}

/// Adapter facts used to pick defaults such as the `Auto` quality tier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: String,
    pub kind: AdapterKind,
}

impl AdapterProfile {
    pub(crate) fn from_wgpu(info: &wgpu::AdapterInfo) -> Self {
        let kind = match info.device_type {
            wgpu::DeviceType::DiscreteGpu => AdapterKind::Discrete,
            wgpu::DeviceType::IntegratedGpu => AdapterKind::Integrated,
            wgpu::DeviceType::VirtualGpu => AdapterKind::Virtual,
            wgpu::DeviceType::Cpu => AdapterKind::Software,
            wgpu::DeviceType::Other => AdapterKind::Unknown,
        };
        let lowered = info.name.to_ascii_lowercase();
        let kind = if lowered.contains("llvmpipe") || lowered.contains("swiftshader") {
            AdapterKind::Software
        } else {
            kind
        };
        Self {
            name: info.name.clone(),
            backend: format!("{:?}", info.backend),
            kind,
        }
    }

    /// Profile reported by the headless device.
    pub fn headless() -> Self {
        Self {
            name: "headless".to_owned(),
            backend: "none".to_owned(),
            kind: AdapterKind::Unknown,
        }
    }

    pub fn is_software(&self) -> bool {
        self.kind == AdapterKind::Software
    }
}

/// Adapter power preference forwarded to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Immutable configuration for the preview renderer.
///
/// `RendererConfig` mirrors the CLI and config file: which effect to start
/// with, the host colors, and how the window should look.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Effect shown at start-up.
    pub effect: EffectVariant,
    /// Host colors in `rgb(R, G, B)` form; missing or malformed slots use the
    /// effect's defaults.
    pub colors: Vec<String>,
    /// Whether the playback clock starts running.
    pub playing: bool,
    pub quality: QualityTier,
    /// Rebuild the previous effect when a switch fails to build.
    pub fallback_to_previous: bool,
    /// Window size in physical pixels.
    pub window_size: (u32, u32),
    pub title: String,
    pub power: GpuPowerPreference,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            effect: EffectVariant::default(),
            colors: Vec::new(),
            playing: true,
            quality: QualityTier::default(),
            fallback_to_previous: false,
            window_size: (1280, 720),
            title: "coverglow".to_owned(),
            power: GpuPowerPreference::default(),
        }
    }
}
