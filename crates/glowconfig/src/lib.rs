use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Effect names accepted in `effect = "..."`, in display order.
pub const EFFECT_NAMES: [&str; 5] = [
    "warp-melt",
    "volumetric-raymarch",
    "wave-lines",
    "radial-ring",
    "swirl-flow",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectSetting {
    WarpMelt,
    VolumetricRaymarch,
    WaveLines,
    RadialRing,
    SwirlFlow,
}

impl EffectSetting {
    const ALL: [EffectSetting; 5] = [
        EffectSetting::WarpMelt,
        EffectSetting::VolumetricRaymarch,
        EffectSetting::WaveLines,
        EffectSetting::RadialRing,
        EffectSetting::SwirlFlow,
    ];

    pub fn name(self) -> &'static str {
        EFFECT_NAMES[self as usize]
    }
}

impl fmt::Display for EffectSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualitySetting {
    Auto,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    #[default]
    Major,
    Minor,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlowConfig {
    pub version: u32,
    /// Effect name, e.g. `"radial-ring"`, or its 1-based index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default = "default_playing")]
    pub playing: bool,
    /// Host colors in `rgb(R, G, B)` form.
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub fallback_to_previous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<ArtworkConfig>,
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtworkConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub bpm: Option<f32>,
    #[serde(default)]
    pub mode: Option<KeyMode>,
    #[serde(default)]
    pub energy: Option<f32>,
    #[serde(default)]
    pub valence: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for GlowConfig {
    fn default() -> Self {
        Self {
            version: 1,
            effect: None,
            quality: None,
            playing: default_playing(),
            colors: Vec::new(),
            fallback_to_previous: false,
            artwork: None,
            window: WindowConfig::default(),
        }
    }
}

fn default_playing() -> bool {
    true
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_title() -> String {
    "coverglow".to_owned()
}

/// Parses an effect by name (case-insensitive, `_` or `-`) or 1-based index.
pub fn parse_effect(raw: &str) -> Result<EffectSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
    if let Ok(index) = normalized.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|index| EffectSetting::ALL.get(index).copied())
            .ok_or_else(|| format!("effect index {index} is out of range 1-5"));
    }
    EffectSetting::ALL
        .into_iter()
        .find(|effect| effect.name() == normalized)
        .ok_or_else(|| {
            format!(
                "unknown effect '{}'; expected one of {}",
                raw.trim(),
                EFFECT_NAMES.join(", ")
            )
        })
}

pub fn parse_quality(raw: &str) -> Result<QualitySetting, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(QualitySetting::Auto),
        "low" => Ok(QualitySetting::Low),
        "medium" | "med" => Ok(QualitySetting::Medium),
        "high" => Ok(QualitySetting::High),
        other => Err(format!(
            "invalid quality '{other}'; expected auto, low, medium or high"
        )),
    }
}

impl GlowConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: GlowConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Selected effect. `None` when unset; validated configs never hold an
    /// unknown name.
    pub fn effect(&self) -> Option<EffectSetting> {
        self.effect.as_deref().and_then(|raw| parse_effect(raw).ok())
    }

    pub fn quality(&self) -> Option<QualitySetting> {
        self.quality.as_deref().and_then(|raw| parse_quality(raw).ok())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(effect) = &self.effect {
            parse_effect(effect).map_err(ConfigError::Invalid)?;
        }

        if let Some(quality) = &self.quality {
            parse_quality(quality).map_err(ConfigError::Invalid)?;
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(
                "window width and height must be greater than zero".into(),
            ));
        }

        if self.window.title.trim().is_empty() {
            return Err(ConfigError::Invalid("window title may not be empty".into()));
        }

        if let Some(artwork) = &self.artwork {
            artwork.validate()?;
        }

        Ok(())
    }
}

impl ArtworkConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("artwork.path may not be empty".into()));
        }

        if let Some(bpm) = self.bpm {
            if !(bpm.is_finite() && bpm > 0.0) {
                return Err(ConfigError::Invalid("artwork.bpm must be > 0".into()));
            }
        }

        for (name, value) in [("energy", self.energy), ("valence", self.valence)] {
            if let Some(value) = value {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::Invalid(format!(
                        "artwork.{name} must be between 0 and 1"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
effect = "radial-ring"
quality = "medium"
playing = false
colors = ["rgb(255, 0, 0)", "rgb(0, 255, 0)"]
fallback_to_previous = true

[artwork]
path = "covers/album.png"
bpm = 92
mode = "minor"
energy = 0.3

[window]
width = 800
title = "Now Playing"
"#;

    #[test]
    fn parses_sample_config() {
        let config = GlowConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.effect(), Some(EffectSetting::RadialRing));
        assert_eq!(config.quality(), Some(QualitySetting::Medium));
        assert!(!config.playing);
        assert!(config.fallback_to_previous);
        assert_eq!(config.colors.len(), 2);

        let artwork = config.artwork.as_ref().unwrap();
        assert_eq!(artwork.path, PathBuf::from("covers/album.png"));
        assert_eq!(artwork.bpm, Some(92.0));
        assert_eq!(artwork.mode, Some(KeyMode::Minor));
        assert_eq!(artwork.valence, None);

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.window.title, "Now Playing");
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = GlowConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(config.effect(), None);
        assert!(config.playing);
        assert!(config.colors.is_empty());
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.title, "coverglow");
    }

    #[test]
    fn effect_accepts_aliases_and_indices() {
        assert_eq!(parse_effect("Swirl_Flow"), Ok(EffectSetting::SwirlFlow));
        assert_eq!(parse_effect(" 2 "), Ok(EffectSetting::VolumetricRaymarch));
        assert!(parse_effect("0").is_err());
        assert!(parse_effect("6").is_err());
    }

    #[test]
    fn rejects_unknown_effect() {
        let err = GlowConfig::from_toml_str("version = 1\neffect = \"plasma\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("plasma")));
    }

    #[test]
    fn rejects_unknown_quality() {
        let err = GlowConfig::from_toml_str("version = 1\nquality = \"ultra\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_wrong_version() {
        let err = GlowConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_music_features() {
        let config = r#"
version = 1

[artwork]
path = "cover.jpg"
energy = 1.5
"#;
        let err = GlowConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("energy")));
    }

    #[test]
    fn rejects_zero_window() {
        let err = GlowConfig::from_toml_str("version = 1\n[window]\nheight = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = GlowConfig::from_toml_str("version = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
