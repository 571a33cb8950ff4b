//! Preview launch: merges the config file with CLI flags into a
//! `RendererConfig` and hands it to the renderer.
//!
//! Precedence, highest first: CLI flags, then `config.toml`, then built-in
//! defaults. Colors come from `--color`, then `--artwork`, then the file's
//! `colors`, then the file's `[artwork]`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use backdrop::artwork::{palette_from_artwork, KeyMode, MusicFeatures};
use backdrop::{EffectVariant, GpuPowerPreference, QualityTier, Renderer, RendererConfig};
use glowconfig::{ArtworkConfig, GlowConfig, QualitySetting};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;

/// Parsed config file and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: GlowConfig,
    pub path: PathBuf,
}

impl LoadedConfig {
    /// Resolves a path from the file relative to the file's directory.
    fn resolve(&self, path: &Path) -> PathBuf {
        match self.path.parent() {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

pub fn run(args: RunArgs) -> Result<()> {
    let loaded = load_config(args.config.as_deref())?;
    let config = build_renderer_config(&args, loaded.as_ref())?;
    tracing::info!(
        effect = %config.effect,
        quality = %config.quality,
        playing = config.playing,
        "launching coverglow preview"
    );
    let mut renderer = Renderer::new(config);
    renderer.run()
}

pub fn initialise_tracing() {
    let default_filter = "info,naga=warn,wgpu=warn,wgpu_core=warn,wgpu_hal=error,winit=warn";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads the config file. An explicit path must exist; the discovered
/// default is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<LoadedConfig>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let paths = match AppPaths::discover() {
                Ok(paths) => paths,
                Err(err) => {
                    tracing::debug!("no config directory: {err:#}");
                    return Ok(None);
                }
            };
            let path = paths.config_file();
            if !path.exists() {
                tracing::debug!(
                    dir = %paths.config_dir().display(),
                    "no config file; using defaults"
                );
                return Ok(None);
            }
            path
        }
    };

    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = GlowConfig::from_toml_str(&text)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(Some(LoadedConfig { config, path }))
}

pub fn build_renderer_config(
    args: &RunArgs,
    loaded: Option<&LoadedConfig>,
) -> Result<RendererConfig> {
    let file = loaded.map(|loaded| &loaded.config);
    let defaults = RendererConfig::default();

    let effect = match (args.effect, file.and_then(GlowConfig::effect)) {
        (Some(effect), _) => effect,
        (None, Some(setting)) => setting
            .name()
            .parse::<EffectVariant>()
            .map_err(|err| anyhow!("{err}"))?,
        (None, None) => defaults.effect,
    };

    let quality = args
        .quality
        .or_else(|| file.and_then(GlowConfig::quality).map(convert_quality))
        .unwrap_or(defaults.quality);

    let playing = !args.paused && file.map_or(defaults.playing, |file| file.playing);
    let fallback_to_previous =
        args.fallback || file.is_some_and(|file| file.fallback_to_previous);

    let window_size = args
        .size
        .or_else(|| file.map(|file| (file.window.width, file.window.height)))
        .unwrap_or(defaults.window_size);
    let title = file.map_or(defaults.title, |file| file.window.title.clone());

    let power = if args.high_power {
        GpuPowerPreference::High
    } else {
        GpuPowerPreference::Low
    };

    Ok(RendererConfig {
        effect,
        colors: resolve_colors(args, loaded),
        playing,
        quality,
        fallback_to_previous,
        window_size,
        title,
        power,
    })
}

fn resolve_colors(args: &RunArgs, loaded: Option<&LoadedConfig>) -> Vec<String> {
    if !args.colors.is_empty() {
        return args.colors.clone();
    }

    let file_artwork = loaded.and_then(|loaded| loaded.config.artwork.as_ref());
    let music = file_artwork.map(music_features);

    if let Some(path) = &args.artwork {
        return artwork_colors(path, music.as_ref());
    }

    if let Some(loaded) = loaded {
        if !loaded.config.colors.is_empty() {
            return loaded.config.colors.clone();
        }
        if let Some(artwork) = file_artwork {
            return artwork_colors(&loaded.resolve(&artwork.path), music.as_ref());
        }
    }

    Vec::new()
}

fn artwork_colors(path: &Path, music: Option<&MusicFeatures>) -> Vec<String> {
    let mode = palette_from_artwork(path, music);
    tracing::info!(artwork = %path.display(), %mode, "palette derived from artwork");
    mode.colors().iter().map(|color| (*color).to_owned()).collect()
}

pub(crate) fn music_features(artwork: &ArtworkConfig) -> MusicFeatures {
    let defaults = MusicFeatures::default();
    MusicFeatures {
        bpm: artwork.bpm.unwrap_or(defaults.bpm),
        mode: match artwork.mode {
            Some(glowconfig::KeyMode::Minor) => KeyMode::Minor,
            Some(glowconfig::KeyMode::Major) => KeyMode::Major,
            None => defaults.mode,
        },
        energy: artwork.energy.unwrap_or(defaults.energy),
        valence: artwork.valence.unwrap_or(defaults.valence),
    }
}

pub(crate) fn convert_quality(setting: QualitySetting) -> QualityTier {
    match setting {
        QualitySetting::Auto => QualityTier::Auto,
        QualitySetting::Low => QualityTier::Low,
        QualitySetting::Medium => QualityTier::Medium,
        QualitySetting::High => QualityTier::High,
    }
}
