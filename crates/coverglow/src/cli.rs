use std::path::PathBuf;

use backdrop::{EffectVariant, QualityTier};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "coverglow",
    author,
    version,
    about = "Shader backgrounds for music players",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Effect name (e.g. `radial-ring`) or index 1-5.
    #[arg(long, value_name = "NAME", value_parser = parse_effect)]
    pub effect: Option<EffectVariant>,

    /// Host color in `rgb(R, G, B)` form; repeat up to three times.
    #[arg(long = "color", value_name = "RGB")]
    pub colors: Vec<String>,

    /// Quality tier: `auto`, `low`, `medium`, or `high`.
    #[arg(long, value_name = "TIER", value_parser = parse_quality)]
    pub quality: Option<QualityTier>,

    /// Start with playback paused.
    #[arg(long)]
    pub paused: bool,

    /// Preview window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Derive the palette from a cover image.
    #[arg(long, value_name = "PATH")]
    pub artwork: Option<PathBuf>,

    /// Rebuild the previous effect when a switch fails to compile.
    #[arg(long)]
    pub fallback: bool,

    /// Prefer the high-performance GPU adapter.
    #[arg(long)]
    pub high_power: bool,

    /// Configuration file; defaults to `config.toml` in the config directory.
    #[arg(long, value_name = "PATH", env = "COVERGLOW_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the available effects and their default palettes.
    Effects(EffectsArgs),
    /// Compile and link every effect without a GPU.
    Check(CheckArgs),
    /// Print the palette chosen for a cover image.
    Palette(PaletteArgs),
}

#[derive(Args, Debug, Default)]
pub struct EffectsArgs {
    /// Emit JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Emit a JSON report.
    #[arg(long)]
    pub json: bool,

    /// Frames to render per effect on the headless device.
    #[arg(long, value_name = "COUNT", default_value_t = 3)]
    pub frames: u32,
}

#[derive(Args, Debug)]
pub struct PaletteArgs {
    /// Cover image to analyse.
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Track tempo in beats per minute.
    #[arg(long)]
    pub bpm: Option<f32>,

    /// Track is in a minor key.
    #[arg(long)]
    pub minor: bool,

    /// Track energy between 0 and 1.
    #[arg(long, value_parser = parse_unit)]
    pub energy: Option<f32>,

    /// Track valence between 0 and 1.
    #[arg(long, value_parser = parse_unit)]
    pub valence: Option<f32>,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_effect(value: &str) -> Result<EffectVariant, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_quality(value: &str) -> Result<QualityTier, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in window size".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in window size".to_string())?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

fn parse_unit(value: &str) -> Result<f32, String> {
    let parsed: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(format!("{parsed} is outside 0..=1"));
    }
    Ok(parsed)
}
