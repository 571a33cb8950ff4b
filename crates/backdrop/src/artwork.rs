//! Palette selection from cover art and track features.
//!
//! Six hand-tuned palette modes cover the moods a backdrop needs. A mode is
//! picked from the cover's color temperature, from music features, or from
//! both; [`PaletteMode::colors`] yields `rgb(R, G, B)` strings that go
//! through the regular color adapter like any other host colors.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, warn};

/// Covers are scaled to this square before sampling.
pub const ANALYSIS_SIZE: u32 = 100;
/// Upper bound on sampled pixels.
pub const MAX_SAMPLES: usize = 10_000;

/// Named background palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaletteMode {
    /// Dark umber canvas tones.
    Oil,
    /// Deep teal with a warm accent.
    #[default]
    Cinema,
    Night,
    Warm,
    Cool,
    Vibrant,
}

impl PaletteMode {
    pub const ALL: [PaletteMode; 6] = [
        PaletteMode::Oil,
        PaletteMode::Cinema,
        PaletteMode::Night,
        PaletteMode::Warm,
        PaletteMode::Cool,
        PaletteMode::Vibrant,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PaletteMode::Oil => "oil",
            PaletteMode::Cinema => "cinema",
            PaletteMode::Night => "night",
            PaletteMode::Warm => "warm",
            PaletteMode::Cool => "cool",
            PaletteMode::Vibrant => "vibrant",
        }
    }

    /// Four colors, darkest base first. Only the first three reach the shader.
    pub fn colors(self) -> [&'static str; 4] {
        match self {
            PaletteMode::Oil => [
                "rgb(22, 18, 15)",
                "rgb(70, 45, 35)",
                "rgb(120, 80, 60)",
                "rgb(40, 55, 70)",
            ],
            PaletteMode::Cinema => [
                "rgb(8, 18, 25)",
                "rgb(25, 60, 70)",
                "rgb(90, 150, 140)",
                "rgb(180, 120, 90)",
            ],
            PaletteMode::Night => [
                "rgb(15, 10, 30)",
                "rgb(40, 30, 70)",
                "rgb(70, 50, 100)",
                "rgb(50, 70, 110)",
            ],
            PaletteMode::Warm => [
                "rgb(30, 20, 15)",
                "rgb(90, 50, 30)",
                "rgb(140, 80, 50)",
                "rgb(180, 110, 70)",
            ],
            PaletteMode::Cool => [
                "rgb(10, 15, 25)",
                "rgb(30, 50, 70)",
                "rgb(60, 90, 120)",
                "rgb(90, 120, 140)",
            ],
            PaletteMode::Vibrant => [
                "rgb(20, 10, 40)",
                "rgb(80, 30, 90)",
                "rgb(120, 50, 100)",
                "rgb(90, 80, 140)",
            ],
        }
    }
}

impl fmt::Display for PaletteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown palette mode `{0}` (expected oil, cinema, night, warm, cool or vibrant)")]
pub struct UnknownPaletteMode(pub String);

impl FromStr for PaletteMode {
    type Err = UnknownPaletteMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        PaletteMode::ALL
            .into_iter()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| UnknownPaletteMode(s.to_owned()))
    }
}

/// Major or minor key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    #[default]
    Major,
    Minor,
}

/// Track features. Unknown values keep their defaults: 120 BPM, major key,
/// and 0.5 energy and valence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicFeatures {
    pub bpm: f32,
    pub mode: KeyMode,
    /// 0..=1
    pub energy: f32,
    /// 0..=1, how positive the track feels.
    pub valence: f32,
}

impl Default for MusicFeatures {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            mode: KeyMode::Major,
            energy: 0.5,
            valence: 0.5,
        }
    }
}

/// Averaged cover statistics, every field in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTemperature {
    /// 0 is cold (blue-heavy), 1 is warm (red-heavy).
    pub warmth: f32,
    pub brightness: f32,
    pub saturation: f32,
}

/// Samples up to [`MAX_SAMPLES`] pixels evenly across `image`.
///
/// An empty image reads as neutral, dark, and unsaturated.
pub fn analyze_color_temperature(image: &RgbaImage) -> ColorTemperature {
    let pixels = image.as_raw().chunks_exact(4);
    let total = pixels.len();
    if total == 0 {
        return ColorTemperature {
            warmth: 0.5,
            brightness: 0.0,
            saturation: 0.0,
        };
    }
    let step = (total / total.min(MAX_SAMPLES)).max(1);

    let mut sums = [0.0f64; 3];
    let mut brightness = 0.0f64;
    let mut saturation = 0.0f64;
    let mut samples = 0usize;
    for pixel in pixels.step_by(step) {
        let [r, g, b] = [pixel[0], pixel[1], pixel[2]].map(f64::from);
        sums[0] += r;
        sums[1] += g;
        sums[2] += b;
        brightness += (0.299 * r + 0.587 * g + 0.114 * b) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        if max > 0.0 {
            saturation += (max - min) / max;
        }
        samples += 1;
    }

    let count = samples as f64;
    let warmth = (sums[0] / count - sums[2] / count) / 255.0 * 0.5 + 0.5;
    ColorTemperature {
        warmth: warmth.clamp(0.0, 1.0) as f32,
        brightness: (brightness / count).clamp(0.0, 1.0) as f32,
        saturation: (saturation / count).clamp(0.0, 1.0) as f32,
    }
}

/// Opens an image, scales it to the analysis square, and measures it.
pub fn load_color_temperature(path: &Path) -> Result<ColorTemperature> {
    let image = image::open(path)
        .with_context(|| format!("failed to open artwork {}", path.display()))?;
    let scaled = image
        .resize_exact(ANALYSIS_SIZE, ANALYSIS_SIZE, FilterType::Triangle)
        .to_rgba8();
    Ok(analyze_color_temperature(&scaled))
}

pub fn select_mode_by_temperature(temperature: &ColorTemperature) -> PaletteMode {
    let ColorTemperature {
        warmth,
        brightness,
        saturation,
    } = *temperature;
    if saturation > 0.6 {
        PaletteMode::Vibrant
    } else if warmth > 0.6 && brightness < 0.4 {
        PaletteMode::Oil
    } else if warmth > 0.6 {
        PaletteMode::Warm
    } else if warmth < 0.4 && brightness < 0.4 {
        PaletteMode::Night
    } else if warmth < 0.4 {
        PaletteMode::Cool
    } else {
        PaletteMode::Cinema
    }
}

pub fn select_mode_by_music(features: &MusicFeatures) -> PaletteMode {
    let MusicFeatures {
        bpm,
        mode,
        energy,
        valence,
    } = *features;
    if energy > 0.7 && bpm > 130.0 {
        return PaletteMode::Vibrant;
    }
    if mode == KeyMode::Minor && bpm < 100.0 {
        return if energy < 0.4 {
            PaletteMode::Night
        } else {
            PaletteMode::Cinema
        };
    }
    if valence > 0.6 && energy > 0.4 && energy < 0.7 {
        return PaletteMode::Warm;
    }
    if valence < 0.4 && energy < 0.5 {
        return if bpm < 90.0 {
            PaletteMode::Oil
        } else {
            PaletteMode::Cool
        };
    }
    PaletteMode::Cinema
}

/// Combines both signals. Music wins a disagreement unless the cover is
/// extreme: saturation above 0.7 or warmth outside `[0.2, 0.8]`.
pub fn select_mode(
    music: Option<&MusicFeatures>,
    temperature: Option<&ColorTemperature>,
) -> PaletteMode {
    match (music, temperature) {
        (Some(music), Some(temperature)) => {
            let by_music = select_mode_by_music(music);
            let by_cover = select_mode_by_temperature(temperature);
            let extreme = temperature.saturation > 0.7
                || temperature.warmth > 0.8
                || temperature.warmth < 0.2;
            if by_music != by_cover && extreme {
                by_cover
            } else {
                by_music
            }
        }
        (Some(music), None) => select_mode_by_music(music),
        (None, Some(temperature)) => select_mode_by_temperature(temperature),
        (None, None) => PaletteMode::default(),
    }
}

/// Picks a palette for a cover image. Unreadable images fall back to the
/// music features alone.
pub fn palette_from_artwork(path: &Path, music: Option<&MusicFeatures>) -> PaletteMode {
    match load_color_temperature(path) {
        Ok(temperature) => {
            let mode = select_mode(music, Some(&temperature));
            debug!(
                path = %path.display(),
                warmth = temperature.warmth,
                brightness = temperature.brightness,
                saturation = temperature.saturation,
                %mode,
                "artwork analysed"
            );
            mode
        }
        Err(err) => {
            warn!("artwork analysis failed, using default palette: {err:#}");
            select_mode(music, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::palette::resolve_palette;

    fn solid(r: u8, g: u8, b: u8) -> RgbaImage {
        RgbaImage::from_pixel(ANALYSIS_SIZE, ANALYSIS_SIZE, Rgba([r, g, b, 255]))
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn pure_red_is_warm_and_saturated() {
        let temperature = analyze_color_temperature(&solid(255, 0, 0));
        assert!(approx(temperature.warmth, 1.0));
        assert!(approx(temperature.brightness, 0.299));
        assert!(approx(temperature.saturation, 1.0));
        assert_eq!(select_mode_by_temperature(&temperature), PaletteMode::Vibrant);
    }

    #[test]
    fn temperature_thresholds() {
        let cases = [
            ((128, 128, 128), PaletteMode::Cinema),
            ((120, 80, 65), PaletteMode::Oil),
            ((40, 50, 95), PaletteMode::Night),
            ((200, 150, 140), PaletteMode::Warm),
            ((140, 170, 200), PaletteMode::Cool),
        ];
        for ((r, g, b), expected) in cases {
            let temperature = analyze_color_temperature(&solid(r, g, b));
            assert_eq!(
                select_mode_by_temperature(&temperature),
                expected,
                "rgb({r}, {g}, {b}) -> {temperature:?}"
            );
        }
    }

    #[test]
    fn black_pixels_have_zero_saturation() {
        let temperature = analyze_color_temperature(&solid(0, 0, 0));
        assert_eq!(temperature.saturation, 0.0);
        assert!(approx(temperature.warmth, 0.5));
    }

    #[test]
    fn empty_image_is_neutral() {
        let temperature = analyze_color_temperature(&RgbaImage::new(0, 0));
        assert_eq!(temperature.warmth, 0.5);
        assert_eq!(select_mode_by_temperature(&temperature), PaletteMode::Cinema);
    }

    #[test]
    fn music_thresholds() {
        let features = |bpm, mode, energy, valence| MusicFeatures {
            bpm,
            mode,
            energy,
            valence,
        };
        use KeyMode::{Major, Minor};
        assert_eq!(select_mode_by_music(&features(140.0, Major, 0.8, 0.5)), PaletteMode::Vibrant);
        assert_eq!(select_mode_by_music(&features(80.0, Minor, 0.3, 0.5)), PaletteMode::Night);
        assert_eq!(select_mode_by_music(&features(80.0, Minor, 0.6, 0.5)), PaletteMode::Cinema);
        assert_eq!(select_mode_by_music(&features(120.0, Major, 0.5, 0.7)), PaletteMode::Warm);
        assert_eq!(select_mode_by_music(&features(80.0, Major, 0.3, 0.3)), PaletteMode::Oil);
        assert_eq!(select_mode_by_music(&features(110.0, Major, 0.3, 0.3)), PaletteMode::Cool);
        assert_eq!(select_mode_by_music(&MusicFeatures::default()), PaletteMode::Cinema);
    }

    #[test]
    fn music_wins_unless_cover_is_extreme() {
        let energetic = MusicFeatures {
            bpm: 150.0,
            energy: 0.9,
            ..MusicFeatures::default()
        };
        let grey = analyze_color_temperature(&solid(128, 128, 128));
        assert_eq!(select_mode(Some(&energetic), Some(&grey)), PaletteMode::Vibrant);

        let red = analyze_color_temperature(&solid(255, 0, 0));
        let calm = MusicFeatures::default();
        assert_eq!(select_mode(Some(&calm), Some(&red)), PaletteMode::Vibrant);
        assert_eq!(select_mode(None, None), PaletteMode::Cinema);
    }

    #[test]
    fn mode_colors_resolve_first_three_slots() {
        let fallback = crate::effects::EffectVariant::default().default_palette();
        let palette = resolve_palette(&PaletteMode::Cinema.colors(), &fallback);
        assert_eq!(palette.slot(0), [8.0 / 255.0, 18.0 / 255.0, 25.0 / 255.0]);
        assert_eq!(palette.slot(2), [90.0 / 255.0, 150.0 / 255.0, 140.0 / 255.0]);
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!(" Night ".parse::<PaletteMode>(), Ok(PaletteMode::Night));
        assert!("sepia".parse::<PaletteMode>().is_err());
    }

    #[test]
    fn artwork_file_is_analysed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        RgbaImage::from_pixel(320, 320, Rgba([120, 80, 65, 255]))
            .save(&path)
            .unwrap();
        assert_eq!(palette_from_artwork(&path, None), PaletteMode::Oil);
    }

    #[test]
    fn unreadable_artwork_falls_back_to_music() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");
        assert_eq!(palette_from_artwork(&missing, None), PaletteMode::Cinema);
        let fast = MusicFeatures {
            bpm: 160.0,
            energy: 0.95,
            ..MusicFeatures::default()
        };
        assert_eq!(palette_from_artwork(&missing, Some(&fast)), PaletteMode::Vibrant);
    }
}
