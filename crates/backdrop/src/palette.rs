//! Color adapter: turns host-supplied `rgb(R, G, B)` strings into the
//! normalised triples uploaded as `iColor1`..`iColor3`.
//!
//! Every slot resolves independently. An absent or malformed entry falls back
//! to the same slot of the effect's default palette, so resolution never fails.

use std::fmt;

/// Normalised RGB triple, each channel in `[0, 1]`.
pub type Rgb = [f32; 3];

/// Ordered triple of colors fed to the shader's color uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    colors: [Rgb; Palette::SLOTS],
}

impl Palette {
    /// Number of color slots exposed to effects.
    pub const SLOTS: usize = 3;

    pub const fn new(primary: Rgb, secondary: Rgb, accent: Rgb) -> Self {
        Self {
            colors: [primary, secondary, accent],
        }
    }

    pub fn colors(&self) -> &[Rgb; Palette::SLOTS] {
        &self.colors
    }

    /// Returns the color stored in `slot`, clamped to the last slot.
    pub fn slot(&self, slot: usize) -> Rgb {
        self.colors[slot.min(Self::SLOTS - 1)]
    }

    /// Each slot as an `rgb(R, G, B)` string, rounded to 8-bit channels.
    pub fn rgb_strings(&self) -> Vec<String> {
        self.colors
            .iter()
            .map(|color| format_rgb(to_bytes(*color)))
            .collect()
    }

    /// Resolves raw host colors against `fallback`; see [`resolve_palette`].
    pub fn resolve<S: AsRef<str>>(raw: &[S], fallback: &Palette) -> Palette {
        resolve_palette(raw, fallback)
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rgb_strings().join(", "))
    }
}

/// Resolves up to three host color strings into a palette.
///
/// Entries beyond the third are ignored. Missing or malformed entries take the
/// matching slot of `fallback`.
pub fn resolve_palette<S: AsRef<str>>(raw: &[S], fallback: &Palette) -> Palette {
    let mut colors = *fallback.colors();
    for (slot, color) in colors.iter_mut().enumerate() {
        if let Some(parsed) = raw.get(slot).and_then(|value| parse_rgb(value.as_ref())) {
            *color = parsed;
        }
    }
    Palette { colors }
}

/// Parses `rgb(R, G, B)` with integer channels in `0..=255`.
///
/// Whitespace around the whole value and around each channel is accepted.
pub fn parse_rgb(value: &str) -> Option<Rgb> {
    let inner = value
        .trim()
        .strip_prefix("rgb(")?
        .strip_suffix(')')?;

    let mut channels = inner.split(',');
    let red = parse_channel(channels.next()?)?;
    let green = parse_channel(channels.next()?)?;
    let blue = parse_channel(channels.next()?)?;
    if channels.next().is_some() {
        return None;
    }
    Some([red, green, blue])
}

fn parse_channel(text: &str) -> Option<f32> {
    let digits = text.trim();
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let value: u32 = digits.parse().ok()?;
    (value <= 255).then(|| value as f32 / 255.0)
}

/// Formats 8-bit channels in the textual form accepted by [`parse_rgb`].
pub fn format_rgb([red, green, blue]: [u8; 3]) -> String {
    format!("rgb({red}, {green}, {blue})")
}

fn to_bytes(color: Rgb) -> [u8; 3] {
    color.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: Palette = Palette::new([0.5, 0.3, 0.7], [0.7, 0.3, 0.5], [0.3, 0.5, 0.7]);

    #[test]
    fn primary_colors_normalise_exactly() {
        let palette = resolve_palette(&["rgb(255,0,0)", "rgb(0,255,0)", "rgb(0,0,255)"], &FALLBACK);
        assert_eq!(
            palette.colors(),
            &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn rgb_strings_round_channels() {
        let palette = Palette::new([1.0, 0.0, 0.5], [0.2, 0.4, 0.6], [0.0; 3]);
        assert_eq!(
            palette.rgb_strings(),
            vec!["rgb(255, 0, 128)", "rgb(51, 102, 153)", "rgb(0, 0, 0)"]
        );
    }

    #[test]
    fn malformed_entry_uses_slot_default() {
        let palette = resolve_palette(&["not-a-color"], &FALLBACK);
        assert_eq!(palette.slot(0), FALLBACK.slot(0));
        assert_eq!(palette, FALLBACK);
    }

    #[test]
    fn each_slot_falls_back_independently() {
        let palette = resolve_palette(&["rgb(0, 0, 0)", "hsl(1, 2, 3)"], &FALLBACK);
        assert_eq!(palette.slot(0), [0.0, 0.0, 0.0]);
        assert_eq!(palette.slot(1), FALLBACK.slot(1));
        assert_eq!(palette.slot(2), FALLBACK.slot(2));
    }

    #[test]
    fn empty_input_is_the_fallback() {
        let empty: [&str; 0] = [];
        assert_eq!(resolve_palette(&empty, &FALLBACK), FALLBACK);
    }

    #[test]
    fn excess_entries_are_ignored() {
        let palette = resolve_palette(
            &[
                "rgb(1, 1, 1)",
                "rgb(2, 2, 2)",
                "rgb(3, 3, 3)",
                "rgb(255, 255, 255)",
            ],
            &FALLBACK,
        );
        assert!((palette.slot(2)[0] - 3.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn parse_accepts_spacing_variants() {
        assert_eq!(parse_rgb("rgb(51, 102, 204)"), Some([0.2, 0.4, 0.8]));
        assert_eq!(parse_rgb("  rgb( 51 ,102 , 204 ) "), Some([0.2, 0.4, 0.8]));
    }

    #[test]
    fn parse_rejects_out_of_range_and_garbage() {
        assert_eq!(parse_rgb("rgb(256, 0, 0)"), None);
        assert_eq!(parse_rgb("rgb(-1, 0, 0)"), None);
        assert_eq!(parse_rgb("rgb(1.5, 0, 0)"), None);
        assert_eq!(parse_rgb("rgb(1, 2)"), None);
        assert_eq!(parse_rgb("rgb(1, 2, 3, 4)"), None);
        assert_eq!(parse_rgb("rgba(1, 2, 3)"), None);
        assert_eq!(parse_rgb("rgb(1, 2, 3"), None);
        assert_eq!(parse_rgb(""), None);
    }

    #[test]
    fn display_round_trips_through_parser() {
        let palette = Palette::new([1.0, 0.0, 0.0], [0.0, 0.5, 0.0], [0.2, 0.4, 0.8]);
        let text = palette.to_string();
        assert_eq!(text, "rgb(255, 0, 0), rgb(0, 128, 0), rgb(51, 102, 204)");
    }
}
