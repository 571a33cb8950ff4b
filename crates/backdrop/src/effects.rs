//! Catalogue of the built-in effects.
//!
//! Each variant maps to a fragment shader written against the effect contract
//! (`iTime`, `iResolution`, `iColor1`..`iColor3`) and a default palette used
//! for any color slot the host leaves unset or malformed.

use std::fmt;
use std::str::FromStr;

use crate::palette::Palette;

/// One of the interchangeable background effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectVariant {
    /// Iterated sine warp of the plane, vignetted through alpha.
    WarpMelt,
    /// Raymarched noise volume around a dark core.
    VolumetricRaymarch,
    /// Six glowing sine lines.
    WaveLines,
    /// Noisy ring of light with an orbiting highlight.
    RadialRing,
    /// Palette advected along a curl-noise flow field.
    SwirlFlow,
}

/// Static description of an effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectDefinition {
    pub name: &'static str,
    pub summary: &'static str,
    pub fragment_source: &'static str,
    pub default_palette: Palette,
}

const DEFINITIONS: [EffectDefinition; 5] = [
    EffectDefinition {
        name: "warp-melt",
        summary: "iterated sine warp with a soft vignette",
        fragment_source: include_str!("../shaders/warp_melt.frag"),
        default_palette: Palette::new([0.5, 0.3, 0.7], [0.7, 0.3, 0.5], [0.3, 0.5, 0.7]),
    },
    EffectDefinition {
        name: "volumetric-raymarch",
        summary: "raymarched noise volume around a dark core",
        fragment_source: include_str!("../shaders/volumetric_raymarch.frag"),
        default_palette: Palette::new([0.5, 0.3, 0.7], [0.7, 0.3, 0.5], [0.3, 0.5, 0.7]),
    },
    EffectDefinition {
        name: "wave-lines",
        summary: "six glowing sine lines",
        fragment_source: include_str!("../shaders/wave_lines.frag"),
        default_palette: Palette::new([0.8, 0.6, 0.3], [0.6, 0.4, 0.3], [0.3, 0.5, 0.7]),
    },
    EffectDefinition {
        name: "radial-ring",
        summary: "noisy light ring with an orbiting highlight",
        fragment_source: include_str!("../shaders/radial_ring.frag"),
        default_palette: Palette::new(
            [0.611765, 0.262745, 0.996078],
            [0.298039, 0.760784, 0.913725],
            [0.062745, 0.078431, 0.6],
        ),
    },
    EffectDefinition {
        name: "swirl-flow",
        summary: "palette advected along a curl-noise flow",
        fragment_source: include_str!("../shaders/swirl_flow.frag"),
        default_palette: Palette::new([0.2, 0.5, 0.7], [0.5, 0.3, 0.6], [0.3, 0.6, 0.8]),
    },
];

impl EffectVariant {
    pub const ALL: [EffectVariant; 5] = [
        EffectVariant::WarpMelt,
        EffectVariant::VolumetricRaymarch,
        EffectVariant::WaveLines,
        EffectVariant::RadialRing,
        EffectVariant::SwirlFlow,
    ];

    /// Zero-based position in [`EffectVariant::ALL`].
    pub fn index(self) -> usize {
        match self {
            EffectVariant::WarpMelt => 0,
            EffectVariant::VolumetricRaymarch => 1,
            EffectVariant::WaveLines => 2,
            EffectVariant::RadialRing => 3,
            EffectVariant::SwirlFlow => 4,
        }
    }

    pub fn definition(self) -> &'static EffectDefinition {
        &DEFINITIONS[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.definition().name
    }

    pub fn summary(self) -> &'static str {
        self.definition().summary
    }

    /// Unwrapped fragment source as authored.
    pub fn fragment_source(self) -> &'static str {
        self.definition().fragment_source
    }

    pub fn default_palette(self) -> Palette {
        self.definition().default_palette
    }

    /// Variant at `index`, wrapping around the catalogue.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(self) -> Self {
        Self::from_index(self.index() + Self::ALL.len() - 1)
    }
}

impl Default for EffectVariant {
    fn default() -> Self {
        EffectVariant::WarpMelt
    }
}

impl fmt::Display for EffectVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when an effect name is not in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown effect '{0}' (expected one of: warp-melt, volumetric-raymarch, wave-lines, radial-ring, swirl-flow, or 1-5)")]
pub struct UnknownEffect(pub String);

impl FromStr for EffectVariant {
    type Err = UnknownEffect;

    /// Accepts catalogue names, ignoring case and `_`/`-` differences, or a
    /// one-based index.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        if let Ok(position) = normalized.parse::<usize>() {
            if (1..=Self::ALL.len()).contains(&position) {
                return Ok(Self::ALL[position - 1]);
            }
        }
        Self::ALL
            .into_iter()
            .find(|variant| variant.name() == normalized)
            .ok_or_else(|| UnknownEffect(value.to_owned()))
    }
}
