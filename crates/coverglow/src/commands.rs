//! Utility subcommands: `effects`, `check`, and `palette`.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use backdrop::artwork::{palette_from_artwork, KeyMode, MusicFeatures};
use backdrop::{
    resolve_palette, Backdrop, BackdropOptions, EffectVariant, FrameOutcome, GraphicsDevice,
    HeadlessDevice, ManualScheduler, ViewportEvents,
};
use serde::Serialize;

use crate::cli::{CheckArgs, EffectsArgs, PaletteArgs};

/// Viewport used by `check`.
const CHECK_VIEWPORT: (u32, u32) = (640, 360);
const CHECK_FRAME_STEP: Duration = Duration::from_millis(16);

#[derive(Debug, Serialize)]
struct EffectEntry {
    index: usize,
    name: &'static str,
    summary: &'static str,
    palette: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    effect: &'static str,
    ok: bool,
    frames_rendered: u32,
    leaked_resources: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct PaletteReport {
    mode: &'static str,
    colors: Vec<String>,
}

pub fn effects(args: &EffectsArgs) -> Result<()> {
    let entries: Vec<EffectEntry> = EffectVariant::ALL
        .into_iter()
        .map(|effect| EffectEntry {
            index: effect.index() + 1,
            name: effect.name(),
            summary: effect.summary(),
            palette: effect.default_palette().rgb_strings(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!("{}. {:<20} {}", entry.index, entry.name, entry.summary);
        println!("   palette: {}", entry.palette.join(", "));
    }
    Ok(())
}

pub fn check(args: &CheckArgs) -> Result<()> {
    let reports: Vec<CheckReport> = EffectVariant::ALL
        .into_iter()
        .map(|effect| check_effect(effect, args.frames))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let status = if report.ok { "ok" } else { "FAILED" };
            println!(
                "{:<20} {:<6} frames={}",
                report.effect, status, report.frames_rendered
            );
            if let Some(error) = &report.error {
                println!("    {error}");
            }
        }
    }

    let failed = reports.iter().filter(|report| !report.ok).count();
    if failed > 0 {
        bail!("{failed} of {} effects failed the check", reports.len());
    }
    Ok(())
}

fn check_effect(effect: EffectVariant, frames: u32) -> CheckReport {
    let viewport = ViewportEvents::new(CHECK_VIEWPORT.0, CHECK_VIEWPORT.1);
    let options = BackdropOptions {
        effect,
        ..BackdropOptions::default()
    };
    let mut backdrop = Backdrop::new(
        HeadlessDevice::new(),
        ManualScheduler::new(),
        viewport,
        options,
    );

    let start = Instant::now();
    let mut error = backdrop
        .mount(start)
        .err()
        .map(|err| format!("{:#}", anyhow::Error::new(err)));

    let mut rendered = 0;
    if error.is_none() {
        for frame in 0..frames {
            let Some(request) = backdrop.scheduler_mut().fire() else {
                error = Some("render loop stopped scheduling frames".to_owned());
                break;
            };
            match backdrop.frame(request, start + CHECK_FRAME_STEP * frame) {
                FrameOutcome::Rendered => rendered += 1,
                outcome => {
                    error = Some(format!("frame {frame} was not rendered: {outcome:?}"));
                    break;
                }
            }
        }
    }

    backdrop.unmount();
    let leaked = !backdrop.device().live_resources().is_empty();
    if leaked && error.is_none() {
        error = Some(format!(
            "resources still live after unmount: {:?}",
            backdrop.device().live_resources()
        ));
    }

    CheckReport {
        effect: effect.name(),
        ok: error.is_none(),
        frames_rendered: rendered,
        leaked_resources: leaked,
        error,
    }
}

pub fn palette(args: &PaletteArgs) -> Result<()> {
    let music = music_features(args);
    let mode = palette_from_artwork(&args.image, music.as_ref());
    let resolved = resolve_palette(&mode.colors(), &EffectVariant::default().default_palette());
    let report = PaletteReport {
        mode: mode.name(),
        colors: resolved.rgb_strings(),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode palette")?;
        println!("{json}");
        return Ok(());
    }

    println!("mode: {}", report.mode);
    for (slot, color) in report.colors.iter().enumerate() {
        println!("iColor{}: {color}", slot + 1);
    }
    Ok(())
}

fn music_features(args: &PaletteArgs) -> Option<MusicFeatures> {
    if args.bpm.is_none() && !args.minor && args.energy.is_none() && args.valence.is_none() {
        return None;
    }
    let defaults = MusicFeatures::default();
    Some(MusicFeatures {
        bpm: args.bpm.unwrap_or(defaults.bpm),
        mode: if args.minor {
            KeyMode::Minor
        } else {
            KeyMode::Major
        },
        energy: args.energy.unwrap_or(defaults.energy),
        valence: args.valence.unwrap_or(defaults.valence),
    })
}
