use std::fs;
use std::process::Command;

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

fn coverglow(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_coverglow"));
    command
        .env("COVERGLOW_CONFIG_DIR", config_dir)
        .env_remove("COVERGLOW_CONFIG")
        .env("RUST_LOG", "error");
    command
}

#[test]
fn effects_lists_every_variant_as_json() {
    let root = TempDir::new().unwrap();
    let output = coverglow(root.path())
        .args(["effects", "--json"])
        .output()
        .expect("failed to run coverglow effects");
    assert!(output.status.success());

    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "warp-melt",
            "volumetric-raymarch",
            "wave-lines",
            "radial-ring",
            "swirl-flow"
        ]
    );
    assert_eq!(entries[0]["palette"].as_array().unwrap().len(), 3);
}

#[test]
fn check_passes_on_the_headless_device() {
    let root = TempDir::new().unwrap();
    let output = coverglow(root.path())
        .args(["check", "--json", "--frames", "2"])
        .output()
        .expect("failed to run coverglow check");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    for report in reports.as_array().unwrap() {
        assert_eq!(report["ok"], true, "{report}");
        assert_eq!(report["frames_rendered"], 2);
        assert_eq!(report["leaked_resources"], false);
    }
}

#[test]
fn palette_reads_cover_art() {
    let root = TempDir::new().unwrap();
    let cover = root.path().join("cover.png");
    RgbaImage::from_pixel(64, 64, Rgba([140, 170, 200, 255]))
        .save(&cover)
        .unwrap();

    let output = coverglow(root.path())
        .arg("palette")
        .arg(&cover)
        .arg("--json")
        .output()
        .expect("failed to run coverglow palette");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mode"], "cool");
    assert_eq!(report["colors"][0], "rgb(10, 15, 25)");
    assert_eq!(report["colors"].as_array().unwrap().len(), 3);
}

#[test]
fn missing_cover_falls_back_to_music() {
    let root = TempDir::new().unwrap();
    let output = coverglow(root.path())
        .args(["palette", "does-not-exist.png", "--minor", "--bpm", "80", "--energy", "0.2"])
        .output()
        .expect("failed to run coverglow palette");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("mode: night"), "{stdout}");
}

#[test]
fn invalid_config_file_is_reported() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "version = 1\neffect = \"plasma\"\n").unwrap();

    let output = coverglow(root.path())
        .output()
        .expect("failed to run coverglow");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("plasma"), "stderr: {stderr}");
}
