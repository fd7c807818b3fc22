use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn raycompute(config_dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_raycompute"));
    command
        .env("SHADERDEMOS_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "error");
    command
}

#[test]
fn config_show_reports_defaults_without_a_file() {
    let root = TempDir::new().unwrap();
    let output = raycompute(root.path())
        .args(["config", "show"])
        .output()
        .expect("failed to run raycompute config show");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("# source: built-in defaults"));
    assert!(stdout.contains("[raytracer]"));
    assert!(stdout.contains("fov = 50.0"));
}

#[test]
fn config_path_points_into_override_directory() {
    let root = TempDir::new().unwrap();
    let output = raycompute(root.path())
        .args(["config", "path"])
        .output()
        .expect("failed to run raycompute config path");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(&root.path().join("config.toml").display().to_string()));
    assert!(stdout.contains("missing"));
}

#[test]
fn out_of_range_fov_in_config_fails() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "[raytracer]\nfov = 0.0\n").unwrap();

    let output = raycompute(root.path())
        .output()
        .expect("failed to run raycompute");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("raytracer.fov"), "stderr was: {stderr}");
}
