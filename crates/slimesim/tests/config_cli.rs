use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn slimesim(config_dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_slimesim"));
    command
        .env("SHADERDEMOS_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "error");
    command
}

#[test]
fn config_init_writes_simulation_defaults() {
    let root = TempDir::new().unwrap();
    let target = root.path().join("slime/config.toml");

    let status = slimesim(root.path())
        .args(["config", "init"])
        .arg(&target)
        .status()
        .expect("failed to run slimesim config init");
    assert!(status.success());

    let written = fs::read_to_string(&target).unwrap();
    assert!(written.contains("[slime]"));
    assert!(written.contains("body_count = 4096"));
    assert!(written.contains("x_group_size = 64"));

    let output = slimesim(root.path())
        .args(["--config"])
        .arg(&target)
        .args(["config", "show"])
        .output()
        .expect("failed to run slimesim config show");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("sensor_angle = 60.0"));
}

#[test]
fn oversized_workgroup_is_rejected() {
    let root = TempDir::new().unwrap();
    let bad = root.path().join("config.toml");
    fs::write(&bad, "[compute]\nx_group_size = 64\ny_group_size = 64\n").unwrap();

    let output = slimesim(root.path())
        .output()
        .expect("failed to run slimesim");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invocations"), "stderr was: {stderr}");
}

#[test]
fn zero_bodies_is_a_usage_error() {
    let root = TempDir::new().unwrap();
    let output = slimesim(root.path())
        .args(["--body", "0"])
        .output()
        .expect("failed to run slimesim");
    assert_eq!(output.status.code(), Some(2));
}
