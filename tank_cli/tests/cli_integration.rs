use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &Path) -> PathBuf {
    let toml = format!(
        r#"
[tank]
id = 7

[logging]
interval_min = 1

[store]
dir = "{}"
"#,
        dir.join("records").display()
    );
    let path = dir.join("tank.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn tank() -> Command {
    let mut cmd = Command::cargo_bin("tank_cli").unwrap();
    cmd.env_remove("TANK_TEST_SIM_FAULT").env_remove("RUST_LOG");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run", "--ticks", "20"], 0, "ran 20 passes", "stdout")]
#[case(&["self-check"], 0, "self-check OK (tank 7)", "stdout")]
#[case(&["calibrate", "--probe", "ph"], 2, "--csv", "stderr")]
#[case(&["run", "--ticks", "1", "--keys", "left"], 1, "unknown key", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let mut cmd = tank();
    cmd.arg("--config").arg(&cfg).args(args);
    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => assert.stdout(predicate::str::contains(needle)),
        _ => assert.stderr(predicate::str::contains(needle)),
    };
}

#[rstest]
fn keys_drive_the_menu_and_persist() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    // Set pH setpoint to 7.25
    tank()
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--ticks", "10", "--keys", "sel 7.25 sel"])
        .assert()
        .success();

    let stored = fs::read_to_string(dir.path().join("records/ph.setpoint.json")).unwrap();
    assert_eq!(stored.trim(), "7.25");

    tank()
        .arg("--config")
        .arg(&cfg)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("ph.setpoint = 7.25"))
        .stdout(predicate::str::contains("ph.pid = (unset)"));
}

#[rstest]
fn calibrate_from_csv() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let csv = dir.path().join("ph.csv");
    fs::write(&csv, "raw,reference\n3000,4.0\n2000,7.0\n1000,10.0\n").unwrap();

    tank()
        .arg("--config")
        .arg(&cfg)
        .args(["calibrate", "--probe", "ph", "--csv"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("ph calibration saved: slope=-0.003000"));
    assert!(dir.path().join("records/ph.calibration.json").exists());
}

#[rstest]
fn degenerate_csv_exits_with_calibration_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let csv = dir.path().join("bad.csv");
    fs::write(&csv, "raw,reference\n5,1\n5,2\n").unwrap();

    tank()
        .arg("--config")
        .arg(&cfg)
        .args(["calibrate", "--probe", "temperature", "--csv"])
        .arg(&csv)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("too close together"));
    assert!(!dir.path().join("records/temp.calibration.json").exists());
}

#[rstest]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[tank]\nid = 500\n").unwrap();
    tank()
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"));
}
