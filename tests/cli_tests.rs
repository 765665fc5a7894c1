//! Command-line behavior of the `nvsniff` binary
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

mod utils;

use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;
use utils::*;

#[test]
fn test_cli_help() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("extract-seeds"));
}

#[test]
fn test_frontend_device_with_suffix() {
    let bytes = stream(&[frontend_call("/dev/nvidia0-foo", 0x27)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .write_stdin(bytes)
        .assert()
        .success()
        .stdout("Frontend:\n\t0x27\n");
}

#[test]
fn test_cli_requires_subcommand() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.assert().failure();
}

#[test]
fn test_parse_reports_unsupported_from_stdin() {
    let bytes = stream(&[uvm_call(0x30), control_call(0x2080_0101, 0), uvm_call(0x21)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .write_stdin(bytes)
        .assert()
        .success()
        .stdout("UVM:\n\t0x21\n\t0x30\nControl:\n\t0x20800101\n");
}

#[test]
fn test_parse_empty_stream_prints_nothing() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .write_stdin(Vec::new())
        .assert()
        .success()
        .stdout("");
}

#[test]
fn test_parse_merges_multiple_inputs() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    write_stream(&a, &[uvm_call(0x30)]);
    write_stream(&b, &[frontend_call("/dev/nvidia0", 0x27)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout("Frontend:\n\t0x27\nUVM:\n\t0x30\n");
}

#[test]
fn test_parse_missing_input_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .arg(dir.path().join("missing.bin"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open input"));
}

#[test]
fn test_parse_supported_file_filters_report() {
    let dir = tempdir().unwrap();
    let supported = dir.path().join("supported.toml");
    fs::write(&supported, "uvm = [0x30]\ncontrol = [0x20800101]\n").unwrap();
    let bytes = stream(&[uvm_call(0x30), control_call(0x2080_0101, 0), uvm_call(0x21)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .arg("--supported")
        .arg(&supported)
        .write_stdin(bytes)
        .assert()
        .success()
        .stdout("UVM:\n\t0x21\n");
}

#[test]
fn test_parse_rejects_bad_supported_file() {
    let dir = tempdir().unwrap();
    let supported = dir.path().join("supported.toml");
    fs::write(&supported, "gpu = [1]\n").unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .arg("--supported")
        .arg(&supported)
        .write_stdin(Vec::new())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse supported set"));
}

#[test]
fn test_enforce_instant_exits_without_report() {
    let bytes = stream(&[uvm_call(0x30), uvm_call(0x31)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .arg("--enforce")
        .arg("instant")
        .write_stdin(bytes)
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("Unsupported ioctl"));
}

#[test]
fn test_enforce_mode_from_env() {
    let bytes = stream(&[uvm_call(0x30)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .env("IOCTL_SNIFFER_ENFORCE_COMPATIBILITY", "instant")
        .write_stdin(bytes)
        .assert()
        .code(1);
}

#[test]
fn test_enforce_mode_from_legacy_env_name() {
    let bytes = stream(&[uvm_call(0x30)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .env("GVISOR_IOCTL_SNIFFER_ENFORCE_COMPATIBILITY", "INSTANT")
        .write_stdin(bytes)
        .assert()
        .code(1)
        .stdout("");
}

#[test]
fn test_unrecognised_enforce_env_value_is_off() {
    let bytes = stream(&[uvm_call(0x30)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .env("IOCTL_SNIFFER_ENFORCE_COMPATIBILITY", "1")
        .write_stdin(bytes)
        .assert()
        .success()
        .stdout("UVM:\n\t0x30\n")
        .stderr(predicate::str::contains("enforce mode stays off"));
}

#[test]
fn test_unknown_enforce_flag_still_rejected() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .arg("--enforce")
        .arg("1")
        .write_stdin(Vec::new())
        .assert()
        .code(2);
}

#[test]
fn test_dump_file_from_legacy_env_name() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("legacy.dump");
    let bytes = stream(&[pre_call(control_call(0x2080_0101, 0))]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .env("GVISOR_IOCTL_DUMP_FILE", &dump)
        .write_stdin(bytes)
        .assert()
        .success();
    assert_eq!(fs::metadata(&dump).unwrap().len(), 24 + 32);
}

#[test]
fn test_enforce_report_prints_then_fails() {
    let bytes = stream(&[uvm_call(0x30)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .arg("--enforce")
        .arg("report")
        .write_stdin(bytes)
        .assert()
        .failure()
        .stdout("UVM:\n\t0x30\n");
}

#[test]
fn test_enforce_report_passes_when_clean() {
    let bytes = stream(&[control_call(0x0000_8001, 0)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .arg("--enforce")
        .arg("report")
        .write_stdin(bytes)
        .assert()
        .success();
}

#[test]
fn test_parse_json_with_stats() {
    let bytes = stream(&[uvm_call(0x30), control_call(0x2080_0101, 0)]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    let output = cmd
        .arg("parse")
        .arg("--format")
        .arg("json")
        .arg("--stats")
        .write_stdin(bytes)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["has_unsupported"], true);
    assert_eq!(value["unsupported"]["UVM"], serde_json::json!([0x30]));
    assert_eq!(value["unsupported"]["Control"], serde_json::json!([0x2080_0101]));
    assert_eq!(value["stats"]["records"], 2);
    assert_eq!(value["stats"]["classified"], 2);
}

#[test]
fn test_dump_file_from_env_then_extract_and_inspect() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("ioctl.dump");
    let bytes = stream(&[
        pre_call(control_call(0x2080_0101, 0)),
        pre_call(control_call(0x2080_0101, 0)),
        pre_call(alloc_call(0x41, 0, 0)),
        control_call(0x2080_0101, 0),
    ]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("parse")
        .env("IOCTL_DUMP_FILE", &dump)
        .write_stdin(bytes)
        .assert()
        .success();
    assert_eq!(fs::metadata(&dump).unwrap().len(), 3 * (24 + 32));

    let seeds = dir.path().join("smi");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("extract-seeds")
        .arg(&dump)
        .arg(&seeds)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Extracted 2 seeds (Control: 1, Alloc: 1, duplicates skipped: 1)",
        ));
    assert!(seeds.join("smi_000000.bin").exists());
    assert!(seeds.join("smi_000001.bin").exists());

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("inspect-seed")
        .arg(seeds.join("smi_000001.bin"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Type:           Alloc"))
        .stdout(predicate::str::contains("Subclass:       0x41"))
        .stdout(predicate::str::contains("Argument Size:  32 bytes"));
}

#[test]
fn test_inspect_seed_rejects_garbage() {
    let dir = tempdir().unwrap();
    let seed = dir.path().join("junk.bin");
    fs::write(&seed, [0xffu8; 40]).unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nvsniff");
    cmd.arg("inspect-seed")
        .arg(&seed)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid magic"));
}
