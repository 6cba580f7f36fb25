//! Black-box checks of the gafferd binary's argument surface.

use assert_cmd::Command;

fn gafferd() -> Command {
    Command::cargo_bin("gafferd").unwrap()
}

#[test]
fn help_prints_usage() {
    let output = gafferd().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("USAGE"));
    assert!(stdout.contains("gafferd"));
    assert!(stdout.contains("GAFFER_ROOT"));
}

#[test]
fn version_prints_version() {
    let output = gafferd().arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unexpected_argument_exits_with_config_error() {
    let output = gafferd().arg("--bogus").output().unwrap();
    assert_eq!(output.status.code(), Some(1), "exit 1 is a configuration error");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unexpected argument"));
}
