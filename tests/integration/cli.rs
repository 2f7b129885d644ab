//! The `rill` binary

use std::io::Write;
use std::process::{Command, Stdio};

fn rill() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rill"));
    // Keep the user's configuration out of the way.
    cmd.env("XDG_CONFIG_HOME", "/nonexistent").env_remove("RILL_LOG");
    cmd
}

#[test]
fn test_decode_file_to_stdout() {
    let mut input = tempfile::NamedTempFile::new().unwrap();
    input.write_all(b"a,b\n1,2.5\n").unwrap();

    let output = rill().arg("csv").arg(input.path()).output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "[\"a\", \"b\"]\n[a:1, b:2.5]\n"
    );
}

#[test]
fn test_decode_stdin() {
    let mut child = rill()
        .arg("lines")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"x\ty\n").unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "\"x\\ty\"\n");
}

#[test]
fn test_bad_arguments() {
    let output = rill().arg("xml").output().unwrap();
    assert!(!output.status.success());

    let output = rill()
        .args(["--config", "/nonexistent/rill.toml", "csv"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("configuration"));
}
