#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub fn find_node() -> Option<PathBuf> {
    which::which("node").ok()
}

pub fn project() -> TempDir {
    tempfile::Builder::new()
        .prefix("testrun-cli")
        .tempdir()
        .expect("tempdir")
}

pub fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(&path, contents).expect("write file");
    path
}

/// Shell script standing in for node and its test driver.
///
/// Answers `--version` with a supported release. Otherwise it runs the setup
/// and teardown paths from `TESTRUN_DRIVER_OPTIONS` as shell scripts around
/// the run, exiting 70 or 71 when one fails, appends `TZ` to
/// `$TESTRUN_TRACE` and prints `$FAKE_TAP`.
#[cfg(unix)]
pub fn fake_node(root: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo v22.10.0
  exit 0
fi
setup=$(printf '%s' "$TESTRUN_DRIVER_OPTIONS" | sed -n 's/.*"setup":"\([^"]*\)".*/\1/p')
teardown=$(printf '%s' "$TESTRUN_DRIVER_OPTIONS" | sed -n 's/.*"teardown":"\([^"]*\)".*/\1/p')
if [ -n "$setup" ]; then
  sh "$setup" || exit 70
fi
echo "engine TZ=$TZ" >> "$TESTRUN_TRACE"
if [ -n "$FAKE_TAP" ]; then
  cat "$FAKE_TAP"
fi
if [ -n "$teardown" ]; then
  sh "$teardown" || exit 71
fi
exit "${FAKE_EXIT:-0}"
"#;
    let path = write(root, "bin/node", script);
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}

/// Real node, when it is new enough to run the driver.
pub fn supported_node() -> Option<PathBuf> {
    let node = find_node()?;
    let output = std::process::Command::new(&node).arg("--version").output().ok()?;
    let version = String::from_utf8(output.stdout).ok()?;
    let mut parts = version.trim().strip_prefix('v')?.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    ((major, minor) >= (22, 10)).then_some(node)
}

pub fn read_trace(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

pub const PASSING_TAP: &str = "TAP version 13
# Subtest: adds
ok 1 - adds
  ---
  duration_ms: 0.5
  ...
1..1
# tests 1
# suites 0
# pass 1
# fail 0
# cancelled 0
# skipped 0
# todo 0
# duration_ms 3
";

pub const FAILING_TAP: &str = "TAP version 13
# Subtest: subtracts
not ok 1 - subtracts
  ---
  duration_ms: 0.8
  location: '/work/test/math.test.js:7:3'
  failureType: 'testCodeFailure'
  error: 'Expected values to be strictly equal'
  code: 'ERR_ASSERTION'
  ...
1..1
# tests 1
# suites 0
# pass 0
# fail 1
# cancelled 0
# skipped 0
# todo 0
# duration_ms 4
";
