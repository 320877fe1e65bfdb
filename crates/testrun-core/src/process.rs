use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

/// Builds a child command with explicit env pairs and working directory.
pub(crate) fn configured_command(
    program: &Path,
    args: &[String],
    envs: &[(String, String)],
    cwd: &Path,
) -> Command {
    let mut command = Command::new(program);
    command.args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    command.current_dir(cwd);
    command
}

/// Runs a program to completion and returns its trimmed stdout.
///
/// # Errors
///
/// Returns an error when the program cannot be started, exits unsuccessfully,
/// or prints something that is not UTF-8.
pub(crate) async fn command_stdout(program: &Path, args: &[String], cwd: &Path) -> Result<String> {
    let mut command = configured_command(program, args, &[], cwd);
    command.stdin(Stdio::null());
    command.stderr(Stdio::null());
    command.kill_on_drop(true);

    let output = command
        .output()
        .await
        .with_context(|| format!("failed to start {}", program.display()))?;
    if !output.status.success() {
        bail!(
            "{} exited with status {}",
            program.display(),
            output.status.code().unwrap_or(-1)
        );
    }
    let stdout = String::from_utf8(output.stdout).context("output is not UTF-8")?;
    Ok(stdout.trim().to_string())
}
