use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::tap::TapParser;
use super::{Engine, EngineExit, ResultStream};
use crate::config::{RunConfig, Settings};
use crate::error::EngineError;
use crate::event::TestEvent;
use crate::hooks::{HookKind, HookSet};
use crate::process::{command_stdout, configured_command};

const NODE_BINARY: &str = "node";
const DRIVER: &str = include_str!("driver.mjs");
const OPTIONS_ENV: &str = "TESTRUN_DRIVER_OPTIONS";

/// `run()` needs 22.10 for `globPatterns` together with the coverage options.
const MIN_NODE_VERSION: (u32, u32) = (22, 10);

/// How long a stopped engine gets to run teardown before it is killed.
const STOP_GRACE: Duration = Duration::from_secs(10);

const SETUP_FAILED: i32 = 70;
const TEARDOWN_FAILED: i32 = 71;

/// Runs node:test through a small driver script inside one node process and
/// decodes its TAP output.
///
/// The driver awaits the setup hook, runs the tests, then awaits the teardown
/// hook once the result stream has finished. Closing its stdin stops the run.
#[derive(Debug, Clone)]
pub struct NodeEngine {
    program: PathBuf,
    envs: Vec<(String, String)>,
    grace: Duration,
}

#[derive(Debug, Serialize)]
struct DriverOptions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    setup: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    teardown: Option<&'a Path>,
    run: RunOptions<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
struct RunOptions<'a> {
    concurrency: usize,
    timeout: u64,
    only: bool,
    watch: bool,
    force_exit: bool,
    exec_argv: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_name_patterns: Option<[&'a str; 1]>,
    #[serde(skip_serializing_if = "is_empty")]
    files: &'a [PathBuf],
    #[serde(skip_serializing_if = "is_empty")]
    glob_patterns: &'a [String],
    coverage: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    coverage_exclude_globs: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_coverage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch_coverage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_coverage: Option<u8>,
}

impl<'a> DriverOptions<'a> {
    fn new(config: &'a RunConfig, hooks: &'a HookSet) -> Self {
        let coverage = &config.coverage;
        let threshold = |value: u8| coverage.enabled.then_some(value);
        Self {
            setup: hooks.setup.as_ref().map(|hook| hook.path.as_path()),
            teardown: hooks.teardown.as_ref().map(|hook| hook.path.as_path()),
            run: RunOptions {
                concurrency: config.concurrency,
                timeout: config.timeout_ms,
                only: config.only,
                watch: config.watch,
                force_exit: config.force_exit,
                exec_argv: if config.expose_gc {
                    vec!["--expose-gc"]
                } else {
                    Vec::new()
                },
                test_name_patterns: config.name_pattern.as_deref().map(|name| [name]),
                files: config.selection.files(),
                glob_patterns: config.selection.patterns(),
                coverage: coverage.enabled,
                coverage_exclude_globs: coverage.enabled.then_some(coverage.exclude.as_slice()),
                line_coverage: threshold(coverage.lines),
                branch_coverage: threshold(coverage.branches),
                function_coverage: threshold(coverage.functions),
            },
        }
    }
}

impl NodeEngine {
    #[must_use]
    pub fn new(program: PathBuf, envs: Vec<(String, String)>) -> Self {
        Self {
            program,
            envs,
            grace: STOP_GRACE,
        }
    }

    #[cfg(test)]
    fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Resolves the node binary from settings or `PATH`.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] when no binary can be located.
    pub fn locate(settings: &Settings) -> Result<Self, EngineError> {
        let program = match &settings.node {
            Some(path) => path.clone(),
            None => which::which(NODE_BINARY).map_err(|_| EngineError::NotFound {
                binary: NODE_BINARY.to_string(),
            })?,
        };
        Ok(Self::new(program, settings.child_env()))
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Checks that the binary is a node release the driver can use.
    ///
    /// # Errors
    /// Returns [`EngineError::Version`] when `--version` fails or prints
    /// something unexpected, and [`EngineError::Unsupported`] for releases
    /// older than 22.10.
    pub async fn ensure_supported(&self) -> Result<(), EngineError> {
        let version = command_stdout(&self.program, &["--version".to_string()], Path::new("."))
            .await
            .map_err(|source| EngineError::Version {
                program: self.program.clone(),
                source,
            })?;
        let Some(found) = parse_version(&version) else {
            return Err(EngineError::Version {
                program: self.program.clone(),
                source: anyhow::anyhow!("unrecognized version `{version}`"),
            });
        };
        debug!(program = %self.program.display(), %version, "found node");
        if found < MIN_NODE_VERSION {
            let (major, minor) = MIN_NODE_VERSION;
            return Err(EngineError::Unsupported {
                program: self.program.clone(),
                found: version,
                required: format!("v{major}.{minor}"),
            });
        }
        Ok(())
    }

    fn args() -> Vec<String> {
        vec![
            "--input-type=module".to_string(),
            "--eval".to_string(),
            DRIVER.to_string(),
        ]
    }
}

fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

/// Reads `vMAJOR.MINOR.PATCH` as printed by `node --version`.
fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().strip_prefix('v')?.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

impl Engine for NodeEngine {
    fn start(&self, config: &RunConfig, hooks: &HookSet) -> Result<ResultStream, EngineError> {
        let options = serde_json::to_string(&DriverOptions::new(config, hooks))?;
        debug!(program = %self.program.display(), %options, "starting test engine");
        let mut envs = self.envs.clone();
        envs.push((OPTIONS_ENV.to_string(), options));

        let mut command = configured_command(&self.program, &Self::args(), &envs, &config.cwd);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::inherit());
        command.kill_on_drop(true);
        let child = command.spawn().map_err(|source| EngineError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let grace = self.grace;
        Ok(ResultStream::spawn(move |tx, cancel| {
            pump(child, tx, cancel, grace)
        }))
    }
}

async fn pump(
    mut child: Child,
    tx: mpsc::Sender<TestEvent>,
    cancel: CancellationToken,
    grace: Duration,
) -> Result<EngineExit, EngineError> {
    let stdout = child.stdout.take().ok_or(EngineError::MissingStdout)?;
    let mut stdin = child.stdin.take();
    let mut lines = BufReader::new(stdout).lines();
    let mut parser = TapParser::new();
    let mut cancelled = false;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                drop(stdin.take());
                deadline = Some(Instant::now() + grace);
                debug!(?grace, "stopping test engine");
            }
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                warn!("test engine did not stop in time; killing it");
                if let Err(err) = child.start_kill() {
                    debug!(%err, "engine already exited");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                for event in parser.push_line(&line) {
                    if tx.send(event).await.is_err() {
                        debug!("result stream receiver dropped");
                    }
                }
            }
        }
    }

    for event in parser.finish() {
        tx.send(event).await.ok();
    }
    drop(stdin);
    let status = child.wait().await?;
    let code = status.code();
    let failed_hook = match code {
        Some(SETUP_FAILED) => Some(HookKind::Setup),
        Some(TEARDOWN_FAILED) => Some(HookKind::Teardown),
        _ => None,
    };
    debug!(?code, cancelled, ?failed_hook, "test engine exited");
    Ok(EngineExit {
        code,
        cancelled,
        failed_hook,
    })
}
