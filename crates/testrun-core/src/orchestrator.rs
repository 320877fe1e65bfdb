//! One invocation: engine run with its hooks, reporting, exit status.
//!
//! The engine awaits setup and teardown in the process that runs the tests;
//! teardown runs exactly once after the result stream has ended, whether the
//! stream finished on its own or was destroyed through the cancellation token.

use std::io::Write;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::engine::{Engine, EngineExit, ResultStream};
use crate::error::{HookError, RunError};
use crate::event::{RunSummary, TestEvent};
use crate::hooks::HookSet;
use crate::report::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    Failed,
    Interrupted,
}

impl RunStatus {
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Passed => 0,
            Self::Failed | Self::Interrupted => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub status: RunStatus,
    pub failures: usize,
    pub summary: Option<RunSummary>,
}

#[derive(Debug, Default)]
struct Progress {
    failures: usize,
    interrupted: bool,
    summary: Option<RunSummary>,
}

pub struct Orchestrator<'a, E> {
    config: &'a RunConfig,
    engine: &'a E,
    reporters: Vec<Box<dyn Reporter + 'a>>,
}

impl<'a, E: Engine> Orchestrator<'a, E> {
    #[must_use]
    pub fn new(config: &'a RunConfig, engine: &'a E) -> Self {
        Self {
            config,
            engine,
            reporters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn Reporter + 'a>) -> Self {
        self.reporters.push(reporter);
        self
    }

    /// Runs the suite and reports how it went.
    ///
    /// Test failures are part of the returned report; only hook, engine and
    /// output errors come back as `Err`.
    ///
    /// # Errors
    /// Returns an error when a hook fails, the engine cannot be started or
    /// waited on, or reporter output cannot be written.
    pub async fn run(
        mut self,
        cancel: &CancellationToken,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<RunReport, RunError> {
        let hooks = HookSet::locate(&self.config.root_dir);
        let mut stream = self.engine.start(self.config, &hooks)?;
        let driven = self.drive(&mut stream, cancel, out, err).await;
        if driven.is_err() {
            stream.destroy();
            while stream.next().await.is_some() {}
        }
        let exit = stream.finished().await;

        let progress = driven?;
        let exit = exit?;
        check_hooks(&exit, &hooks)?;

        let status = if progress.interrupted || exit.cancelled {
            RunStatus::Interrupted
        } else if progress.failures > 0 {
            RunStatus::Failed
        } else if !exit.success() {
            warn!(
                code = ?exit.code,
                "test engine exited unsuccessfully without a failing test"
            );
            RunStatus::Failed
        } else {
            RunStatus::Passed
        };
        debug!(?status, failures = progress.failures, "run finished");
        Ok(RunReport {
            status,
            failures: progress.failures,
            summary: progress.summary,
        })
    }

    async fn drive(
        &mut self,
        stream: &mut ResultStream,
        cancel: &CancellationToken,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<Progress, RunError> {
        let mut progress = Progress::default();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled(), if !stream.is_destroyed() => {
                    stream.destroy();
                    progress.interrupted = true;
                }
                event = stream.next() => {
                    let Some(event) = event else {
                        break;
                    };
                    self.observe(&event, &mut progress, out, err)?;
                }
            }
        }
        for reporter in &mut self.reporters {
            reporter.finish(out)?;
        }
        out.flush()?;
        Ok(progress)
    }

    fn observe(
        &mut self,
        event: &TestEvent,
        progress: &mut Progress,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<(), RunError> {
        match event {
            TestEvent::Fail(_) => {
                progress.failures += 1;
                let rendered = serde_json::to_string_pretty(event)
                    .unwrap_or_else(|_| format!("{event:?}"));
                writeln!(err, "{rendered}")?;
            }
            TestEvent::Summary(summary) => progress.summary = Some(summary.clone()),
            _ => {}
        }
        for reporter in &mut self.reporters {
            reporter.report(event, out)?;
        }
        Ok(())
    }
}

fn check_hooks(exit: &EngineExit, hooks: &HookSet) -> Result<(), HookError> {
    let Some(kind) = exit.failed_hook else {
        return Ok(());
    };
    match hooks.get(kind) {
        Some(hook) => Err(HookError::Failed {
            kind,
            path: hook.path.clone(),
        }),
        None => Err(HookError::Unexpected { kind }),
    }
}
