use std::io;
use std::path::PathBuf;

use crate::hooks::HookKind;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("test engine `{binary}` not found (set TESTRUN_NODE or add node to PATH)")]
    NotFound { binary: String },
    #[error("failed to start {program}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not determine the version of {program}")]
    Version {
        program: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("{program} is node {found}; testrun needs node {required} or newer")]
    Unsupported {
        program: PathBuf,
        found: String,
        required: String,
    },
    #[error("failed to encode engine options")]
    Options(#[from] serde_json::Error),
    #[error("engine stdout was not captured")]
    MissingStdout,
    #[error("failed to read engine output")]
    Io(#[from] io::Error),
    #[error("engine task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("{kind} hook {path} failed")]
    Failed { kind: HookKind, path: PathBuf },
    #[error("test engine reported a failing {kind} hook, but none was configured")]
    Unexpected { kind: HookKind },
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("failed to write reporter output")]
    Output(#[from] io::Error),
}
