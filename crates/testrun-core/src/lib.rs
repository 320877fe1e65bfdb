#![deny(clippy::all)]

pub mod config;
pub mod engine;
mod error;
pub mod event;
pub mod hooks;
mod orchestrator;
mod process;
mod report;
pub mod signals;

pub use crate::config::{EnvSnapshot, RawOptions, ReporterKind, RunConfig, Settings, TestSelection};
pub use crate::engine::{Engine, EngineExit, NodeEngine, ResultStream};
pub use crate::error::{EngineError, HookError, RunError};
pub use crate::event::{RunSummary, TestEvent, TestResult};
pub use crate::hooks::{HookKind, HookModule, HookSet};
pub use crate::orchestrator::{Orchestrator, RunReport, RunStatus};
pub use crate::report::Reporter;
