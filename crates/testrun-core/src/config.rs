use std::collections::HashMap;
use std::env;
use std::path::{Component, Path, PathBuf};

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::warn;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_COVERAGE_THRESHOLD: u8 = 90;
pub const DEFAULT_ROOT_DIR: &str = "test";
pub const DEFAULT_TIMEZONE: &str = "UTC";

const COMPILED_PATTERNS: [&str; 2] = ["**/*.test.{cjs,mjs,js}", "**/test/**/*.test.{cjs,mjs,js}"];
const TSX_PATTERNS: [&str; 5] = [
    "**/**/*.test.ts",
    "**/*.test.{cjs,mjs,js}",
    "**/test/**/*.test.{cjs,mjs,js}",
    "**/*.test.{cts,mts,ts}",
    "**/test/**/*.test.{cts,mts,ts}",
];

/// Immutable view of the process environment taken once at startup.
#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }

    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.var(key).map(str::trim).filter(|value| !value.is_empty())
    }
}

/// Process-wide settings derived from the environment.
///
/// These are fixed for the lifetime of one invocation; children receive the
/// forced timezone explicitly instead of the parent mutating its own env.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub node: Option<PathBuf>,
    pub timezone: String,
    pub ci_annotations: bool,
    pub tsx: bool,
    pub no_color: bool,
}

impl Settings {
    #[must_use]
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            node: snapshot.non_empty("TESTRUN_NODE").map(PathBuf::from),
            timezone: snapshot
                .non_empty("TESTRUN_TZ")
                .unwrap_or(DEFAULT_TIMEZONE)
                .to_string(),
            ci_annotations: snapshot.non_empty("GITHUB_ACTION").is_some(),
            tsx: snapshot.var("npm_lifecycle_script") == Some("\"tsx\""),
            no_color: snapshot.var("NO_COLOR").is_some(),
        }
    }

    /// Environment pairs every child process (engine and hooks) receives.
    #[must_use]
    pub fn child_env(&self) -> Vec<(String, String)> {
        vec![("TZ".to_string(), self.timezone.clone())]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReporterKind {
    Spec,
    Tap,
    Dot,
    Junit,
}

impl ReporterKind {
    #[must_use]
    pub fn default_for(stdout_is_terminal: bool) -> Self {
        if stdout_is_terminal {
            Self::Spec
        } else {
            Self::Tap
        }
    }

    #[must_use]
    pub fn names() -> Vec<String> {
        Self::iter().map(|kind| kind.to_string()).collect()
    }
}

/// Which files the engine is asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSelection {
    Files(Vec<PathBuf>),
    Patterns(Vec<String>),
}

impl TestSelection {
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        match self {
            Self::Files(files) => files,
            Self::Patterns(_) => &[],
        }
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        match self {
            Self::Files(_) => &[],
            Self::Patterns(patterns) => patterns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub enabled: bool,
    pub lines: u8,
    pub branches: u8,
    pub functions: u8,
    pub exclude: Vec<String>,
}

/// Flag values exactly as they arrived on the command line.
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RawOptions {
    pub concurrency: Option<String>,
    pub expose_gc: bool,
    pub watch: bool,
    pub patterns: Vec<String>,
    pub coverage: bool,
    pub reporter: Option<String>,
    pub lines: Option<String>,
    pub branches: Option<String>,
    pub functions: Option<String>,
    pub name: Option<String>,
    pub timeout: Option<String>,
    pub only: bool,
    pub force_exit: bool,
    pub root_dir: Option<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunConfig {
    pub concurrency: usize,
    pub selection: TestSelection,
    pub coverage: Coverage,
    pub reporter: ReporterKind,
    pub name_pattern: Option<String>,
    pub timeout_ms: u64,
    pub only: bool,
    pub watch: bool,
    pub expose_gc: bool,
    pub force_exit: bool,
    pub root_dir: PathBuf,
    pub cwd: PathBuf,
}

impl RunConfig {
    /// Normalizes raw flag values into a run configuration.
    ///
    /// Malformed optional values never fail: they are logged and replaced by
    /// their defaults.
    #[must_use]
    pub fn build(
        raw: &RawOptions,
        settings: &Settings,
        cwd: &Path,
        stdout_is_terminal: bool,
    ) -> Self {
        let given: Vec<String> = raw
            .patterns
            .iter()
            .map(|pattern| pattern.trim())
            .filter(|pattern| !pattern.is_empty())
            .map(str::to_string)
            .collect();
        let patterns = if given.is_empty() {
            default_patterns(settings.tsx, cwd)
        } else {
            given
        };
        let selection = if raw.files.is_empty() {
            TestSelection::Patterns(patterns.clone())
        } else {
            TestSelection::Files(raw.files.iter().map(|f| absolutize(cwd, f)).collect())
        };
        let reporter = match raw.reporter.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => value.parse().unwrap_or_else(|_| {
                let fallback = ReporterKind::default_for(stdout_is_terminal);
                warn!(
                    reporter = value,
                    known = ?ReporterKind::names(),
                    "unknown reporter; using {fallback}"
                );
                fallback
            }),
            _ => ReporterKind::default_for(stdout_is_terminal),
        };
        let root_dir = raw
            .root_dir
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_ROOT_DIR);

        Self {
            concurrency: positive_or(
                "concurrency",
                raw.concurrency.as_deref(),
                default_concurrency(),
            ),
            selection,
            coverage: Coverage {
                enabled: raw.coverage,
                lines: percent_or("lines", raw.lines.as_deref()),
                branches: percent_or("branches", raw.branches.as_deref()),
                functions: percent_or("functions", raw.functions.as_deref()),
                exclude: patterns,
            },
            reporter,
            name_pattern: raw.name.clone().filter(|name| !name.is_empty()),
            timeout_ms: positive_or("timeout", raw.timeout.as_deref(), DEFAULT_TIMEOUT_MS),
            only: raw.only,
            watch: raw.watch,
            expose_gc: raw.expose_gc,
            force_exit: raw.force_exit,
            root_dir: absolutize(cwd, root_dir),
            cwd: cwd.to_path_buf(),
        }
    }
}

#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

#[must_use]
pub fn default_patterns(tsx: bool, cwd: &Path) -> Vec<String> {
    let set: &[&str] = if tsx { &TSX_PATTERNS } else { &COMPILED_PATTERNS };
    set.iter()
        .map(|pattern| cwd.join(pattern).display().to_string())
        .collect()
}

fn positive_or<T>(flag: &str, raw: Option<&str>, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(value) = raw else {
        return default;
    };
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => parsed,
        _ => {
            warn!(flag, value, "expected a positive integer; using {default}");
            default
        }
    }
}

fn percent_or(flag: &str, raw: Option<&str>) -> u8 {
    let Some(value) = raw else {
        return DEFAULT_COVERAGE_THRESHOLD;
    };
    match value.trim().parse::<u8>() {
        Ok(parsed) if parsed <= 100 => parsed,
        _ => {
            warn!(
                flag,
                value, "expected a percentage in 0..=100; using {DEFAULT_COVERAGE_THRESHOLD}"
            );
            DEFAULT_COVERAGE_THRESHOLD
        }
    }
}

/// Joins `path` onto `cwd` and folds `.`/`..` lexically, without touching the
/// filesystem.
pub(crate) fn absolutize(cwd: &Path, path: &str) -> PathBuf {
    let joined = cwd.join(path);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
