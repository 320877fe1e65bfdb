//! Structured events produced by the engine for one run.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum TestEvent {
    #[serde(rename = "test:start")]
    Start(TestStart),
    #[serde(rename = "test:pass")]
    Pass(TestResult),
    #[serde(rename = "test:fail")]
    Fail(TestResult),
    #[serde(rename = "test:diagnostic")]
    Diagnostic(Diagnostic),
    #[serde(rename = "test:summary")]
    Summary(RunSummary),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestStart {
    pub name: String,
    pub nesting: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub name: String,
    pub nesting: usize,
    pub test_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directive: Option<Directive>,
    pub details: TestDetails,
}

impl TestResult {
    #[must_use]
    pub fn is_suite(&self) -> bool {
        self.details.kind.as_deref() == Some("suite")
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self.directive, Some(Directive::Skip(_)))
    }

    #[must_use]
    pub fn is_todo(&self) -> bool {
        matches!(self.directive, Some(Directive::Todo(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    Skip(Option<String>),
    Todo(Option<String>),
}

/// Diagnostic block attached to a test point.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl TestDetails {
    /// Splits `location` (`path:line:col`) into its parts.
    #[must_use]
    pub fn source_position(&self) -> Option<SourcePosition<'_>> {
        let location = self.location.as_deref()?;
        let mut parts = location.rsplitn(3, ':');
        let column = parts.next()?.parse().ok()?;
        let line = parts.next()?.parse().ok()?;
        let file = parts.next()?;
        Some(SourcePosition { file, line, column })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition<'a> {
    pub file: &'a str,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub nesting: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub tests: u32,
    pub suites: u32,
    pub pass: u32,
    pub fail: u32,
    pub cancelled: u32,
    pub skipped: u32,
    pub todo: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}
