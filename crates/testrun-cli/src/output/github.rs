use std::io::{self, Write};
use std::path::{Path, PathBuf};

use testrun_core::{Reporter, TestEvent, TestResult};

/// Workflow commands that annotate failing tests in a GitHub Actions run.
pub struct GithubReporter {
    cwd: PathBuf,
}

impl GithubReporter {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd }
    }

    fn annotation(&self, result: &TestResult) -> String {
        let message = result
            .details
            .error
            .as_deref()
            .unwrap_or("test failed");
        let mut properties = Vec::new();
        if let Some(position) = result.details.source_position() {
            let file = relative_to(&self.cwd, position.file);
            properties.push(format!("file={}", escape_property(&file)));
            properties.push(format!("line={}", position.line));
            properties.push(format!("col={}", position.column));
        }
        properties.push(format!("title={}", escape_property(&result.name)));
        format!("::error {}::{}", properties.join(","), escape_data(message))
    }
}

fn relative_to(cwd: &Path, file: &str) -> String {
    let file = file.strip_prefix("file://").unwrap_or(file);
    Path::new(file)
        .strip_prefix(cwd)
        .map_or_else(|_| file.to_string(), |rel| rel.display().to_string())
}

fn escape_data(text: &str) -> String {
    text.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(text: &str) -> String {
    escape_data(text).replace(':', "%3A").replace(',', "%2C")
}

impl Reporter for GithubReporter {
    fn report(&mut self, event: &TestEvent, out: &mut dyn Write) -> io::Result<()> {
        match event {
            TestEvent::Fail(result) if !result.is_suite() && !result.is_todo() => {
                writeln!(out, "{}", self.annotation(result))
            }
            TestEvent::Summary(summary) => {
                let text = format!(
                    "tests {}, pass {}, fail {}, cancelled {}, skipped {}, todo {}",
                    summary.tests,
                    summary.pass,
                    summary.fail,
                    summary.cancelled,
                    summary.skipped,
                    summary.todo
                );
                writeln!(out, "::notice title=Test summary::{}", escape_data(&text))
            }
            _ => Ok(()),
        }
    }
}
