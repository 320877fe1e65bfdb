use std::io::{self, Write};

use testrun_core::event::TestStart;
use testrun_core::{Reporter, RunSummary, TestEvent, TestResult};

use super::format_duration;
use crate::style::Style;

/// Human-readable tree of results, one line per test.
pub struct SpecReporter {
    style: Style,
    pending: Option<TestStart>,
    failures: Vec<TestResult>,
}

impl SpecReporter {
    pub fn new(style: Style) -> Self {
        Self {
            style,
            pending: None,
            failures: Vec::new(),
        }
    }

    fn result_line(&self, result: &TestResult, passed: bool) -> String {
        let duration = self.style.dimmed(&format_duration(result.details.duration_ms));
        if result.is_skipped() {
            let label = self.style.skip(&format!("﹣ {}", result.name));
            return format!("{label}{duration} # SKIP");
        }
        if result.is_todo() {
            let label = self.style.skip(&format!("﹣ {}", result.name));
            return format!("{label}{duration} # TODO");
        }
        let label = if result.is_suite() {
            let mark = if passed { "▶" } else { "✖" };
            let text = format!("{mark} {}", result.name);
            if passed {
                self.style.info(&text)
            } else {
                self.style.fail(&text)
            }
        } else if passed {
            self.style.pass(&format!("✔ {}", result.name))
        } else {
            self.style.fail(&format!("✖ {}", result.name))
        };
        format!("{label}{duration}")
    }

    fn write_failure(&self, result: &TestResult, out: &mut dyn Write) -> io::Result<()> {
        if let Some(location) = result.details.location.as_deref() {
            writeln!(out, "{}", self.style.dimmed(&format!("test at {location}")))?;
        }
        writeln!(out, "{}", self.style.fail(&format!("✖ {}", result.name)))?;
        for text in [&result.details.error, &result.details.stack]
            .into_iter()
            .flatten()
        {
            for line in text.lines() {
                writeln!(out, "  {line}")?;
            }
        }
        writeln!(out)
    }

    fn write_summary(&self, summary: &RunSummary, out: &mut dyn Write) -> io::Result<()> {
        let rows = [
            ("tests", summary.tests),
            ("suites", summary.suites),
            ("pass", summary.pass),
            ("fail", summary.fail),
            ("cancelled", summary.cancelled),
            ("skipped", summary.skipped),
            ("todo", summary.todo),
        ];
        for (label, count) in rows {
            writeln!(out, "{} {label} {count}", self.style.info("ℹ"))?;
        }
        if let Some(ms) = summary.duration_ms {
            writeln!(out, "{} duration_ms {ms}", self.style.info("ℹ"))?;
        }
        Ok(())
    }
}

fn indent(nesting: usize) -> String {
    "  ".repeat(nesting)
}

impl Reporter for SpecReporter {
    fn report(&mut self, event: &TestEvent, out: &mut dyn Write) -> io::Result<()> {
        match event {
            TestEvent::Start(start) => {
                // A deeper start means the previous one is a suite still running.
                if let Some(parent) = self.pending.take() {
                    if start.nesting > parent.nesting {
                        let header = self.style.info(&format!("▶ {}", parent.name));
                        writeln!(out, "{}{header}", indent(parent.nesting))?;
                    }
                }
                self.pending = Some(start.clone());
            }
            TestEvent::Pass(result) => {
                self.pending = None;
                writeln!(out, "{}{}", indent(result.nesting), self.result_line(result, true))?;
            }
            TestEvent::Fail(result) => {
                self.pending = None;
                writeln!(out, "{}{}", indent(result.nesting), self.result_line(result, false))?;
                if !result.is_suite() && !result.is_todo() {
                    if let Some(error) = result.details.error.as_deref() {
                        for line in error.lines() {
                            writeln!(out, "{}  {line}", indent(result.nesting))?;
                        }
                    }
                    self.failures.push(result.clone());
                }
            }
            TestEvent::Diagnostic(diagnostic) => {
                writeln!(
                    out,
                    "{}{} {}",
                    indent(diagnostic.nesting),
                    self.style.info("ℹ"),
                    diagnostic.message
                )?;
            }
            TestEvent::Summary(summary) => self.write_summary(summary, out)?,
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        writeln!(out, "\n{}\n", self.style.fail_header("✖ failing tests:"))?;
        for result in &self.failures {
            self.write_failure(result, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::{fail, pass, render, skipped, start, suite, summary, todo_fail};

    #[test]
    fn prints_suite_header_before_children() {
        let mut reporter = SpecReporter::new(Style::plain());
        let output = render(
            &mut reporter,
            &[
                start("math", 0),
                start("adds", 1),
                pass("adds", 1),
                suite("math", true),
            ],
        );
        assert_eq!(output, "▶ math\n  ✔ adds (1.5ms)\n▶ math (1.5ms)\n");
    }

    #[test]
    fn failures_are_repeated_after_the_run() {
        let mut reporter = SpecReporter::new(Style::plain());
        let output = render(
            &mut reporter,
            &[start("subtracts", 0), fail("subtracts", 0, "expected 1 to equal 2"), summary()],
        );
        assert!(output.starts_with("✖ subtracts (1.5ms)\n  expected 1 to equal 2\n"));
        assert!(output.contains("ℹ tests 3\n"));
        assert!(output.contains("ℹ fail 1\n"));
        assert!(output.contains("ℹ duration_ms 42\n"));
        let tail = output.split("✖ failing tests:").nth(1).expect("failure section");
        assert!(tail.contains("test at /work/test/math.test.js:3:1"));
        assert!(tail.contains("  at TestContext.<anonymous>"));
    }

    #[test]
    fn skipped_and_todo_are_not_listed_as_failures() {
        let mut reporter = SpecReporter::new(Style::plain());
        let output = render(&mut reporter, &[skipped("later", "flaky"), todo_fail("someday")]);
        assert_eq!(output, "﹣ later (1.5ms) # SKIP\n﹣ someday (1.5ms) # TODO\n");
    }
}
