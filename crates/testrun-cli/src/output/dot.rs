use std::io::{self, Write};

use testrun_core::{Reporter, TestEvent, TestResult};

use crate::style::Style;

const LINE_WIDTH: usize = 80;

/// One character per finished test: `.` passed, `X` failed.
pub struct DotReporter {
    style: Style,
    column: usize,
    failures: Vec<TestResult>,
}

impl DotReporter {
    pub fn new(style: Style) -> Self {
        Self {
            style,
            column: 0,
            failures: Vec::new(),
        }
    }

    fn mark(&mut self, text: String, out: &mut dyn Write) -> io::Result<()> {
        write!(out, "{text}")?;
        self.column += 1;
        if self.column == LINE_WIDTH {
            self.column = 0;
            writeln!(out)?;
        }
        Ok(())
    }
}

impl Reporter for DotReporter {
    fn report(&mut self, event: &TestEvent, out: &mut dyn Write) -> io::Result<()> {
        match event {
            TestEvent::Pass(result) if !result.is_suite() => {
                let dot = self.style.pass(".");
                self.mark(dot, out)
            }
            TestEvent::Fail(result) if !result.is_suite() => {
                if !result.is_todo() {
                    self.failures.push(result.clone());
                }
                let cross = self.style.fail("X");
                self.mark(cross, out)
            }
            _ => Ok(()),
        }
    }

    fn finish(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.column > 0 {
            writeln!(out)?;
            self.column = 0;
        }
        if self.failures.is_empty() {
            return Ok(());
        }
        writeln!(out, "{}", self.style.fail_header("Failed tests:"))?;
        writeln!(out)?;
        for result in &self.failures {
            writeln!(out, "{}", self.style.fail(&format!("✖ {}", result.name)))?;
            if let Some(error) = result.details.error.as_deref() {
                for line in error.lines() {
                    writeln!(out, "  {line}")?;
                }
            }
            if let Some(location) = result.details.location.as_deref() {
                writeln!(out, "  {}", self.style.dimmed(&format!("at {location}")))?;
            }
        }
        Ok(())
    }
}
