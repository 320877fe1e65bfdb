use std::io::{self, Write};

use testrun_core::event::Directive;
use testrun_core::{Reporter, TestEvent, TestResult};

const INDENT: &str = "    ";

/// Re-emits the stream as TAP version 13.
#[derive(Default)]
pub struct TapReporter {
    started: bool,
    top_level: u32,
}

impl TapReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn header(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if !self.started {
            self.started = true;
            writeln!(out, "TAP version 13")?;
        }
        Ok(())
    }

    fn point(&mut self, result: &TestResult, ok: bool, out: &mut dyn Write) -> io::Result<()> {
        let pad = INDENT.repeat(result.nesting);
        if result.nesting == 0 {
            self.top_level += 1;
        }
        let status = if ok { "ok" } else { "not ok" };
        let directive = match &result.directive {
            Some(Directive::Skip(reason)) => format!(" # SKIP{}", reason_suffix(reason.as_deref())),
            Some(Directive::Todo(reason)) => format!(" # TODO{}", reason_suffix(reason.as_deref())),
            None => String::new(),
        };
        writeln!(
            out,
            "{pad}{status} {} - {}{directive}",
            result.test_number,
            escape(&result.name)
        )?;

        let details = &result.details;
        let yaml_pad = format!("{pad}  ");
        writeln!(out, "{yaml_pad}---")?;
        if let Some(ms) = details.duration_ms {
            writeln!(out, "{yaml_pad}duration_ms: {ms}")?;
        }
        if let Some(kind) = details.kind.as_deref() {
            writeln!(out, "{yaml_pad}type: '{kind}'")?;
        }
        if let Some(location) = details.location.as_deref() {
            writeln!(out, "{yaml_pad}location: '{}'", location.replace('\'', "''"))?;
        }
        if let Some(failure_type) = details.failure_type.as_deref() {
            writeln!(out, "{yaml_pad}failureType: '{failure_type}'")?;
        }
        for (key, value) in [
            ("error", &details.error),
            ("code", &details.code),
            ("stack", &details.stack),
        ] {
            if let Some(value) = value {
                write_scalar(out, &yaml_pad, key, value)?;
            }
        }
        for (key, value) in &details.extra {
            write_scalar(out, &yaml_pad, key, value)?;
        }
        writeln!(out, "{yaml_pad}...")
    }
}

fn reason_suffix(reason: Option<&str>) -> String {
    reason.map(|reason| format!(" {}", escape(reason))).unwrap_or_default()
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('#', "\\#")
        .replace('\n', "\\n")
}

fn write_scalar(out: &mut dyn Write, pad: &str, key: &str, value: &str) -> io::Result<()> {
    if value.contains('\n') {
        writeln!(out, "{pad}{key}: |-")?;
        for line in value.lines() {
            writeln!(out, "{pad}  {line}")?;
        }
        Ok(())
    } else {
        writeln!(out, "{pad}{key}: '{}'", value.replace('\'', "''"))
    }
}

impl Reporter for TapReporter {
    fn report(&mut self, event: &TestEvent, out: &mut dyn Write) -> io::Result<()> {
        self.header(out)?;
        match event {
            TestEvent::Start(start) => {
                writeln!(
                    out,
                    "{}# Subtest: {}",
                    INDENT.repeat(start.nesting),
                    escape(&start.name)
                )
            }
            TestEvent::Pass(result) => self.point(result, true, out),
            TestEvent::Fail(result) => self.point(result, false, out),
            TestEvent::Diagnostic(diagnostic) => writeln!(
                out,
                "{}# {}",
                INDENT.repeat(diagnostic.nesting),
                diagnostic.message
            ),
            TestEvent::Summary(summary) => {
                writeln!(out, "1..{}", self.top_level)?;
                writeln!(out, "# tests {}", summary.tests)?;
                writeln!(out, "# suites {}", summary.suites)?;
                writeln!(out, "# pass {}", summary.pass)?;
                writeln!(out, "# fail {}", summary.fail)?;
                writeln!(out, "# cancelled {}", summary.cancelled)?;
                writeln!(out, "# skipped {}", summary.skipped)?;
                writeln!(out, "# todo {}", summary.todo)?;
                if let Some(ms) = summary.duration_ms {
                    writeln!(out, "# duration_ms {ms}")?;
                }
                Ok(())
            }
        }
    }
}
