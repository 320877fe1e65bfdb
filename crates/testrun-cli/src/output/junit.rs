use std::io::{self, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use testrun_core::event::Directive;
use testrun_core::{Reporter, RunSummary, TestEvent, TestResult};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const ROOT_CLASSNAME: &str = "testrun";

struct Case {
    name: String,
    classname: String,
    seconds: f64,
    outcome: Outcome,
}

enum Outcome {
    Passed,
    Skipped(Option<String>),
    Failed {
        message: String,
        kind: String,
        body: String,
    },
}

/// Buffers results and writes one JUnit XML document when the stream ends.
pub struct JunitReporter {
    started: OffsetDateTime,
    parents: Vec<String>,
    cases: Vec<Case>,
    diagnostics: Vec<String>,
    summary: Option<RunSummary>,
}

impl JunitReporter {
    pub fn new() -> Self {
        Self::starting_at(OffsetDateTime::now_utc())
    }

    fn starting_at(started: OffsetDateTime) -> Self {
        Self {
            started,
            parents: Vec::new(),
            cases: Vec::new(),
            diagnostics: Vec::new(),
            summary: None,
        }
    }

    fn record(&mut self, result: &TestResult, passed: bool) {
        self.parents.truncate(result.nesting);
        if result.is_suite() {
            return;
        }
        let classname = if self.parents.is_empty() {
            ROOT_CLASSNAME.to_string()
        } else {
            self.parents.join(" > ")
        };
        let outcome = if result.is_skipped() || result.is_todo() {
            Outcome::Skipped(match &result.directive {
                Some(Directive::Skip(reason)) => reason.clone(),
                Some(Directive::Todo(reason)) => {
                    Some(reason.clone().unwrap_or_else(|| "todo".to_string()))
                }
                None => None,
            })
        } else if passed {
            Outcome::Passed
        } else {
            let details = &result.details;
            let message = details
                .error
                .as_deref()
                .and_then(|error| error.lines().next())
                .unwrap_or("test failed")
                .to_string();
            let body = [details.error.as_deref(), details.stack.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("\n");
            Outcome::Failed {
                message,
                kind: details
                    .failure_type
                    .clone()
                    .unwrap_or_else(|| "testCodeFailure".to_string()),
                body,
            }
        };
        self.cases.push(Case {
            name: result.name.clone(),
            classname,
            seconds: result.details.duration_ms.unwrap_or(0.0) / 1000.0,
            outcome,
        });
    }

    fn render(&self) -> io::Result<Vec<u8>> {
        let timestamp = self
            .started
            .format(&Rfc3339)
            .map_err(io::Error::other)?;
        let failures = self
            .cases
            .iter()
            .filter(|case| matches!(case.outcome, Outcome::Failed { .. }))
            .count()
            .to_string();
        let skipped = self
            .cases
            .iter()
            .filter(|case| matches!(case.outcome, Outcome::Skipped(_)))
            .count()
            .to_string();
        let tests = self.cases.len().to_string();
        let seconds = self
            .summary
            .as_ref()
            .and_then(|summary| summary.duration_ms)
            .map_or_else(|| self.cases.iter().map(|case| case.seconds).sum(), |ms| ms / 1000.0)
            .to_string();

        let mut xml = Writer::new_with_indent(Vec::new(), b' ', 2);
        emit(&mut xml, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        let counts = [
            ("tests", tests.as_str()),
            ("failures", failures.as_str()),
            ("skipped", skipped.as_str()),
            ("time", seconds.as_str()),
        ];
        emit(
            &mut xml,
            Event::Start(BytesStart::new("testsuites").with_attributes(counts)),
        )?;
        emit(
            &mut xml,
            Event::Start(
                BytesStart::new("testsuite")
                    .with_attributes([("name", ROOT_CLASSNAME)])
                    .with_attributes(counts)
                    .with_attributes([("timestamp", timestamp.as_str())]),
            ),
        )?;
        for case in &self.cases {
            let time = case.seconds.to_string();
            let testcase = BytesStart::new("testcase").with_attributes([
                ("name", printable(&case.name).as_str()),
                ("classname", printable(&case.classname).as_str()),
                ("time", time.as_str()),
            ]);
            match &case.outcome {
                Outcome::Passed => emit(&mut xml, Event::Empty(testcase))?,
                Outcome::Skipped(reason) => {
                    emit(&mut xml, Event::Start(testcase))?;
                    let mut skip = BytesStart::new("skipped");
                    if let Some(reason) = reason {
                        skip.push_attribute(("message", printable(reason).as_str()));
                    }
                    emit(&mut xml, Event::Empty(skip))?;
                    emit(&mut xml, Event::End(BytesEnd::new("testcase")))?;
                }
                Outcome::Failed {
                    message,
                    kind,
                    body,
                } => {
                    emit(&mut xml, Event::Start(testcase))?;
                    let failure = BytesStart::new("failure").with_attributes([
                        ("message", printable(message).as_str()),
                        ("type", printable(kind).as_str()),
                    ]);
                    emit(&mut xml, Event::Start(failure))?;
                    emit(&mut xml, Event::Text(BytesText::new(&printable(body))))?;
                    emit(&mut xml, Event::End(BytesEnd::new("failure")))?;
                    emit(&mut xml, Event::End(BytesEnd::new("testcase")))?;
                }
            }
        }
        if !self.diagnostics.is_empty() {
            emit(&mut xml, Event::Start(BytesStart::new("system-out")))?;
            let text = printable(&self.diagnostics.join("\n"));
            emit(&mut xml, Event::Text(BytesText::new(&text)))?;
            emit(&mut xml, Event::End(BytesEnd::new("system-out")))?;
        }
        emit(&mut xml, Event::End(BytesEnd::new("testsuite")))?;
        emit(&mut xml, Event::End(BytesEnd::new("testsuites")))?;
        let mut document = xml.into_inner();
        document.push(b'\n');
        Ok(document)
    }
}

fn emit(xml: &mut Writer<Vec<u8>>, event: Event<'_>) -> io::Result<()> {
    xml.write_event(event).map_err(io::Error::other)
}

/// Drops control characters XML 1.0 cannot carry.
fn printable(text: &str) -> String {
    text.chars()
        .filter(|ch| !ch.is_control() || matches!(ch, '\n' | '\t' | '\r'))
        .collect()
}

impl Reporter for JunitReporter {
    fn report(&mut self, event: &TestEvent, _out: &mut dyn Write) -> io::Result<()> {
        match event {
            TestEvent::Start(start) => {
                self.parents.truncate(start.nesting);
                self.parents.push(start.name.clone());
            }
            TestEvent::Pass(result) => self.record(result, true),
            TestEvent::Fail(result) => self.record(result, false),
            TestEvent::Diagnostic(diagnostic) => self.diagnostics.push(diagnostic.message.clone()),
            TestEvent::Summary(summary) => self.summary = Some(summary.clone()),
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.render()?)
    }
}
