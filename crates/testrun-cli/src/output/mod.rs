//! Reporter implementations selected by `--reporter`.

mod dot;
mod github;
mod junit;
mod spec;
mod tap;

use testrun_core::{Reporter, ReporterKind, RunConfig, Settings};

use self::dot::DotReporter;
use self::github::GithubReporter;
use self::junit::JunitReporter;
use self::spec::SpecReporter;
use self::tap::TapReporter;
use crate::style::Style;

/// The selected reporter, followed by the GitHub annotator when running
/// inside a GitHub Action.
pub fn reporters(config: &RunConfig, settings: &Settings, style: Style) -> Vec<Box<dyn Reporter>> {
    let primary: Box<dyn Reporter> = match config.reporter {
        ReporterKind::Spec => Box::new(SpecReporter::new(style)),
        ReporterKind::Tap => Box::new(TapReporter::new()),
        ReporterKind::Dot => Box::new(DotReporter::new(style)),
        ReporterKind::Junit => Box::new(JunitReporter::new()),
    };
    let mut list = vec![primary];
    if settings.ci_annotations {
        list.push(Box::new(GithubReporter::new(config.cwd.clone())));
    }
    list
}

pub(crate) fn format_duration(duration_ms: Option<f64>) -> String {
    duration_ms.map_or_else(String::new, |ms| format!(" ({ms}ms)"))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use testrun_core::event::{Directive, TestDetails, TestStart};
    use testrun_core::{RunSummary, TestEvent, TestResult};

    pub fn start(name: &str, nesting: usize) -> TestEvent {
        TestEvent::Start(TestStart {
            name: name.into(),
            nesting,
        })
    }

    pub fn result(name: &str, nesting: usize) -> TestResult {
        TestResult {
            name: name.into(),
            nesting,
            test_number: 1,
            directive: None,
            details: TestDetails {
                duration_ms: Some(1.5),
                kind: Some("test".into()),
                ..TestDetails::default()
            },
        }
    }

    pub fn pass(name: &str, nesting: usize) -> TestEvent {
        TestEvent::Pass(result(name, nesting))
    }

    pub fn fail(name: &str, nesting: usize, error: &str) -> TestEvent {
        let mut result = result(name, nesting);
        result.details.error = Some(error.into());
        result.details.failure_type = Some("testCodeFailure".into());
        result.details.location = Some("/work/test/math.test.js:3:1".into());
        result.details.stack = Some("at TestContext.<anonymous> (/work/test/math.test.js:4:10)".into());
        TestEvent::Fail(result)
    }

    pub fn skipped(name: &str, reason: &str) -> TestEvent {
        let mut result = result(name, 0);
        result.directive = Some(Directive::Skip(Some(reason.into())));
        TestEvent::Pass(result)
    }

    pub fn todo_fail(name: &str) -> TestEvent {
        let mut result = result(name, 0);
        result.directive = Some(Directive::Todo(None));
        TestEvent::Fail(result)
    }

    pub fn suite(name: &str, passed: bool) -> TestEvent {
        let mut result = result(name, 0);
        result.details.kind = Some("suite".into());
        if passed {
            TestEvent::Pass(result)
        } else {
            TestEvent::Fail(result)
        }
    }

    pub fn summary() -> TestEvent {
        TestEvent::Summary(RunSummary {
            tests: 3,
            suites: 1,
            pass: 2,
            fail: 1,
            cancelled: 0,
            skipped: 0,
            todo: 0,
            duration_ms: Some(42.0),
        })
    }

    pub fn render(reporter: &mut dyn testrun_core::Reporter, events: &[TestEvent]) -> String {
        let mut out = Vec::new();
        for event in events {
            reporter.report(event, &mut out).expect("report");
        }
        reporter.finish(&mut out).expect("finish");
        String::from_utf8(out).expect("utf8")
    }
}
