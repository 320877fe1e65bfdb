//! Incremental decoder for the TAP 13 stream written by `node --test`.
//!
//! Subtests are indented four spaces per nesting level and a test point may be
//! followed by a YAML diagnostic block (`---` ... `...`) indented two further
//! spaces. The footer counters at nesting zero fold into the run summary.

use crate::event::{
    Diagnostic, Directive, RunSummary, TestDetails, TestEvent, TestResult, TestStart,
};

const INDENT_PER_LEVEL: usize = 4;

#[derive(Debug, Default)]
pub struct TapParser {
    pending: Option<PendingPoint>,
    yaml: Option<YamlBlock>,
    counted: RunSummary,
    footer: Option<RunSummary>,
    finished: bool,
}

#[derive(Debug)]
struct PendingPoint {
    ok: bool,
    indent: usize,
    result: TestResult,
}

#[derive(Debug)]
struct YamlBlock {
    point: PendingPoint,
    indent: usize,
    lines: Vec<String>,
}

impl TapParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line of engine output and returns the events it completes.
    pub fn push_line(&mut self, line: &str) -> Vec<TestEvent> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut events = Vec::new();

        if let Some(block) = self.yaml.as_mut() {
            if line.trim() == "..." && indent_of(line) == block.indent {
                if let Some(block) = self.yaml.take() {
                    let details = parse_yaml(&block.lines, block.indent);
                    events.push(self.emit_point(block.point, details));
                }
            } else {
                block.lines.push(line.to_string());
            }
            return events;
        }

        if let Some(pending) = self.pending.take() {
            if line.trim() == "---" && indent_of(line) >= pending.indent {
                self.yaml = Some(YamlBlock {
                    point: pending,
                    indent: indent_of(line),
                    lines: Vec::new(),
                });
                return events;
            }
            events.push(self.emit_point(pending, TestDetails::default()));
        }

        self.classify(line, &mut events);
        events
    }

    /// Flushes buffered state and emits the run summary exactly once.
    pub fn finish(&mut self) -> Vec<TestEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.finished = true;
        if let Some(block) = self.yaml.take() {
            let details = parse_yaml(&block.lines, block.indent);
            events.push(self.emit_point(block.point, details));
        }
        if let Some(pending) = self.pending.take() {
            events.push(self.emit_point(pending, TestDetails::default()));
        }
        let summary = self.footer.take().unwrap_or_else(|| self.counted.clone());
        events.push(TestEvent::Summary(summary));
        events
    }

    fn classify(&mut self, line: &str, events: &mut Vec<TestEvent>) {
        let indent = indent_of(line);
        let nesting = indent / INDENT_PER_LEVEL;
        let body = line.trim_start();
        if body.is_empty() || body.starts_with("TAP version") || is_plan(body) {
            return;
        }
        if let Some(name) = body.strip_prefix("# Subtest:") {
            events.push(TestEvent::Start(TestStart {
                name: unescape(name.trim()),
                nesting,
            }));
            return;
        }
        if let Some(result) = parse_test_point(body, nesting) {
            self.pending = Some(PendingPoint {
                ok: result.0,
                indent,
                result: result.1,
            });
            return;
        }
        if let Some(comment) = body.strip_prefix('#') {
            let comment = comment.trim_start();
            if nesting == 0 && self.fold_footer(comment) {
                return;
            }
            events.push(TestEvent::Diagnostic(Diagnostic {
                nesting,
                message: comment.to_string(),
            }));
            return;
        }
        events.push(TestEvent::Diagnostic(Diagnostic {
            nesting,
            message: body.to_string(),
        }));
    }

    fn fold_footer(&mut self, comment: &str) -> bool {
        let Some((key, value)) = comment.split_once(' ') else {
            return false;
        };
        let value = value.trim();
        if key == "duration_ms" {
            let Ok(ms) = value.parse::<f64>() else {
                return false;
            };
            self.footer.get_or_insert_with(RunSummary::default).duration_ms = Some(ms);
            return true;
        }
        let known = matches!(
            key,
            "tests" | "suites" | "pass" | "fail" | "cancelled" | "skipped" | "todo"
        );
        let Ok(count) = value.parse::<u32>() else {
            return false;
        };
        if !known {
            return false;
        }
        let footer = self.footer.get_or_insert_with(RunSummary::default);
        match key {
            "tests" => footer.tests = count,
            "suites" => footer.suites = count,
            "pass" => footer.pass = count,
            "fail" => footer.fail = count,
            "cancelled" => footer.cancelled = count,
            "skipped" => footer.skipped = count,
            _ => footer.todo = count,
        }
        true
    }

    fn emit_point(&mut self, point: PendingPoint, details: TestDetails) -> TestEvent {
        let mut result = point.result;
        result.details = details;
        let counted = &mut self.counted;
        if result.is_suite() {
            counted.suites += 1;
        } else {
            counted.tests += 1;
            match (&result.directive, point.ok) {
                (Some(Directive::Skip(_)), _) => counted.skipped += 1,
                (Some(Directive::Todo(_)), _) => counted.todo += 1,
                (None, true) => counted.pass += 1,
                (None, false) => counted.fail += 1,
            }
        }
        if let Some(ms) = result.details.duration_ms {
            if result.nesting == 0 {
                *counted.duration_ms.get_or_insert(0.0) += ms;
            }
        }
        if point.ok {
            TestEvent::Pass(result)
        } else {
            TestEvent::Fail(result)
        }
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_plan(body: &str) -> bool {
    body.split_once("..").is_some_and(|(start, end)| {
        !start.is_empty()
            && start.bytes().all(|b| b.is_ascii_digit())
            && end
                .split_whitespace()
                .next()
                .is_some_and(|n| n.bytes().all(|b| b.is_ascii_digit()))
    })
}

fn parse_test_point(body: &str, nesting: usize) -> Option<(bool, TestResult)> {
    let (ok, rest) = if let Some(rest) = body.strip_prefix("not ok") {
        (false, rest)
    } else if let Some(rest) = body.strip_prefix("ok") {
        (true, rest)
    } else {
        return None;
    };
    if !(rest.is_empty() || rest.starts_with(' ')) {
        return None;
    }
    let rest = rest.trim_start();
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let test_number = rest[..digits].parse().unwrap_or(0);
    let rest = rest[digits..].trim_start();
    let rest = rest.strip_prefix('-').map_or(rest, str::trim_start);

    let (name, directive) = split_directive(rest);
    Some((
        ok,
        TestResult {
            name: unescape(name.trim_end()),
            nesting,
            test_number,
            directive,
            details: TestDetails::default(),
        },
    ))
}

fn split_directive(text: &str) -> (&str, Option<Directive>) {
    let bytes = text.as_bytes();
    for (idx, _) in text.match_indices('#').rev() {
        if idx > 0 && bytes[idx - 1] == b'\\' {
            continue;
        }
        let tail = text[idx + 1..].trim();
        let upper = tail.to_ascii_uppercase();
        let directive = if upper.starts_with("SKIP") {
            Directive::Skip(reason(&tail[4..]))
        } else if upper.starts_with("TODO") {
            Directive::Todo(reason(&tail[4..]))
        } else {
            continue;
        };
        return (&text[..idx], Some(directive));
    }
    (text, None)
}

fn reason(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| unescape(text))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('#') => out.push('#'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn parse_yaml(lines: &[String], base: usize) -> TestDetails {
    let mut details = TestDetails::default();
    let mut idx = 0;
    while idx < lines.len() {
        let line = &lines[idx];
        idx += 1;
        if indent_of(line) != base {
            continue;
        }
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        let text = if value.is_empty() || matches!(value, "|" | "|-" | ">" | ">-") {
            let start = idx;
            while idx < lines.len()
                && (lines[idx].trim().is_empty() || indent_of(&lines[idx]) > base)
            {
                idx += 1;
            }
            block_text(&lines[start..idx], base)
        } else {
            unquote(value)
        };
        assign(&mut details, key.trim(), text);
    }
    details
}

fn block_text(lines: &[String], base: usize) -> String {
    let strip = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| indent_of(line))
        .min()
        .unwrap_or(base + 2);
    let text = lines
        .iter()
        .map(|line| line.get(strip..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    text.trim_end().to_string()
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace("''", "'");
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return unescape(&value[1..value.len() - 1]).replace("\\\"", "\"");
    }
    value.to_string()
}

fn assign(details: &mut TestDetails, key: &str, value: String) {
    match key {
        "duration_ms" => details.duration_ms = value.parse().ok(),
        "type" => details.kind = Some(value),
        "location" => details.location = Some(value),
        "failureType" => details.failure_type = Some(value),
        "error" => details.error = Some(value),
        "code" => details.code = Some(value),
        "stack" => details.stack = Some(value),
        _ => {
            details.extra.insert(key.to_string(), value);
        }
    }
}
