use clap::{ArgAction, Parser};
use testrun_core::RawOptions;

pub const TESTRUN_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nArguments:\n{positionals}\n\nOptions:\n{options}\n{after-help}";

pub const TESTRUN_BEFORE_HELP: &str = concat!(
    "testrun ",
    env!("CARGO_PKG_VERSION"),
    " – run node:test suites with global setup and teardown\n\n",
    "Test files are selected by glob patterns, or by explicit FILE arguments\n",
    "which then replace the patterns entirely.",
);

pub const TESTRUN_AFTER_HELP: &str = concat!(
    "\x1b[1;36mHooks\x1b[0m\n",
    "  <rootDir>/setup.js       Default export awaited before the first test.\n",
    "  <rootDir>/teardown.js    Default export awaited after the run ends, also on Ctrl-C.\n\n",
    "\x1b[1;36mEnvironment\x1b[0m\n",
    "  GITHUB_ACTION            Add GitHub annotations for failing tests.\n",
    "  npm_lifecycle_script     \"tsx\" switches the default patterns to include TypeScript.\n",
    "  TESTRUN_NODE             Node binary to run, 22.10 or newer (default: node on PATH).\n",
    "  TESTRUN_TZ               Timezone forced on tests and hooks (default: UTC).\n",
    "  TESTRUN_LOG              Log filter, e.g. debug (default: warn).\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "testrun",
    version,
    before_help = TESTRUN_BEFORE_HELP,
    after_help = TESTRUN_AFTER_HELP,
    help_template = TESTRUN_HELP_TEMPLATE,
    override_usage = "testrun [OPTIONS] [FILE]..."
)]
#[allow(clippy::struct_excessive_bools)]
pub struct TestRunCli {
    #[arg(
        short = 'c',
        long,
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = "",
        help = "Tests run in parallel (default: available cores - 1)"
    )]
    pub concurrency: Option<String>,
    #[arg(long = "expose-gc", help = "Start the test processes with --expose-gc")]
    pub expose_gc: bool,
    #[arg(short = 'w', long, help = "Re-run tests when files change")]
    pub watch: bool,
    #[arg(
        short = 'p',
        long = "pattern",
        value_name = "GLOB",
        action = ArgAction::Append,
        num_args = 0..=1,
        default_missing_value = "",
        help = "Glob selecting test files (repeatable)"
    )]
    pub patterns: Vec<String>,
    #[arg(short = 'C', long, help = "Collect coverage and enforce thresholds")]
    pub coverage: bool,
    #[arg(
        short = 'r',
        long,
        value_name = "NAME",
        num_args = 0..=1,
        default_missing_value = "",
        help = "Reporter: spec, tap, dot or junit (default: spec on a terminal, tap otherwise)"
    )]
    pub reporter: Option<String>,
    #[arg(long, value_name = "PCT", num_args = 0..=1, default_missing_value = "", help = "Line coverage threshold (default: 90)")]
    pub lines: Option<String>,
    #[arg(long, value_name = "PCT", num_args = 0..=1, default_missing_value = "", help = "Branch coverage threshold (default: 90)")]
    pub branches: Option<String>,
    #[arg(long, value_name = "PCT", num_args = 0..=1, default_missing_value = "", help = "Function coverage threshold (default: 90)")]
    pub functions: Option<String>,
    #[arg(
        short = 'n',
        long,
        value_name = "PATTERN",
        num_args = 0..=1,
        default_missing_value = "",
        help = "Only run tests whose name matches"
    )]
    pub name: Option<String>,
    #[arg(
        short = 't',
        long,
        value_name = "MS",
        num_args = 0..=1,
        default_missing_value = "",
        help = "Per-test timeout in milliseconds (default: 30000)"
    )]
    pub timeout: Option<String>,
    #[arg(short = 'o', long, help = "Only run tests marked with `only`")]
    pub only: bool,
    #[arg(short = 'F', long = "forceExit", help = "Exit once all known tests have finished")]
    pub force_exit: bool,
    #[arg(
        long = "rootDir",
        value_name = "DIR",
        num_args = 0..=1,
        default_missing_value = "",
        help = "Where setup/teardown hooks live (default: test)"
    )]
    pub root_dir: Option<String>,
    #[arg(value_name = "FILE", help = "Explicit test files; disables --pattern")]
    pub files: Vec<String>,
}

impl TestRunCli {
    pub fn into_raw(self) -> RawOptions {
        RawOptions {
            concurrency: self.concurrency,
            expose_gc: self.expose_gc,
            watch: self.watch,
            patterns: self.patterns,
            coverage: self.coverage,
            reporter: self.reporter,
            lines: self.lines,
            branches: self.branches,
            functions: self.functions,
            name: self.name,
            timeout: self.timeout,
            only: self.only,
            force_exit: self.force_exit,
            root_dir: self.root_dir,
            files: self.files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> RawOptions {
        let mut argv = vec!["testrun"];
        argv.extend_from_slice(args);
        TestRunCli::try_parse_from(argv).expect("parse").into_raw()
    }

    #[test]
    fn command_definition_is_consistent() {
        TestRunCli::command().debug_assert();
    }

    #[test]
    fn short_aliases_map_to_options() {
        let raw = parse(&[
            "-c", "2", "-w", "-p", "a/*.test.js", "-p", "b/*.test.js", "-C", "-r", "dot", "-n",
            "adds", "-t", "100", "-o", "-F",
        ]);
        assert_eq!(raw.concurrency.as_deref(), Some("2"));
        assert!(raw.watch);
        assert_eq!(raw.patterns, ["a/*.test.js", "b/*.test.js"]);
        assert!(raw.coverage);
        assert_eq!(raw.reporter.as_deref(), Some("dot"));
        assert_eq!(raw.name.as_deref(), Some("adds"));
        assert_eq!(raw.timeout.as_deref(), Some("100"));
        assert!(raw.only);
        assert!(raw.force_exit);
        assert!(raw.files.is_empty());
    }

    #[test]
    fn long_flags_and_positionals() {
        let raw = parse(&[
            "--expose-gc",
            "--lines=70",
            "--branches",
            "60",
            "--functions",
            "50",
            "--rootDir",
            "spec",
            "one.test.js",
            "two.test.js",
        ]);
        assert!(raw.expose_gc);
        assert_eq!(raw.lines.as_deref(), Some("70"));
        assert_eq!(raw.branches.as_deref(), Some("60"));
        assert_eq!(raw.functions.as_deref(), Some("50"));
        assert_eq!(raw.root_dir.as_deref(), Some("spec"));
        assert_eq!(raw.files, ["one.test.js", "two.test.js"]);
    }

    #[test]
    fn missing_values_do_not_fail() {
        let raw = parse(&["--timeout", "--concurrency", "--name", "--pattern", "--rootDir"]);
        assert_eq!(raw.timeout.as_deref(), Some(""));
        assert_eq!(raw.concurrency.as_deref(), Some(""));
        assert_eq!(raw.name.as_deref(), Some(""));
        assert_eq!(raw.patterns, [""]);
        assert_eq!(raw.root_dir.as_deref(), Some(""));
        assert!(raw.files.is_empty());
    }

    #[test]
    fn malformed_values_are_passed_through_for_normalizing() {
        let raw = parse(&["--concurrency", "many", "--lines", "abc"]);
        assert_eq!(raw.concurrency.as_deref(), Some("many"));
        assert_eq!(raw.lines.as_deref(), Some("abc"));
    }
}
