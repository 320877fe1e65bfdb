use assert_cmd::cargo::cargo_bin_cmd;

mod common;

fn help_output(args: &[&str]) -> String {
    let assert = cargo_bin_cmd!("testrun").args(args).assert().success();
    String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 help")
}

#[test]
fn help_lists_every_option() {
    let output = help_output(&["--help"]);
    for flag in [
        "--concurrency",
        "--expose-gc",
        "--watch",
        "--pattern",
        "--coverage",
        "--reporter",
        "--lines",
        "--branches",
        "--functions",
        "--name",
        "--timeout",
        "--only",
        "--forceExit",
        "--rootDir",
    ] {
        assert!(output.contains(flag), "help missing {flag}: {output}");
    }
    assert!(output.contains("setup.js"), "help missing hooks: {output}");
    assert!(output.contains("GITHUB_ACTION"), "help missing env: {output}");
}

#[test]
fn short_help_matches_long_help() {
    assert_eq!(help_output(&["-h"]), help_output(&["--help"]));
}

#[cfg(unix)]
#[test]
fn help_runs_neither_hooks_nor_tests() {
    let temp = common::project();
    let root = temp.path();
    let node = common::fake_node(root);
    let trace = root.join("trace.log");
    common::write(root, "test/setup.js", &format!("echo setup >> {}\n", trace.display()));

    cargo_bin_cmd!("testrun")
        .current_dir(root)
        .env("TESTRUN_NODE", &node)
        .env("TESTRUN_TRACE", &trace)
        .arg("--help")
        .assert()
        .success();

    assert!(common::read_trace(&trace).is_empty());
}
