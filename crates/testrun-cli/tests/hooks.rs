#![cfg(unix)]

use assert_cmd::cargo::cargo_bin_cmd;

mod common;

fn hook(trace: &std::path::Path, label: &str, exit: i32) -> String {
    format!("echo \"{label} TZ=$TZ\" >> {}\nexit {exit}\n", trace.display())
}

#[test]
fn setup_runs_before_and_teardown_after_the_engine() {
    let temp = common::project();
    let root = temp.path();
    let node = common::fake_node(root);
    let trace = root.join("trace.log");
    let tap = common::write(root, "out.tap", common::PASSING_TAP);
    common::write(root, "test/setup.js", &hook(&trace, "setup", 0));
    common::write(root, "test/teardown.mjs", &hook(&trace, "teardown", 0));

    cargo_bin_cmd!("testrun")
        .current_dir(root)
        .env("TESTRUN_NODE", &node)
        .env("TESTRUN_TRACE", &trace)
        .env("FAKE_TAP", &tap)
        .env("TESTRUN_TZ", "Europe/Paris")
        .env_remove("GITHUB_ACTION")
        .assert()
        .success();

    let lines = common::read_trace(&trace);
    assert_eq!(lines.len(), 3, "trace: {lines:?}");
    assert_eq!(lines[0], "setup TZ=Europe/Paris");
    assert_eq!(lines[1], "engine TZ=Europe/Paris");
    assert_eq!(lines[2], "teardown TZ=Europe/Paris");
}

#[test]
fn teardown_runs_after_failing_tests() {
    let temp = common::project();
    let root = temp.path();
    let node = common::fake_node(root);
    let trace = root.join("trace.log");
    let tap = common::write(root, "out.tap", common::FAILING_TAP);
    common::write(root, "test/teardown.js", &hook(&trace, "teardown", 0));

    cargo_bin_cmd!("testrun")
        .current_dir(root)
        .env("TESTRUN_NODE", &node)
        .env("TESTRUN_TRACE", &trace)
        .env("FAKE_TAP", &tap)
        .env("FAKE_EXIT", "1")
        .env_remove("GITHUB_ACTION")
        .assert()
        .code(1);

    let lines = common::read_trace(&trace);
    assert_eq!(lines.last().map(String::as_str), Some("teardown TZ=UTC"));
}

#[test]
fn failing_setup_skips_engine_and_teardown() {
    let temp = common::project();
    let root = temp.path();
    let node = common::fake_node(root);
    let trace = root.join("trace.log");
    common::write(root, "test/setup.js", &hook(&trace, "setup", 3));
    common::write(root, "test/teardown.js", &hook(&trace, "teardown", 0));

    let assert = cargo_bin_cmd!("testrun")
        .current_dir(root)
        .env("TESTRUN_NODE", &node)
        .env("TESTRUN_TRACE", &trace)
        .env_remove("GITHUB_ACTION")
        .env_remove("TESTRUN_TZ")
        .assert()
        .code(1);

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("setup hook"), "stderr: {stderr}");
    assert_eq!(common::read_trace(&trace), ["setup TZ=UTC"]);
}

#[test]
fn root_dir_moves_hook_lookup() {
    let temp = common::project();
    let root = temp.path();
    let node = common::fake_node(root);
    let trace = root.join("trace.log");
    common::write(root, "test/setup.js", &hook(&trace, "wrong", 0));
    common::write(root, "spec/setup.cjs", &hook(&trace, "setup", 0));

    cargo_bin_cmd!("testrun")
        .current_dir(root)
        .env("TESTRUN_NODE", &node)
        .env("TESTRUN_TRACE", &trace)
        .env_remove("GITHUB_ACTION")
        .env_remove("TESTRUN_TZ")
        .args(["--rootDir", "spec"])
        .assert()
        .success();

    let lines = common::read_trace(&trace);
    assert_eq!(lines[0], "setup TZ=UTC");
    assert!(lines.iter().all(|line| !line.starts_with("wrong")));
}

mod real_node {
    use std::time::Duration;

    use super::*;

    #[test]
    fn environment_set_by_setup_reaches_the_tests() {
        let Some(node) = common::supported_node() else {
            eprintln!("skipping node run (node 22.10 or newer not found)");
            return;
        };
        let temp = common::project();
        let root = temp.path();
        common::write(
            root,
            "test/setup.mjs",
            "export default async () => { process.env.FROM_SETUP = 'yes'; };\n",
        );
        common::write(
            root,
            "test/env.test.js",
            "const test = require('node:test');\n\
             const assert = require('node:assert');\n\
             test('sees setup env', () => assert.strictEqual(process.env.FROM_SETUP, 'yes'));\n",
        );

        let assert = cargo_bin_cmd!("testrun")
            .current_dir(root)
            .env("TESTRUN_NODE", &node)
            .env_remove("GITHUB_ACTION")
            .env_remove("FROM_SETUP")
            .args(["--reporter", "tap", "test/env.test.js"])
            .timeout(Duration::from_secs(60))
            .assert();
        let output = assert.get_output();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        assert_eq!(output.status.code(), Some(0), "stdout: {stdout}\nstderr: {stderr}");
        assert!(stdout.contains("ok 1 - sees setup env"), "stdout: {stdout}");
    }

    #[test]
    fn server_opened_by_setup_is_closed_by_teardown() {
        let Some(node) = common::supported_node() else {
            eprintln!("skipping node run (node 22.10 or newer not found)");
            return;
        };
        let temp = common::project();
        let root = temp.path();
        common::write(
            root,
            "test/setup.mjs",
            "import { createServer } from 'node:http';\n\
             export default async () => {\n\
               const server = createServer((req, res) => res.end('pong'));\n\
               await new Promise((resolve) => server.listen(0, '127.0.0.1', resolve));\n\
               globalThis.server = server;\n\
               process.env.SERVER_PORT = String(server.address().port);\n\
             };\n",
        );
        common::write(
            root,
            "test/teardown.mjs",
            "export default () => new Promise((resolve) => globalThis.server.close(resolve));\n",
        );
        common::write(
            root,
            "test/server.test.js",
            "const test = require('node:test');\n\
             const assert = require('node:assert');\n\
             test('reaches the server', async () => {\n\
               const res = await fetch(`http://127.0.0.1:${process.env.SERVER_PORT}/`);\n\
               assert.strictEqual(await res.text(), 'pong');\n\
             });\n",
        );

        let assert = cargo_bin_cmd!("testrun")
            .current_dir(root)
            .env("TESTRUN_NODE", &node)
            .env_remove("GITHUB_ACTION")
            .args(["--reporter", "tap", "test/server.test.js"])
            .timeout(Duration::from_secs(60))
            .assert();
        let output = assert.get_output();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        assert_eq!(output.status.code(), Some(0), "stdout: {stdout}\nstderr: {stderr}");
        assert!(stdout.contains("ok 1 - reaches the server"), "stdout: {stdout}");
    }
}
