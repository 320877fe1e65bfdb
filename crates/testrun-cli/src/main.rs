use std::io;
use std::path::Path;

use atty::Stream;
use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use testrun_core::{signals, EnvSnapshot, NodeEngine, Orchestrator, RunConfig, Settings};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod output;
mod style;

use cli::TestRunCli;
use style::Style;

const LOG_ENV: &str = "TESTRUN_LOG";

fn main() -> Result<()> {
    color_eyre::install()?;
    install_exit_on_panic();

    let cli = TestRunCli::parse();
    init_tracing();

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("testrun: {err:#}");
            1
        }
    };
    std::process::exit(code);
}

/// Escaped panics end the process with status 1 once the report is printed.
fn install_exit_on_panic() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        std::process::exit(1);
    }));
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: TestRunCli) -> Result<i32> {
    let settings = Settings::from_snapshot(&EnvSnapshot::capture());
    let cwd = std::env::current_dir().wrap_err("failed to read the working directory")?;
    let stdout_is_terminal = atty::is(Stream::Stdout);
    let config = RunConfig::build(&cli.into_raw(), &settings, &cwd, stdout_is_terminal);
    debug!(?config, ?settings, "resolved run configuration");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start the async runtime")?;
    runtime.block_on(execute(&config, &settings, stdout_is_terminal))
}

async fn execute(config: &RunConfig, settings: &Settings, stdout_is_terminal: bool) -> Result<i32> {
    let engine = NodeEngine::locate(settings)?;
    engine.ensure_supported().await?;
    log_selection(config, engine.program());

    let cancel = CancellationToken::new();
    let listener = signals::install(cancel.clone()).wrap_err("failed to install signal handlers")?;

    let style = Style::new(settings.no_color, stdout_is_terminal);
    let orchestrator = output::reporters(config, settings, style)
        .into_iter()
        .fold(Orchestrator::new(config, &engine), |orchestrator, reporter| {
            orchestrator.with_reporter(reporter)
        });

    let mut out = io::stdout();
    let mut err = io::stderr();
    let report = orchestrator.run(&cancel, &mut out, &mut err).await;
    listener.abort();

    let report = report?;
    debug!(status = ?report.status, failures = report.failures, "exiting");
    Ok(report.status.exit_code())
}

fn log_selection(config: &RunConfig, program: &Path) {
    debug!(
        engine = %program.display(),
        files = config.selection.files().len(),
        patterns = ?config.selection.patterns(),
        reporter = %config.reporter,
        root = %config.root_dir.display(),
        "starting test run"
    );
}
