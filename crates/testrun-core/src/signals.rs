//! Termination signals mapped onto the run's cancellation token.

use std::io;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancels `token` on the first SIGINT or SIGTERM (Ctrl-C on Windows).
///
/// Handlers stay registered for the rest of the process, so later deliveries
/// are absorbed instead of killing the process mid-teardown.
///
/// # Errors
/// Returns an error when the signal handlers cannot be registered.
#[cfg(unix)]
pub fn install(token: CancellationToken) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
            () = token.cancelled() => return,
        };
        warn!(signal = name, "received termination signal; stopping test run");
        token.cancel();
    }))
}

/// Cancels `token` on the first Ctrl-C.
///
/// # Errors
/// Never fails on this platform; the signature matches the unix variant.
#[cfg(not(unix))]
pub fn install(token: CancellationToken) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    warn!(signal = "ctrl-c", "received termination signal; stopping test run");
                    token.cancel();
                }
            }
            () = token.cancelled() => {}
        }
    }))
}
