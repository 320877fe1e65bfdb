//! Test-execution engine seam and the result stream it produces.

pub mod node;
pub mod tap;

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::error::EngineError;
use crate::event::TestEvent;
use crate::hooks::{HookKind, HookSet};

pub use node::NodeEngine;

const EVENT_BUFFER: usize = 256;

/// Something that can run a test suite and stream back its events.
pub trait Engine {
    /// Starts a run. Must be called from inside a tokio runtime.
    ///
    /// The engine awaits `hooks.setup` before any test starts and
    /// `hooks.teardown` once after its stream has ended, in the same process
    /// that runs the tests, including when the stream is destroyed.
    ///
    /// # Errors
    /// Returns an error when the engine cannot be started.
    fn start(&self, config: &RunConfig, hooks: &HookSet) -> Result<ResultStream, EngineError>;
}

/// How the engine's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineExit {
    pub code: Option<i32>,
    pub cancelled: bool,
    /// Set when a hook threw or rejected.
    pub failed_hook: Option<HookKind>,
}

impl EngineExit {
    #[must_use]
    pub fn success(&self) -> bool {
        !self.cancelled && self.failed_hook.is_none() && self.code == Some(0)
    }
}

/// Events of one run, fed by a producer task.
///
/// The stream ends once the producer finishes, either naturally or after
/// [`ResultStream::destroy`]; in both cases the producer emits the trailing
/// summary before closing.
pub struct ResultStream {
    events: mpsc::Receiver<TestEvent>,
    cancel: CancellationToken,
    producer: JoinHandle<Result<EngineExit, EngineError>>,
}

impl ResultStream {
    pub fn spawn<F, Fut>(produce: F) -> Self
    where
        F: FnOnce(mpsc::Sender<TestEvent>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<EngineExit, EngineError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let producer = tokio::spawn(produce(tx, cancel.clone()));
        Self {
            events: rx,
            cancel,
            producer,
        }
    }

    pub async fn next(&mut self) -> Option<TestEvent> {
        self.events.recv().await
    }

    /// Forcibly ends the run. Idempotent.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the producer and reports how the engine exited.
    ///
    /// # Errors
    /// Returns the producer's error, or [`EngineError::Panicked`] when the
    /// producer task panicked.
    pub async fn finished(self) -> Result<EngineExit, EngineError> {
        drop(self.events);
        match self.producer.await {
            Ok(result) => result,
            Err(err) => Err(EngineError::Panicked(err.to_string())),
        }
    }
}
