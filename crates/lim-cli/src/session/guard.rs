//! Single-fire arbitration between completion paths

use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;

use super::signal::TerminationSignal;
use lim_core::exit::EXIT_FAILURE;

/// How a command invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The remote side reported this exit code
    Completed(i32),
    /// The operator interrupted the invocation
    Signalled(TerminationSignal),
    /// The session broke before a result arrived
    Failed,
}

impl Termination {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Termination::Completed(code) => *code,
            Termination::Signalled(signal) => signal.exit_code(),
            Termination::Failed => EXIT_FAILURE,
        }
    }
}

/// Records whichever outcome is settled first and ignores the rest
#[derive(Debug, Default)]
pub struct CompletionGuard {
    outcome: OnceLock<Termination>,
    done: CancellationToken,
}

impl CompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle the outcome. Returns `false` if another path already won.
    pub fn settle(&self, termination: Termination) -> bool {
        if self.outcome.set(termination).is_ok() {
            self.done.cancel();
            true
        } else {
            false
        }
    }

    pub fn outcome(&self) -> Option<Termination> {
        self.outcome.get().copied()
    }

    /// Resolves once any path has settled
    pub async fn settled(&self) -> Termination {
        self.done.cancelled().await;
        // set() always happens before cancel()
        self.outcome().unwrap_or(Termination::Failed)
    }
}
