use std::fmt;

/// Lifecycle of one run. Stages only move forward; `Failed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ManifestsLoaded,
    BackendReady,
    ContextReady,
    GraphsComposed,
    GraphsFinalized,
    Executing,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Idle => "idle",
            RunState::ManifestsLoaded => "manifests loaded",
            RunState::BackendReady => "backend ready",
            RunState::ContextReady => "context ready",
            RunState::GraphsComposed => "graphs composed",
            RunState::GraphsFinalized => "graphs finalized",
            RunState::Executing => "executing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        })
    }
}
