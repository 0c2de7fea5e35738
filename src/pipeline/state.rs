use std::fmt;

/// Where a run is. `EmptyExit`, `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Authenticating,
    Fetching,
    EmptyExit,
    Summarizing,
    Sending,
    Acknowledging,
    Done,
    Failed,
}

impl RunState {
    /// The transition table. `Acknowledging` is only entered from `Sending`.
    pub fn permits(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Authenticating)
                | (Idle, Failed)
                | (Authenticating, Fetching)
                | (Authenticating, Failed)
                | (Fetching, EmptyExit)
                | (Fetching, Summarizing)
                | (Fetching, Failed)
                | (Summarizing, Sending)
                | (Summarizing, Failed)
                | (Sending, Acknowledging)
                | (Sending, Failed)
                | (Acknowledging, Done)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
