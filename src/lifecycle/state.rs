//! Generator state machine
//!
//! ```text
//! Idle ──run()──► Starting ──setup ok──► Running ──► Stopped
//!                     │                                ▲
//!                     └──────────setup failed──────────┘
//! ```
//! `Starting` is internal; callers observe it as `Idle` since the generator
//! has not entered the running state yet.

/// Observable generator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Created, `run()` not accepted yet
    Idle,
    /// Receive loop active
    Running,
    /// Terminal, a new generator is needed for another run
    Stopped,
}

impl std::fmt::Display for GeneratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorState::Idle => write!(f, "idle"),
            GeneratorState::Running => write!(f, "running"),
            GeneratorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Internal phase, one step finer than [`GeneratorState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Starting,
    Running,
    Stopped,
}

impl Phase {
    pub(crate) fn observed(self) -> GeneratorState {
        match self {
            Phase::Idle | Phase::Starting => GeneratorState::Idle,
            Phase::Running => GeneratorState::Running,
            Phase::Stopped => GeneratorState::Stopped,
        }
    }

    /// Whether setup has finished one way or the other
    pub(crate) fn is_settled(self) -> bool {
        matches!(self, Phase::Running | Phase::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observed_state() {
        assert_eq!(Phase::Idle.observed(), GeneratorState::Idle);
        assert_eq!(Phase::Starting.observed(), GeneratorState::Idle);
        assert_eq!(Phase::Running.observed(), GeneratorState::Running);
        assert_eq!(Phase::Stopped.observed(), GeneratorState::Stopped);
    }

    #[test]
    fn test_settled() {
        assert!(!Phase::Idle.is_settled());
        assert!(!Phase::Starting.is_settled());
        assert!(Phase::Running.is_settled());
        assert!(Phase::Stopped.is_settled());
    }
}
