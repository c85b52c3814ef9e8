//! Pipeline lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline lifecycle state
///
/// `Created -> Running -> {Paused <-> Running} -> Stopped`. `Stopped` is
/// terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Stages may still be appended
    #[default]
    Created,
    /// Dispatcher is forwarding input
    Running,
    /// Dispatcher and stages hold their input until resumed
    Paused,
    /// Every task has terminated; the pipeline cannot be reused
    Stopped,
}

impl PipelineState {
    /// Whether `pause` is a legal transition from this state
    pub fn can_pause(self) -> bool {
        self == Self::Running
    }

    /// Whether `resume` is legal (possibly a no-op) from this state
    pub fn can_resume(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Whether `stop` is legal from this state
    pub fn can_stop(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Whether the state is terminal
    pub fn is_stopped(self) -> bool {
        self == Self::Stopped
    }

    /// Numeric encoding used for the state gauge
    pub fn as_gauge(self) -> f64 {
        match self {
            Self::Created => 0.0,
            Self::Running => 1.0,
            Self::Paused => 2.0,
            Self::Stopped => 3.0,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert!(PipelineState::Running.can_pause());
        assert!(!PipelineState::Paused.can_pause());
        assert!(!PipelineState::Stopped.can_pause());

        assert!(PipelineState::Running.can_resume());
        assert!(PipelineState::Paused.can_resume());
        assert!(!PipelineState::Stopped.can_resume());

        assert!(PipelineState::Paused.can_stop());
        assert!(!PipelineState::Stopped.can_stop());
        assert!(!PipelineState::Created.can_stop());
    }

    #[test]
    fn test_display() {
        assert_eq!(PipelineState::Paused.to_string(), "paused");
    }
}
