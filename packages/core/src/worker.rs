//! Task processor identity and lifecycle state.

use serde::{Deserialize, Serialize};

/// Stable identifier for a task processor.
///
/// Derived from the host, the process id, and the processor's index within its pool,
/// formatted as `<host>:<pid>+<index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Build an identifier from its parts.
    pub fn new(host: &str, pid: u32, index: u64) -> Self {
        Self(format!("{}:{}+{}", host, pid, index))
    }

    /// Wrap an existing identifier string.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a task processor.
///
/// `Idle -> Working -> Idle` while running; any state moves to `Stopping` on a stop
/// request and to `Stopped` once the processor has exited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorState {
    /// Polling for work or waiting between polls.
    #[default]
    Idle,
    /// Executing a claimed job.
    Working,
    /// Asked to stop; finishes any in-flight job first.
    Stopping,
    /// Exited.
    Stopped,
}

impl ProcessorState {
    /// Compact encoding for lock-free storage.
    pub fn as_u8(self) -> u8 {
        match self {
            ProcessorState::Idle => 0,
            ProcessorState::Working => 1,
            ProcessorState::Stopping => 2,
            ProcessorState::Stopped => 3,
        }
    }

    /// Inverse of [`ProcessorState::as_u8`]; unknown values read as `Stopped`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessorState::Idle,
            1 => ProcessorState::Working,
            2 => ProcessorState::Stopping,
            _ => ProcessorState::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorState::Idle => "idle",
            ProcessorState::Working => "working",
            ProcessorState::Stopping => "stopping",
            ProcessorState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
