//! Errors surfaced by the simulation kernel.

use crate::config::ConfigError;
use crate::storage::StorageError;

use super::process::{BlockedProcess, ProcessId};
use super::time::VirtualTime;

/// Errors produced while running a simulation.
///
/// `Interrupted` is the only recoverable variant: suspension points return
/// it so the interrupted process can unwind to its recovery branch. Every
/// other variant that escapes a process body halts the run.
#[derive(Debug)]
pub enum SimError {
    /// The current process was interrupted at a suspension point.
    Interrupted,
    /// A suspension primitive was awaited outside any simulated process.
    OutsideProcess,
    /// The event queue ran dry while non-daemon processes were still parked.
    Deadlock {
        now: VirtualTime,
        blocked: Vec<BlockedProcess>,
    },
    /// The simulation already stopped on a fatal error and cannot continue.
    Halted,
    /// A process body returned a fatal error.
    ProcessFailed {
        pid: ProcessId,
        name: String,
        source: Box<Self>,
    },
    /// The storage device rejected a command.
    Storage(StorageError),
    /// A component was built with an invalid configuration.
    Config(ConfigError),
    /// A new workload was started on a host whose earlier run is still live.
    WorkloadRunning { host: String },
}

impl SimError {
    /// Whether this error is the recoverable interrupt signal.
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupted => write!(f, "process interrupted"),
            Self::OutsideProcess => {
                write!(f, "suspension point awaited outside a simulated process")
            }
            Self::Deadlock { now, blocked } => {
                write!(f, "deadlock at {now}: {} process(es) blocked", blocked.len())?;
                for process in blocked {
                    write!(f, "; {process}")?;
                }
                Ok(())
            }
            Self::Halted => write!(f, "simulation halted after a fatal error"),
            Self::ProcessFailed { pid, name, source } => {
                write!(f, "process {pid} '{name}' failed: {source}")
            }
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Config(e) => write!(f, "configuration error: {e}"),
            Self::WorkloadRunning { host } => {
                write!(f, "{host} is still running an earlier workload")
            }
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ProcessFailed { source, .. } => Some(source.as_ref()),
            Self::Storage(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for SimError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for SimError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
