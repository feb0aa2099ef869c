//! Deterministic discrete-event simulation kernel.
//!
//! # Architecture
//!
//! ```text
//! Simulation (run loop, owns process bodies)
//!     │ pops Event(due, seq, target)
//!     ▼
//! Scheduler (virtual clock + min-heap)
//!     ▲ schedule_after / wake
//!     │
//! Context (shared handle) ◀── Resource, Channel, Timeout
//! ```
//!
//! A process is an `async` block returning `Result<(), SimError>`. It runs
//! until it awaits one of the kernel's suspension points ([`Timeout`],
//! [`Request`], [`Put`], [`Get`]); each of those either resolves at once or
//! parks the process and arranges for exactly one later resumption.
//!
//! Exactly one process runs at any instant. Ties at the same virtual time
//! are broken by scheduling order, so identical programs produce identical
//! traces.
//!
//! # Interrupts
//!
//! [`Context::interrupt`] is the only cancellation primitive. A parked
//! target resumes at the current tick with [`SimError::Interrupted`]; a
//! target that is not parked sees the error at its next suspension point or
//! [`Context::checkpoint`]. Guards and queued entries are released as the
//! error unwinds through `?`.

mod channel;
mod context;
mod error;
mod event;
mod process;
mod resource;
mod scheduler;
mod simulation;
mod time;

pub use channel::{Channel, Get, Put};
pub use context::{Context, Timeout};
pub use error::SimError;
pub use event::Event;
pub use process::{BlockedProcess, ProcessId, ProcessState, SuspendReason};
pub use resource::{Request, Resource, ResourceGuard};
pub use scheduler::Scheduler;
pub use simulation::{RunReport, Simulation, StopReason};
pub use time::VirtualTime;
