// Life of an operation:
// 1. A workload driver asks its host for a read or write
// 2. The host wraps it in a payload and starts a transaction on its link
// 3. The payload crosses the bus (one transfer, `latency` ticks)
// 4. The storage evaluator takes it, waits out the processing delay, and
//    evaluates it under the device lock
// 5. The completion crosses the bus back
// 6. The host matches it by transaction id and reports to the driver
//
// System components:
//  - Discrete-event kernel (clock, processes, resources, channels)
//  - Bus, paths, and storage links
//  - Storage device
//  - Hosts and workload drivers

// Processes are single-threaded futures holding `Rc` handles.
#![allow(clippy::future_not_send)]

pub mod config;
pub mod host;
pub mod kernel;
pub mod link;
pub mod storage;
pub mod system;
pub mod workload;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod testing;

pub use config::{ConfigError, SimConfig};
pub use host::{Host, OperationOutcome};
pub use kernel::{SimError, Simulation, VirtualTime};
pub use system::System;
pub use workload::{RunResult, WorkloadDriver};
