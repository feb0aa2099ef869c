//! End-to-end tests at the host/bus/storage level.
//!
//! Each test file covers one scenario and drives real hosts against a real
//! device, checking outcomes and the virtual times they land at.

#![cfg(test)]

mod helpers;

mod test_bus_ordering;
mod test_cancellation;
mod test_deadlock;
mod test_determinism;
mod test_multi_host;
mod test_result_export;
mod test_round_trip;
