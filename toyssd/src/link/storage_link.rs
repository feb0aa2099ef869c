//! Duplex route between one host and the storage device.

use crate::kernel::{Context, SimError};
use crate::storage::{Completion, Payload};

use super::bus::Bus;
use super::path::Path;

/// A pair of [`Path`]s, host → storage and storage → host.
///
/// Both directions of a bus-backed link share the one [`Bus`], so a request
/// and a completion in flight at the same time are serialized against each
/// other and against every other link on that bus.
#[derive(Clone, Debug)]
pub struct StorageLink {
    name: String,
    to_storage: Path<Payload>,
    to_host: Path<Completion>,
}

impl StorageLink {
    #[must_use]
    pub fn over_bus(ctx: &Context, name: impl Into<String>, bus: &Bus) -> Self {
        let name = name.into();
        Self {
            to_storage: Path::over_bus(ctx, format!("{name}/to-storage"), bus),
            to_host: Path::over_bus(ctx, format!("{name}/to-host"), bus),
            name,
        }
    }

    /// A link with no transfer cost in either direction.
    #[must_use]
    pub fn direct(ctx: &Context, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            to_storage: Path::direct(ctx, format!("{name}/to-storage")),
            to_host: Path::direct(ctx, format!("{name}/to-host")),
            name,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a request to storage. Returns once it has been delivered.
    ///
    /// # Errors
    ///
    /// [`SimError::Interrupted`] if the caller is interrupted before
    /// delivery; the request is then never seen by storage.
    pub async fn start_transaction(&self, payload: Payload) -> Result<(), SimError> {
        tracing::trace!(link = %self.name, id = %payload.id, address = payload.address, "starting transaction");
        self.to_storage.send(payload).await
    }

    /// Send a completion back to the host.
    ///
    /// # Errors
    ///
    /// [`SimError::Interrupted`] if the caller is interrupted before
    /// delivery.
    pub async fn end_transaction(&self, completion: Completion) -> Result<(), SimError> {
        tracing::trace!(link = %self.name, id = %completion.id, address = completion.address, "ending transaction");
        self.to_host.send(completion).await
    }

    /// Wait for the next request addressed to storage.
    ///
    /// # Errors
    ///
    /// [`SimError::Interrupted`] if the caller is interrupted while waiting.
    pub async fn next_for_storage(&self) -> Result<Payload, SimError> {
        self.to_storage.get().await
    }

    /// Wait for the next completion addressed to the host.
    ///
    /// # Errors
    ///
    /// [`SimError::Interrupted`] if the caller is interrupted while waiting.
    pub async fn next_for_host(&self) -> Result<Completion, SimError> {
        self.to_host.get().await
    }

    /// Requests delivered to storage but not yet taken.
    #[must_use]
    pub fn payloads_for_storage(&self) -> Vec<Payload> {
        self.to_storage.items()
    }

    /// Completions delivered to the host but not yet taken.
    #[must_use]
    pub fn payloads_for_host(&self) -> Vec<Completion> {
        self.to_host.items()
    }

    /// Latency of one transfer in either direction.
    #[must_use]
    pub const fn transfer_latency(&self) -> u64 {
        self.to_storage.transfer_latency()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::BusConfig;
    use crate::kernel::{Simulation, VirtualTime};
    use crate::storage::{Command, Outcome, TransactionId};

    #[test]
    fn test_round_trip_costs_two_transfers() {
        let mut sim = Simulation::new();
        let bus = Bus::new(&sim.context(), &BusConfig { latency: 3, lanes: 1 }).unwrap();
        let link = StorageLink::over_bus(&sim.context(), "host0", &bus);
        assert_eq!(link.transfer_latency(), 3);

        let echo = link.clone();
        sim.spawn_daemon("echo", async move {
            loop {
                let payload = echo.next_for_storage().await?;
                echo.end_transaction(Completion {
                    id: payload.id,
                    command: Command::Read,
                    address: payload.address,
                    outcome: Outcome::NotFound,
                })
                .await?;
            }
        });

        let ctx = sim.context();
        let host = link.clone();
        let done = Rc::new(RefCell::new(None));
        let seen = Rc::clone(&done);
        sim.spawn("host0", async move {
            host.start_transaction(Payload::read(TransactionId::new(1), 42))
                .await?;
            let completion = host.next_for_host().await?;
            *seen.borrow_mut() = Some((ctx.now().ticks(), completion.id, completion.address));
            Ok(())
        });

        let report = sim.run().unwrap();
        assert_eq!(*done.borrow(), Some((6, TransactionId::new(1), 42)));
        assert_eq!(report.now, VirtualTime::new(6));
        assert_eq!(bus.transfers(), 2);
    }

    #[test]
    fn test_undelivered_payloads_are_visible() {
        let mut sim = Simulation::new();
        let link = StorageLink::direct(&sim.context(), "host0");
        let sender = link.clone();
        sim.spawn("host0", async move {
            sender
                .start_transaction(Payload::write(TransactionId::new(7), 1, vec![5]))
                .await
        });

        sim.run().unwrap();
        let pending = link.payloads_for_storage();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, TransactionId::new(7));
        assert!(link.payloads_for_host().is_empty());
    }
}
