//! The storage device model.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;

use crate::config::{ConfigError, StorageConfig};
use crate::kernel::{Context, ProcessId, Resource, SimError};
use crate::link::StorageLink;

use super::error::StorageError;
use super::payload::{Address, Command, Completion, Data, Outcome, Payload};

/// Counters kept by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub writes: u64,
    pub reads: u64,
    /// Reads that hit an address never written.
    pub misses: u64,
}

/// An address-keyed store behind a command queue.
///
/// Each command first takes one of `concurrency` command slots and spends
/// its processing delay holding it, then evaluates under a capacity-1
/// internal lock. The lock keeps evaluations from overlapping even when
/// several evaluator loops (one per attached link) feed the device.
///
/// # Invariants
///
/// - The store is only touched by [`evaluate`](Self::evaluate), and every
///   evaluation applies completely or not at all.
/// - An unknown command is never skipped: it fails the evaluator loop and
///   with it the simulation.
#[derive(Clone, Debug)]
pub struct Storage {
    ctx: Context,
    lock: Resource,
    slots: Resource,
    write_delay: u64,
    read_delay: u64,
    store: Rc<RefCell<BTreeMap<Address, Data>>>,
    stats: Rc<Cell<StorageStats>>,
}

impl Storage {
    /// # Errors
    ///
    /// [`ConfigError::ZeroCapacity`] if `config.concurrency` is zero.
    pub fn new(ctx: &Context, config: &StorageConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            ctx: ctx.clone(),
            lock: Resource::new(ctx, "storage-lock", 1)?,
            slots: Resource::new(ctx, "storage-slots", config.concurrency)?,
            write_delay: config.write_delay,
            read_delay: config.read_delay,
            store: Rc::new(RefCell::new(BTreeMap::new())),
            stats: Rc::new(Cell::new(StorageStats::default())),
        })
    }

    /// Evaluate one request against the store, instantly.
    ///
    /// Absent addresses read as [`Outcome::NotFound`].
    ///
    /// # Errors
    ///
    /// - [`StorageError::UnknownCommand`] for an undecodable opcode.
    /// - [`StorageError::MissingWriteData`] for a write without data.
    pub fn evaluate(&self, payload: Payload) -> Result<Completion, StorageError> {
        let command = payload.command()?;
        let mut stats = self.stats.get();
        let outcome = match command {
            Command::Write => {
                let data = payload.data.ok_or(StorageError::MissingWriteData {
                    address: payload.address,
                })?;
                self.store.borrow_mut().insert(payload.address, data);
                stats.writes += 1;
                Outcome::Written
            }
            Command::Read => {
                stats.reads += 1;
                match self.store.borrow().get(&payload.address) {
                    Some(data) => Outcome::Found(data.clone()),
                    None => {
                        stats.misses += 1;
                        Outcome::NotFound
                    }
                }
            }
        };
        self.stats.set(stats);

        Ok(Completion {
            id: payload.id,
            command,
            address: payload.address,
            outcome,
        })
    }

    /// Run one request through the device: command slot, processing delay,
    /// then evaluation under the internal lock.
    ///
    /// # Errors
    ///
    /// Propagates interrupts of the calling process and evaluation errors.
    pub async fn process(&self, payload: Payload) -> Result<Completion, SimError> {
        let _slot = self.slots.request().await?;
        let delay = match Command::try_from(payload.opcode) {
            Ok(Command::Write) => self.write_delay,
            Ok(Command::Read) => self.read_delay,
            Err(_) => 0,
        };
        if delay > 0 {
            self.ctx.timeout(delay).await?;
        }

        let _lock = self.lock.request().await?;
        let completion = self.evaluate(payload)?;
        tracing::debug!(
            id = %completion.id,
            command = %completion.command,
            address = completion.address,
            now = %self.ctx.now(),
            "evaluated command"
        );
        Ok(completion)
    }

    /// Start an evaluator loop serving `link`. Returns its process.
    ///
    /// The loop is a daemon: once its link goes quiet it stays parked
    /// without counting as a deadlock. It fails, halting the simulation, on
    /// the first command it cannot evaluate.
    pub fn attach(&self, link: &StorageLink) -> ProcessId {
        let storage = self.clone();
        let link = link.clone();
        let name = format!("storage:{}", link.name());
        self.ctx.spawn_daemon(name, async move {
            loop {
                let payload = link.next_for_storage().await?;
                let completion = storage.process(payload).await?;
                link.end_transaction(completion).await?;
            }
        })
    }

    /// The data currently stored at `address`.
    #[must_use]
    pub fn get(&self, address: Address) -> Option<Data> {
        self.store.borrow().get(&address).cloned()
    }

    /// Number of distinct addresses written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> StorageStats {
        self.stats.get()
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.slots.capacity()
    }
}
