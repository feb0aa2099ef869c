//! Workload drivers and run results.

use std::cell::Cell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::ConfigError;
use crate::host::{Host, OperationOutcome};
use crate::kernel::{Context, ProcessId, SimError, VirtualTime};
use crate::storage::{Address, Data};

/// How a driver picks addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPattern {
    /// Writes and reads each walk their own counter up from zero.
    Sequential,
    /// Addresses drawn uniformly from `0..span`, reproducible from `seed`.
    /// A zero span is rejected by [`WorkloadConfig::validate`].
    Random { seed: u64, span: u64 },
}

/// Shape of a sequential write/read workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub writes_per_round: u64,
    pub reads_per_round: u64,
    /// `None` repeats until the simulation is stopped.
    pub rounds: Option<u64>,
    pub pattern: AddressPattern,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            writes_per_round: 1,
            reads_per_round: 1,
            rounds: Some(1),
            pattern: AddressPattern::Sequential,
        }
    }
}

impl WorkloadConfig {
    #[must_use]
    pub const fn new(writes_per_round: u64, reads_per_round: u64) -> Self {
        Self {
            writes_per_round,
            reads_per_round,
            rounds: Some(1),
            pattern: AddressPattern::Sequential,
        }
    }

    #[must_use]
    pub const fn with_rounds(mut self, rounds: Option<u64>) -> Self {
        self.rounds = rounds;
        self
    }

    #[must_use]
    pub const fn with_pattern(mut self, pattern: AddressPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Check the workload can draw addresses.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a random pattern with an
    /// empty span.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let AddressPattern::Random { span: 0, .. } = self.pattern {
            return Err(ConfigError::InvalidValue {
                name: "TOYSSD_ADDRESS_SPAN".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Operations issued so far. Valid while a run is still in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkloadProgress {
    pub writes: u64,
    pub reads: u64,
    /// Issued operations that were aborted by an interrupt.
    pub aborted: u64,
    /// Completed reads that found no data.
    pub misses: u64,
}

/// The metrics of a finished run; the only thing external tooling consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub writes: u64,
    pub reads: u64,
    pub elapsed_time: VirtualTime,
}

impl RunResult {
    /// Freeze `progress` at the time the run ended.
    #[must_use]
    pub const fn from_progress(progress: WorkloadProgress, elapsed_time: VirtualTime) -> Self {
        Self {
            writes: progress.writes,
            reads: progress.reads,
            elapsed_time,
        }
    }
}

enum Addresses {
    Sequential { next_write: Address, next_read: Address },
    Random { rng: StdRng, span: u64 },
}

impl Addresses {
    fn new(pattern: AddressPattern) -> Self {
        match pattern {
            AddressPattern::Sequential => Self::Sequential {
                next_write: 0,
                next_read: 0,
            },
            AddressPattern::Random { seed, span } => Self::Random {
                rng: StdRng::seed_from_u64(seed),
                span,
            },
        }
    }

    fn next_write(&mut self) -> Address {
        match self {
            Self::Sequential { next_write, .. } => {
                let address = *next_write;
                *next_write += 1;
                address
            }
            Self::Random { rng, span } => rng.random_range(0..*span),
        }
    }

    fn next_read(&mut self) -> Address {
        match self {
            Self::Sequential { next_read, .. } => {
                let address = *next_read;
                *next_read += 1;
                address
            }
            Self::Random { rng, span } => rng.random_range(0..*span),
        }
    }
}

/// Drives one [`Host`] through a workload inside a dedicated process.
///
/// The driver's process is the host's process: interrupting it aborts the
/// host's current operation and the driver moves on to the next one.
///
/// Each `start`/`run_*` call begins a fresh run: progress is reset and the
/// completion time cleared.
#[derive(Clone, Debug)]
pub struct WorkloadDriver {
    ctx: Context,
    host: Host,
    progress: Rc<Cell<WorkloadProgress>>,
    finished_at: Rc<Cell<Option<VirtualTime>>>,
}

impl WorkloadDriver {
    #[must_use]
    pub fn new(ctx: &Context, host: Host) -> Self {
        Self {
            ctx: ctx.clone(),
            host,
            progress: Rc::new(Cell::new(WorkloadProgress::default())),
            finished_at: Rc::new(Cell::new(None)),
        }
    }

    #[must_use]
    pub const fn host(&self) -> &Host {
        &self.host
    }

    /// Data written to `address`. Deterministic so reads can be checked.
    #[must_use]
    pub fn data_for(address: Address) -> Data {
        address.to_le_bytes().to_vec()
    }

    /// Spawn the host's process running `writes_per_round` writes followed
    /// by `reads_per_round` reads, each to the next sequential address, for
    /// `rounds` rounds (`None`: until the simulation stops).
    pub fn run_sequential_write_read(
        &self,
        writes_per_round: u64,
        reads_per_round: u64,
        rounds: Option<u64>,
    ) -> ProcessId {
        self.begin();
        let driver = self.clone();
        let config = WorkloadConfig::new(writes_per_round, reads_per_round).with_rounds(rounds);
        self.ctx
            .spawn(self.host.name().to_string(), async move { driver.drive(config).await })
    }

    /// Spawn the host's process running `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`WorkloadConfig::validate`];
    /// nothing is spawned then.
    pub fn start(&self, config: &WorkloadConfig) -> Result<ProcessId, ConfigError> {
        config.validate()?;
        self.begin();
        let driver = self.clone();
        let config = *config;
        Ok(self
            .ctx
            .spawn(self.host.name().to_string(), async move { driver.drive(config).await }))
    }

    /// Spawn the host's process writing then reading back each address in
    /// `0..num_addresses`.
    pub fn run_write_read(&self, num_addresses: u64) -> ProcessId {
        self.begin();
        let driver = self.clone();
        self.ctx.spawn(self.host.name().to_string(), async move {
            for address in 0..num_addresses {
                driver.write(address).await?;
                driver.read(address).await?;
            }
            driver.finish();
            Ok(())
        })
    }

    /// Operations issued so far in the current run.
    #[must_use]
    pub fn get_result(&self) -> WorkloadProgress {
        self.progress.get()
    }

    /// When the current run's process finished its workload, `None` while
    /// it is still going.
    #[must_use]
    pub fn finished_at(&self) -> Option<VirtualTime> {
        self.finished_at.get()
    }

    fn begin(&self) {
        self.progress.set(WorkloadProgress::default());
        self.finished_at.set(None);
    }

    async fn drive(&self, config: WorkloadConfig) -> Result<(), SimError> {
        let mut addresses = Addresses::new(config.pattern);
        let mut round = 0;
        while config.rounds.is_none_or(|rounds| round < rounds) {
            for _ in 0..config.writes_per_round {
                self.write(addresses.next_write()).await?;
            }
            for _ in 0..config.reads_per_round {
                self.read(addresses.next_read()).await?;
            }
            round += 1;
            if config.writes_per_round == 0 && config.reads_per_round == 0 {
                break;
            }
        }
        self.finish();
        Ok(())
    }

    async fn write(&self, address: Address) -> Result<(), SimError> {
        self.update(|progress| progress.writes += 1);
        let outcome = self.host.write(address, Self::data_for(address)).await?;
        if outcome.is_aborted() {
            self.update(|progress| progress.aborted += 1);
        }
        Ok(())
    }

    async fn read(&self, address: Address) -> Result<(), SimError> {
        self.update(|progress| progress.reads += 1);
        match self.host.read(address).await? {
            OperationOutcome::Completed(Some(_)) => {}
            OperationOutcome::Completed(None) => self.update(|progress| progress.misses += 1),
            OperationOutcome::Aborted => self.update(|progress| progress.aborted += 1),
        }
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut WorkloadProgress)) {
        let mut progress = self.progress.get();
        f(&mut progress);
        self.progress.set(progress);
    }

    fn finish(&self) {
        self.finished_at.set(Some(self.ctx.now()));
        let progress = self.progress.get();
        tracing::info!(
            host = %self.host.name(),
            writes = progress.writes,
            reads = progress.reads,
            aborted = progress.aborted,
            now = %self.ctx.now(),
            "workload finished"
        );
    }
}
