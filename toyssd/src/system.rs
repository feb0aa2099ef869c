//! A complete simulated system: hosts, bus, and one storage device.
//!
//! ```text
//! WorkloadDriver ─▶ Host ─▶ StorageLink ─┐
//! WorkloadDriver ─▶ Host ─▶ StorageLink ─┼─▶ Bus ─▶ Storage
//!             ...                        ┘
//! ```
//!
//! Each host gets its own link; all links share the one bus (unless the
//! system is built with `direct_link`), and the device runs one evaluator
//! loop per link.

use crate::config::{ConfigError, SimConfig};
use crate::host::{Host, HostStats};
use crate::kernel::{ProcessId, ProcessState, RunReport, SimError, Simulation, VirtualTime};
use crate::link::{Bus, StorageLink};
use crate::storage::Storage;
use crate::workload::{RunResult, WorkloadConfig, WorkloadDriver, WorkloadProgress};

/// Owns a [`Simulation`] and everything attached to it.
pub struct System {
    sim: Simulation,
    config: SimConfig,
    bus: Option<Bus>,
    storage: Storage,
    drivers: Vec<WorkloadDriver>,
    /// Each host's process, once its workload has started.
    processes: Vec<Option<ProcessId>>,
    /// Interrupts requested before the hosts' processes existed.
    pending_interrupts: Vec<(usize, VirtualTime)>,
}

impl System {
    /// Build the system described by `config`. Nothing runs until one of
    /// the `run_*` methods is called.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`SimConfig::validate`].
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let sim = Simulation::new();
        let ctx = sim.context();

        let bus = if config.direct_link {
            None
        } else {
            Some(Bus::new(&ctx, &config.bus)?)
        };
        let storage = Storage::new(&ctx, &config.storage)?;

        let drivers = (0..config.hosts)
            .map(|index| {
                let name = format!("host{index}");
                let link = match &bus {
                    Some(bus) => StorageLink::over_bus(&ctx, name.clone(), bus),
                    None => StorageLink::direct(&ctx, name.clone()),
                };
                storage.attach(&link);
                WorkloadDriver::new(&ctx, Host::new(&ctx, name, link))
            })
            .collect::<Vec<_>>();

        let mut system = Self {
            sim,
            config: config.clone(),
            bus,
            storage,
            processes: vec![None; drivers.len()],
            drivers,
            pending_interrupts: Vec::new(),
        };
        if let Some(interrupt) = config.interrupt {
            system.interrupt_host_at(interrupt.host, VirtualTime::new(interrupt.tick));
        }
        tracing::debug!(hosts = config.hosts, direct_link = config.direct_link, "system built");
        Ok(system)
    }

    /// Every host runs `writes_per_round` writes then `reads_per_round`
    /// reads to sequential addresses, for the configured number of rounds.
    ///
    /// # Errors
    ///
    /// Returns the simulation's error if the run fails or deadlocks.
    pub fn run_sequential_write_read(
        &mut self,
        writes_per_round: u64,
        reads_per_round: u64,
    ) -> Result<RunResult, SimError> {
        let workload = WorkloadConfig::new(writes_per_round, reads_per_round)
            .with_rounds(self.config.workload.rounds);
        self.run_workload_with(&workload)
    }

    /// Run the workload from the configuration on every host.
    ///
    /// # Errors
    ///
    /// Returns the simulation's error if the run fails or deadlocks.
    pub fn run_workload(&mut self) -> Result<RunResult, SimError> {
        let workload = self.config.workload;
        self.run_workload_with(&workload)
    }

    /// Run `workload` on every host until the run completes or the
    /// configured duration elapses.
    ///
    /// Each call is a separate run: the result counts only its own
    /// operations and the time since it started.
    ///
    /// # Errors
    ///
    /// - [`SimError::Config`] if `workload` fails [`WorkloadConfig::validate`].
    /// - [`SimError::WorkloadRunning`] if an earlier run was cut off by the
    ///   duration and its hosts are still busy.
    /// - The simulation's error if the run fails or deadlocks.
    pub fn run_workload_with(&mut self, workload: &WorkloadConfig) -> Result<RunResult, SimError> {
        workload.validate()?;
        self.ensure_idle()?;
        let started_at = self.sim.now();
        for (index, driver) in self.drivers.iter().enumerate() {
            self.processes[index] = Some(driver.start(workload)?);
        }
        self.finish(started_at)
    }

    /// Every host writes then reads back each address in `0..num_addresses`.
    ///
    /// # Errors
    ///
    /// See [`run_workload_with`](Self::run_workload_with).
    pub fn run_write_read_workload(&mut self, num_addresses: u64) -> Result<RunResult, SimError> {
        self.ensure_idle()?;
        let started_at = self.sim.now();
        for (index, driver) in self.drivers.iter().enumerate() {
            self.processes[index] = Some(driver.run_write_read(num_addresses));
        }
        self.finish(started_at)
    }

    /// Interrupt host `index`'s process at virtual time `at`, aborting the
    /// operation it has in flight then.
    ///
    /// May be called before a workload starts; the interrupt is scheduled as
    /// soon as the host's process exists. Returns `false` for an unknown
    /// host.
    pub fn interrupt_host_at(&mut self, index: usize, at: VirtualTime) -> bool {
        match self.processes.get(index) {
            None => false,
            Some(Some(pid)) => {
                self.sim.schedule_interrupt(*pid, at);
                true
            }
            Some(None) => {
                self.pending_interrupts.push((index, at));
                true
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), SimError> {
        let busy = self
            .drivers
            .iter()
            .zip(&self.processes)
            .find(|&(_, process)| {
                process.is_some_and(|pid| self.sim.state(pid) != ProcessState::Terminated)
            });
        match busy {
            Some((driver, _)) => Err(SimError::WorkloadRunning {
                host: driver.host().name().to_string(),
            }),
            None => Ok(()),
        }
    }

    fn finish(&mut self, started_at: VirtualTime) -> Result<RunResult, SimError> {
        for (index, at) in std::mem::take(&mut self.pending_interrupts) {
            if let Some(Some(pid)) = self.processes.get(index) {
                self.sim.schedule_interrupt(*pid, at);
            }
        }

        let report: RunReport = match self.config.duration {
            Some(duration) => self.sim.run_until(started_at.after(duration))?,
            None => self.sim.run()?,
        };

        // Once every host is done the run has ended, whatever later events
        // (an interrupt trigger, say) did to the clock.
        let ended_at = self
            .drivers
            .iter()
            .map(WorkloadDriver::finished_at)
            .collect::<Option<Vec<_>>>()
            .and_then(|times| times.into_iter().max())
            .unwrap_or(report.now);
        let elapsed = VirtualTime::new(ended_at.since(started_at));

        let progress = self.progress();
        let result = RunResult::from_progress(progress, elapsed);
        tracing::info!(
            writes = result.writes,
            reads = result.reads,
            elapsed = %result.elapsed_time,
            stop = ?report.stop,
            "run finished"
        );
        Ok(result)
    }

    /// Progress of the current run, summed over every host.
    #[must_use]
    pub fn progress(&self) -> WorkloadProgress {
        self.drivers
            .iter()
            .map(WorkloadDriver::get_result)
            .fold(WorkloadProgress::default(), |total, p| WorkloadProgress {
                writes: total.writes + p.writes,
                reads: total.reads + p.reads,
                aborted: total.aborted + p.aborted,
                misses: total.misses + p.misses,
            })
    }

    #[must_use]
    pub fn host_stats(&self, index: usize) -> Option<HostStats> {
        self.drivers.get(index).map(|driver| driver.host().stats())
    }

    #[must_use]
    pub fn host(&self, index: usize) -> Option<&Host> {
        self.drivers.get(index).map(WorkloadDriver::host)
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub const fn bus(&self) -> Option<&Bus> {
        self.bus.as_ref()
    }

    #[must_use]
    pub fn now(&self) -> VirtualTime {
        self.sim.now()
    }

    /// The underlying simulation, e.g. to spawn extra processes.
    pub const fn simulation(&mut self) -> &mut Simulation {
        &mut self.sim
    }
}
