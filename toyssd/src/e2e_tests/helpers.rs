//! Common helpers for end-to-end tests.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use crate::config::{BusConfig, StorageConfig};
use crate::host::Host;
use crate::kernel::{Context, ProcessId, SimError, Simulation};
use crate::link::{Bus, StorageLink};
use crate::storage::Storage;

/// A shared list that processes append to and the test inspects.
pub type Log<T> = Rc<RefCell<Vec<T>>>;

pub fn log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

/// A simulation with one device and one host attached to it.
pub struct Rig {
    pub sim: Simulation,
    pub storage: Storage,
    pub host: Host,
    pub bus: Option<Bus>,
}

impl Rig {
    /// Host and device over a single-lane bus with `latency`.
    pub fn over_bus(latency: u64) -> Self {
        let sim = Simulation::new();
        let ctx = sim.context();
        #[allow(clippy::unwrap_used)]
        let bus = Bus::new(&ctx, &BusConfig { latency, lanes: 1 }).unwrap();
        let link = StorageLink::over_bus(&ctx, "host0", &bus);
        Self::assemble(sim, link, &StorageConfig::default(), Some(bus))
    }

    /// Host wired straight to a device with the given processing delays.
    pub fn direct(write_delay: u64, read_delay: u64) -> Self {
        let sim = Simulation::new();
        let link = StorageLink::direct(&sim.context(), "host0");
        let storage = StorageConfig {
            concurrency: 1,
            write_delay,
            read_delay,
        };
        Self::assemble(sim, link, &storage, None)
    }

    fn assemble(sim: Simulation, link: StorageLink, config: &StorageConfig, bus: Option<Bus>) -> Self {
        let ctx = sim.context();
        #[allow(clippy::unwrap_used)]
        let storage = Storage::new(&ctx, config).unwrap();
        storage.attach(&link);
        let host = Host::new(&ctx, "host0", link);
        Self {
            sim,
            storage,
            host,
            bus,
        }
    }

    pub fn context(&self) -> Context {
        self.sim.context()
    }

    /// Spawn the host's process running `script`.
    pub fn spawn_host<F, Fut>(&self, script: F) -> ProcessId
    where
        F: FnOnce(Host, Context) -> Fut,
        Fut: Future<Output = Result<(), SimError>> + 'static,
    {
        let body = script(self.host.clone(), self.context());
        self.sim.spawn(self.host.name().to_string(), body)
    }
}
