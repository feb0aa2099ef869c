//! Configuration fixtures shared by unit and end-to-end tests.

use crate::config::{BusConfig, SimConfig, StorageConfig};
use crate::workload::WorkloadConfig;

/// One host over a single-lane bus with `latency`, instant device.
pub fn bus_config(latency: u64) -> SimConfig {
    SimConfig {
        bus: BusConfig { latency, lanes: 1 },
        ..SimConfig::default()
    }
}

/// One host wired straight to a device with the given processing delays.
pub fn direct_config(write_delay: u64, read_delay: u64) -> SimConfig {
    SimConfig {
        direct_link: true,
        storage: StorageConfig {
            concurrency: 1,
            write_delay,
            read_delay,
        },
        ..SimConfig::default()
    }
}

/// `config` with its workload replaced.
pub fn with_workload(config: SimConfig, workload: WorkloadConfig) -> SimConfig {
    SimConfig { workload, ..config }
}
