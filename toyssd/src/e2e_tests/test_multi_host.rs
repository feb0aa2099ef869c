//! Several hosts running unbounded workloads for a fixed duration.

use crate::config::InterruptAt;
use crate::kernel::VirtualTime;
use crate::system::System;
use crate::testing::{bus_config, with_workload};
use crate::workload::WorkloadConfig;

#[test]
fn test_interrupting_one_host_leaves_the_other_alone() {
    let mut config = with_workload(
        bus_config(1),
        WorkloadConfig::new(1, 1).with_rounds(None),
    );
    config.hosts = 2;
    config.duration = Some(100);
    config.interrupt = Some(InterruptAt { host: 1, tick: 61 });
    let mut system = System::new(&config).unwrap();

    let result = system.run_workload().unwrap();
    assert_eq!(result.elapsed_time, VirtualTime::new(100));
    assert_eq!(system.progress().aborted, 1);

    let first = system.host_stats(0).unwrap();
    let second = system.host_stats(1).unwrap();
    assert_eq!(first.aborted, 0);
    assert_eq!(second.aborted, 1);
    assert!(first.completed > 0);
    assert!(second.completed > 0);
}

#[test]
fn test_hosts_keep_their_own_data() {
    let mut config = bus_config(1);
    config.hosts = 2;
    let mut system = System::new(&config).unwrap();

    let result = system.run_write_read_workload(3).unwrap();
    assert_eq!(result.writes, 6);
    assert_eq!(result.reads, 6);
    // Both hosts write the same values to the same addresses.
    assert_eq!(system.storage().len(), 3);
    assert_eq!(system.progress().misses, 0);
    assert_eq!(system.storage().stats().writes, 6);
}

#[test]
fn test_late_interrupt_request_is_honoured() {
    let mut config = with_workload(
        bus_config(1),
        WorkloadConfig::new(1, 1).with_rounds(None),
    );
    config.duration = Some(20);
    let mut system = System::new(&config).unwrap();
    assert!(system.interrupt_host_at(0, VirtualTime::new(5)));

    system.run_workload().unwrap();
    assert_eq!(system.host_stats(0).unwrap().aborted, 1);
}
