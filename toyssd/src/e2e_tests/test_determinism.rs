//! Test that the same configuration produces identical runs.

use crate::config::{InterruptAt, SimConfig};
use crate::host::HostStats;
use crate::system::System;
use crate::testing::{bus_config, with_workload};
use crate::workload::{AddressPattern, RunResult, WorkloadConfig};

fn run(config: &SimConfig) -> (RunResult, Vec<HostStats>, usize) {
    let mut system = System::new(config).unwrap();
    let result = system.run_workload().unwrap();
    let stats = (0..config.hosts)
        .map(|index| system.host_stats(index).unwrap())
        .collect();
    (result, stats, system.storage().len())
}

#[test]
fn test_deterministic_random_workload() {
    let workload = WorkloadConfig::new(3, 2)
        .with_rounds(Some(5))
        .with_pattern(AddressPattern::Random { seed: 11, span: 8 });
    let mut config = with_workload(bus_config(2), workload);
    config.hosts = 3;

    let first = run(&config);
    assert_eq!(first, run(&config));
    assert_eq!(first.0.writes, 45);
    assert_eq!(first.0.reads, 30);
    assert!(first.2 <= 8);
}

#[test]
fn test_deterministic_interrupted_run() {
    let mut config = with_workload(
        bus_config(1),
        WorkloadConfig::new(1, 1).with_rounds(None),
    );
    config.hosts = 2;
    config.duration = Some(50);
    config.interrupt = Some(InterruptAt { host: 0, tick: 17 });

    let first = run(&config);
    assert_eq!(first, run(&config));
    assert_eq!(first.1[0].aborted, 1);
}

#[test]
fn test_seed_changes_the_addresses() {
    let draw = |seed| {
        let workload = WorkloadConfig::new(8, 0)
            .with_pattern(AddressPattern::Random { seed, span: 1024 });
        let config = with_workload(bus_config(1), workload);
        let mut system = System::new(&config).unwrap();
        system.run_workload().unwrap();
        (0..1024)
            .filter(|address| system.storage().get(*address).is_some())
            .collect::<Vec<_>>()
    };
    assert_eq!(draw(1), draw(1));
    assert_ne!(draw(1), draw(2));
}
