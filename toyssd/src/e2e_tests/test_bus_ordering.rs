//! Several hosts contending for one bus lane.

use crate::kernel::VirtualTime;
use crate::system::System;
use crate::testing::bus_config;

#[test]
fn test_single_lane_serializes_in_request_order() {
    let mut config = bus_config(2);
    config.hosts = 3;
    let mut system = System::new(&config).unwrap();

    let result = system.run_sequential_write_read(1, 0).unwrap();
    assert_eq!(result.writes, 3);
    assert_eq!(result.reads, 0);
    // Requests cross at 0-2, 2-4, 4-6; completions queue behind them.
    assert_eq!(result.elapsed_time, VirtualTime::new(12));

    let bus = system.bus().unwrap();
    assert_eq!(bus.transfers(), 6);
    assert_eq!(bus.peak_lanes_in_use(), 1);

    let latencies = (0..3)
        .map(|index| system.host_stats(index).unwrap().max_latency)
        .collect::<Vec<_>>();
    assert_eq!(latencies, vec![8, 10, 12]);
}

#[test]
fn test_extra_lanes_shorten_the_run() {
    let mut config = bus_config(2);
    config.hosts = 2;
    config.bus.lanes = 2;
    let mut system = System::new(&config).unwrap();

    let result = system.run_sequential_write_read(1, 0).unwrap();
    assert_eq!(result.elapsed_time, VirtualTime::new(4));
    assert_eq!(system.bus().unwrap().peak_lanes_in_use(), 2);
}
