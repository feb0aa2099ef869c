//! A host waiting on a link nobody serves is reported, not hung.

use crate::host::Host;
use crate::kernel::{SimError, Simulation, SuspendReason, VirtualTime};
use crate::link::StorageLink;

#[test]
fn test_unserved_link_reports_the_blocked_host() {
    let mut sim = Simulation::new();
    let ctx = sim.context();
    let link = StorageLink::direct(&ctx, "host0");
    let host = Host::new(&ctx, "host0", link.clone());

    sim.spawn("host0", async move {
        host.read(1).await?;
        Ok(())
    });

    match sim.run() {
        Err(SimError::Deadlock { now, blocked }) => {
            assert_eq!(now, VirtualTime::ZERO);
            assert_eq!(blocked.len(), 1);
            assert_eq!(blocked[0].name, "host0");
            assert_eq!(blocked[0].reason, SuspendReason::ChannelGet);
        }
        other => panic!("expected deadlock, got {other:?}"),
    }
    // The request sits undelivered on the storage side.
    assert_eq!(link.payloads_for_storage().len(), 1);
}

#[test]
fn test_idle_storage_daemons_do_not_deadlock() {
    let mut system = crate::system::System::new(&crate::testing::bus_config(1)).unwrap();
    let result = system.run_sequential_write_read(0, 0).unwrap();
    assert_eq!(result.elapsed_time, VirtualTime::ZERO);
}
