//! Writes followed by reads of the same addresses.

use crate::e2e_tests::helpers::*;
use crate::host::OperationOutcome;
use crate::kernel::VirtualTime;

#[test]
fn test_read_returns_latest_write() {
    let mut rig = Rig::direct(1, 2);
    let reads = log();

    let seen = reads.clone();
    rig.spawn_host(|host, _| async move {
        host.write(1, b"a".to_vec()).await?;
        host.write(1, b"bb".to_vec()).await?;
        let read = host.read(1).await?;
        seen.borrow_mut().push(read);
        Ok(())
    });

    let report = rig.sim.run().unwrap();
    assert_eq!(
        *reads.borrow(),
        vec![OperationOutcome::Completed(Some(b"bb".to_vec()))]
    );
    assert_eq!(report.now, VirtualTime::new(4));

    let stats = rig.storage.stats();
    assert_eq!(stats.writes, 2);
    assert_eq!(stats.reads, 1);
    assert_eq!(stats.misses, 0);
    assert_eq!(rig.storage.len(), 1);
}

#[test]
fn test_addresses_are_independent() {
    let mut rig = Rig::over_bus(1);
    let reads = log();

    let seen = reads.clone();
    rig.spawn_host(|host, _| async move {
        for address in 0..3u8 {
            host.write(u64::from(address), vec![address; 2]).await?;
        }
        for address in [2, 0, 7] {
            let read = host.read(address).await?;
            seen.borrow_mut().push(read.completed());
        }
        Ok(())
    });

    let report = rig.sim.run().unwrap();
    assert_eq!(
        *reads.borrow(),
        vec![Some(Some(vec![2, 2])), Some(Some(vec![0, 0])), Some(None)]
    );
    // Six operations, each one transfer out and one back.
    assert_eq!(report.now, VirtualTime::new(12));
    assert_eq!(rig.storage.stats().misses, 1);
    assert_eq!(rig.bus.as_ref().map(|bus| bus.transfers()), Some(12));
}

#[test]
fn test_host_latency_accounting() {
    let mut rig = Rig::direct(3, 1);
    rig.spawn_host(|host, _| async move {
        host.write(9, vec![1]).await?;
        host.read(9).await?;
        Ok(())
    });

    rig.sim.run().unwrap();
    let stats = rig.host.stats();
    assert_eq!(stats.issued, 2);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.total_latency, 4);
    assert_eq!(stats.max_latency, 3);
}
