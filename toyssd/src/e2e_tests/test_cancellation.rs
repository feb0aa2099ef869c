//! Interrupting a host aborts only the operation it has in flight.

use crate::e2e_tests::helpers::*;
use crate::host::OperationOutcome;
use crate::kernel::VirtualTime;

#[test]
fn test_interrupt_during_request_transfer_drops_the_write() {
    let mut rig = Rig::over_bus(5);
    let outcomes = log();

    let seen = outcomes.clone();
    let pid = rig.spawn_host(|host, _| async move {
        let write = host.write(1, vec![7]).await?;
        let read = host.read(1).await?;
        seen.borrow_mut().push((write, read));
        Ok(())
    });
    rig.sim.schedule_interrupt(pid, VirtualTime::new(3));

    let report = rig.sim.run().unwrap();
    assert_eq!(
        *outcomes.borrow(),
        vec![(OperationOutcome::Aborted, OperationOutcome::Completed(None))]
    );
    // The read starts at 3 on a free lane: 3-8 out, 8-13 back.
    assert_eq!(report.now, VirtualTime::new(13));
    assert!(rig.storage.is_empty());
    assert_eq!(rig.storage.stats().writes, 0);

    let stats = rig.host.stats();
    assert_eq!(stats.aborted, 1);
    assert_eq!(stats.stale_discarded, 0);
}

#[test]
fn test_interrupt_after_delivery_still_applies_the_whole_write() {
    let mut rig = Rig::over_bus(5);
    let outcomes = log();

    let seen = outcomes.clone();
    let pid = rig.spawn_host(|host, _| async move {
        let write = host.write(1, vec![1, 2, 3]).await?;
        let read = host.read(1).await?;
        seen.borrow_mut().push((write, read));
        Ok(())
    });
    // The write reaches storage at 5; its completion is on the bus until 10.
    rig.sim.schedule_interrupt(pid, VirtualTime::new(7));

    let report = rig.sim.run().unwrap();
    assert_eq!(
        *outcomes.borrow(),
        vec![(
            OperationOutcome::Aborted,
            OperationOutcome::Completed(Some(vec![1, 2, 3]))
        )]
    );
    assert_eq!(rig.storage.get(1), Some(vec![1, 2, 3]));
    // The read waits for the lane until 10: 10-15 out, 15-20 back.
    assert_eq!(report.now, VirtualTime::new(20));

    let stats = rig.host.stats();
    assert_eq!(stats.aborted, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.stale_discarded, 1);
}

#[test]
fn test_interrupt_racing_the_completion_aborts_the_read() {
    let mut rig = Rig::over_bus(1);
    rig.storage
        .evaluate(crate::storage::Payload::write(
            crate::storage::TransactionId::new(100),
            4,
            vec![42],
        ))
        .unwrap();
    let outcomes = log();

    let seen = outcomes.clone();
    let pid = rig.spawn_host(|host, _| async move {
        let write = host.write(3, vec![1]).await?;
        seen.borrow_mut().push(write.is_aborted());
        let read = host.read(4).await?;
        seen.borrow_mut().push(read.is_aborted());
        Ok(())
    });

    // The read's completion is handed over at 4, in the same tick the
    // interrupt fires.
    rig.sim.run_until(VirtualTime::new(3)).unwrap();
    rig.sim.schedule_interrupt(pid, VirtualTime::new(4));
    let report = rig.sim.run().unwrap();

    assert_eq!(*outcomes.borrow(), vec![false, true]);
    assert_eq!(report.now, VirtualTime::new(4));
    assert_eq!(rig.host.stats().aborted, 1);
    assert_eq!(rig.host.stats().completed, 1);
}

#[test]
fn test_host_keeps_working_after_repeated_interrupts() {
    let mut rig = Rig::over_bus(2);
    let outcomes = log();

    let seen = outcomes.clone();
    let pid = rig.spawn_host(|host, _| async move {
        for address in 0..4 {
            let outcome = host.write(address, vec![1]).await?;
            seen.borrow_mut().push(outcome.is_aborted());
        }
        Ok(())
    });
    // Each lands while a request is on the bus: writes 0 and 2 go.
    rig.sim.schedule_interrupt(pid, VirtualTime::new(1));
    rig.sim.schedule_interrupt(pid, VirtualTime::new(6));

    rig.sim.run().unwrap();
    assert_eq!(*outcomes.borrow(), vec![true, false, true, false]);
    assert_eq!(rig.storage.get(0), None);
    assert_eq!(rig.storage.get(1), Some(vec![1]));
    assert_eq!(rig.storage.get(2), None);
    assert_eq!(rig.storage.get(3), Some(vec![1]));
}
