//! Reconciliation contract tests
//!
//! Reported device state that already matches the pool leaves the device
//! untouched; any mismatch is corrected with a single push of the pool's
//! assignment.

mod common;

use common::{admin_status, address_state, start_engine, test_config, wait_for_event, MockPusher};
use ifsync_core::engine::EngineEvent;
use ifsync_core::traits::{LeafUpdate, TelemetryMessage};

#[tokio::test]
async fn test_matching_reported_state_is_adopted_without_a_push() {
    let pusher = MockPusher::new();
    let probe = MockPusher::sharing_counters_with(&pusher);
    let mut harness = start_engine(pusher, test_config(10, 24, 5_000));

    harness
        .feed
        .send(Ok(admin_status("Ethernet1", "UP")))
        .unwrap();
    harness
        .feed
        .send(Ok(address_state(
            "Ethernet1",
            "10.0.2.1",
            &[("ip", "10.0.2.1"), ("prefix-length", "24")],
        )))
        .unwrap();

    let event = wait_for_event(&mut harness.events, |e| {
        matches!(e, EngineEvent::Configured { .. })
    })
    .await;

    assert_eq!(
        event,
        EngineEvent::Configured {
            interface: "Ethernet1".to_string(),
            address: "10.0.2.1".to_string(),
            prefix_len: 24,
            pushed: false,
        }
    );
    assert_eq!(probe.call_count(), 0);

    let _ = harness.shutdown.send(());
    harness.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_prefix_length_mismatch_is_corrected() {
    let pusher = MockPusher::new();
    let probe = MockPusher::sharing_counters_with(&pusher);
    let mut harness = start_engine(pusher, test_config(10, 24, 5_000));

    harness
        .feed
        .send(Ok(admin_status("Ethernet1", "UP")))
        .unwrap();
    // Right address, wrong mask.
    harness
        .feed
        .send(Ok(address_state(
            "Ethernet1",
            "10.0.2.1",
            &[("ip", "10.0.2.1"), ("prefix-length", "30")],
        )))
        .unwrap();

    let event = wait_for_event(&mut harness.events, |e| {
        matches!(e, EngineEvent::Configured { .. })
    })
    .await;

    assert_eq!(
        event,
        EngineEvent::Configured {
            interface: "Ethernet1".to_string(),
            address: "10.0.2.1".to_string(),
            prefix_len: 24,
            pushed: true,
        }
    );
    assert_eq!(probe.pushes(), vec![("Ethernet1".to_string(), "10.0.2.1".to_string(), 24)]);

    let _ = harness.shutdown.send(());
    harness.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_foreign_address_is_replaced_by_an_allocation() {
    let pusher = MockPusher::new();
    let probe = MockPusher::sharing_counters_with(&pusher);
    let mut harness = start_engine(pusher, test_config(10, 24, 5_000));

    harness
        .feed
        .send(Ok(admin_status("Ethernet1", "UP")))
        .unwrap();
    // An address from outside the pool entirely.
    harness
        .feed
        .send(Ok(address_state(
            "Ethernet1",
            "192.168.7.5",
            &[("ip", "192.168.7.5"), ("prefix-length", "24")],
        )))
        .unwrap();

    let event = wait_for_event(&mut harness.events, |e| {
        matches!(e, EngineEvent::Configured { .. })
    })
    .await;

    assert_eq!(
        event,
        EngineEvent::Configured {
            interface: "Ethernet1".to_string(),
            address: "10.0.1.1".to_string(),
            prefix_len: 24,
            pushed: true,
        }
    );
    assert_eq!(probe.call_count(), 1);

    let _ = harness.shutdown.send(());
    harness.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_leaves_of_one_batch_dispatch_in_delivery_order() {
    let pusher = MockPusher::new();
    let probe = MockPusher::sharing_counters_with(&pusher);
    let mut harness = start_engine(pusher, test_config(10, 24, 5_000));

    // Admin status and both address leaves in a single batch; processing
    // them in delivery order completes the fragment set while the machine
    // is already up, with no timer involved.
    harness
        .feed
        .send(Ok(TelemetryMessage::Updates {
            prefix: "/interfaces/interface[name=Ethernet1]".to_string(),
            updates: vec![
                LeafUpdate::new("state/admin-status", "UP"),
                LeafUpdate::new(
                    "subinterfaces/subinterface[index=0]/ipv4/addresses\
                     /address[ip=10.0.2.1]/state/ip",
                    "10.0.2.1",
                ),
                LeafUpdate::new(
                    "subinterfaces/subinterface[index=0]/ipv4/addresses\
                     /address[ip=10.0.2.1]/state/prefix-length",
                    "30",
                ),
            ],
        }))
        .unwrap();

    let event = wait_for_event(&mut harness.events, |e| {
        matches!(e, EngineEvent::Configured { .. })
    })
    .await;
    assert_eq!(
        event,
        EngineEvent::Configured {
            interface: "Ethernet1".to_string(),
            address: "10.0.2.1".to_string(),
            prefix_len: 24,
            pushed: true,
        }
    );
    assert_eq!(probe.call_count(), 1);

    let _ = harness.shutdown.send(());
    harness.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_exhausted_pool_reports_and_leaves_device_alone() {
    let pusher = MockPusher::new();
    let probe = MockPusher::sharing_counters_with(&pusher);
    // One address; the second interface cannot be served.
    let mut harness = start_engine(pusher, test_config(1, 24, 5_000));

    for interface in ["Ethernet1", "Ethernet2"] {
        harness.feed.send(Ok(admin_status(interface, "UP"))).unwrap();
        harness
            .feed
            .send(Ok(address_state(
                interface,
                "192.168.7.5",
                &[("ip", "192.168.7.5"), ("prefix-length", "24")],
            )))
            .unwrap();
    }

    wait_for_event(&mut harness.events, |e| {
        matches!(e, EngineEvent::Configured { interface, .. } if interface == "Ethernet1")
    })
    .await;
    let event = wait_for_event(&mut harness.events, |e| {
        matches!(e, EngineEvent::PoolExhausted { .. })
    })
    .await;

    assert_eq!(
        event,
        EngineEvent::PoolExhausted {
            interface: "Ethernet2".to_string(),
        }
    );
    // Only the first interface was written.
    assert_eq!(probe.call_count(), 1);

    let _ = harness.shutdown.send(());
    harness.handle.await.unwrap().unwrap();
}
