//! End-to-end fan-out behavior through the public registry and
//! scheduler APIs, without sockets or backing services.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use sentra_core::events::{EventSink, ServerEvent};
use sentra_core::model::{EmergencyType, Severity};
use sentra_server::realtime::{ArmScheduler, ClientConnection, Identity, PresenceRegistry};

fn connect(
    registry: &PresenceRegistry,
    identity: Identity,
) -> (Arc<ClientConnection>, mpsc::Receiver<ServerEvent>) {
    let (tx, rx) = mpsc::channel(16);
    let connection = Arc::new(ClientConnection::new(identity, tx));
    registry.register(Arc::clone(&connection));
    (connection, rx)
}

#[tokio::test]
async fn emergency_mirroring_shapes_payloads_per_audience() {
    let registry = PresenceRegistry::new();
    let customer = Uuid::new_v4();
    let (_cust_conn, mut cust_rx) = connect(&registry, Identity::Customer(customer));
    let (_op_conn, mut op_rx) = connect(&registry, Identity::Operator(Uuid::new_v4()));

    let emergency_id = Uuid::new_v4();
    let now = Utc::now();
    registry.notify_customer(
        customer,
        ServerEvent::EmergencyTriggered {
            emergency_id,
            kind: EmergencyType::Fire,
            severity: Severity::Critical,
            timestamp: now,
        },
    );
    registry.notify_operators(ServerEvent::NewEmergency {
        emergency_id,
        customer_id: customer,
        kind: EmergencyType::Fire,
        severity: Severity::Critical,
        timestamp: now,
    });

    let customer_event = cust_rx.try_recv().expect("customer should receive");
    let customer_wire = serde_json::to_value(&customer_event).unwrap();
    assert_eq!(customer_wire["event"], "EMERGENCY_TRIGGERED");
    assert!(customer_wire["data"].get("customer_id").is_none());

    let operator_event = op_rx.try_recv().expect("operators should receive");
    let operator_wire = serde_json::to_value(&operator_event).unwrap();
    assert_eq!(operator_wire["event"], "NEW_EMERGENCY");
    assert_eq!(operator_wire["data"]["customer_id"], customer.to_string());

    // Neither audience sees the other's mirror.
    assert!(cust_rx.try_recv().is_err());
    assert!(op_rx.try_recv().is_err());
}

#[tokio::test]
async fn displaced_connection_no_longer_receives() {
    let registry = PresenceRegistry::new();
    let customer = Uuid::new_v4();
    let (old, mut old_rx) = connect(&registry, Identity::Customer(customer));
    let (_new, mut new_rx) = connect(&registry, Identity::Customer(customer));
    registry.unregister(old.id);

    registry.notify_customer(
        customer,
        ServerEvent::SystemDisarmed {
            timestamp: Utc::now(),
        },
    );

    assert!(new_rx.try_recv().is_ok());
    assert!(old_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn disarm_during_countdown_wins() {
    let scheduler = Arc::new(ArmScheduler::new());
    let customer = Uuid::new_v4();
    let armed = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&armed);
    scheduler.schedule(customer, Duration::from_secs(30), move |ticket| {
        if ticket.commit() {
            flag.store(true, Ordering::SeqCst);
        }
        std::future::ready(())
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(scheduler.cancel(customer));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!armed.load(Ordering::SeqCst));
}
