//! Real-time event contract shared between the dispatch orchestrator
//! and the server's fan-out layer.
//!
//! Wire form is `{"event": "<NAME>", "data": {...}}`. Event names are
//! a preserved contract; payload shaping differs per audience —
//! operator payloads always carry `customer_id`, customer payloads
//! never do.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::model::{Device, EmergencyType, Severity};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    ConnectionEstablished {
        #[serde(skip_serializing_if = "Option::is_none")]
        customer_id: Option<Uuid>,
        #[serde(skip_serializing_if = "Option::is_none")]
        operator_id: Option<Uuid>,
        timestamp: DateTime<Utc>,
        message: String,
    },
    SystemArmCountdown {
        mode: String,
        delay: u64,
        timestamp: DateTime<Utc>,
    },
    SystemArmed {
        mode: String,
        timestamp: DateTime<Utc>,
    },
    SystemDisarmed {
        timestamp: DateTime<Utc>,
    },
    HeartbeatReceived {
        device_id: Uuid,
        status: Option<String>,
        battery_level: Option<i32>,
        timestamp: DateTime<Utc>,
    },
    HeartbeatAcknowledged {
        device_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    BatteryLow {
        device_id: Uuid,
        battery_level: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        device_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<String>,
        timestamp: DateTime<Utc>,
    },
    SensorTriggered {
        device_id: Uuid,
        device_type: String,
        location: Option<String>,
        sensor_type: String,
        trigger_data: Option<JsonValue>,
        timestamp: DateTime<Utc>,
    },
    DeviceConnected {
        device_id: Uuid,
        device_type: String,
        location: Option<String>,
        status: Option<String>,
        battery_level: Option<i32>,
    },
    DeviceDisconnected {
        device_id: Uuid,
        device_type: String,
        location: Option<String>,
    },
    DeviceStatusChanged {
        device_id: Uuid,
        device_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        battery_level: Option<i32>,
    },
    EmergencyTriggered {
        emergency_id: Uuid,
        #[serde(rename = "type")]
        kind: EmergencyType,
        severity: Severity,
        timestamp: DateTime<Utc>,
    },
    /// Operators only; mirrors EMERGENCY_TRIGGERED with the customer
    /// identity attached.
    NewEmergency {
        emergency_id: Uuid,
        customer_id: Uuid,
        #[serde(rename = "type")]
        kind: EmergencyType,
        severity: Severity,
        timestamp: DateTime<Utc>,
    },
    EmergencyResolved {
        emergency_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        customer_id: Option<Uuid>,
        resolved_at: DateTime<Utc>,
        resolved_by: String,
    },
    EmergencyCancelled {
        emergency_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        customer_id: Option<Uuid>,
        cancelled_at: DateTime<Utc>,
    },
    EmergencyUpdated {
        emergency_id: Uuid,
        status: String,
        timestamp: DateTime<Utc>,
    },
    /// Operators only; customer acknowledgment mirrored with identity
    /// and notes attached.
    EmergencyCustomerUpdate {
        emergency_id: Uuid,
        customer_id: Uuid,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
        timestamp: DateTime<Utc>,
    },
    CustomerStatusUpdated {
        status: String,
        timestamp: DateTime<Utc>,
    },
    SystemStatusResponse {
        system_status: JsonValue,
        devices: Vec<Device>,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionEstablished { .. } => "CONNECTION_ESTABLISHED",
            ServerEvent::SystemArmCountdown { .. } => "SYSTEM_ARM_COUNTDOWN",
            ServerEvent::SystemArmed { .. } => "SYSTEM_ARMED",
            ServerEvent::SystemDisarmed { .. } => "SYSTEM_DISARMED",
            ServerEvent::HeartbeatReceived { .. } => "HEARTBEAT_RECEIVED",
            ServerEvent::HeartbeatAcknowledged { .. } => "HEARTBEAT_ACKNOWLEDGED",
            ServerEvent::BatteryLow { .. } => "BATTERY_LOW",
            ServerEvent::SensorTriggered { .. } => "SENSOR_TRIGGERED",
            ServerEvent::DeviceConnected { .. } => "DEVICE_CONNECTED",
            ServerEvent::DeviceDisconnected { .. } => "DEVICE_DISCONNECTED",
            ServerEvent::DeviceStatusChanged { .. } => "DEVICE_STATUS_CHANGED",
            ServerEvent::EmergencyTriggered { .. } => "EMERGENCY_TRIGGERED",
            ServerEvent::NewEmergency { .. } => "NEW_EMERGENCY",
            ServerEvent::EmergencyResolved { .. } => "EMERGENCY_RESOLVED",
            ServerEvent::EmergencyCancelled { .. } => "EMERGENCY_CANCELLED",
            ServerEvent::EmergencyUpdated { .. } => "EMERGENCY_UPDATED",
            ServerEvent::EmergencyCustomerUpdate { .. } => "EMERGENCY_CUSTOMER_UPDATE",
            ServerEvent::CustomerStatusUpdated { .. } => "CUSTOMER_STATUS_UPDATED",
            ServerEvent::SystemStatusResponse { .. } => "SYSTEM_STATUS_RESPONSE",
            ServerEvent::Error { .. } => "ERROR",
        }
    }
}

/// Fire-and-forget fan-out seam.
///
/// Implementations must never block: delivery failures are logged and
/// swallowed, and a slow subscriber never stalls the caller. The
/// server's presence registry is the production implementation.
pub trait EventSink: Send + Sync {
    fn notify_customer(&self, customer_id: Uuid, event: ServerEvent);
    fn notify_operators(&self, event: ServerEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(event: &ServerEvent) -> serde_json::Value {
        serde_json::to_value(event).unwrap()
    }

    #[test]
    fn events_are_adjacently_tagged() {
        let event = ServerEvent::SystemDisarmed {
            timestamp: Utc::now(),
        };
        let value = wire(&event);
        assert_eq!(value["event"], "SYSTEM_DISARMED");
        assert!(value["data"]["timestamp"].is_string());
    }

    #[test]
    fn wire_names_match_contract() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let cases = vec![
            ServerEvent::SystemArmed {
                mode: "full".into(),
                timestamp: now,
            },
            ServerEvent::BatteryLow {
                device_id: id,
                battery_level: 15,
                device_type: None,
                location: None,
                timestamp: now,
            },
            ServerEvent::NewEmergency {
                emergency_id: id,
                customer_id: id,
                kind: EmergencyType::Fire,
                severity: Severity::Critical,
                timestamp: now,
            },
            ServerEvent::Error {
                message: "nope".into(),
            },
        ];
        for event in cases {
            assert_eq!(wire(&event)["event"], event.name());
        }
    }

    #[test]
    fn customer_payloads_omit_customer_id() {
        let event = ServerEvent::EmergencyResolved {
            emergency_id: Uuid::new_v4(),
            customer_id: None,
            resolved_at: Utc::now(),
            resolved_by: "customer".into(),
        };
        let value = wire(&event);
        assert!(value["data"].get("customer_id").is_none());
    }

    #[test]
    fn operator_payloads_carry_customer_id() {
        let customer_id = Uuid::new_v4();
        let event = ServerEvent::EmergencyResolved {
            emergency_id: Uuid::new_v4(),
            customer_id: Some(customer_id),
            resolved_at: Utc::now(),
            resolved_by: "customer".into(),
        };
        let value = wire(&event);
        assert_eq!(value["data"]["customer_id"], customer_id.to_string());
    }

    #[test]
    fn severity_and_type_serialize_lowercase() {
        let event = ServerEvent::EmergencyTriggered {
            emergency_id: Uuid::new_v4(),
            kind: EmergencyType::Panic,
            severity: Severity::High,
            timestamp: Utc::now(),
        };
        let value = wire(&event);
        assert_eq!(value["data"]["type"], "panic");
        assert_eq!(value["data"]["severity"], "high");
    }
}
