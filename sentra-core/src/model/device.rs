use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::emergency::{EmergencyType, Severity};

/// A security device installed at a customer site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: Option<String>,
    pub status: Option<String>,
    pub battery_level: Option<i32>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Battery level at or below this threshold raises BATTERY_LOW.
pub const LOW_BATTERY_THRESHOLD: i32 = 20;

/// Cache record refreshed on every device heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatMarker {
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub battery_level: Option<i32>,
}

impl HeartbeatMarker {
    pub const TTL_SECONDS: u64 = 300;
}

/// Severity an inbound sensor trip escalates with.
pub fn severity_for_sensor(sensor_type: &str) -> Severity {
    match sensor_type {
        "panic" | "fire" | "smoke" => Severity::Critical,
        "intrusion" | "glass_break" => Severity::High,
        "door" | "window" => Severity::Medium,
        "motion" => Severity::Low,
        _ => Severity::Medium,
    }
}

/// Emergency category an inbound sensor trip escalates as.
pub fn emergency_type_for_sensor(sensor_type: &str) -> EmergencyType {
    match sensor_type {
        "panic" => EmergencyType::Panic,
        "fire" | "smoke" => EmergencyType::Fire,
        "intrusion" | "door" | "window" | "motion" | "glass_break" => EmergencyType::Intrusion,
        _ => EmergencyType::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_severity_mapping() {
        assert_eq!(severity_for_sensor("panic"), Severity::Critical);
        assert_eq!(severity_for_sensor("smoke"), Severity::Critical);
        assert_eq!(severity_for_sensor("glass_break"), Severity::High);
        assert_eq!(severity_for_sensor("window"), Severity::Medium);
        assert_eq!(severity_for_sensor("motion"), Severity::Low);
        assert_eq!(severity_for_sensor("tilt"), Severity::Medium);
    }

    #[test]
    fn sensor_type_mapping() {
        assert_eq!(emergency_type_for_sensor("panic"), EmergencyType::Panic);
        assert_eq!(emergency_type_for_sensor("smoke"), EmergencyType::Fire);
        assert_eq!(emergency_type_for_sensor("motion"), EmergencyType::Intrusion);
        assert_eq!(emergency_type_for_sensor("tilt"), EmergencyType::Other);
    }
}
