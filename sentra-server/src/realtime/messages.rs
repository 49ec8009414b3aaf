//! Inbound client event contract.
//!
//! Same wire shape as the outbound side: `{"event": "<NAME>", "data":
//! {...}}` with SCREAMING_SNAKE_CASE names.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use sentra_core::model::{DEFAULT_ARM_DELAY_SECONDS, DEFAULT_ARM_MODE};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientEvent {
    CustomerStatusUpdate {
        status: String,
    },
    RequestSystemStatus,
    DeviceSensorTrigger {
        device_id: Uuid,
        sensor_type: String,
        #[serde(default)]
        trigger_data: Option<JsonValue>,
    },
    DeviceHeartbeat {
        device_id: Uuid,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        battery_level: Option<i32>,
    },
    EmergencyUpdate {
        emergency_id: Uuid,
        status: String,
        #[serde(default)]
        notes: Option<String>,
    },
    SystemArmRequest {
        #[serde(default = "default_arm_mode")]
        mode: String,
        #[serde(default = "default_arm_delay")]
        delay: u64,
    },
    SystemDisarmRequest,
}

fn default_arm_mode() -> String {
    DEFAULT_ARM_MODE.to_string()
}

fn default_arm_delay() -> u64 {
    DEFAULT_ARM_DELAY_SECONDS
}
