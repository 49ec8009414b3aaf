use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// The slice of a customer record the core needs for authentication
/// and scoping decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub subscription_status: String,
}

impl Customer {
    pub fn is_active(&self) -> bool {
        self.subscription_status == "active"
    }
}

/// Snapshot of the customer details an operator needs during an
/// emergency, cached for the duration of handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerEmergencyInfo {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contacts: Option<JsonValue>,
    pub medical_alerts: Option<JsonValue>,
}

impl CustomerEmergencyInfo {
    pub const TTL_SECONDS: u64 = 3600;
}
