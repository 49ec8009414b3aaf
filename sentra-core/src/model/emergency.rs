use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::SentraError;

/// Severity of an emergency, in ascending order of urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Dispatch priority: critical emergencies sort first.
    pub fn priority(self) -> u8 {
        match self {
            Severity::Critical => 1,
            Severity::High => 2,
            Severity::Medium => 3,
            Severity::Low => 4,
        }
    }

    /// Critical and high severity emergencies trigger automatic
    /// dispatch actions in addition to operator assignment.
    pub fn requires_auto_dispatch(self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Priority for a raw severity string; unrecognized values fall
    /// back to the lowest priority.
    pub fn priority_for(raw: &str) -> u8 {
        raw.parse::<Severity>().map(Severity::priority).unwrap_or(4)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = SentraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(SentraError::Validation(format!("unknown severity `{other}`"))),
        }
    }
}

/// Category of an emergency, driving the auto-dispatch derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyType {
    Panic,
    Intrusion,
    Fire,
    Medical,
    Other,
}

impl EmergencyType {
    /// Actions derived for this emergency type, in dispatch order.
    pub fn dispatch_actions(self) -> &'static [DispatchAction] {
        use DispatchAction::*;
        match self {
            EmergencyType::Fire => &[ContactFireDepartment],
            EmergencyType::Medical => &[ContactAmbulance],
            EmergencyType::Intrusion => &[ContactSecurity],
            EmergencyType::Panic => &[ContactCustomer, ContactEmergencyContacts],
            EmergencyType::Other => &[ContactCustomer],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmergencyType::Panic => "panic",
            EmergencyType::Intrusion => "intrusion",
            EmergencyType::Fire => "fire",
            EmergencyType::Medical => "medical",
            EmergencyType::Other => "other",
        }
    }
}

impl fmt::Display for EmergencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmergencyType {
    type Err = SentraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "panic" => Ok(EmergencyType::Panic),
            "intrusion" => Ok(EmergencyType::Intrusion),
            "fire" => Ok(EmergencyType::Fire),
            "medical" => Ok(EmergencyType::Medical),
            "other" => Ok(EmergencyType::Other),
            unknown => Err(SentraError::Validation(format!(
                "unknown emergency type `{unknown}`"
            ))),
        }
    }
}

/// Lifecycle state of an emergency.
///
/// Resolved and cancelled are terminal; the repository layer enforces
/// the transition graph with guarded updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    Pending,
    InProgress,
    Resolved,
    Cancelled,
}

impl EmergencyStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EmergencyStatus::Resolved | EmergencyStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: EmergencyStatus) -> bool {
        use EmergencyStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Resolved)
                | (Pending, Cancelled)
                | (InProgress, Resolved)
                | (InProgress, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmergencyStatus::Pending => "pending",
            EmergencyStatus::InProgress => "in_progress",
            EmergencyStatus::Resolved => "resolved",
            EmergencyStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EmergencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmergencyStatus {
    type Err = SentraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EmergencyStatus::Pending),
            "in_progress" => Ok(EmergencyStatus::InProgress),
            "resolved" => Ok(EmergencyStatus::Resolved),
            "cancelled" => Ok(EmergencyStatus::Cancelled),
            other => Err(SentraError::Validation(format!(
                "unknown emergency status `{other}`"
            ))),
        }
    }
}

/// An auto-dispatch action recorded on the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    ContactFireDepartment,
    ContactAmbulance,
    ContactSecurity,
    ContactCustomer,
    ContactEmergencyContacts,
}

impl DispatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchAction::ContactFireDepartment => "contact_fire_department",
            DispatchAction::ContactAmbulance => "contact_ambulance",
            DispatchAction::ContactSecurity => "contact_security",
            DispatchAction::ContactCustomer => "contact_customer",
            DispatchAction::ContactEmergencyContacts => "contact_emergency_contacts",
        }
    }
}

impl fmt::Display for DispatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked emergency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emergency {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub device_id: Option<Uuid>,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: EmergencyType,
    pub description: Option<String>,
    pub location_data: Option<JsonValue>,
    pub status: EmergencyStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Input for creating a new emergency. Enum fields are already
/// parsed; raw string validation happens at the caller.
#[derive(Debug, Clone)]
pub struct EmergencyInput {
    pub customer_id: Uuid,
    pub device_id: Option<Uuid>,
    pub severity: Severity,
    pub kind: EmergencyType,
    pub description: Option<String>,
    pub location_data: Option<JsonValue>,
}

/// One row of the append-only emergency audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyResponse {
    pub id: Uuid,
    pub emergency_id: Uuid,
    pub operator_id: Option<Uuid>,
    pub action: String,
    pub response_time_seconds: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Joined from the operators table for display; not stored on the row.
    pub operator_name: Option<String>,
}

/// Advisory cache record describing in-flight handling of an
/// emergency. The durable store remains the authority for status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMarker {
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub priority: u8,
}

impl ProcessingMarker {
    pub const TTL_SECONDS: u64 = 3600;

    pub fn new(severity: Severity) -> Self {
        Self {
            status: "processing".to_string(),
            started_at: Utc::now(),
            priority: severity.priority(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_mapping_is_total() {
        assert_eq!(Severity::Critical.priority(), 1);
        assert_eq!(Severity::High.priority(), 2);
        assert_eq!(Severity::Medium.priority(), 3);
        assert_eq!(Severity::Low.priority(), 4);
    }

    #[test]
    fn unknown_severity_falls_back_to_lowest_priority() {
        assert_eq!(Severity::priority_for("critical"), 1);
        assert_eq!(Severity::priority_for("high"), 2);
        assert_eq!(Severity::priority_for("catastrophic"), 4);
        assert_eq!(Severity::priority_for(""), 4);
    }

    #[test]
    fn fire_dispatches_exactly_fire_department() {
        assert_eq!(
            EmergencyType::Fire.dispatch_actions(),
            &[DispatchAction::ContactFireDepartment]
        );
    }

    #[test]
    fn panic_dispatches_customer_then_emergency_contacts() {
        assert_eq!(
            EmergencyType::Panic.dispatch_actions(),
            &[
                DispatchAction::ContactCustomer,
                DispatchAction::ContactEmergencyContacts
            ]
        );
    }

    #[test]
    fn remaining_types_dispatch_single_actions() {
        assert_eq!(
            EmergencyType::Medical.dispatch_actions(),
            &[DispatchAction::ContactAmbulance]
        );
        assert_eq!(
            EmergencyType::Intrusion.dispatch_actions(),
            &[DispatchAction::ContactSecurity]
        );
        assert_eq!(
            EmergencyType::Other.dispatch_actions(),
            &[DispatchAction::ContactCustomer]
        );
    }

    #[test]
    fn terminal_states_never_transition() {
        use EmergencyStatus::*;
        for next in [Pending, InProgress, Resolved, Cancelled] {
            assert!(!Resolved.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn pending_and_in_progress_may_terminate() {
        use EmergencyStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(Pending.can_transition_to(Resolved));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Resolved));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!InProgress.can_transition_to(Pending));
    }

    #[test]
    fn enum_round_trips_through_strings() {
        for severity in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            assert_eq!(severity.as_str().parse::<Severity>().unwrap(), severity);
        }
        for status in [
            EmergencyStatus::Pending,
            EmergencyStatus::InProgress,
            EmergencyStatus::Resolved,
            EmergencyStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<EmergencyStatus>().unwrap(), status);
        }
    }

    #[test]
    fn processing_marker_carries_severity_priority() {
        let marker = ProcessingMarker::new(Severity::Critical);
        assert_eq!(marker.status, "processing");
        assert_eq!(marker.priority, 1);
    }
}
