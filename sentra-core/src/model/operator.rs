use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A human operator eligible for emergency assignment.
///
/// `last_assigned_at` drives the deterministic least-recently-assigned
/// selection order; operators that have never been assigned sort first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: Uuid,
    pub name: String,
    pub last_assigned_at: Option<DateTime<Utc>>,
}
