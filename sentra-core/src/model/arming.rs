use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cache record indicating the security system is currently armed.
///
/// The cache is the sole authority here: absence of the key means
/// disarmed, and there is no durable fallback. See DESIGN.md for the
/// rationale of keeping this limitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmState {
    pub status: String,
    pub mode: String,
    pub timestamp: DateTime<Utc>,
    pub armed_by: Uuid,
}

impl ArmState {
    pub const TTL_SECONDS: u64 = 3600;

    pub fn armed(mode: impl Into<String>, armed_by: Uuid) -> Self {
        Self {
            status: "armed".to_string(),
            mode: mode.into(),
            timestamp: Utc::now(),
            armed_by,
        }
    }
}

/// Default arm mode when the client does not specify one.
pub const DEFAULT_ARM_MODE: &str = "full";

/// Default countdown before an arm request activates, in seconds.
pub const DEFAULT_ARM_DELAY_SECONDS: u64 = 30;
