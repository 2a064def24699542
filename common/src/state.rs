use serde::{Deserialize, Serialize};

/// The single persisted controller record.
///
/// `running` is the last successfully actuated direction, not a reading from
/// the unit, and drifts if a transmission is lost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    #[serde(rename = "OpMode")]
    pub op_mode: String,
    #[serde(rename = "Schedule")]
    pub schedule: String,
    #[serde(rename = "Manual")]
    pub manual: bool,
    #[serde(rename = "Override")]
    pub override_lock: bool,
    #[serde(rename = "Running")]
    pub running: bool,
}
