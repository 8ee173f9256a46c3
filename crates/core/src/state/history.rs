//! Append-only audit trail of detected risk events.

use serde::{Deserialize, Serialize};

use crate::Timestamp;
use crate::signal::Metadata;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub detected_at: Timestamp,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub metadata: Metadata,
}
