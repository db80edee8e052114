//! BGPIPsConfig CRD
//!
//! Declares one external IP pool. The controller registers the range on first
//! observation and reports pool usage in the status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "bgplb.io",
    version = "v1beta1",
    kind = "BGPIPsConfig",
    status = "BGPIPsConfigStatus",
    printcolumn = r#"{"name":"CIDR", "type":"string", "jsonPath":".spec.cidr"}"#,
    printcolumn = r#"{"name":"STATE", "type":"string", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"USED", "type":"integer", "jsonPath":".status.used"}"#,
    printcolumn = r#"{"name":"FREE", "type":"integer", "jsonPath":".status.free"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BGPIPsConfigSpec {
    /// Address range of the pool
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BGPIPsConfigStatus {
    /// Registration state
    pub state: PoolState,

    /// Normalised range as registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,

    /// Addresses the pool can hand out (saturates for very large ranges)
    #[serde(default)]
    pub total: u64,

    /// Acquired addresses
    #[serde(default)]
    pub used: u64,

    /// Remaining addresses
    #[serde(default)]
    pub free: u64,

    /// Acquired addresses, ascending
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocated: Vec<String>,

    /// Error message if registration failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Last reconciliation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<chrono::DateTime<chrono::Utc>>,
}

impl BGPIPsConfigStatus {
    /// Compare everything except `last_reconciled`
    #[must_use]
    pub fn same_observation(&self, other: &Self) -> bool {
        self.state == other.state
            && self.cidr == other.cidr
            && self.total == other.total
            && self.used == other.used
            && self.free == other.free
            && self.allocated == other.allocated
            && self.error == other.error
    }
}

/// Pool registration state
///
/// Serializes as PascalCase ("Ready", "Invalid", ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum PoolState {
    /// Not yet observed by the controller
    #[default]
    Pending,

    /// Registered and serving allocations
    Ready,

    /// CIDR could not be parsed or overlaps another pool
    Invalid,
}
