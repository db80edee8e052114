//! BGPConfiguration CRD
//!
//! Cluster-wide controller configuration. One object, named `default` unless
//! configured otherwise, lists the CIDRs external Service IPs are drawn from.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "bgplb.io",
    version = "v1beta1",
    kind = "BGPConfiguration",
    status = "BGPConfigurationStatus",
    printcolumn = r#"{"name":"AGE", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BGPConfigurationSpec {
    /// Address ranges LoadBalancer Service IPs are allocated from, in
    /// allocation order
    #[serde(default, rename = "serviceExternalIPs")]
    pub service_external_ips: Vec<ServiceExternalIPBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExternalIPBlock {
    /// CIDR text, e.g. "192.0.2.0/24"
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BGPConfigurationStatus {
    /// Ranges accepted by the allocator (normalised)
    #[serde(default)]
    pub registered_cidrs: Vec<String>,

    /// Entries that could not be parsed, with the reason
    #[serde(default)]
    pub rejected_cidrs: Vec<String>,

    /// Last reconciliation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<chrono::DateTime<chrono::Utc>>,
}

impl BGPConfiguration {
    /// CIDR texts in declaration order
    pub fn cidrs(&self) -> impl Iterator<Item = &str> {
        self.spec.service_external_ips.iter().map(|block| block.cidr.as_str())
    }
}
