//! Reconciliation logic for bgplb.
//!
//! - `decision`: pure decision table for a single Service
//! - `service`: applies decisions against the allocator and the object store
//! - `pool`: registers pools declared by `BGPIPsConfig` / `BGPConfiguration`
//! - `recovery`: rebuilds allocation state at startup
//!
//! All reconciliations share one `IpamManager` behind a single async mutex.
//! The guard is held for the whole reconciliation, object store calls
//! included, so allocation decisions never interleave.

pub mod decision;
pub mod pool;
#[cfg(test)]
mod pool_test;
pub mod recovery;
pub mod service;

use crate::store::ObjectStore;
use lb_ipam::IpamManager;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Reconciles Services and pool configuration against the allocator.
pub struct Reconciler {
    pub(crate) store: Box<dyn ObjectStore>,
    /// Allocation state; locking it is the global reconciliation lock
    pub(crate) ipam: Mutex<IpamManager>,
    /// Name of the singleton `BGPConfiguration`
    pub(crate) config_name: String,
}

impl Reconciler {
    /// Creates a reconciler with an empty allocator.
    pub fn new(store: Box<dyn ObjectStore>, config_name: impl Into<String>) -> Self {
        Self {
            store,
            ipam: Mutex::new(IpamManager::new()),
            config_name: config_name.into(),
        }
    }
}

/// Result of registering a list of CIDRs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CidrRegistration {
    /// Normalised ranges now known to the allocator (new or pre-existing)
    pub registered: Vec<String>,
    /// Rejected entries as "<cidr>: <reason>"
    pub rejected: Vec<String>,
}

/// Register every CIDR, skipping the ones that fail.
pub(crate) fn register_cidrs<'a>(
    ipam: &mut IpamManager,
    cidrs: impl IntoIterator<Item = &'a str>,
) -> CidrRegistration {
    let mut result = CidrRegistration::default();
    for cidr in cidrs {
        match ipam.register(cidr) {
            Ok(registration) => {
                debug!("CIDR {} available for allocation as {}", cidr, registration.prefix());
                result.registered.push(registration.prefix().to_string());
            }
            Err(e) => {
                warn!("Skipping CIDR {}: {}", cidr, e);
                result.rejected.push(format!("{cidr}: {e}"));
            }
        }
    }
    result
}
