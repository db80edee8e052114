//! Startup recovery
//!
//! Rebuilds allocation state from the cluster before any Service is
//! reconciled. Every pool is registered first, from the `BGPConfiguration`
//! singleton and from each `BGPIPsConfig`. Only then is every ingress IP
//! already published on a `LoadBalancer` Service marked as taken.

use super::decision::{assigned_ips, is_load_balancer};
use super::{register_cidrs, Reconciler};
use crate::error::ControllerError;
use crate::store::ServiceKey;
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Outcome of `Reconciler::recover`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub registered_cidrs: Vec<String>,
    pub rejected_cidrs: Vec<String>,
    pub services_scanned: usize,
    pub addresses_marked: usize,
    pub addresses_ignored: usize,
}

impl Reconciler {
    /// Rebuild allocation state. Must complete before reconciliation starts.
    ///
    /// A missing configuration object is fine; failing to read it, to list
    /// pools or to list Services is returned.
    pub async fn recover(&self, page_size: u32) -> Result<RecoveryReport, ControllerError> {
        let mut ipam = self.ipam.lock().await;
        let mut report = RecoveryReport::default();

        match self.store.get_bgp_configuration(&self.config_name).await? {
            Some(config) => {
                let registration = register_cidrs(&mut ipam, config.cidrs());
                report.registered_cidrs = registration.registered;
                report.rejected_cidrs = registration.rejected;
            }
            None => {
                info!(
                    "BGPConfiguration {} not found, starting without configured pools",
                    self.config_name
                );
            }
        }

        let pools = self.store.list_ip_pools().await?;
        debug!("Recovery registering {} BGPIPsConfig pools", pools.len());
        let registration = register_cidrs(&mut ipam, pools.iter().map(|pool| pool.spec.cidr.as_str()));
        report.registered_cidrs.extend(registration.registered);
        report.rejected_cidrs.extend(registration.rejected);

        let mut continue_token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_services(page_size, continue_token.as_deref())
                .await?;
            debug!("Recovery scanning {} Services", page.items.len());

            for service in &page.items {
                report.services_scanned += 1;
                if !is_load_balancer(service) {
                    continue;
                }
                let key = ServiceKey::from_service(service);
                for text in assigned_ips(service) {
                    let marked = text
                        .parse::<IpAddr>()
                        .is_ok_and(|address| ipam.mark_used(address));
                    if marked {
                        report.addresses_marked += 1;
                    } else {
                        warn!(
                            "Ignoring ingress IP {:?} of Service {}: unparsable or outside registered pools",
                            text,
                            key.as_ref().map_or_else(|| "<unnamed>".to_string(), ToString::to_string)
                        );
                        report.addresses_ignored += 1;
                    }
                }
            }

            match page.continue_token {
                Some(token) => continue_token = Some(token),
                None => break,
            }
        }

        Ok(report)
    }
}
