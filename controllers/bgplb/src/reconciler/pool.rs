//! Pool reconcilers
//!
//! `BGPIPsConfig` declares one pool, the `BGPConfiguration` singleton lists
//! several. Both register their ranges on observation and report the outcome
//! in their status. Registration is idempotent, so the periodic resync simply
//! re-runs them.

use super::{register_cidrs, Reconciler};
use crate::error::ControllerError;
use chrono::Utc;
use crds::{BGPConfiguration, BGPConfigurationStatus, BGPIPsConfig, BGPIPsConfigStatus, PoolState};
use lb_ipam::{Prefix, Registration};
use tracing::{debug, info, warn};

impl Reconciler {
    pub async fn reconcile_ip_pool(&self, pool: &BGPIPsConfig) -> Result<(), ControllerError> {
        let name = pool
            .metadata
            .name
            .as_ref()
            .ok_or_else(|| ControllerError::MissingField("BGPIPsConfig missing name".to_string()))?;

        debug!("Reconciling BGPIPsConfig {}", name);

        let mut ipam = self.ipam.lock().await;
        let mut status = match ipam.register_pool(&pool.spec.cidr) {
            Ok((registration, prefix)) => {
                if let Registration::Registered(net) = registration {
                    info!("BGPIPsConfig {} registered pool {}", name, net);
                }
                usage_status(prefix)
            }
            Err(e) => {
                warn!("BGPIPsConfig {} rejected: {}", name, e);
                BGPIPsConfigStatus {
                    state: PoolState::Invalid,
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let unchanged = pool
            .status
            .as_ref()
            .is_some_and(|current| current.same_observation(&status));
        if unchanged {
            debug!("BGPIPsConfig {} status unchanged", name);
            return Ok(());
        }

        status.last_reconciled = Some(Utc::now());
        self.store.update_ip_pool_status(name, &status).await?;
        debug!(
            "Updated BGPIPsConfig {} status: {} used, {} free",
            name, status.used, status.free
        );
        Ok(())
    }

    pub async fn reconcile_bgp_configuration(
        &self,
        config: &BGPConfiguration,
    ) -> Result<(), ControllerError> {
        let name = config.metadata.name.as_ref().ok_or_else(|| {
            ControllerError::MissingField("BGPConfiguration missing name".to_string())
        })?;
        if *name != self.config_name {
            debug!(
                "Ignoring BGPConfiguration {}, only {} is honoured",
                name, self.config_name
            );
            return Ok(());
        }

        let mut ipam = self.ipam.lock().await;
        let registration = register_cidrs(&mut ipam, config.cidrs());
        drop(ipam);

        let unchanged = config.status.as_ref().is_some_and(|current| {
            current.registered_cidrs == registration.registered
                && current.rejected_cidrs == registration.rejected
        });
        if unchanged {
            debug!("BGPConfiguration {} status unchanged", name);
            return Ok(());
        }

        info!(
            "BGPConfiguration {}: {} CIDRs registered, {} rejected",
            name,
            registration.registered.len(),
            registration.rejected.len()
        );
        let status = BGPConfigurationStatus {
            registered_cidrs: registration.registered,
            rejected_cidrs: registration.rejected,
            last_reconciled: Some(Utc::now()),
        };
        self.store.update_bgp_configuration_status(name, &status).await?;
        Ok(())
    }
}

fn usage_status(prefix: &Prefix) -> BGPIPsConfigStatus {
    let usage = prefix.usage();
    BGPIPsConfigStatus {
        state: PoolState::Ready,
        cidr: Some(prefix.net().to_string()),
        total: saturate(usage.capacity),
        used: saturate(usage.used),
        free: saturate(usage.free()),
        allocated: prefix.acquired().map(|address| address.to_string()).collect(),
        error: None,
        last_reconciled: None,
    }
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
