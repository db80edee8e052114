//! Service reconciler
//!
//! Fetches the Service, asks `decision::plan` what to do and applies the
//! answer. Allocator changes are rolled back when the status write that
//! should publish them fails, so allocation state always matches what the
//! cluster has recorded.

use super::decision::{plan, AddressRequest, Decision, SERVICE_FINALIZER};
use super::Reconciler;
use crate::error::ControllerError;
use crate::store::ServiceKey;
use k8s_openapi::api::core::v1::{LoadBalancerIngress, Service};
use lb_ipam::{IpamError, IpamManager};
use std::net::IpAddr;
use tracing::{debug, error, info, warn};

impl Reconciler {
    /// Reconcile the Service identified by `key`.
    ///
    /// Holds the global allocation lock for the whole call. Object store
    /// failures are returned so the caller can retry; allocation failures are
    /// logged and leave the Service untouched until its next event.
    pub async fn reconcile_service(&self, key: &ServiceKey) -> Result<(), ControllerError> {
        let mut ipam = self.ipam.lock().await;

        let Some(service) = self.store.get_service(key).await? else {
            debug!("Service {} not found, nothing to do", key);
            return Ok(());
        };

        match plan(&service) {
            Decision::NoOp => {
                debug!("Service {} already converged", key);
                Ok(())
            }
            Decision::AddFinalizer => self.add_finalizer(key, service).await,
            Decision::Finalize { release } => {
                self.finalize(&mut ipam, key, service, &release).await
            }
            Decision::Converge { release, acquire } => {
                self.converge(&mut ipam, key, service, &release, acquire)
                    .await
            }
        }
    }

    async fn add_finalizer(&self, key: &ServiceKey, mut service: Service) -> Result<(), ControllerError> {
        service
            .metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(SERVICE_FINALIZER.to_string());
        self.store.update_service(&service).await?;
        info!("Added finalizer {} to Service {}", SERVICE_FINALIZER, key);
        Ok(())
    }

    async fn finalize(
        &self,
        ipam: &mut IpamManager,
        key: &ServiceKey,
        mut service: Service,
        release: &[String],
    ) -> Result<(), ControllerError> {
        let released = release_addresses(ipam, key, release)?;

        if !release.is_empty() {
            set_ingress(&mut service, Vec::new());
            service = match self.store.update_service_status(&service).await {
                Ok(updated) => updated,
                Err(e) => {
                    restore_addresses(ipam, &released);
                    return Err(e.into());
                }
            };
        }

        if let Some(finalizers) = service.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != SERVICE_FINALIZER);
        }
        self.store.update_service(&service).await?;
        info!("Removed finalizer {} from Service {}", SERVICE_FINALIZER, key);
        Ok(())
    }

    async fn converge(
        &self,
        ipam: &mut IpamManager,
        key: &ServiceKey,
        mut service: Service,
        release: &[String],
        acquire: Option<AddressRequest>,
    ) -> Result<(), ControllerError> {
        let released = release_addresses(ipam, key, release)?;
        let mut status_changed = false;
        if !release.is_empty() {
            set_ingress(&mut service, Vec::new());
            status_changed = true;
        }

        let acquired = match acquire {
            Some(request) => match acquire_address(ipam, key, &request) {
                Ok(acquired) => acquired,
                Err(e) => {
                    restore_addresses(ipam, &released);
                    return Err(e);
                }
            },
            None => None,
        };
        if let Some(address) = acquired {
            service
                .status
                .get_or_insert_with(Default::default)
                .load_balancer
                .get_or_insert_with(Default::default)
                .ingress
                .get_or_insert_with(Vec::new)
                .push(LoadBalancerIngress {
                    ip: Some(address.to_string()),
                    ..Default::default()
                });
            status_changed = true;
        }

        if !status_changed {
            return Ok(());
        }

        if let Err(e) = self.store.update_service_status(&service).await {
            error!("Failed to update status of Service {}: {}", key, e);
            if let Some(address) = acquired {
                // Nothing recorded the address, so it must not stay taken
                if let Err(release_error) = ipam.release(address) {
                    warn!("Failed to roll back {} for Service {}: {}", address, key, release_error);
                }
            }
            restore_addresses(ipam, &released);
            return Err(e.into());
        }

        if let Some(address) = acquired {
            info!("Assigned external IP {} to Service {}", address, key);
        }
        Ok(())
    }
}

/// Release every parsable address; returns the ones released
fn release_addresses(
    ipam: &mut IpamManager,
    key: &ServiceKey,
    addresses: &[String],
) -> Result<Vec<IpAddr>, ControllerError> {
    let mut released = Vec::new();
    for text in addresses {
        let Ok(address) = text.parse::<IpAddr>() else {
            warn!("Service {} has unparsable ingress IP {:?}, dropping it", key, text);
            continue;
        };
        if let Err(e) = ipam.release(address) {
            restore_addresses(ipam, &released);
            return Err(e.into());
        }
        info!("Released external IP {} of Service {}", address, key);
        released.push(address);
    }
    Ok(released)
}

/// Put back addresses released earlier in a failed reconciliation
fn restore_addresses(ipam: &mut IpamManager, addresses: &[IpAddr]) {
    for address in addresses {
        ipam.mark_used(*address);
    }
}

/// `Ok(None)` when no address could be obtained for a retry-later reason
fn acquire_address(
    ipam: &mut IpamManager,
    key: &ServiceKey,
    request: &AddressRequest,
) -> Result<Option<IpAddr>, ControllerError> {
    match request {
        AddressRequest::Specific(text) => {
            let Ok(address) = text.parse::<IpAddr>() else {
                warn!("Service {} requests unparsable loadBalancerIP {:?}", key, text);
                return Ok(None);
            };
            match ipam.acquire_specific(address) {
                Ok(()) => Ok(Some(address)),
                Err(e) => {
                    info!("Cannot reserve {} for Service {}: {}", address, key, e);
                    Ok(None)
                }
            }
        }
        AddressRequest::Any => match ipam.acquire_any() {
            Ok(address) => Ok(Some(address)),
            Err(IpamError::NoAddressAvailable) => {
                warn!("No external IP available for Service {}", key);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        },
    }
}

fn set_ingress(service: &mut Service, ingress: Vec<LoadBalancerIngress>) {
    let load_balancer = service
        .status
        .get_or_insert_with(Default::default)
        .load_balancer
        .get_or_insert_with(Default::default);
    load_balancer.ingress = (!ingress.is_empty()).then_some(ingress);
}
