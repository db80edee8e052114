//! Main controller implementation.
//!
//! Builds the reconciler, rebuilds allocation state from the cluster and only
//! then starts the watchers:
//! - Service: assigns and releases external IPs
//! - BGPIPsConfig: registers single pools and reports their usage
//! - BGPConfiguration: registers the pools listed by the singleton

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::store::KubeObjectStore;
use crate::watcher::Watcher;
use crds::{BGPConfiguration, BGPIPsConfig};
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for external IP management.
#[derive(Debug)]
pub struct Controller {
    service_watcher: JoinHandle<Result<(), ControllerError>>,
    ip_pool_watcher: JoinHandle<Result<(), ControllerError>>,
    bgp_configuration_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    ///
    /// Fails if the cluster cannot be reached or startup recovery fails; no
    /// Service is reconciled before recovery has completed.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing bgplb controller");

        let client = Client::try_default().await?;

        let service_api: Api<Service> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(client.clone(), ns),
            None => Api::all(client.clone()),
        };
        let ip_pool_api: Api<BGPIPsConfig> = Api::all(client.clone());
        let bgp_configuration_api: Api<BGPConfiguration> = Api::all(client.clone());

        let store = KubeObjectStore::new(client, config.namespace.clone());
        let reconciler = Arc::new(Reconciler::new(Box::new(store), config.config_name.clone()));

        info!("Recovering allocation state from the cluster...");
        let report = reconciler.recover(config.list_page_size).await.map_err(|e| {
            error!("Startup recovery failed: {}", e);
            e
        })?;
        info!(
            "Recovery complete: {} pools registered, {} CIDRs rejected, {} Services scanned, {} addresses marked, {} ignored",
            report.registered_cidrs.len(),
            report.rejected_cidrs.len(),
            report.services_scanned,
            report.addresses_marked,
            report.addresses_ignored
        );

        let watcher_instance = Arc::new(Watcher::new(
            reconciler,
            service_api,
            ip_pool_api,
            bgp_configuration_api,
            config.retry,
            config.pool_resync,
        ));

        let service_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_services().await })
        };

        let ip_pool_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_ip_pools().await })
        };

        let bgp_configuration_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_bgp_configurations().await })
        };

        Ok(Self {
            service_watcher,
            ip_pool_watcher,
            bgp_configuration_watcher,
        })
    }

    /// Runs until one of the watchers exits, returning its failure.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("bgplb controller running");

        tokio::select! {
            result = &mut self.service_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Service watcher panicked: {e}")))??;
            }
            result = &mut self.ip_pool_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("BGPIPsConfig watcher panicked: {e}")))??;
            }
            result = &mut self.bgp_configuration_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("BGPConfiguration watcher panicked: {e}")))??;
            }
        }

        Ok(())
    }
}
