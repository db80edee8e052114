//! bgplb Controller
//!
//! Assigns external IPs to `LoadBalancer` Services from configured CIDR pools:
//! - BGPConfiguration: cluster-wide singleton listing the pools
//! - BGPIPsConfig: one additional pool per object
//! - Service: gets an address in `status.loadBalancer.ingress`, released again
//!   when the Service is deleted or stops being a `LoadBalancer`

mod admission;
mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod store;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls client needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting bgplb controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  BGPConfiguration: {}", config.config_name);
    info!("  List page size: {}", config.list_page_size);
    info!(
        "  Retry: {}s..{}s, {} retries",
        config.retry.min_seconds, config.retry.max_seconds, config.retry.max_retries
    );
    info!("  Pool resync: {:?}", config.pool_resync);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
