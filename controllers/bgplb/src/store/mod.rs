//! Object store abstraction
//!
//! Every read and write the controller performs against the cluster goes
//! through the `ObjectStore` trait. The Kubernetes implementation lives in
//! `kube_store`; tests use the in-memory `MockObjectStore`.

pub mod kube_store;
#[cfg(test)]
pub mod mock;

pub use self::kube_store::KubeObjectStore;
#[cfg(test)]
pub use self::mock::{MockObjectStore, MockWrite};

use crds::{BGPConfiguration, BGPConfigurationStatus, BGPIPsConfig, BGPIPsConfigStatus};
use k8s_openapi::api::core::v1::Service;
use std::fmt;
use thiserror::Error;

/// Errors returned by object store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Optimistic concurrency check failed
    #[error("Conflict writing {0}")]
    Conflict(String),

    /// Object disappeared before the write
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object lacks the metadata needed to address it
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Store could not be reached
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Namespace and name of a Service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceKey {
    pub namespace: String,
    pub name: String,
}

impl ServiceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of `service`, `None` when name or namespace is missing
    pub fn from_service(service: &Service) -> Option<Self> {
        Some(Self::new(
            service.metadata.namespace.as_deref()?,
            service.metadata.name.as_deref()?,
        ))
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One page of a Service listing
#[derive(Debug, Clone, Default)]
pub struct ServicePage {
    pub items: Vec<Service>,
    /// Token for the next page, `None` on the last page
    pub continue_token: Option<String>,
}

/// Reads and writes the controller needs from the cluster.
///
/// All methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a Service, `Ok(None)` when it does not exist
    async fn get_service(&self, key: &ServiceKey) -> Result<Option<Service>, StoreError>;

    /// List one page of Services
    async fn list_services(
        &self,
        limit: u32,
        continue_token: Option<&str>,
    ) -> Result<ServicePage, StoreError>;

    /// Persist metadata and spec of a Service (optimistic concurrency on
    /// `resourceVersion`)
    async fn update_service(&self, service: &Service) -> Result<Service, StoreError>;

    /// Persist the load balancer status of a Service (optimistic concurrency
    /// on `resourceVersion`)
    async fn update_service_status(&self, service: &Service) -> Result<Service, StoreError>;

    /// Fetch the cluster-scoped configuration object
    async fn get_bgp_configuration(
        &self,
        name: &str,
    ) -> Result<Option<BGPConfiguration>, StoreError>;

    /// List every `BGPIPsConfig`
    async fn list_ip_pools(&self) -> Result<Vec<BGPIPsConfig>, StoreError>;

    /// Publish the registration outcome of a configuration object
    async fn update_bgp_configuration_status(
        &self,
        name: &str,
        status: &BGPConfigurationStatus,
    ) -> Result<(), StoreError>;

    /// Publish pool usage
    async fn update_ip_pool_status(
        &self,
        name: &str,
        status: &BGPIPsConfigStatus,
    ) -> Result<(), StoreError>;
}
