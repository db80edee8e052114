//! `ObjectStore` backed by the Kubernetes API.

use super::{ObjectStore, ServiceKey, ServicePage, StoreError};
use crds::{BGPConfiguration, BGPConfigurationStatus, BGPIPsConfig, BGPIPsConfigStatus};
use k8s_openapi::api::core::v1::Service;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

/// Kubernetes-backed object store.
///
/// Service access is limited to `namespace` when one is configured.
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
    namespace: Option<String>,
}

impl KubeObjectStore {
    /// Creates a store using `client`
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    fn services_in(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self) -> Api<Service> {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn key_of(service: &Service) -> Result<ServiceKey, StoreError> {
        ServiceKey::from_service(service)
            .ok_or_else(|| StoreError::InvalidObject("Service missing name or namespace".to_string()))
    }
}

#[async_trait::async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get_service(&self, key: &ServiceKey) -> Result<Option<Service>, StoreError> {
        Ok(self.services_in(&key.namespace).get_opt(&key.name).await?)
    }

    async fn list_services(
        &self,
        limit: u32,
        continue_token: Option<&str>,
    ) -> Result<ServicePage, StoreError> {
        let mut params = ListParams::default().limit(limit);
        if let Some(token) = continue_token {
            params = params.continue_token(token);
        }

        let list = self.services().list(&params).await?;
        debug!("Listed {} services", list.items.len());
        Ok(ServicePage {
            items: list.items,
            continue_token: list.metadata.continue_.filter(|token| !token.is_empty()),
        })
    }

    async fn update_service(&self, service: &Service) -> Result<Service, StoreError> {
        let key = Self::key_of(service)?;
        Ok(self
            .services_in(&key.namespace)
            .replace(&key.name, &PostParams::default(), service)
            .await?)
    }

    async fn update_service_status(&self, service: &Service) -> Result<Service, StoreError> {
        let key = Self::key_of(service)?;
        let ingress = service
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .filter(|ingress| !ingress.is_empty());

        // resourceVersion turns the merge patch into a conditional write;
        // a null ingress removes the field
        let status_patch = json!({
            "metadata": {
                "resourceVersion": service.metadata.resource_version,
            },
            "status": {
                "loadBalancer": {
                    "ingress": ingress,
                }
            }
        });

        let pp = PatchParams::default();
        Ok(self
            .services_in(&key.namespace)
            .patch_status(&key.name, &pp, &Patch::Merge(&status_patch))
            .await?)
    }

    async fn get_bgp_configuration(
        &self,
        name: &str,
    ) -> Result<Option<BGPConfiguration>, StoreError> {
        let api: Api<BGPConfiguration> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn list_ip_pools(&self) -> Result<Vec<BGPIPsConfig>, StoreError> {
        let api: Api<BGPIPsConfig> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        debug!("Listed {} BGPIPsConfigs", list.items.len());
        Ok(list.items)
    }

    async fn update_bgp_configuration_status(
        &self,
        name: &str,
        status: &BGPConfigurationStatus,
    ) -> Result<(), StoreError> {
        let api: Api<BGPConfiguration> = Api::all(self.client.clone());
        let status_patch = json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await?;
        Ok(())
    }

    async fn update_ip_pool_status(
        &self,
        name: &str,
        status: &BGPIPsConfigStatus,
    ) -> Result<(), StoreError> {
        let api: Api<BGPIPsConfig> = Api::all(self.client.clone());
        let status_patch = json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await?;
        Ok(())
    }
}
