//! In-memory `ObjectStore` for unit tests
//!
//! Behaves like the API server where the controller depends on it:
//! - writes carrying a stale `resourceVersion` fail with `Conflict`
//! - `update_service` keeps the stored status, `update_service_status` keeps
//!   the stored metadata and spec
//! - an object with a deletion timestamp disappears once its last finalizer
//!   is removed

use super::{ObjectStore, ServiceKey, ServicePage, StoreError};
use crds::{BGPConfiguration, BGPConfigurationStatus, BGPIPsConfig, BGPIPsConfigStatus};
use k8s_openapi::api::core::v1::Service;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// A write recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockWrite {
    Service(ServiceKey),
    ServiceStatus(ServiceKey),
    BgpConfigurationStatus(String),
    IpPoolStatus(String),
}

/// Mock object store
#[derive(Clone, Default)]
pub struct MockObjectStore {
    services: Arc<Mutex<BTreeMap<ServiceKey, Service>>>,
    bgp_configurations: Arc<Mutex<HashMap<String, BGPConfiguration>>>,
    ip_pools: Arc<Mutex<BTreeMap<String, BGPIPsConfig>>>,
    bgp_configuration_statuses: Arc<Mutex<HashMap<String, BGPConfigurationStatus>>>,
    ip_pool_statuses: Arc<Mutex<HashMap<String, BGPIPsConfigStatus>>>,
    writes: Arc<Mutex<Vec<MockWrite>>>,
    list_calls: Arc<Mutex<Vec<Option<String>>>>,
    next_version: Arc<Mutex<u64>>,
    fail_reads: Arc<Mutex<bool>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_version(&self) -> String {
        let mut version = self.next_version.lock().unwrap();
        *version += 1;
        version.to_string()
    }

    /// Add or replace a Service (for test setup)
    pub fn add_service(&self, mut service: Service) {
        let key = ServiceKey::from_service(&service).expect("test service needs name and namespace");
        service.metadata.resource_version = Some(self.bump_version());
        self.services.lock().unwrap().insert(key, service);
    }

    /// Stored copy of a Service
    pub fn service(&self, key: &ServiceKey) -> Option<Service> {
        self.services.lock().unwrap().get(key).cloned()
    }

    /// Add a configuration object (for test setup)
    pub fn add_bgp_configuration(&self, config: BGPConfiguration) {
        let name = config.metadata.name.clone().expect("test configuration needs a name");
        self.bgp_configurations.lock().unwrap().insert(name, config);
    }

    /// Add a pool object (for test setup)
    pub fn add_ip_pool(&self, pool: BGPIPsConfig) {
        let name = pool.metadata.name.clone().expect("test pool needs a name");
        self.ip_pools.lock().unwrap().insert(name, pool);
    }

    /// Last status written for a configuration object
    pub fn bgp_configuration_status(&self, name: &str) -> Option<BGPConfigurationStatus> {
        self.bgp_configuration_statuses.lock().unwrap().get(name).cloned()
    }

    /// Last status written for a pool
    pub fn ip_pool_status(&self, name: &str) -> Option<BGPIPsConfigStatus> {
        self.ip_pool_statuses.lock().unwrap().get(name).cloned()
    }

    /// All writes in order
    pub fn writes(&self) -> Vec<MockWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// Continue tokens passed to `list_services`, one entry per call
    pub fn list_calls(&self) -> Vec<Option<String>> {
        self.list_calls.lock().unwrap().clone()
    }

    /// Make every read fail with `Unavailable`
    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    /// Make every write fail with `Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn record(&self, write: MockWrite) {
        self.writes.lock().unwrap().push(write);
    }

    /// Apply `change` to the stored Service after the resourceVersion check
    fn write_service<F>(&self, incoming: &Service, change: F) -> Result<Service, StoreError>
    where
        F: FnOnce(&mut Service, &Service),
    {
        self.check_writes()?;
        let key = ServiceKey::from_service(incoming)
            .ok_or_else(|| StoreError::InvalidObject("Service missing name or namespace".to_string()))?;

        let mut services = self.services.lock().unwrap();
        let stored = services
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if incoming.metadata.resource_version != stored.metadata.resource_version {
            return Err(StoreError::Conflict(key.to_string()));
        }

        change(stored, incoming);
        stored.metadata.resource_version = Some(self.bump_version());
        let result = stored.clone();

        let finalizers_empty = result.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        if result.metadata.deletion_timestamp.is_some() && finalizers_empty {
            services.remove(&key);
        }
        Ok(result)
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockObjectStore {
    async fn get_service(&self, key: &ServiceKey) -> Result<Option<Service>, StoreError> {
        self.check_reads()?;
        Ok(self.service(key))
    }

    async fn list_services(
        &self,
        limit: u32,
        continue_token: Option<&str>,
    ) -> Result<ServicePage, StoreError> {
        self.list_calls
            .lock()
            .unwrap()
            .push(continue_token.map(str::to_string));
        self.check_reads()?;

        let offset = match continue_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StoreError::InvalidObject(format!("bad continue token {token}")))?,
            None => 0,
        };
        let limit = limit as usize;
        let services = self.services.lock().unwrap();
        let items: Vec<Service> = services.values().skip(offset).take(limit).cloned().collect();
        let next = offset + items.len();
        Ok(ServicePage {
            items,
            continue_token: (next < services.len()).then(|| next.to_string()),
        })
    }

    async fn update_service(&self, service: &Service) -> Result<Service, StoreError> {
        let updated = self.write_service(service, |stored, incoming| {
            stored.metadata = incoming.metadata.clone();
            stored.spec = incoming.spec.clone();
        })?;
        self.record(MockWrite::Service(ServiceKey::from_service(&updated).unwrap()));
        Ok(updated)
    }

    async fn update_service_status(&self, service: &Service) -> Result<Service, StoreError> {
        let updated = self.write_service(service, |stored, incoming| {
            stored.status = incoming.status.clone();
        })?;
        self.record(MockWrite::ServiceStatus(ServiceKey::from_service(&updated).unwrap()));
        Ok(updated)
    }

    async fn get_bgp_configuration(
        &self,
        name: &str,
    ) -> Result<Option<BGPConfiguration>, StoreError> {
        self.check_reads()?;
        Ok(self.bgp_configurations.lock().unwrap().get(name).cloned())
    }

    async fn list_ip_pools(&self) -> Result<Vec<BGPIPsConfig>, StoreError> {
        self.check_reads()?;
        Ok(self.ip_pools.lock().unwrap().values().cloned().collect())
    }

    async fn update_bgp_configuration_status(
        &self,
        name: &str,
        status: &BGPConfigurationStatus,
    ) -> Result<(), StoreError> {
        self.check_writes()?;
        self.bgp_configuration_statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status.clone());
        self.record(MockWrite::BgpConfigurationStatus(name.to_string()));
        Ok(())
    }

    async fn update_ip_pool_status(
        &self,
        name: &str,
        status: &BGPIPsConfigStatus,
    ) -> Result<(), StoreError> {
        self.check_writes()?;
        self.ip_pool_statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status.clone());
        self.record(MockWrite::IpPoolStatus(name.to_string()));
        Ok(())
    }
}
