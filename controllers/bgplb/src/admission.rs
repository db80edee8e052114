//! Service event admission
//!
//! The watch stream only carries the current object. `ChangeTracker`
//! remembers the last version of each Service so every event can be turned
//! into a create, update or delete with both sides available, and `admit`
//! decides which of those are worth a reconciliation.

use crate::reconciler::decision::{assigned_ips, has_finalizer, is_load_balancer};
use crate::store::ServiceKey;
use k8s_openapi::api::core::v1::Service;
use kube_runtime::watcher;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A change to one Service
#[derive(Debug, Clone)]
pub enum ServiceChange {
    Created(Service),
    Updated { old: Box<Service>, new: Box<Service> },
    Deleted(Service),
}

impl ServiceChange {
    /// The object as it is now (or was, for deletions)
    pub fn current(&self) -> &Service {
        match self {
            ServiceChange::Created(service) | ServiceChange::Deleted(service) => service,
            ServiceChange::Updated { new, .. } => new.as_ref(),
        }
    }

    pub fn key(&self) -> Option<ServiceKey> {
        ServiceKey::from_service(self.current())
    }
}

/// Whether `change` should trigger a reconciliation
pub fn admit(change: &ServiceChange) -> bool {
    match change {
        ServiceChange::Deleted(_) => false,
        ServiceChange::Created(service) => {
            is_load_balancer(service) && assigned_ips(service).is_empty()
        }
        ServiceChange::Updated { old, new } => {
            is_load_balancer(old)
                || is_load_balancer(new)
                || (has_finalizer(new) && new.metadata.deletion_timestamp.is_some())
        }
    }
}

/// Derives `ServiceChange`s from raw watcher events
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last_seen: HashMap<ServiceKey, Service>,
    /// Keys seen since the current relist started
    relisted: Option<HashSet<ServiceKey>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: watcher::Event<Service>) -> Option<ServiceChange> {
        match event {
            watcher::Event::Init => {
                debug!("Service watch (re)initialising");
                self.relisted = Some(HashSet::new());
                None
            }
            watcher::Event::InitApply(service) => {
                let key = ServiceKey::from_service(&service)?;
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(key.clone());
                }
                self.apply(key, service)
            }
            watcher::Event::Apply(service) => {
                let key = ServiceKey::from_service(&service)?;
                self.apply(key, service)
            }
            watcher::Event::Delete(service) => {
                let key = ServiceKey::from_service(&service)?;
                self.last_seen.remove(&key);
                Some(ServiceChange::Deleted(service))
            }
            watcher::Event::InitDone => {
                if let Some(relisted) = self.relisted.take() {
                    let before = self.last_seen.len();
                    self.last_seen.retain(|key, _| relisted.contains(key));
                    debug!(
                        "Service watch initialised, forgot {} Services",
                        before - self.last_seen.len()
                    );
                }
                None
            }
        }
    }

    fn apply(&mut self, key: ServiceKey, service: Service) -> Option<ServiceChange> {
        match self.last_seen.insert(key, service.clone()) {
            None => Some(ServiceChange::Created(service)),
            Some(old) => {
                let unchanged = old.metadata.resource_version.is_some()
                    && old.metadata.resource_version == service.metadata.resource_version;
                if unchanged {
                    return None;
                }
                Some(ServiceChange::Updated {
                    old: Box::new(old),
                    new: Box::new(service),
                })
            }
        }
    }
}
