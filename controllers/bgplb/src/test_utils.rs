//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::reconciler::decision::{LOAD_BALANCER_TYPE, SERVICE_FINALIZER};
use crate::reconciler::Reconciler;
use crate::store::{MockObjectStore, ServiceKey};
use crds::{BGPConfiguration, BGPConfigurationSpec, BGPIPsConfig, BGPIPsConfigSpec, ServiceExternalIPBlock};
use k8s_openapi::api::core::v1::{LoadBalancerIngress, Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

/// Helper to create a LoadBalancer Service without finalizer or status
pub fn load_balancer_service(namespace: &str, name: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(LOAD_BALANCER_TYPE.to_string()),
            ..Default::default()
        }),
        status: None,
    }
}

pub fn with_type(mut service: Service, service_type: &str) -> Service {
    service.spec.get_or_insert_with(Default::default).type_ = Some(service_type.to_string());
    service
}

pub fn with_requested_ip(mut service: Service, ip: &str) -> Service {
    service.spec.get_or_insert_with(Default::default).load_balancer_ip = Some(ip.to_string());
    service
}

/// Append an ingress entry to `status.loadBalancer`
pub fn with_ingress(mut service: Service, ip: &str) -> Service {
    service
        .status
        .get_or_insert_with(Default::default)
        .load_balancer
        .get_or_insert_with(Default::default)
        .ingress
        .get_or_insert_with(Vec::new)
        .push(LoadBalancerIngress {
            ip: Some(ip.to_string()),
            ..Default::default()
        });
    service
}

pub fn with_finalizer(mut service: Service) -> Service {
    service
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(SERVICE_FINALIZER.to_string());
    service
}

/// Mark the Service as being deleted
pub fn deleting(mut service: Service) -> Service {
    // Built through serde so the helper does not depend on Time's inner type
    let timestamp: Time = serde_json::from_value(serde_json::json!("2024-05-01T12:00:00Z")).unwrap();
    service.metadata.deletion_timestamp = Some(timestamp);
    service
}

pub fn key(namespace: &str, name: &str) -> ServiceKey {
    ServiceKey::new(namespace, name)
}

pub fn bgp_configuration(name: &str, cidrs: &[&str]) -> BGPConfiguration {
    BGPConfiguration::new(
        name,
        BGPConfigurationSpec {
            service_external_ips: cidrs
                .iter()
                .map(|cidr| ServiceExternalIPBlock { cidr: cidr.to_string() })
                .collect(),
        },
    )
}

pub fn ip_pool(name: &str, cidr: &str) -> BGPIPsConfig {
    BGPIPsConfig::new(name, BGPIPsConfigSpec { cidr: cidr.to_string() })
}

/// Reconciler over a fresh mock store with `cidrs` registered
pub async fn create_test_reconciler(cidrs: &[&str]) -> (Reconciler, MockObjectStore) {
    let store = MockObjectStore::new();
    let reconciler = Reconciler::new(Box::new(store.clone()), "default");
    {
        let mut ipam = reconciler.ipam.lock().await;
        for cidr in cidrs {
            ipam.register(cidr).unwrap();
        }
    }
    (reconciler, store)
}
