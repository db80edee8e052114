//! Service decision table
//!
//! `plan()` maps one observed Service to the action the reconciler must take.
//! It is a pure function of the object; nothing is remembered between calls.

use k8s_openapi::api::core::v1::Service;

/// Finalizer guarding release of a Service's external IP
pub const SERVICE_FINALIZER: &str = "bgplb.io/external-ip";

/// `spec.type` of Services that receive an external IP
pub const LOAD_BALANCER_TYPE: &str = "LoadBalancer";

/// How a new address should be obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressRequest {
    /// `spec.loadBalancerIP` asks for this address
    Specific(String),
    /// Any free address
    Any,
}

/// Action derived for one Service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Deletion requested and our finalizer present: release, clear status,
    /// drop the finalizer
    Finalize { release: Vec<String> },
    /// Not deleting and our finalizer missing
    AddFinalizer,
    /// Release stale addresses and/or acquire a new one
    Converge {
        release: Vec<String>,
        acquire: Option<AddressRequest>,
    },
    /// Nothing to do
    NoOp,
}

/// The fields of a Service the decision depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceView<'a> {
    pub requested: Option<&'a str>,
    pub assigned: Vec<&'a str>,
    pub deleting: bool,
    pub finalized: bool,
    pub load_balancer: bool,
}

impl<'a> ServiceView<'a> {
    pub fn observe(service: &'a Service) -> Self {
        Self {
            requested: requested_ip(service),
            assigned: assigned_ips(service),
            deleting: service.metadata.deletion_timestamp.is_some(),
            finalized: has_finalizer(service),
            load_balancer: is_load_balancer(service),
        }
    }

    /// Assigned addresses that no longer belong to this Service
    fn stale(&self) -> bool {
        let Some(first) = self.assigned.first() else {
            return false;
        };
        self.requested.is_some_and(|requested| requested != *first)
            || self.deleting
            || !self.load_balancer
    }

    pub fn decide(&self) -> Decision {
        if self.deleting && self.finalized {
            return Decision::Finalize {
                release: owned(&self.assigned),
            };
        }
        if !self.deleting && !self.finalized {
            return Decision::AddFinalizer;
        }

        let stale = self.stale();
        let release = if stale { owned(&self.assigned) } else { Vec::new() };
        let unassigned = self.assigned.is_empty() || stale;
        let acquire = (unassigned && self.load_balancer && !self.deleting).then(|| {
            match self.requested {
                Some(address) => AddressRequest::Specific(address.to_string()),
                None => AddressRequest::Any,
            }
        });

        if release.is_empty() && acquire.is_none() {
            Decision::NoOp
        } else {
            Decision::Converge { release, acquire }
        }
    }
}

/// Decide what to do with `service`
pub fn plan(service: &Service) -> Decision {
    ServiceView::observe(service).decide()
}

fn owned(addresses: &[&str]) -> Vec<String> {
    addresses.iter().map(|a| (*a).to_string()).collect()
}

pub fn is_load_balancer(service: &Service) -> bool {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        .is_some_and(|t| t == LOAD_BALANCER_TYPE)
}

/// Non-empty `spec.loadBalancerIP`
pub fn requested_ip(service: &Service) -> Option<&str> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.load_balancer_ip.as_deref())
        .filter(|ip| !ip.is_empty())
}

/// Ingress IPs from `status.loadBalancer`, in status order
pub fn assigned_ips(service: &Service) -> Vec<&str> {
    service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|entry| entry.ip.as_deref())
                .filter(|ip| !ip.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub fn has_finalizer(service: &Service) -> bool {
    service
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == SERVICE_FINALIZER))
}
