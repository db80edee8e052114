//! Controller-specific error types.
//!
//! This module defines error types specific to the bgplb controller
//! that are not covered by upstream library errors.

use crate::store::StoreError;
use kube::Error as KubeError;
use lb_ipam::IpamError;
use thiserror::Error;

/// Errors that can occur in the bgplb controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Object store read or write failed
    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    /// Allocator failure that must not be swallowed
    #[error("IPAM error: {0}")]
    Ipam(#[from] IpamError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Object is missing a field the controller relies on
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
