//! bgplb CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the bgplb controller.

pub mod bgp_configuration;
pub mod bgp_ips_config;

pub use bgp_configuration::*;
pub use bgp_ips_config::*;
