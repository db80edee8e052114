//! Load balancer IPAM
//!
//! In-memory registry of CIDR pools with first-fit address allocation,
//! used by the bgplb controller to hand out external IPs to `LoadBalancer`
//! Services.
//!
//! # Example
//!
//! ```
//! use lb_ipam::IpamManager;
//!
//! # fn example() -> Result<(), lb_ipam::IpamError> {
//! let mut ipam = IpamManager::new();
//! ipam.register("10.0.0.0/30")?;
//!
//! let first = ipam.acquire_any()?;
//! assert_eq!(first.to_string(), "10.0.0.1");
//!
//! ipam.release(first)?;
//! ipam.acquire_specific(first)?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! The manager carries no locking of its own. Callers that share it between
//! tasks wrap it in a mutex and hold the guard for the whole decision.

pub mod error;
pub mod manager;
pub mod prefix;

pub use error::IpamError;
pub use manager::{IpamManager, Registration};
pub use prefix::{Prefix, PrefixUsage};
