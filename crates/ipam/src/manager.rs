//! Pool registry and cross-pool allocation
//!
//! `IpamManager` keeps the configured prefixes in registration order and
//! `acquire_any` walks the pools in that order. Registered ranges never
//! overlap, so every address belongs to at most one pool.

use crate::error::IpamError;
use crate::prefix::Prefix;
use ipnet::IpNet;
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Outcome of registering a CIDR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new pool was appended
    Registered(IpNet),
    /// The exact range was already registered, nothing changed
    AlreadyRegistered(IpNet),
}

impl Registration {
    /// Normalised range the registration refers to
    #[must_use]
    pub fn prefix(&self) -> IpNet {
        match self {
            Registration::Registered(net) | Registration::AlreadyRegistered(net) => *net,
        }
    }
}

/// Ordered set of address pools and the allocation state inside them.
#[derive(Debug, Default)]
pub struct IpamManager {
    prefixes: Vec<Prefix>,
}

impl IpamManager {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool from CIDR text.
    ///
    /// Host bits are cleared before comparing with the existing pools, so
    /// `10.0.0.7/24` and `10.0.0.0/24` name the same pool. A range that
    /// overlaps a registered pool without being identical to it is rejected.
    pub fn register(&mut self, cidr: &str) -> Result<Registration, IpamError> {
        self.register_pool(cidr).map(|(registration, _)| registration)
    }

    /// Like `register`, also returning the pool the CIDR resolved to
    pub fn register_pool(&mut self, cidr: &str) -> Result<(Registration, &Prefix), IpamError> {
        let net = cidr
            .trim()
            .parse::<IpNet>()
            .map_err(|source| IpamError::InvalidCidr {
                cidr: cidr.to_string(),
                source,
            })?
            .trunc();

        if let Some(index) = self.prefixes.iter().position(|p| p.net() == net) {
            debug!("Prefix {} already registered", net);
            return Ok((Registration::AlreadyRegistered(net), &self.prefixes[index]));
        }

        if let Some(existing) = self.prefixes.iter().find(|p| overlaps(&p.net(), &net)) {
            warn!("Rejecting prefix {}: overlaps registered prefix {}", net, existing.net());
            return Err(IpamError::OverlappingCidr {
                cidr: net,
                existing: existing.net(),
            });
        }

        self.prefixes.push(Prefix::new(net));
        info!("Registered prefix {}", net);
        let index = self.prefixes.len() - 1;
        Ok((Registration::Registered(net), &self.prefixes[index]))
    }

    /// The pool containing `address`
    #[must_use]
    pub fn locate(&self, address: &IpAddr) -> Option<&Prefix> {
        self.prefixes.iter().find(|p| p.contains(address))
    }

    fn locate_mut(&mut self, address: &IpAddr) -> Option<&mut Prefix> {
        self.prefixes.iter_mut().find(|p| p.contains(address))
    }

    /// Pool registered for exactly `net`
    #[must_use]
    pub fn prefix(&self, net: &IpNet) -> Option<&Prefix> {
        self.prefixes.iter().find(|p| p.net() == *net)
    }

    /// Registered pools in registration order
    #[must_use]
    pub fn prefixes(&self) -> &[Prefix] {
        &self.prefixes
    }

    /// Record an address observed at startup as acquired.
    ///
    /// Returns `false` when no pool contains the address.
    pub fn mark_used(&mut self, address: IpAddr) -> bool {
        match self.locate_mut(&address) {
            Some(prefix) => prefix.mark_used(address).is_ok(),
            None => false,
        }
    }

    /// Reserve exactly `address`.
    pub fn acquire_specific(&mut self, address: IpAddr) -> Result<(), IpamError> {
        let prefix = self
            .locate_mut(&address)
            .ok_or(IpamError::AddressOutsideKnownRanges(address))?;
        prefix.acquire_specific(address)?;
        debug!("Acquired specific address {} from {}", address, prefix.net());
        Ok(())
    }

    /// Acquire the first free address of the first pool that has one.
    ///
    /// Exhausted pools are skipped; any other pool failure stops the scan and
    /// is returned.
    pub fn acquire_any(&mut self) -> Result<IpAddr, IpamError> {
        for prefix in &mut self.prefixes {
            match prefix.acquire() {
                Ok(address) => {
                    debug!("Acquired address {} from {}", address, prefix.net());
                    return Ok(address);
                }
                Err(IpamError::PrefixExhausted(net)) => {
                    debug!("Prefix {} exhausted, trying next", net);
                }
                Err(e) => return Err(e),
            }
        }
        Err(IpamError::NoAddressAvailable)
    }

    /// Release `address`.
    ///
    /// Addresses outside every pool and addresses never acquired are released
    /// successfully without any change.
    pub fn release(&mut self, address: IpAddr) -> Result<(), IpamError> {
        let Some(prefix) = self.locate_mut(&address) else {
            debug!("Address {} is outside all known ranges, nothing to release", address);
            return Ok(());
        };
        match prefix.release(address) {
            Ok(()) => {
                debug!("Released address {} to {}", address, prefix.net());
                Ok(())
            }
            Err(IpamError::NotAllocated(_)) => {
                debug!("Address {} was not allocated in {}", address, prefix.net());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn overlaps(a: &IpNet, b: &IpNet) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}
