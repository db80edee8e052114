//! Single-range address allocator
//!
//! A `Prefix` tracks which addresses of one CIDR range are taken. Addresses
//! are handed out first-fit, lowest free address first, so the same sequence
//! of calls always yields the same addresses.

use crate::error::IpamError;
use ipnet::IpNet;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Allocation state for one CIDR range.
#[derive(Debug, Clone)]
pub struct Prefix {
    net: IpNet,
    /// First address handed out by `acquire`
    first: u128,
    /// Last address handed out by `acquire`
    last: u128,
    /// Acquired addresses as integers, kept sorted for the first-fit scan
    acquired: BTreeSet<u128>,
}

/// Point-in-time usage of a prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixUsage {
    /// The range this usage describes
    pub prefix: IpNet,
    /// Number of addresses `acquire` can hand out
    pub capacity: u128,
    /// Number of acquired addresses
    pub used: u128,
}

impl PrefixUsage {
    /// Addresses still available for acquisition
    #[must_use]
    pub fn free(&self) -> u128 {
        self.capacity.saturating_sub(self.used)
    }
}

impl Prefix {
    /// Create an allocator for `net`. Host bits are cleared.
    ///
    /// IPv4 ranges shorter than /31 never hand out their network and broadcast
    /// addresses, IPv6 ranges shorter than /127 never hand out the
    /// subnet-router address.
    #[must_use]
    pub fn new(net: IpNet) -> Self {
        let net = net.trunc();
        let network = to_bits(net.network());
        let broadcast = to_bits(net.broadcast());
        let (first, last) = match net {
            IpNet::V4(v4) if v4.prefix_len() < 31 => (network + 1, broadcast - 1),
            IpNet::V6(v6) if v6.prefix_len() < 127 => (network + 1, broadcast),
            _ => (network, broadcast),
        };

        Self {
            net,
            first,
            last,
            acquired: BTreeSet::new(),
        }
    }

    /// The range of this prefix
    #[must_use]
    pub fn net(&self) -> IpNet {
        self.net
    }

    /// Whether `address` lies inside the range
    #[must_use]
    pub fn contains(&self, address: &IpAddr) -> bool {
        self.net.contains(address)
    }

    /// Acquire the lowest free address.
    pub fn acquire(&mut self) -> Result<IpAddr, IpamError> {
        let mut candidate = self.first;
        for &used in self.acquired.range(self.first..=self.last) {
            if used != candidate {
                break;
            }
            if candidate == self.last {
                return Err(IpamError::PrefixExhausted(self.net));
            }
            candidate += 1;
        }

        self.acquired.insert(candidate);
        Ok(self.from_bits(candidate))
    }

    /// Acquire exactly `address`.
    pub fn acquire_specific(&mut self, address: IpAddr) -> Result<(), IpamError> {
        let bits = self.bits_in_range(address)?;
        if bits < self.first || bits > self.last || !self.acquired.insert(bits) {
            return Err(IpamError::AddressAlreadyReserved(address));
        }
        Ok(())
    }

    /// Record `address` as acquired whether or not it already was.
    pub fn mark_used(&mut self, address: IpAddr) -> Result<(), IpamError> {
        let bits = self.bits_in_range(address)?;
        self.acquired.insert(bits);
        Ok(())
    }

    /// Return `address` to the free set.
    pub fn release(&mut self, address: IpAddr) -> Result<(), IpamError> {
        let bits = self.bits_in_range(address)?;
        if !self.acquired.remove(&bits) {
            return Err(IpamError::NotAllocated(address));
        }
        Ok(())
    }

    /// Acquired addresses in ascending order
    pub fn acquired(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.acquired.iter().map(|&bits| self.from_bits(bits))
    }

    /// Current usage counters
    #[must_use]
    pub fn usage(&self) -> PrefixUsage {
        PrefixUsage {
            prefix: self.net,
            capacity: (self.last - self.first).saturating_add(1),
            // Recovered addresses outside first..=last are not part of the capacity
            used: self.acquired.range(self.first..=self.last).count() as u128,
        }
    }

    fn bits_in_range(&self, address: IpAddr) -> Result<u128, IpamError> {
        if !self.contains(&address) {
            return Err(IpamError::AddressNotInPrefix {
                address,
                prefix: self.net,
            });
        }
        Ok(to_bits(address))
    }

    fn from_bits(&self, bits: u128) -> IpAddr {
        match self.net {
            // Values of an IPv4 range always fit in 32 bits
            IpNet::V4(_) => IpAddr::V4(Ipv4Addr::from(bits as u32)),
            IpNet::V6(_) => IpAddr::V6(Ipv6Addr::from(bits)),
        }
    }
}

fn to_bits(address: IpAddr) -> u128 {
    match address {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}
