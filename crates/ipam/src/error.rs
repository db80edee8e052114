//! IPAM errors

use ipnet::IpNet;
use std::net::IpAddr;
use thiserror::Error;

/// Errors that can occur when registering pools or allocating addresses
#[derive(Debug, Error)]
pub enum IpamError {
    /// CIDR text could not be parsed
    #[error("Invalid CIDR {cidr:?}: {source}")]
    InvalidCidr {
        cidr: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    /// Range overlaps a registered pool without being identical to it
    #[error("CIDR {cidr} overlaps registered prefix {existing}")]
    OverlappingCidr { cidr: IpNet, existing: IpNet },

    /// No registered pool contains the address
    #[error("Address {0} is outside all known ranges")]
    AddressOutsideKnownRanges(IpAddr),

    /// Address is already acquired (or is never handed out by its pool)
    #[error("Address {0} is already reserved")]
    AddressAlreadyReserved(IpAddr),

    /// Every pool is exhausted, or no pool is registered
    #[error("No address available in any pool")]
    NoAddressAvailable,

    /// A single pool has no free address left
    #[error("Prefix {0} is exhausted")]
    PrefixExhausted(IpNet),

    /// Release of an address the pool never handed out
    #[error("Address {0} is not allocated")]
    NotAllocated(IpAddr),

    /// Address given to a pool that does not contain it
    #[error("Address {address} is not in prefix {prefix}")]
    AddressNotInPrefix { address: IpAddr, prefix: IpNet },
}
