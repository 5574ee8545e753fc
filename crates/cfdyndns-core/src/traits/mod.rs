//! Core traits for the cfdyndns system
//!
//! This module defines the abstract interfaces to the external collaborators.
//!
//! - [`AddressResolver`]: Discover the public IP address
//! - [`DnsProvider`]: Read and write records via provider APIs

pub mod address_resolver;
pub mod dns_provider;

pub use address_resolver::{AddressResolver, IpVersion, ResolvedAddress, StaticAddressResolver};
pub use dns_provider::{DnsProvider, DnsRecord, RecordSpec, RecordType, UpdateResult};
