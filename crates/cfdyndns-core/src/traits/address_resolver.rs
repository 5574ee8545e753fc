// # Address Resolver Trait
//
// Defines the interface for discovering the machine's public IP address.
//
// ## Implementations
//
// - HTTP discovery service: `cfdyndns-ip-http` crate
// - Fixed address: [`StaticAddressResolver`]
//
// ## Usage
//
// ```rust,ignore
// use cfdyndns_core::AddressResolver;
//
// #[tokio::main]
// async fn main() -> cfdyndns_core::Result<()> {
//     let resolver = /* AddressResolver implementation */;
//
//     let address = resolver.resolve().await?;
//     println!("public address: {} ({:?})", address.addr(), address.version());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, Result};

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

/// A public address together with its classified family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedAddress {
    addr: IpAddr,
    version: IpVersion,
}

impl ResolvedAddress {
    /// Classify an address by family
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are unwrapped and
    /// classified as v4.
    pub fn new(addr: IpAddr) -> Self {
        let addr = match addr {
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => IpAddr::V4(v4),
                None => IpAddr::V6(v6),
            },
            v4 => v4,
        };

        let version = match addr {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        };

        Self { addr, version }
    }

    /// Parse the textual form returned by a discovery service
    ///
    /// Surrounding whitespace is ignored. Anything that is neither a v4 nor
    /// a v6 address is a [`Error::Resolution`].
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        text.parse::<IpAddr>()
            .map(Self::new)
            .map_err(|_| Error::resolution(format!("malformed address: '{}'", text)))
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn version(&self) -> IpVersion {
        self.version
    }

    pub fn is_ipv4(&self) -> bool {
        self.version == IpVersion::V4
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

impl From<IpAddr> for ResolvedAddress {
    fn from(addr: IpAddr) -> Self {
        Self::new(addr)
    }
}

/// Trait for public address discovery
///
/// A Client calls [`AddressResolver::resolve`] exactly once, at
/// construction. Implementations must not retry; a transient failure is
/// returned to the caller as-is.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Discover the current public address
    ///
    /// # Returns
    ///
    /// - `Ok(ResolvedAddress)`: The address and its family
    /// - `Err(Error::Resolution)`: Service unreachable or answer malformed
    async fn resolve(&self) -> Result<ResolvedAddress>;

    /// Name of the discovery mechanism (for logging)
    fn resolver_name(&self) -> &'static str;
}

/// Resolver that always answers with the same address
#[derive(Debug, Clone)]
pub struct StaticAddressResolver {
    address: ResolvedAddress,
}

impl StaticAddressResolver {
    pub fn new(addr: IpAddr) -> Self {
        Self {
            address: ResolvedAddress::new(addr),
        }
    }
}

#[async_trait]
impl AddressResolver for StaticAddressResolver {
    async fn resolve(&self) -> Result<ResolvedAddress> {
        Ok(self.address)
    }

    fn resolver_name(&self) -> &'static str {
        "static"
    }
}
