// # HTTP Address Resolver
//
// This crate discovers the host's public IP address by asking an external
// "what is my IP" service over HTTP.
//
// ## Architecture
//
// One GET per `resolve()` call. The service must answer with the bare
// address as plain text (surrounding whitespace is ignored). No caching:
// the Client resolves exactly once at construction and keeps the result.

use cfdyndns_core::traits::{AddressResolver, IpVersion, ResolvedAddress};
use cfdyndns_core::{Error, Result};

use std::time::Duration;

/// Default lookup service; answers over IPv6 when available, else IPv4
pub const DEFAULT_IP_SERVICE: &str = "https://api64.ipify.org";

/// Default HTTP timeout for lookups (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public address resolver
#[derive(Debug, Clone)]
pub struct HttpAddressResolver {
    /// URL to fetch the address from
    url: String,

    /// Required address family (None = accept either)
    version: Option<IpVersion>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpAddressResolver {
    /// Create a resolver querying `url`
    ///
    /// # Parameters
    ///
    /// - `url`: URL answering with a plain-text address (e.g., "https://api.ipify.org")
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::init(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            version: None,
            client,
        })
    }

    /// Resolver querying [`DEFAULT_IP_SERVICE`]
    pub fn with_default_service() -> Result<Self> {
        Self::new(DEFAULT_IP_SERVICE)
    }

    /// Reject addresses of the other family
    pub fn require(mut self, version: IpVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self) -> Result<ResolvedAddress> {
        tracing::debug!("Resolving public address via {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::resolution(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::resolution(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let ip_text = response
            .text()
            .await
            .map_err(|e| Error::resolution(format!("Failed to read response: {}", e)))?;

        let address = ResolvedAddress::parse(&ip_text)?;

        // Filter by address family if specified
        if let Some(version) = self.version {
            if address.version() != version {
                return Err(Error::resolution(format!(
                    "Expected {:?} address, got: {}",
                    version, address
                )));
            }
        }

        tracing::debug!("Public address is {}", address);
        Ok(address)
    }

    fn resolver_name(&self) -> &'static str {
        "http"
    }
}
