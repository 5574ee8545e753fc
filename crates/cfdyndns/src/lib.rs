//! Keep Cloudflare DNS records pointed at this host's public IP
//!
//! ```rust,no_run
//! # async fn run() -> cfdyndns::Result<()> {
//! let client = cfdyndns::new("cloudflare-api-token").await?;
//!
//! // Once
//! client.set("example.com", "home", false).await?;
//!
//! // Now, then every five minutes
//! let job = client.auto("example.com", "@", true, "*/5 * * * *").await?;
//!
//! // Later
//! job.cancel();
//! client.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! The public address is looked up once, when the client is created, and
//! decides between `A` and `AAAA` records for the client's whole lifetime.
//!
//! Use [`Client::builder`] to supply a different [`DnsProvider`] or
//! [`AddressResolver`].

pub use cfdyndns_cloudflare::CloudflareProvider;
pub use cfdyndns_core::*;
pub use cfdyndns_ip_http::{DEFAULT_IP_SERVICE, HttpAddressResolver};

/// Create a client for the Cloudflare account behind `api_token`
///
/// Verifies the token and resolves the public address via
/// [`DEFAULT_IP_SERVICE`]. Diagnostics are discarded.
///
/// # Errors
///
/// `Error::Initialization` if the token is empty or rejected, or the
/// public address cannot be resolved.
pub async fn new(api_token: &str) -> Result<Client> {
    new_with_sink(api_token, NoopSink).await
}

/// Like [`new`], reporting diagnostics to `sink`
pub async fn new_with_sink<S: EventSink + 'static>(api_token: &str, sink: S) -> Result<Client> {
    let provider = CloudflareProvider::new(api_token)?;
    let resolver = HttpAddressResolver::with_default_service()?;

    Client::builder()
        .provider(provider)
        .resolver(resolver)
        .sink(sink)
        .build()
        .await
}
