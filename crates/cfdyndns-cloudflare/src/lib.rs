// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of `DnsProvider`.
//
// Every trait method is exactly one HTTP request against the Cloudflare API
// v4. The provider is stateless: no retry, no caching, no background tasks.
// Reconciliation logic lives in `cfdyndns-core`.
//
// ## Security Requirements
//
// - API token NEVER appears in logs, errors or `Debug` output
// - Construction fails if the token is empty
//
// ## API Reference
//
// - Verify token: GET `/user/tokens/verify`
// - List zones: GET `/zones?name=...`
// - List DNS records: GET `/zones/:zone_id/dns_records?name=...`
// - Create DNS record: POST `/zones/:zone_id/dns_records`
// - Update DNS record: PUT `/zones/:zone_id/dns_records/:record_id`
//
// Every response is wrapped in the envelope
// `{ "success": bool, "errors": [...], "messages": [...], "result": ... }`.
// `success: false` is a failure even when the HTTP status is 200.

use async_trait::async_trait;
use cfdyndns_core::traits::{DnsProvider, DnsRecord, RecordSpec};
use cfdyndns_core::{Error, Result, Stage};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenStatus {
    #[serde(default)]
    status: String,
}

/// Join API error entries into one line
fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }

    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map a non-2xx response to a message
fn status_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .map(|envelope| describe_errors(&envelope.errors))
        .unwrap_or_else(|_| body.trim().to_string());

    match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: invalid API token or insufficient permissions (HTTP {}): {}",
            status.as_u16(),
            detail
        ),
        429 => format!("Rate limit exceeded (HTTP {}): {}", status.as_u16(), detail),
        500..=599 => format!("Cloudflare server error (HTTP {}): {}", status.as_u16(), detail),
        _ => format!("Request rejected (HTTP {}): {}", status.as_u16(), detail),
    }
}

/// Cloudflare DNS provider
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider talking to the public Cloudflare API
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    ///
    /// # Errors
    ///
    /// `Error::Initialization` if the token is empty or the HTTP client
    /// cannot be built.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_token, CLOUDFLARE_API_BASE)
    }

    /// Create a provider against a custom API base URL
    pub fn with_base_url(api_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::init("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::init(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the response envelope
    ///
    /// Errors are plain messages; callers attach the stage.
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<T, String> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {}", e.without_url()))?;

        if !status.is_success() {
            return Err(status_message(status, &body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        if !envelope.success {
            return Err(format!("API error: {}", describe_errors(&envelope.errors)));
        }

        envelope
            .result
            .ok_or_else(|| "Invalid response format: missing result".to_string())
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// ```http
    /// GET /user/tokens/verify
    /// ```
    async fn verify(&self) -> Result<()> {
        let token: TokenStatus = self
            .call(self.client.get(self.url("/user/tokens/verify")))
            .await
            .map_err(|e| Error::init(format!("Token verification failed: {}", e)))?;

        if token.status != "active" {
            return Err(Error::init(format!(
                "Token verification failed: token status is '{}'",
                token.status
            )));
        }

        tracing::debug!("Cloudflare API token verified");
        Ok(())
    }

    /// ```http
    /// GET /zones?name=example.com
    /// ```
    async fn zone_id(&self, zone_name: &str) -> Result<String> {
        tracing::debug!("Looking up zone ID for domain: {}", zone_name);

        let zones: Vec<Zone> = self
            .call(
                self.client
                    .get(self.url("/zones"))
                    .query(&[("name", zone_name)]),
            )
            .await
            .map_err(|e| Error::provider_call(Stage::ZoneLookup, e))?;

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::zone_not_found(zone_name))?;

        tracing::debug!("Found zone ID: {}", zone.id);
        Ok(zone.id)
    }

    /// ```http
    /// GET /zones/:zone_id/dns_records?name=www.example.com
    /// ```
    async fn list_records(&self, zone_id: &str, name: &str) -> Result<Vec<DnsRecord>> {
        let records: Vec<DnsRecord> = self
            .call(
                self.client
                    .get(self.url(&format!("/zones/{}/dns_records", zone_id)))
                    .query(&[("name", name)]),
            )
            .await
            .map_err(|e| Error::provider_call(Stage::List, e))?;

        tracing::debug!("Found {} record(s) named {}", records.len(), name);
        Ok(records)
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// { "type": "A", "name": "...", "content": "...", "proxied": false, "ttl": 1 }
    /// ```
    async fn create_record(&self, zone_id: &str, spec: &RecordSpec) -> Result<DnsRecord> {
        let record: DnsRecord = self
            .call(
                self.client
                    .post(self.url(&format!("/zones/{}/dns_records", zone_id)))
                    .json(spec),
            )
            .await
            .map_err(|e| Error::provider_call(Stage::Create, e))?;

        tracing::debug!("Created record {} ({})", record.name, record.id);
        Ok(record)
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// { "type": "A", "name": "...", "content": "...", "proxied": false, "ttl": 1 }
    /// ```
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> Result<DnsRecord> {
        let record: DnsRecord = self
            .call(
                self.client
                    .put(self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id)))
                    .json(spec),
            )
            .await
            .map_err(|e| Error::provider_call(Stage::Update, e))?;

        tracing::debug!("Updated record {} ({})", record.name, record.id);
        Ok(record)
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}
