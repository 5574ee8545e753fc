// # DNS Provider Trait
//
// Defines the interface for reading and writing address records via a
// provider API.
//
// ## Implementations
//
// - Cloudflare: `cfdyndns-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfdyndns_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> cfdyndns_core::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zone_id = provider.zone_id("example.com").await?;
//     let records = provider.list_records(&zone_id, "www.example.com").await?;
//     println!("{} existing record(s)", records.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::traits::IpVersion;

/// Address record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
    AAAA,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
        }
    }
}

impl From<IpVersion> for RecordType {
    fn from(version: IpVersion) -> Self {
        match version {
            IpVersion::V4 => RecordType::A,
            IpVersion::V6 => RecordType::AAAA,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An existing record as reported by the provider
///
/// `record_type` stays a string: a name filter can match records of any
/// type, and those are overwritten with the desired type on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

/// Desired state of a record, sent on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSpec {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub proxied: bool,
    pub ttl: u32,
}

/// Result of a successful reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// No record existed; one was created
    Created {
        /// Provider id of the new record
        record_id: String,
        /// Fully-qualified record name
        name: String,
        /// Address written
        content: String,
    },
    /// An existing record was overwritten
    Updated {
        /// Provider id of the updated record
        record_id: String,
        /// Fully-qualified record name
        name: String,
        /// Content before the update
        previous_content: String,
        /// Address written
        content: String,
    },
}

impl UpdateResult {
    pub fn record_id(&self) -> &str {
        match self {
            UpdateResult::Created { record_id, .. } | UpdateResult::Updated { record_id, .. } => {
                record_id
            }
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpdateResult::Created { .. })
    }
}

/// Trait for DNS provider implementations
///
/// Each method is a single API call. Implementations must be thread-safe:
/// scheduled jobs call into the same provider concurrently.
///
/// Errors are tagged with the stage they belong to
/// ([`crate::Stage`]); a zone that does not exist is reported as
/// [`crate::Error::ZoneNotFound`]. Implementations never retry and never
/// include the API credential in error messages.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Check that the configured credential is accepted
    ///
    /// Called once while the Client is being built. The default accepts
    /// any credential.
    async fn verify(&self) -> Result<()> {
        Ok(())
    }

    /// Resolve a zone name to the provider's zone identifier
    async fn zone_id(&self, zone_name: &str) -> Result<String>;

    /// List records in a zone whose name equals `name`
    async fn list_records(&self, zone_id: &str, name: &str) -> Result<Vec<DnsRecord>>;

    /// Create a record
    async fn create_record(&self, zone_id: &str, spec: &RecordSpec) -> Result<DnsRecord>;

    /// Overwrite an existing record
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> Result<DnsRecord>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_follows_address_family() {
        assert_eq!(RecordType::from(IpVersion::V4), RecordType::A);
        assert_eq!(RecordType::from(IpVersion::V6), RecordType::AAAA);
        assert_eq!(RecordType::AAAA.to_string(), "AAAA");
    }

    #[test]
    fn record_spec_serializes_as_api_payload() {
        let spec = RecordSpec {
            record_type: RecordType::A,
            name: "www.example.com".to_string(),
            content: "192.0.2.1".to_string(),
            proxied: true,
            ttl: 1,
        };

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "A",
                "name": "www.example.com",
                "content": "192.0.2.1",
                "proxied": true,
                "ttl": 1,
            })
        );
    }

    #[test]
    fn record_deserializes_without_optional_fields() {
        let record: DnsRecord = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "name": "www.example.com",
            "type": "TXT",
            "content": "hello",
        }))
        .unwrap();

        assert!(!record.proxied);
        assert!(record.created_on.is_none());
        assert_eq!(record.record_type, "TXT");
    }
}
