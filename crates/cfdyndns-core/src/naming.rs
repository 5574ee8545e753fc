//! Record name normalization
//!
//! Turns a caller-supplied zone and label into the zone name used for the
//! zone lookup and the fully-qualified name used for the record itself.

/// Normalized zone and record name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordName {
    /// Lowercased, trimmed zone name
    pub zone: String,
    /// Fully-qualified record name
    pub fqdn: String,
}

impl RecordName {
    /// Whether the record sits at the zone apex
    pub fn is_apex(&self) -> bool {
        self.zone == self.fqdn
    }
}

/// Normalize a zone and a subdomain label
///
/// Both inputs are lowercased and trimmed. Any occurrence of the zone inside
/// the label is removed, so callers may pass either `www` or
/// `www.example.com`. An empty label or `@` denotes the zone apex, whose
/// fully-qualified name is the zone itself.
///
/// ```
/// use cfdyndns_core::naming::normalize;
///
/// let name = normalize("Example.com ", "WWW");
/// assert_eq!(name.zone, "example.com");
/// assert_eq!(name.fqdn, "www.example.com");
///
/// assert_eq!(normalize("example.com", "@"), normalize("example.com", ""));
/// ```
pub fn normalize(domain: &str, subdomain: &str) -> RecordName {
    let zone = domain.trim().to_lowercase();

    let mut label = subdomain.trim().to_lowercase();
    if !zone.is_empty() {
        label = label.replace(&zone, "");
    }
    let label = label.trim_matches('.');

    let fqdn = if label.is_empty() || label == "@" {
        zone.clone()
    } else {
        format!("{}.{}", label, zone)
    };

    RecordName { zone, fqdn }
}
