//! Record reconciliation
//!
//! The [`Reconciler`] makes exactly one record match the desired state:
//!
//! ```text
//!   normalize(domain, subdomain)
//!              │
//!              ▼
//!   DnsProvider::zone_id(zone)          ── unknown zone ──▶ ZoneNotFound
//!              │
//!              ▼
//!   DnsProvider::list_records(fqdn)
//!              │
//!      ┌───────┴────────┐
//!   0 matches      ≥1 matches
//!      │                │
//!      ▼                ▼
//!   create_record   update_record(oldest match)
//! ```
//!
//! One create-or-update call is issued per invocation. Reconciliations for
//! the same fully-qualified name are serialized, so concurrent first-time
//! calls cannot both take the create branch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::RecordDefaults;
use crate::error::{Error, Result};
use crate::events::{ClientEvent, EventSink};
use crate::naming::{RecordName, normalize};
use crate::traits::{DnsProvider, DnsRecord, RecordSpec, RecordType, ResolvedAddress, UpdateResult};

/// Per-name async locks
///
/// An entry lives only while some reconciliation holds or waits for it.
#[derive(Default)]
struct RecordLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RecordLocks {
    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Drop the entry for `name` once no caller holds a reference to it
    fn release(&self, name: &str) {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(name);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Pick the record to update among several sharing one name
///
/// The record with the earliest creation time wins; records without a
/// timestamp come last, and remaining ties go to the smallest id.
pub fn select_record(records: &[DnsRecord]) -> Option<&DnsRecord> {
    records.iter().min_by(|a, b| {
        (a.created_on.is_none(), a.created_on, &a.id).cmp(&(
            b.created_on.is_none(),
            b.created_on,
            &b.id,
        ))
    })
}

/// Creates or updates one address record per call
///
/// The target address is fixed at construction; every record written by a
/// reconciler carries that same address and the matching record type.
pub struct Reconciler {
    provider: Arc<dyn DnsProvider>,
    address: ResolvedAddress,
    defaults: RecordDefaults,
    sink: Arc<dyn EventSink>,
    locks: RecordLocks,
}

impl Reconciler {
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        address: ResolvedAddress,
        defaults: RecordDefaults,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            provider,
            address,
            defaults,
            sink,
            locks: RecordLocks::default(),
        }
    }

    pub fn address(&self) -> ResolvedAddress {
        self.address
    }

    pub fn record_type(&self) -> RecordType {
        RecordType::from(self.address.version())
    }

    /// Normalize the names, then reconcile
    pub async fn set(&self, domain: &str, subdomain: &str, proxied: bool) -> Result<UpdateResult> {
        let name = normalize(domain, subdomain);
        self.reconcile(&name, proxied).await
    }

    /// Make the record `name` point at the cached address
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateResult::Created)`: no record existed
    /// - `Ok(UpdateResult::Updated)`: an existing record was overwritten
    /// - `Err(Error)`: the first failing provider call, stage attached
    pub async fn reconcile(&self, name: &RecordName, proxied: bool) -> Result<UpdateResult> {
        if name.zone.is_empty() {
            return Err(Error::zone_not_found("<empty domain>"));
        }

        let lock = self.locks.lock_for(&name.fqdn);
        let guard = lock.lock().await;
        let result = self.reconcile_locked(name, proxied).await;
        drop(guard);
        drop(lock);
        self.locks.release(&name.fqdn);

        result
    }

    async fn reconcile_locked(&self, name: &RecordName, proxied: bool) -> Result<UpdateResult> {
        let zone_id = self.provider.zone_id(&name.zone).await?;
        self.sink.emit(ClientEvent::ZoneFound {
            zone: name.zone.clone(),
            zone_id: zone_id.clone(),
        });

        let records = self.provider.list_records(&zone_id, &name.fqdn).await?;

        let spec = RecordSpec {
            record_type: self.record_type(),
            name: name.fqdn.clone(),
            content: self.address.to_string(),
            proxied,
            ttl: self.defaults.ttl,
        };

        match select_record(&records) {
            None => {
                let created = self.provider.create_record(&zone_id, &spec).await?;
                self.sink.emit(ClientEvent::RecordCreated {
                    name: spec.name.clone(),
                    record_type: spec.record_type,
                    content: spec.content.clone(),
                    proxied,
                });

                Ok(UpdateResult::Created {
                    record_id: created.id,
                    name: spec.name,
                    content: spec.content,
                })
            }
            Some(existing) => {
                if records.len() > 1 {
                    self.sink.emit(ClientEvent::DuplicateRecords {
                        name: spec.name.clone(),
                        count: records.len(),
                        chosen_id: existing.id.clone(),
                    });
                }

                let updated = self
                    .provider
                    .update_record(&zone_id, &existing.id, &spec)
                    .await?;
                self.sink.emit(ClientEvent::RecordUpdated {
                    name: spec.name.clone(),
                    record_type: spec.record_type,
                    content: spec.content.clone(),
                    proxied,
                });

                Ok(UpdateResult::Updated {
                    record_id: updated.id,
                    name: spec.name,
                    previous_content: existing.content.clone(),
                    content: spec.content,
                })
            }
        }
    }
}
