//! Test doubles and common utilities for contract tests
//!
//! The mock provider keeps records in memory and counts every call, so
//! tests can assert both on the resulting zone contents and on how many
//! API calls a Client made.

#![allow(dead_code)]

use cfdyndns_core::error::{Error, Result, Stage};
use cfdyndns_core::events::ClientEvent;
use cfdyndns_core::traits::{AddressResolver, DnsProvider, DnsRecord, RecordSpec, ResolvedAddress};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const ZONE: &str = "example.com";
pub const ZONE_ID: &str = "zone-example";

pub fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::from([a, b, c, d])
}

/// An in-memory DnsProvider that tracks calls
pub struct MockDnsProvider {
    zones: Arc<HashMap<String, String>>,
    /// (zone id, record)
    records: Arc<Mutex<Vec<(String, DnsRecord)>>>,
    next_id: Arc<AtomicUsize>,
    zone_calls: Arc<AtomicUsize>,
    list_calls: Arc<AtomicUsize>,
    create_calls: Arc<AtomicUsize>,
    update_calls: Arc<AtomicUsize>,
    verify_calls: Arc<AtomicUsize>,
    reject_credentials: Arc<AtomicBool>,
    failing_stage: Arc<Mutex<Option<Stage>>>,
    list_latency: Arc<Mutex<Option<Duration>>>,
}

impl MockDnsProvider {
    /// Provider knowing the single zone [`ZONE`]
    pub fn new() -> Self {
        let mut zones = HashMap::new();
        zones.insert(ZONE.to_string(), ZONE_ID.to_string());

        Self {
            zones: Arc::new(zones),
            records: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicUsize::new(1)),
            zone_calls: Arc::new(AtomicUsize::new(0)),
            list_calls: Arc::new(AtomicUsize::new(0)),
            create_calls: Arc::new(AtomicUsize::new(0)),
            update_calls: Arc::new(AtomicUsize::new(0)),
            verify_calls: Arc::new(AtomicUsize::new(0)),
            reject_credentials: Arc::new(AtomicBool::new(false)),
            failing_stage: Arc::new(Mutex::new(None)),
            list_latency: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a new MockDnsProvider that shares state and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            zones: Arc::clone(&other.zones),
            records: Arc::clone(&other.records),
            next_id: Arc::clone(&other.next_id),
            zone_calls: Arc::clone(&other.zone_calls),
            list_calls: Arc::clone(&other.list_calls),
            create_calls: Arc::clone(&other.create_calls),
            update_calls: Arc::clone(&other.update_calls),
            verify_calls: Arc::clone(&other.verify_calls),
            reject_credentials: Arc::clone(&other.reject_credentials),
            failing_stage: Arc::clone(&other.failing_stage),
            list_latency: Arc::clone(&other.list_latency),
        }
    }

    /// Insert an existing record; returns its id
    pub fn seed(&self, id: &str, name: &str, content: &str, created_at: Option<i64>) -> String {
        let record = DnsRecord {
            id: id.to_string(),
            name: name.to_string(),
            record_type: "A".to_string(),
            content: content.to_string(),
            proxied: false,
            ttl: 1,
            created_on: created_at.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()),
        };
        self.records
            .lock()
            .unwrap()
            .push((ZONE_ID.to_string(), record));
        id.to_string()
    }

    /// Records currently stored under `name`
    pub fn records_named(&self, name: &str) -> Vec<DnsRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.name == name)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn record_by_id(&self, id: &str) -> Option<DnsRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|(_, r)| r.id == id)
            .map(|(_, r)| r.clone())
    }

    /// Make every call of `stage` fail until cleared
    pub fn fail_at(&self, stage: Option<Stage>) {
        *self.failing_stage.lock().unwrap() = stage;
    }

    pub fn reject_credentials(&self) {
        self.reject_credentials.store(true, Ordering::SeqCst);
    }

    /// Delay every list call
    pub fn set_list_latency(&self, latency: Option<Duration>) {
        *self.list_latency.lock().unwrap() = latency;
    }

    pub fn zone_calls(&self) -> usize {
        self.zone_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Create and update calls combined
    pub fn write_calls(&self) -> usize {
        self.create_calls() + self.update_calls()
    }

    fn check(&self, stage: Stage) -> Result<()> {
        if *self.failing_stage.lock().unwrap() == Some(stage) {
            return Err(Error::provider_call(stage, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn verify(&self) -> Result<()> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(Error::provider_call(Stage::ZoneLookup, "Invalid API Token"));
        }
        Ok(())
    }

    async fn zone_id(&self, zone_name: &str) -> Result<String> {
        self.zone_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Stage::ZoneLookup)?;
        self.zones
            .get(zone_name)
            .cloned()
            .ok_or_else(|| Error::zone_not_found(zone_name))
    }

    async fn list_records(&self, zone_id: &str, name: &str) -> Result<Vec<DnsRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Stage::List)?;

        let latency = *self.list_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(z, r)| z == zone_id && r.name == name)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create_record(&self, zone_id: &str, spec: &RecordSpec) -> Result<DnsRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Stage::Create)?;

        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = DnsRecord {
            id,
            name: spec.name.clone(),
            record_type: spec.record_type.to_string(),
            content: spec.content.clone(),
            proxied: spec.proxied,
            ttl: spec.ttl,
            created_on: Some(Utc::now()),
        };
        self.records
            .lock()
            .unwrap()
            .push((zone_id.to_string(), record.clone()));
        Ok(record)
    }

    async fn update_record(
        &self,
        _zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> Result<DnsRecord> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Stage::Update)?;

        let mut records = self.records.lock().unwrap();
        let (_, record) = records
            .iter_mut()
            .find(|(_, r)| r.id == record_id)
            .ok_or_else(|| Error::provider_call(Stage::Update, "record not found"))?;

        record.record_type = spec.record_type.to_string();
        record.name = spec.name.clone();
        record.content = spec.content.clone();
        record.proxied = spec.proxied;
        record.ttl = spec.ttl;
        Ok(record.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// An AddressResolver that counts calls
pub struct CountingResolver {
    address: Option<IpAddr>,
    calls: Arc<AtomicUsize>,
}

impl CountingResolver {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address: Some(address),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A resolver whose lookups always fail
    pub fn failing() -> Self {
        Self {
            address: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            address: other.address,
            calls: Arc::clone(&other.calls),
        }
    }
}

#[async_trait::async_trait]
impl AddressResolver for CountingResolver {
    async fn resolve(&self) -> Result<ResolvedAddress> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.address
            .map(ResolvedAddress::new)
            .ok_or_else(|| Error::resolution("lookup service unreachable"))
    }

    fn resolver_name(&self) -> &'static str {
        "counting"
    }
}

/// Collect every event currently queued on the receiver
pub fn drain(rx: &mut mpsc::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
