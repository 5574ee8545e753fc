// # cfdyndns-core
//
// Core library for the cfdyndns dynamic DNS synchronizer.
//
// ## Architecture Overview
//
// - **AddressResolver**: Trait for discovering the public IP address
// - **DnsProvider**: Trait for reading and writing records via provider APIs
// - **Reconciler**: Makes one record match the cached address (create or update)
// - **Scheduler**: Recurring jobs driven by cron expressions or fixed intervals
// - **Client**: Owns the cached address, the reconciler and the scheduler
// - **EventSink**: Injected destination for diagnostic events
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider and resolver implementations
// 2. **Resolve Once**: The public address is discovered at construction and never refreshed
// 3. **No Global State**: Diagnostics flow through the sink handed to the Client
// 4. **Library-First**: The daemon is a thin wrapper around the same Client

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod naming;
pub mod reconciler;
pub mod scheduler;
pub mod traits;

// Re-export core types for convenience
pub use client::{Client, ClientBuilder};
pub use config::{RecordDefaults, Verbosity};
pub use error::{Error, Result, Stage};
pub use events::{ChannelSink, ClientEvent, EventSink, NoopSink, TracingSink};
pub use naming::{RecordName, normalize};
pub use scheduler::{JobHandle, JobId, JobInfo, Schedule};
pub use traits::{
    AddressResolver, DnsProvider, DnsRecord, IpVersion, RecordSpec, RecordType, ResolvedAddress,
    StaticAddressResolver, UpdateResult,
};
