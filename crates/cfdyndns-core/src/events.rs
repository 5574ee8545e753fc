//! Diagnostic events emitted by a Client
//!
//! A Client never logs through global state. Everything it has to say is
//! expressed as a [`ClientEvent`] and handed to the [`EventSink`] it was
//! built with. Sinks are informational only: they cannot fail and cannot
//! influence control flow.
//!
//! - [`NoopSink`]: drops everything (the default)
//! - [`TracingSink`]: forwards to `tracing`, filtered by [`Verbosity`]
//! - [`ChannelSink`]: forwards into a bounded channel for external monitoring

use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};

use crate::config::Verbosity;
use crate::scheduler::JobId;
use crate::traits::{IpVersion, RecordType, ResolvedAddress};

/// Events emitted by a Client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Public address resolved at construction
    AddressResolved {
        address: ResolvedAddress,
        version: IpVersion,
    },

    /// Zone identifier found for a domain
    ZoneFound { zone: String, zone_id: String },

    /// Several records matched one name; only `chosen_id` is updated
    DuplicateRecords {
        name: String,
        count: usize,
        chosen_id: String,
    },

    /// A new record was created
    RecordCreated {
        name: String,
        record_type: RecordType,
        content: String,
        proxied: bool,
    },

    /// An existing record was overwritten
    RecordUpdated {
        name: String,
        record_type: RecordType,
        content: String,
        proxied: bool,
    },

    /// A recurring job was registered
    JobScheduled {
        job: JobId,
        name: String,
        expression: String,
    },

    /// A recurring job was cancelled through its handle
    JobCancelled { job: JobId, name: String },

    /// A scheduled tick failed; the job keeps running
    JobFailed {
        job: JobId,
        name: String,
        error: String,
    },

    /// The whole scheduler was stopped
    SchedulerStopped { cancelled_jobs: usize },
}

impl ClientEvent {
    /// Severity of the event
    pub fn level(&self) -> Level {
        match self {
            ClientEvent::ZoneFound { .. } => Level::DEBUG,
            ClientEvent::DuplicateRecords { .. } => Level::WARN,
            ClientEvent::JobFailed { .. } => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Destination for diagnostic events
pub trait EventSink: Send + Sync {
    /// Receive one event
    fn emit(&self, event: ClientEvent);
}

/// Sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: ClientEvent) {}
}

/// Sink that writes events through `tracing`
///
/// Events below the configured verbosity are dropped before they reach
/// the subscriber, so the tier holds even under a permissive subscriber.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    verbosity: Verbosity,
}

impl TracingSink {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Sink whose verbosity follows `APP_ENV`
    pub fn from_env() -> Self {
        Self::new(Verbosity::from_env())
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: ClientEvent) {
        if !self.verbosity.allows(event.level()) {
            return;
        }

        match event {
            ClientEvent::AddressResolved { address, version } => {
                info!(ip = %address, ?version, "Public address resolved");
            }
            ClientEvent::ZoneFound { zone, zone_id } => {
                debug!(%zone, %zone_id, "Found zone");
            }
            ClientEvent::DuplicateRecords {
                name,
                count,
                chosen_id,
            } => {
                warn!(record = %name, count, chosen = %chosen_id, "Several records share this name, updating the oldest");
            }
            ClientEvent::RecordCreated {
                name,
                record_type,
                content,
                proxied,
            } => {
                info!(record = %name, %record_type, ip = %content, proxied, "Record created");
            }
            ClientEvent::RecordUpdated {
                name,
                record_type,
                content,
                proxied,
            } => {
                info!(record = %name, %record_type, ip = %content, proxied, "Record updated");
            }
            ClientEvent::JobScheduled {
                job,
                name,
                expression,
            } => {
                info!(%job, record = %name, schedule = %expression, "Scheduled job");
            }
            ClientEvent::JobCancelled { job, name } => {
                info!(%job, record = %name, "Stopped scheduled job");
            }
            ClientEvent::JobFailed { job, name, error } => {
                error!(%job, record = %name, %error, "Scheduled update failed");
            }
            ClientEvent::SchedulerStopped { cancelled_jobs } => {
                info!(cancelled_jobs, "Scheduler stopped");
            }
        }
    }
}

/// Sink that forwards events into a bounded channel
///
/// When the receiver falls behind, events are dropped rather than
/// blocking the Client.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ClientEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that yields its events
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ClientEvent) {
        if self.tx.try_send(event).is_err() {
            // Receiver is full or gone; diagnostics are best-effort
            tracing::trace!("Event channel unavailable, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped() -> ClientEvent {
        ClientEvent::SchedulerStopped { cancelled_jobs: 2 }
    }

    #[test]
    fn levels() {
        assert_eq!(stopped().level(), Level::INFO);
        assert_eq!(
            ClientEvent::ZoneFound {
                zone: "example.com".into(),
                zone_id: "z1".into()
            }
            .level(),
            Level::DEBUG
        );
    }

    #[tokio::test]
    async fn channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.emit(stopped());
        assert_eq!(rx.recv().await, Some(stopped()));
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.emit(stopped());
        sink.emit(ClientEvent::SchedulerStopped { cancelled_jobs: 9 });

        assert_eq!(rx.try_recv().ok(), Some(stopped()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_sink_survives_closed_receiver() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        sink.emit(stopped());
    }
}
