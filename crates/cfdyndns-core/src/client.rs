//! Client
//!
//! The [`Client`] ties the pieces together:
//!
//! ```text
//!   ClientBuilder::build
//!     ├─ DnsProvider::verify          (token check)
//!     └─ AddressResolver::resolve     (once, cached for the Client's lifetime)
//!
//!   Client::set   ─▶ Reconciler::reconcile
//!   Client::auto  ─▶ Reconciler::reconcile, then Scheduler::add
//!   Client::stop  ─▶ Scheduler::stop
//! ```
//!
//! Clones share the cached address, the scheduler and the record locks.
//! Dropping the last clone cancels every scheduled job.

use std::fmt;
use std::sync::Arc;

use crate::config::RecordDefaults;
use crate::error::{Error, Result};
use crate::events::{ClientEvent, EventSink, NoopSink};
use crate::naming::normalize;
use crate::reconciler::Reconciler;
use crate::scheduler::{JobFn, JobHandle, JobInfo, JobTarget, Schedule, Scheduler};
use crate::traits::{AddressResolver, DnsProvider, RecordType, ResolvedAddress, UpdateResult};

/// Builder for [`Client`]
pub struct ClientBuilder {
    provider: Option<Arc<dyn DnsProvider>>,
    resolver: Option<Arc<dyn AddressResolver>>,
    sink: Arc<dyn EventSink>,
    defaults: RecordDefaults,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            provider: None,
            resolver: None,
            sink: Arc::new(NoopSink),
            defaults: RecordDefaults::default(),
        }
    }
}

impl ClientBuilder {
    /// DNS provider used for every record operation (required)
    pub fn provider<P: DnsProvider + 'static>(mut self, provider: P) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Resolver queried once during [`ClientBuilder::build`] (required)
    pub fn resolver<R: AddressResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Destination for diagnostic events (defaults to [`NoopSink`])
    pub fn sink<S: EventSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn shared_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn record_defaults(mut self, defaults: RecordDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Verify the provider credentials and resolve the public address
    ///
    /// # Errors
    ///
    /// - `Error::Initialization`: missing collaborator, rejected token, or
    ///   the public address could not be resolved
    /// - `Error::Config`: invalid record defaults
    pub async fn build(self) -> Result<Client> {
        let provider = self
            .provider
            .ok_or_else(|| Error::init("No DNS provider configured"))?;
        let resolver = self
            .resolver
            .ok_or_else(|| Error::init("No address resolver configured"))?;
        self.defaults.validate()?;

        provider.verify().await.map_err(|e| match e {
            Error::Initialization(_) => e,
            other => Error::init(format!(
                "{} rejected the credentials: {}",
                provider.provider_name(),
                other
            )),
        })?;

        let address = resolver.resolve().await.map_err(|e| {
            Error::init(format!(
                "Could not resolve public address via {}: {}",
                resolver.resolver_name(),
                e
            ))
        })?;
        self.sink.emit(ClientEvent::AddressResolved {
            address,
            version: address.version(),
        });

        let reconciler = Reconciler::new(provider, address, self.defaults, Arc::clone(&self.sink));

        Ok(Client {
            inner: Arc::new(ClientInner {
                reconciler: Arc::new(reconciler),
                scheduler: Scheduler::new(Arc::clone(&self.sink)),
                sink: self.sink,
            }),
        })
    }
}

struct ClientInner {
    reconciler: Arc<Reconciler>,
    scheduler: Scheduler,
    sink: Arc<dyn EventSink>,
}

/// Keeps address records pointed at this host's public IP
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Public address captured at construction
    pub fn address(&self) -> ResolvedAddress {
        self.inner.reconciler.address()
    }

    /// Record type written by this client (`A` or `AAAA`)
    pub fn record_type(&self) -> RecordType {
        self.inner.reconciler.record_type()
    }

    /// Create or update one record so it points at the cached address
    ///
    /// `subdomain` may be a bare label, a fully-qualified name inside
    /// `domain`, or empty / `@` for the zone apex.
    pub async fn set(&self, domain: &str, subdomain: &str, proxied: bool) -> Result<UpdateResult> {
        self.inner.reconciler.set(domain, subdomain, proxied).await
    }

    /// Update a record now, then keep updating it on a schedule
    ///
    /// Nothing is registered unless the immediate update succeeds and
    /// `expression` parses. An update already made stands even if the
    /// expression is rejected.
    ///
    /// # Errors
    ///
    /// - `Error::SchedulerStopped`: [`Client::stop`] was already called
    /// - any error of [`Client::set`] from the immediate update
    /// - `Error::ScheduleExpression`: `expression` could not be parsed
    pub async fn auto(
        &self,
        domain: &str,
        subdomain: &str,
        proxied: bool,
        expression: &str,
    ) -> Result<JobHandle> {
        if self.inner.scheduler.is_stopped() {
            return Err(Error::SchedulerStopped);
        }

        let name = normalize(domain, subdomain);
        self.inner.reconciler.reconcile(&name, proxied).await?;

        let schedule = Schedule::parse(expression)?;
        let target = JobTarget {
            zone: name.zone.clone(),
            name: name.fqdn.clone(),
            proxied,
        };

        let reconciler = Arc::clone(&self.inner.reconciler);
        let sink = Arc::clone(&self.inner.sink);
        let job: JobFn = Arc::new(move |id| {
            let reconciler = Arc::clone(&reconciler);
            let sink = Arc::clone(&sink);
            let name = name.clone();
            Box::pin(async move {
                if let Err(e) = reconciler.reconcile(&name, proxied).await {
                    sink.emit(ClientEvent::JobFailed {
                        job: id,
                        name: name.fqdn,
                        error: e.to_string(),
                    });
                }
            })
        });

        self.inner.scheduler.add(schedule, target, job)
    }

    /// Registered recurring jobs, ordered by id
    pub fn jobs(&self) -> Vec<JobInfo> {
        self.inner.scheduler.jobs()
    }

    /// Cancel every scheduled job and wait for running ticks to finish
    ///
    /// [`Client::set`] keeps working afterwards; [`Client::auto`] fails
    /// with `Error::SchedulerStopped`.
    ///
    /// # Returns
    ///
    /// The number of jobs that were cancelled
    pub async fn stop(&self) -> usize {
        self.inner.scheduler.stop().await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.address())
            .field("record_type", &self.record_type())
            .field("jobs", &self.inner.scheduler.jobs().len())
            .field("stopped", &self.inner.scheduler.is_stopped())
            .finish()
    }
}
