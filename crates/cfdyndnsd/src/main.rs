// # cfdyndnsd - Cloudflare DDNS Daemon
//
// Thin integration layer around `cfdyndns-core`: reads configuration from
// the environment, builds a Client, registers one recurring job per record
// and waits for a shutdown signal. No DNS logic lives here.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `CF_API_TOKEN`: Cloudflare API token (required)
// - `CFDYNDNS_DOMAIN`: Zone name, e.g. `example.com` (required)
// - `CFDYNDNS_RECORDS`: Comma-separated labels; `@` is the zone apex (default: `@`)
// - `CFDYNDNS_PROXIED`: Route traffic through Cloudflare (default: `false`)
// - `CFDYNDNS_SCHEDULE`: Cron expression or `@every <duration>` (default: `@every 5m`)
// - `CFDYNDNS_IP_URL`: Public address lookup service (default: `https://api64.ipify.org`)
// - `APP_ENV`: `local`/`dev` for debug output, `prod` for none (default: info)
//
// ## Example
//
// ```bash
// export CF_API_TOKEN=your_token
// export CFDYNDNS_DOMAIN=example.com
// export CFDYNDNS_RECORDS=@,www,home
// export CFDYNDNS_SCHEDULE="*/10 * * * *"
//
// cfdyndnsd
// ```

use anyhow::Result;
use cfdyndns_cloudflare::CloudflareProvider;
use cfdyndns_core::{Client, Schedule, TracingSink, Verbosity};
use cfdyndns_ip_http::HttpAddressResolver;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_SCHEDULE: &str = "@every 5m";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    api_token: String,
    domain: String,
    records: Vec<String>,
    proxied: bool,
    schedule: String,
    ip_url: Option<String>,
    verbosity: Verbosity,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut records: Vec<String> = lookup("CFDYNDNS_RECORDS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if records.is_empty() {
            records.push("@".to_string());
        }

        let proxied = match lookup("CFDYNDNS_PROXIED") {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                anyhow::anyhow!("CFDYNDNS_PROXIED must be true or false. Got: {}", value)
            })?,
            None => false,
        };

        Ok(Self {
            api_token: lookup("CF_API_TOKEN").ok_or_else(|| {
                anyhow::anyhow!(
                    "CF_API_TOKEN is required. Set it via: export CF_API_TOKEN=your_token"
                )
            })?,
            domain: lookup("CFDYNDNS_DOMAIN").unwrap_or_default().trim().to_string(),
            records,
            proxied,
            schedule: lookup("CFDYNDNS_SCHEDULE")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string()),
            ip_url: lookup("CFDYNDNS_IP_URL").filter(|s| !s.trim().is_empty()),
            verbosity: Verbosity::from_app_env(lookup(cfdyndns_core::config::APP_ENV_VAR).as_deref()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            anyhow::bail!(
                "CF_API_TOKEN is required. Set it via: export CF_API_TOKEN=your_token"
            );
        }

        // Cloudflare API tokens are 40 characters
        if self.api_token.len() < 20 {
            anyhow::bail!(
                "CF_API_TOKEN appears too short ({} chars). \
                Cloudflare tokens are typically 40 characters. \
                Verify your token is correct.",
                self.api_token.len()
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.api_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "CF_API_TOKEN appears to be a placeholder. \
                Use an actual API token from the Cloudflare dashboard."
            );
        }

        if self.domain.is_empty() {
            anyhow::bail!(
                "CFDYNDNS_DOMAIN is required. Set it via: export CFDYNDNS_DOMAIN=example.com"
            );
        }
        validate_domain_name(&self.domain)?;

        for record in &self.records {
            if record != "@" {
                validate_domain_name(record)?;
            }
        }

        Schedule::parse(&self.schedule)
            .map_err(|e| anyhow::anyhow!("CFDYNDNS_SCHEDULE is not valid: {}", e))?;

        if let Some(ref url) = self.ip_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!(
                    "CFDYNDNS_IP_URL must use HTTP or HTTPS scheme. Got: {}",
                    url
                );
            }

            if url.starts_with("http://") {
                eprintln!(
                    "WARNING: CFDYNDNS_IP_URL uses HTTP (not HTTPS). \
                    The lookup answer could be tampered with in transit."
                );
            }
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Validate that a string is a valid domain name or label
///
/// Basic RFC 1035 checks; catches common typos, not every invalid name.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.trim_end_matches('.').split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        // Underscore is allowed for service-style labels
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '*')
        {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing; silent means no subscriber at all
    let log_level = match config.verbosity {
        Verbosity::Silent => None,
        Verbosity::Info => Some(Level::INFO),
        Verbosity::Debug => Some(Level::DEBUG),
    };

    if let Some(log_level) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Failed to set tracing subscriber: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    }

    info!("Starting cfdyndnsd");
    info!(
        "Configuration loaded: {} record(s) in {}",
        config.records.len(),
        config.domain
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let provider = CloudflareProvider::new(config.api_token.as_str())?;
    let resolver = match config.ip_url {
        Some(ref url) => HttpAddressResolver::new(url.as_str())?,
        None => HttpAddressResolver::with_default_service()?,
    };

    let client = Client::builder()
        .provider(provider)
        .resolver(resolver)
        .sink(TracingSink::new(config.verbosity))
        .build()
        .await?;

    info!(
        "Public address {} ({} records)",
        client.address(),
        client.record_type()
    );

    let mut jobs = Vec::with_capacity(config.records.len());
    for record in &config.records {
        match client
            .auto(&config.domain, record, config.proxied, &config.schedule)
            .await
        {
            Ok(job) => jobs.push(job),
            Err(e) => error!("Failed to manage record '{}': {}", record, e),
        }
    }

    if jobs.is_empty() {
        anyhow::bail!("No record could be updated");
    }

    info!(
        "Managing {} record(s) on schedule '{}'",
        jobs.len(),
        config.schedule
    );

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);

    let cancelled = client.stop().await;
    info!("Shut down cleanly, {} job(s) cancelled", cancelled);

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
