//! Configuration types for the cfdyndns system
//!
//! This module defines the configuration structures shared by the library
//! and the daemon.

use serde::{Deserialize, Serialize};

/// Environment variable selecting the diagnostic verbosity
pub const APP_ENV_VAR: &str = "APP_ENV";

/// TTL value Cloudflare interprets as "automatic"
pub const AUTOMATIC_TTL: u32 = 1;

/// Diagnostic verbosity tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// No diagnostic output at all
    Silent,
    /// Informational events
    #[default]
    Info,
    /// Informational and debug events
    Debug,
}

impl Verbosity {
    /// Map an application environment name to a verbosity tier
    ///
    /// - `local`, `dev`, `development`: debug
    /// - `test`, `staging`, or no value at all: info
    /// - `prod`, `production`, anything else: silent
    pub fn from_app_env(app_env: Option<&str>) -> Self {
        let Some(env) = app_env else {
            return Verbosity::Info;
        };

        match env.trim().to_lowercase().as_str() {
            "local" | "dev" | "development" => Verbosity::Debug,
            "test" | "staging" => Verbosity::Info,
            _ => Verbosity::Silent,
        }
    }

    /// Read the tier from `APP_ENV`
    pub fn from_env() -> Self {
        Self::from_app_env(std::env::var(APP_ENV_VAR).ok().as_deref())
    }

    /// Whether events at `level` pass this tier
    pub fn allows(&self, level: tracing::Level) -> bool {
        match self {
            Verbosity::Silent => false,
            Verbosity::Info => level <= tracing::Level::INFO,
            Verbosity::Debug => level <= tracing::Level::DEBUG,
        }
    }
}

/// Values applied to every record written by a Client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDefaults {
    /// Record TTL in seconds (`1` = automatic)
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

fn default_ttl() -> u32 {
    AUTOMATIC_TTL
}

impl RecordDefaults {
    /// Validate the defaults
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ttl != AUTOMATIC_TTL && !(60..=86_400).contains(&self.ttl) {
            return Err(crate::Error::config(format!(
                "Record TTL must be 1 (automatic) or between 60 and 86400 seconds. Got: {}",
                self.ttl
            )));
        }
        Ok(())
    }
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self { ttl: AUTOMATIC_TTL }
    }
}
