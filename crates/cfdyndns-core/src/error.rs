//! Error types for the cfdyndns system
//!
//! This module defines all error types used throughout the workspace.

use std::fmt;

use thiserror::Error;

/// Result type alias for cfdyndns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Provider call stage that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Zone identifier lookup
    ZoneLookup,
    /// Listing existing records
    List,
    /// Creating a new record
    Create,
    /// Updating an existing record
    Update,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ZoneLookup => "zone lookup",
            Stage::List => "list",
            Stage::Create => "create",
            Stage::Update => "update",
        };
        f.write_str(name)
    }
}

/// Core error type for the cfdyndns system
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or rejected token, or address resolution failure at construction
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// Public address could not be discovered or parsed
    #[error("Address resolution failed: {0}")]
    Resolution(String),

    /// Domain is not a zone of the authenticated account
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// Provider API failure, tagged with the failing stage
    #[error("Provider call failed during {stage}: {message}")]
    ProviderCall {
        /// Stage of the reconciliation that failed
        stage: Stage,
        /// Error message
        message: String,
    },

    /// Schedule expression rejected by the parser
    #[error("Invalid schedule expression '{expression}': {reason}")]
    ScheduleExpression {
        /// The offending expression
        expression: String,
        /// Why it was rejected
        reason: String,
    },

    /// The scheduler has been stopped and accepts no new jobs
    #[error("Scheduler has been stopped")]
    SchedulerStopped,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Create an address resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(zone: impl Into<String>) -> Self {
        Self::ZoneNotFound(zone.into())
    }

    /// Create a provider call error for the given stage
    pub fn provider_call(stage: Stage, message: impl Into<String>) -> Self {
        Self::ProviderCall {
            stage,
            message: message.into(),
        }
    }

    /// Create a schedule expression error
    pub fn schedule(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ScheduleExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The failing stage, if this is a provider call error
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::ProviderCall { stage, .. } => Some(*stage),
            Self::ZoneNotFound(_) => Some(Stage::ZoneLookup),
            _ => None,
        }
    }
}
