//! Errors surfaced to callers and the soft per-unit outcome type threaded
//! through batch loops.

use std::fmt;

use serde::Serialize;

use crate::models::Id;

/// Failures that make a whole requested computation meaningless, or that a
/// caller needs to tell apart from generic plumbing errors.
///
/// Everything else travels as `anyhow::Error` with context; callers that care
/// can `downcast_ref::<EngineError>()`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{component} is not configured: {message}")]
    Configuration {
        component: &'static str,
        message: String,
    },

    #[error("unknown user {0}")]
    UserNotFound(Id),

    #[error("account {account} does not belong to user {user}")]
    AccountNotFound { user: Id, account: Id },

    #[error("{provider} request failed: {message}")]
    ExternalProvider { provider: String, message: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("malformed stored data in {context}: {message}")]
    MalformedStoredData { context: String, message: String },
}

impl EngineError {
    pub fn configuration(component: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            component,
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ExternalProvider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

/// Result of processing one unit (symbol, date, account, user) in a batch.
///
/// `Degraded` carries a usable value produced through a fallback; `Skipped`
/// means the unit contributed nothing. Neither aborts the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Degraded(T, String),
    Skipped(String),
}

impl<T> Outcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Ok(value) | Outcome::Degraded(value, _) => Some(value),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Ok(value) | Outcome::Degraded(value, _) => Some(value),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Degraded(_, reason) | Outcome::Skipped(reason) => Some(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(..))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Degraded(value, reason) => Outcome::Degraded(f(value), reason),
            Outcome::Skipped(reason) => Outcome::Skipped(reason),
        }
    }
}

/// Per-batch tally of unit outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeTally {
    pub ok: usize,
    pub degraded: usize,
    pub skipped: usize,
}

impl OutcomeTally {
    pub fn record<T>(&mut self, outcome: &Outcome<T>) {
        match outcome {
            Outcome::Ok(_) => self.ok += 1,
            Outcome::Degraded(..) => self.degraded += 1,
            Outcome::Skipped(_) => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.degraded + self.skipped
    }
}
