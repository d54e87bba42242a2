use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Security;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// The security already carried a canonical symbol.
    Provided,
    DirectTicker,
    IdentifierLookup,
    FuzzyName,
    Unresolved,
}

impl ResolutionMethod {
    pub fn is_resolved(self) -> bool {
        !matches!(self, ResolutionMethod::Unresolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentifierType {
    Cusip,
    Isin,
}

impl IdentifierType {
    /// OpenFIGI `idType` value.
    pub fn figi_id_type(self) -> &'static str {
        match self {
            IdentifierType::Cusip => "ID_CUSIP",
            IdentifierType::Isin => "ID_ISIN",
        }
    }
}

/// Outcome of resolving one security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub symbol: Option<String>,
    /// 0–100.
    pub confidence: u8,
    pub method: ResolutionMethod,
    /// Served from the mapping cache without external calls.
    #[serde(default)]
    pub cached: bool,
}

impl Resolution {
    pub fn resolved(symbol: impl Into<String>, confidence: u8, method: ResolutionMethod) -> Self {
        Self {
            symbol: Some(symbol.into()),
            confidence: confidence.min(100),
            method,
            cached: false,
        }
    }

    pub fn unresolved() -> Self {
        Self {
            symbol: None,
            confidence: 0,
            method: ResolutionMethod::Unresolved,
            cached: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.symbol.is_some()
    }
}

/// Permanent cache row: once confirmed, a mapping never needs re-resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMapping {
    pub provider_id: String,
    pub symbol: String,
    pub confidence: u8,
    pub method: ResolutionMethod,
    pub resolved_at: DateTime<Utc>,
}

impl SymbolMapping {
    pub fn resolution(&self) -> Resolution {
        Resolution {
            symbol: Some(self.symbol.clone()),
            confidence: self.confidence,
            method: self.method,
            cached: true,
        }
    }
}

/// A security waiting for manual or deferred resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedSecurity {
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cusip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub attempts: u32,
    pub first_seen: DateTime<Utc>,
    pub last_attempt: DateTime<Utc>,
}

impl UnresolvedSecurity {
    pub fn from_security(security: &Security, at: DateTime<Utc>) -> Self {
        Self {
            provider_id: security.provider_id.clone(),
            ticker: security.ticker.clone(),
            cusip: security.cusip.clone(),
            isin: security.isin.clone(),
            name: security.name.clone(),
            attempts: 1,
            first_seen: at,
            last_attempt: at,
        }
    }

    /// Fold a new failed attempt into an existing queue entry.
    pub fn merge_attempt(&mut self, newer: UnresolvedSecurity) {
        self.attempts += newer.attempts.max(1);
        self.last_attempt = self.last_attempt.max(newer.last_attempt);
        self.ticker = newer.ticker.or(self.ticker.take());
        self.cusip = newer.cusip.or(self.cusip.take());
        self.isin = newer.isin.or(self.isin.take());
        self.name = newer.name.or(self.name.take());
    }
}
