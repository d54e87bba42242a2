use serde::{Deserialize, Serialize};

/// Instrument taxonomy shared by reconstruction and analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityType {
    #[default]
    Equity,
    /// Broad-market index ETF.
    Etf,
    /// Single-sector or thematic ETF.
    SectorEtf,
    LeveragedEtf,
    Bond,
    MutualFund,
    MoneyMarket,
    Crypto,
    Option,
    Cash,
    Other,
}

impl SecurityType {
    /// Cash is valued at par and never needs a price feed.
    pub fn is_cash(self) -> bool {
        matches!(self, SecurityType::Cash)
    }
}

/// A tradable instrument as reported by a broker.
///
/// `provider_id` is the broker's opaque identifier and the key used by the
/// replay engine; `canonical_symbol` is filled in by the symbol resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cusip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub security_type: SecurityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_symbol: Option<String>,
}

impl Security {
    pub fn new(provider_id: impl Into<String>, security_type: SecurityType) -> Self {
        Self {
            provider_id: provider_id.into(),
            ticker: None,
            cusip: None,
            isin: None,
            name: None,
            security_type,
            canonical_symbol: None,
        }
    }

    /// Equity whose provider id is its ticker.
    pub fn equity(ticker: impl Into<String>) -> Self {
        let ticker = ticker.into();
        Self::new(ticker.clone(), SecurityType::Equity).with_ticker(ticker)
    }

    pub fn cash(provider_id: impl Into<String>) -> Self {
        Self::new(provider_id, SecurityType::Cash)
    }

    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn with_cusip(mut self, cusip: impl Into<String>) -> Self {
        self.cusip = Some(cusip.into());
        self
    }

    pub fn with_isin(mut self, isin: impl Into<String>) -> Self {
        self.isin = Some(isin.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, security_type: SecurityType) -> Self {
        self.security_type = security_type;
        self
    }

    pub fn with_canonical_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.canonical_symbol = Some(symbol.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.ticker.as_deref())
            .unwrap_or(&self.provider_id)
    }
}
