//! OpenFIGI identifier mapping (`POST /v3/mapping`).
//!
//! Works without a key at a lower rate limit; a key is sent as
//! `X-OPENFIGI-APIKEY` when configured.

use anyhow::{Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{IdentifierMappingProvider, IdentifierType};
use crate::error::EngineError;

const OPENFIGI_BASE_URL: &str = "https://api.openfigi.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MappingJob<'a> {
    id_type: &'static str,
    id_value: &'a str,
}

/// One entry per job: either `data`, or a `warning` such as
/// "No identifier found.", or an `error`.
#[derive(Debug, Deserialize)]
struct MappingResult {
    #[serde(default)]
    data: Vec<FigiInstrument>,
    #[serde(default)]
    warning: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FigiInstrument {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    exch_code: Option<String>,
}

pub struct OpenFigiMapper {
    api_key: Option<SecretString>,
    client: Client,
    base_url: String,
}

impl OpenFigiMapper {
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self {
            api_key,
            client: Client::new(),
            base_url: OPENFIGI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Prefer the US composite listing; otherwise the first instrument with a
    /// ticker.
    fn pick_ticker(instruments: &[FigiInstrument]) -> Option<String> {
        let with_ticker = || {
            instruments
                .iter()
                .filter(|i| i.ticker.as_deref().is_some_and(|t| !t.trim().is_empty()))
        };
        with_ticker()
            .find(|i| i.exch_code.as_deref() == Some("US"))
            .or_else(|| with_ticker().next())
            .and_then(|i| i.ticker.as_ref())
            .map(|t| t.trim().to_uppercase())
    }
}

#[async_trait::async_trait]
impl IdentifierMappingProvider for OpenFigiMapper {
    async fn lookup(&self, id_type: IdentifierType, value: &str) -> Result<Option<String>> {
        let url = format!("{}/v3/mapping", self.base_url);
        let jobs = [MappingJob {
            id_type: id_type.figi_id_type(),
            id_value: value.trim(),
        }];

        let mut request = self.client.post(&url).json(&jobs);
        if let Some(key) = &self.api_key {
            request = request.header("X-OPENFIGI-APIKEY", key.expose_secret());
        }

        let response = request.send().await.context("OpenFIGI request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::provider("openfigi", format!("status {status}: {body}")).into());
        }

        let results: Vec<MappingResult> = response
            .json()
            .await
            .context("Failed to decode OpenFIGI response")?;

        let Some(result) = results.into_iter().next() else {
            return Ok(None);
        };
        if let Some(error) = result.error {
            return Err(EngineError::provider("openfigi", format!("rejected {value}: {error}")).into());
        }
        if result.warning.is_some() {
            return Ok(None);
        }
        Ok(Self::pick_ticker(&result.data))
    }

    fn name(&self) -> &str {
        "openfigi"
    }
}
