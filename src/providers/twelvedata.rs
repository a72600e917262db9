//! Twelve Data client
//!
//! ETF-profile collaborator. Twelve Data supplies the live name check via
//! its quote endpoint; sector, expected return and risk tier come from a
//! curated table of the broad-market funds the portfolio step works with,
//! since no upstream endpoint exposes those fields directly.

use crate::error::PipelineError;
use crate::ports::{EtfProfile, EtfProfilePort};
use crate::providers::http_client;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const BASE_URL: &str = "https://api.twelvedata.com/quote";

/// symbol, sector, expected annual return, risk tier.
const KNOWN_ETFS: &[(&str, &str, f64, &str)] = &[
    ("SPY", "broad market", 0.08, "medium"),
    ("VOO", "broad market", 0.08, "medium"),
    ("VTI", "broad market", 0.08, "medium"),
    ("QQQ", "technology", 0.10, "high"),
    ("VGT", "technology", 0.10, "high"),
    ("XLK", "technology", 0.10, "high"),
    ("XLE", "energy", 0.07, "high"),
    ("XLF", "financials", 0.07, "medium"),
    ("XLV", "health care", 0.07, "medium"),
    ("BND", "bonds", 0.04, "low"),
    ("AGG", "bonds", 0.04, "low"),
    ("GLD", "commodities", 0.05, "medium"),
];

pub struct TwelveDataClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TwelveDataClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    name: Option<String>,
}

#[async_trait]
impl EtfProfilePort for TwelveDataClient {
    async fn etf_profile(&self, symbol: &str) -> Result<EtfProfile> {
        let (_, sector, expected_return, risk_score) = KNOWN_ETFS
            .iter()
            .find(|(s, _, _, _)| s.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| {
                PipelineError::Collaborator(format!("'{}' is not a recognized ETF", symbol))
            })?;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("symbol", symbol), ("apikey", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Collaborator(format!(
                "Twelve Data returned status {}",
                response.status()
            )));
        }

        let quote: QuoteResponse = response.json().await?;
        let name = quote.name.unwrap_or_else(|| format!("{} Fund", symbol));

        debug!(symbol, "Twelve Data quote received");
        Ok(EtfProfile {
            symbol: symbol.to_uppercase(),
            name,
            top_sector: sector.to_string(),
            expected_return: *expected_return,
            risk_score: risk_score.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_etf_table_lookup() {
        assert!(KNOWN_ETFS.iter().any(|(s, _, _, _)| *s == "SPY"));
        let bnd = KNOWN_ETFS.iter().find(|(s, _, _, _)| *s == "BND").unwrap();
        assert_eq!(bnd.1, "bonds");
        assert_eq!(bnd.3, "low");
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_a_collaborator_error() {
        let client = TwelveDataClient::new("key".to_string());
        let result = client.etf_profile("NOTREAL").await;
        assert!(matches!(result, Err(PipelineError::Collaborator(_))));
    }
}
