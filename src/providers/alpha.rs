//! Alpha Vantage client
//!
//! Quote and company-overview collaborator. Alpha Vantage keys its quote
//! payload with numbered labels ("05. price"), so both endpoints are
//! parsed as loose JSON and coerced field by field; anything that doesn't
//! coerce becomes `None` and renders downstream as "N/A".

use crate::error::PipelineError;
use crate::ports::{CompanyOverview, MarketDataPort, Quote};
use crate::providers::http_client;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

const BASE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    async fn query(&self, function: &str, symbol: &str) -> Result<Value> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", function),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Collaborator(format!(
                "Alpha Vantage returned status {}",
                response.status()
            )));
        }

        let value: Value = response.json().await?;
        if let Some(note) = value.get("Note").and_then(Value::as_str) {
            // Rate limiting arrives as a 200 with a "Note" body.
            return Err(PipelineError::Collaborator(format!(
                "Alpha Vantage throttled: {}",
                note
            )));
        }
        Ok(value)
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty() && *s != "None" && *s != "-")
        .map(str::to_string)
}

fn f64_field(value: &Value, key: &str) -> Option<f64> {
    str_field(value, key).and_then(|s| s.parse().ok())
}

fn u64_field(value: &Value, key: &str) -> Option<u64> {
    str_field(value, key).and_then(|s| s.parse().ok())
}

/// "1.2345%" -> 1.2345
fn percent_field(value: &Value, key: &str) -> Option<f64> {
    str_field(value, key).and_then(|s| s.trim_end_matches('%').parse().ok())
}

#[async_trait]
impl MarketDataPort for AlphaVantageClient {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let value = self.query("GLOBAL_QUOTE", symbol).await?;
        let body = value.get("Global Quote").ok_or_else(|| {
            PipelineError::Parse("Alpha Vantage quote payload missing 'Global Quote'".to_string())
        })?;

        debug!(symbol, "Alpha Vantage quote received");
        Ok(Quote {
            symbol: symbol.to_string(),
            price: f64_field(body, "05. price"),
            change_percent: percent_field(body, "10. change percent"),
            volume: u64_field(body, "06. volume"),
        })
    }

    async fn overview(&self, symbol: &str) -> Result<CompanyOverview> {
        let value = self.query("OVERVIEW", symbol).await?;

        debug!(symbol, "Alpha Vantage overview received");
        Ok(CompanyOverview {
            symbol: symbol.to_string(),
            name: str_field(&value, "Name"),
            market_cap: f64_field(&value, "MarketCapitalization"),
            pe_ratio: f64_field(&value, "PERatio"),
            dividend_yield: f64_field(&value, "DividendYield"),
            sector: str_field(&value, "Sector"),
            beta: f64_field(&value, "Beta"),
        })
    }
}
