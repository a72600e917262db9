//! Finnhub client
//!
//! Candle history and technical indicators from the same upstream, so one
//! client implements both ports. Indicator responses carry parallel
//! arrays; the latest reading is the last element. A "no_data" status is
//! an empty series, not an error.

use crate::error::PipelineError;
use crate::models::PricePoint;
use crate::ports::{BollingerReading, IndicatorPort, MacdReading, PriceHistoryPort};
use crate::providers::http_client;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const BASE_URL: &str = "https://finnhub.io/api/v1";
/// Daily resolution used for all indicator queries.
const INDICATOR_RESOLUTION: &str = "D";

pub struct FinnhubClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FinnhubClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("token", self.api_key.clone()));

        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Collaborator(format!(
                "Finnhub returned status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    async fn indicator(&self, symbol: &str, indicator: &str, extra: &[(&str, String)]) -> Result<Value> {
        let to = Utc::now().timestamp();
        let from = (Utc::now() - Duration::days(365)).timestamp();
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("resolution", INDICATOR_RESOLUTION.to_string()),
            ("from", from.to_string()),
            ("to", to.to_string()),
            ("indicator", indicator.to_string()),
        ];
        params.extend_from_slice(extra);
        self.get("/indicator", &params).await
    }
}

/// Last finite reading of a parallel indicator array.
fn last_value(value: &Value, key: &str) -> Option<f64> {
    value
        .get(key)
        .and_then(Value::as_array)
        .and_then(|arr| arr.iter().rev().find_map(Value::as_f64))
        .filter(|v| v.is_finite())
}

fn interval_resolution(interval: &str) -> &'static str {
    match interval {
        "1m" => "1",
        "5m" => "5",
        "15m" => "15",
        "30m" => "30",
        "1h" => "60",
        _ => "D",
    }
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

#[async_trait]
impl PriceHistoryPort for FinnhubClient {
    async fn price_history(
        &self,
        symbol: &str,
        period_days: u32,
        interval: &str,
    ) -> Result<Vec<PricePoint>> {
        let to = Utc::now().timestamp();
        let from = (Utc::now() - Duration::days(period_days as i64)).timestamp();

        let value = self
            .get(
                "/stock/candle",
                &[
                    ("symbol", symbol.to_string()),
                    ("resolution", interval_resolution(interval).to_string()),
                    ("from", from.to_string()),
                    ("to", to.to_string()),
                ],
            )
            .await?;

        let candles: CandleResponse = serde_json::from_value(value)
            .map_err(|e| PipelineError::Parse(format!("Finnhub candle payload: {}", e)))?;

        if candles.s == "no_data" {
            debug!(symbol, "Finnhub returned no candle data");
            return Ok(Vec::new());
        }
        if candles.s != "ok" {
            return Err(PipelineError::Collaborator(format!(
                "Finnhub candle status '{}'",
                candles.s
            )));
        }

        let points = candles
            .t
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let timestamp = DateTime::<Utc>::from_timestamp(ts, 0)?;
                Some(PricePoint {
                    timestamp,
                    open: *candles.o.get(i)?,
                    high: *candles.h.get(i)?,
                    low: *candles.l.get(i)?,
                    close: *candles.c.get(i)?,
                    volume: candles.v.get(i).copied().unwrap_or(0.0) as u64,
                })
            })
            .collect();

        Ok(points)
    }
}

#[async_trait]
impl IndicatorPort for FinnhubClient {
    async fn rsi(&self, symbol: &str, time_period: u32) -> Result<Option<f64>> {
        let value = self
            .indicator(symbol, "rsi", &[("timeperiod", time_period.to_string())])
            .await?;
        Ok(last_value(&value, "rsi"))
    }

    async fn macd(&self, symbol: &str) -> Result<MacdReading> {
        let value = self.indicator(symbol, "macd", &[]).await?;
        Ok(MacdReading {
            macd: last_value(&value, "macd"),
            signal: last_value(&value, "macdSignal"),
        })
    }

    async fn sma(&self, symbol: &str, time_period: u32) -> Result<Option<f64>> {
        let value = self
            .indicator(symbol, "sma", &[("timeperiod", time_period.to_string())])
            .await?;
        Ok(last_value(&value, "sma"))
    }

    async fn bollinger(&self, symbol: &str) -> Result<BollingerReading> {
        let value = self.indicator(symbol, "bbands", &[]).await?;
        Ok(BollingerReading {
            upper: last_value(&value, "upperband"),
            lower: last_value(&value, "lowerband"),
            last_price: last_value(&value, "c"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_value_skips_trailing_nulls() {
        let value = json!({"rsi": [48.2, 51.0, null]});
        assert_eq!(last_value(&value, "rsi"), Some(51.0));
        assert_eq!(last_value(&value, "absent"), None);
        assert_eq!(last_value(&json!({"rsi": []}), "rsi"), None);
    }

    #[test]
    fn test_interval_resolution_mapping() {
        assert_eq!(interval_resolution("1h"), "60");
        assert_eq!(interval_resolution("1d"), "D");
        assert_eq!(interval_resolution("weird"), "D");
    }

    #[test]
    fn test_candle_deserialization() {
        let raw = json!({
            "s": "ok",
            "t": [1700000000i64, 1700003600i64],
            "o": [10.0, 10.5],
            "h": [11.0, 11.5],
            "l": [9.5, 10.0],
            "c": [10.5, 11.0],
            "v": [1000.0, 1200.0]
        });
        let candles: CandleResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(candles.s, "ok");
        assert_eq!(candles.c.len(), 2);
    }
}
