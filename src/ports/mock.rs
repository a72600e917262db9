//! In-memory mock collaborators
//!
//! Keep the pipeline functional without API keys and drive deterministic
//! tests. Each mock returns canned data; the language-model mock also
//! counts calls so tests can assert that a branch made none.

use crate::models::{NewsArticle, PricePoint};
use crate::ports::{
    BollingerReading, Collaborators, CompanyOverview, EtfProfile, EtfProfilePort, IndicatorPort,
    LanguageModelPort, MacdReading, MacroObservation, MacroSeriesPort, MarketDataPort, NewsPort,
    PriceHistoryPort, Quote,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted language model. Pops queued responses in order, then falls
/// back to a fixed default.
pub struct MockLanguageModel {
    queued: Mutex<VecDeque<String>>,
    default_response: String,
    calls: AtomicUsize,
}

impl MockLanguageModel {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default_response: default_response.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_queued(self, responses: Vec<String>) -> Self {
        *self.queued.lock().unwrap() = responses.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModelPort for MockLanguageModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queued = self.queued.lock().unwrap();
        Ok(queued
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone()))
    }
}

pub struct MockNews {
    articles: Vec<NewsArticle>,
}

impl MockNews {
    pub fn new(articles: Vec<NewsArticle>) -> Self {
        Self { articles }
    }

    pub fn sample(symbol: &str) -> Self {
        Self::new(vec![
            NewsArticle {
                title: format!("{} beats quarterly expectations", symbol),
                summary: format!("{} reported earnings above consensus estimates.", symbol),
                published_at: Utc::now() - Duration::hours(3),
                source: "MockWire".to_string(),
                sentiment: None,
            },
            NewsArticle {
                title: format!("Analysts split on {} outlook", symbol),
                summary: "Price targets diverge after the latest guidance.".to_string(),
                published_at: Utc::now() - Duration::hours(9),
                source: "MockWire".to_string(),
                sentiment: None,
            },
        ])
    }
}

#[async_trait]
impl NewsPort for MockNews {
    async fn latest_news(&self, _symbol: &str, _lookback_days: u32) -> Result<Vec<NewsArticle>> {
        Ok(self.articles.clone())
    }
}

pub struct MockPrices {
    points: Vec<PricePoint>,
}

impl MockPrices {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// A short synthetic uptrend ending at `last_close`.
    pub fn trending_to(last_close: f64) -> Self {
        let now = Utc::now();
        let points = (0..5)
            .map(|i| {
                let close = last_close - (4 - i) as f64;
                PricePoint {
                    timestamp: now - Duration::hours((5 - i) as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000 + i as u64 * 100,
                }
            })
            .collect();
        Self::new(points)
    }
}

#[async_trait]
impl PriceHistoryPort for MockPrices {
    async fn price_history(
        &self,
        _symbol: &str,
        _period_days: u32,
        _interval: &str,
    ) -> Result<Vec<PricePoint>> {
        Ok(self.points.clone())
    }
}

#[derive(Default)]
pub struct MockMarketData;

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        // Deterministic pseudo-quote derived from the symbol so movers
        // sorting is stable in tests.
        let seed = symbol.bytes().map(u64::from).sum::<u64>() % 23;
        Ok(Quote {
            symbol: symbol.to_string(),
            price: Some(20.0 + seed as f64 * 10.0),
            change_percent: Some(seed as f64 - 11.0),
            volume: Some(1_000_000 + seed * 50_000),
        })
    }

    async fn overview(&self, symbol: &str) -> Result<CompanyOverview> {
        Ok(CompanyOverview {
            symbol: symbol.to_string(),
            name: Some(format!("{} Inc.", symbol)),
            market_cap: Some(50e9),
            pe_ratio: Some(24.5),
            dividend_yield: Some(0.012),
            sector: Some("Technology".to_string()),
            beta: Some(1.1),
        })
    }
}

#[derive(Default)]
pub struct MockIndicators;

#[async_trait]
impl IndicatorPort for MockIndicators {
    async fn rsi(&self, _symbol: &str, _time_period: u32) -> Result<Option<f64>> {
        Ok(Some(54.2))
    }

    async fn macd(&self, _symbol: &str) -> Result<MacdReading> {
        Ok(MacdReading {
            macd: Some(1.35),
            signal: Some(1.10),
        })
    }

    async fn sma(&self, _symbol: &str, time_period: u32) -> Result<Option<f64>> {
        Ok(Some(if time_period >= 200 { 148.0 } else { 161.5 }))
    }

    async fn bollinger(&self, _symbol: &str) -> Result<BollingerReading> {
        Ok(BollingerReading {
            upper: Some(172.0),
            lower: Some(151.0),
            last_price: Some(163.4),
        })
    }
}

#[derive(Default)]
pub struct MockMacroSeries;

#[async_trait]
impl MacroSeriesPort for MockMacroSeries {
    async fn latest_observation(&self, series_id: &str) -> Result<MacroObservation> {
        let value = match series_id {
            "FEDFUNDS" => "5.33",
            "CPIAUCSL" => "310.3",
            "UNRATE" => "3.9",
            _ => "0.0",
        };
        Ok(MacroObservation {
            series_id: series_id.to_string(),
            date: "2024-06-01".to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Default)]
pub struct MockEtfProfiles;

#[async_trait]
impl EtfProfilePort for MockEtfProfiles {
    async fn etf_profile(&self, symbol: &str) -> Result<EtfProfile> {
        let (top_sector, risk_score) = match symbol {
            "BND" => ("bonds", "low"),
            "XLE" => ("energy", "high"),
            _ => ("technology", "medium"),
        };
        Ok(EtfProfile {
            symbol: symbol.to_string(),
            name: format!("{} Fund", symbol),
            top_sector: top_sector.to_string(),
            expected_return: 0.07,
            risk_score: risk_score.to_string(),
        })
    }
}

/// Full mock bundle with a fixed language-model response. Used by the
/// demo binary when no API keys are configured, and as a test baseline.
pub fn mock_collaborators(llm_response: impl Into<String>) -> Collaborators {
    Collaborators {
        llm: Arc::new(MockLanguageModel::new(llm_response)),
        news: Arc::new(MockNews::sample("AAPL")),
        prices: Arc::new(MockPrices::trending_to(190.0)),
        market: Arc::new(MockMarketData),
        indicators: Arc::new(MockIndicators),
        macro_series: Arc::new(MockMacroSeries),
        etf: Arc::new(MockEtfProfiles),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_llm_pops_in_order() {
        let llm = MockLanguageModel::new("default")
            .with_queued(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(llm.complete("p").await.unwrap(), "first");
        assert_eq!(llm.complete("p").await.unwrap(), "second");
        assert_eq!(llm.complete("p").await.unwrap(), "default");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_price_history_is_not_an_error() {
        let prices = MockPrices::empty();
        let history = prices.price_history("AAPL", 7, "1h").await.unwrap();
        assert!(history.is_empty());
    }
}
