//! HTTP-backed collaborator implementations
//!
//! One client per upstream service, each holding a long-lived pooled
//! `reqwest::Client` with a bounded request timeout and no retries. All
//! keys are passed in by constructor; nothing here reads the environment
//! except [`collaborators_from_env`], which the demo binary uses to wire
//! a bundle from whatever keys are configured, falling back to mocks for
//! the rest.

use crate::ports::mock::{
    MockEtfProfiles, MockIndicators, MockMacroSeries, MockMarketData, MockNews, MockPrices,
};
use crate::ports::Collaborators;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub mod alpha;
pub mod finnhub;
pub mod fred;
pub mod gemini;
pub mod newsapi;
pub mod twelvedata;

pub use alpha::AlphaVantageClient;
pub use finnhub::FinnhubClient;
pub use fred::FredClient;
pub use gemini::GeminiClient;
pub use newsapi::NewsApiClient;
pub use twelvedata::TwelveDataClient;

/// Request timeout shared by all providers. Collaborator calls are
/// bounded; a slow upstream becomes a step fallback, not a hung run.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .build()
        .expect("Failed to build HTTP client")
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Build a collaborator bundle from environment keys. Returns `None`
/// when `GEMINI_API_KEY` is absent (the pipeline is useless without a
/// language model); every other missing key falls back to its mock.
///
/// Keys: `GEMINI_API_KEY`, `ALPHA_VANTAGE_API_KEY`, `FINNHUB_API_KEY`,
/// `FRED_API_KEY`, `NEWS_API_KEY`, `TWELVE_DATA_API_KEY`.
pub fn collaborators_from_env() -> Option<Collaborators> {
    let llm = Arc::new(GeminiClient::new(env_key("GEMINI_API_KEY")?));

    let market: Arc<dyn crate::ports::MarketDataPort> = match env_key("ALPHA_VANTAGE_API_KEY") {
        Some(key) => Arc::new(AlphaVantageClient::new(key)),
        None => Arc::new(MockMarketData),
    };

    let (indicators, prices): (
        Arc<dyn crate::ports::IndicatorPort>,
        Arc<dyn crate::ports::PriceHistoryPort>,
    ) = match env_key("FINNHUB_API_KEY") {
        Some(key) => {
            let client = Arc::new(FinnhubClient::new(key));
            (client.clone(), client)
        }
        None => (
            Arc::new(MockIndicators),
            Arc::new(MockPrices::trending_to(190.0)),
        ),
    };

    let macro_series: Arc<dyn crate::ports::MacroSeriesPort> = match env_key("FRED_API_KEY") {
        Some(key) => Arc::new(FredClient::new(key)),
        None => Arc::new(MockMacroSeries),
    };

    let news: Arc<dyn crate::ports::NewsPort> = match env_key("NEWS_API_KEY") {
        Some(key) => Arc::new(NewsApiClient::new(key)),
        None => Arc::new(MockNews::sample("AAPL")),
    };

    let etf: Arc<dyn crate::ports::EtfProfilePort> = match env_key("TWELVE_DATA_API_KEY") {
        Some(key) => Arc::new(TwelveDataClient::new(key)),
        None => Arc::new(MockEtfProfiles),
    };

    Some(Collaborators {
        llm,
        news,
        prices,
        market,
        indicators,
        macro_series,
        etf,
    })
}
