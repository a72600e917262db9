//! Core data models for the trading assistant pipeline
//!
//! One `RunState` instance is created per user request, owned by the
//! pipeline engine, and threaded through every step by value. Bounded
//! numeric fields are clamped by their constructors so out-of-range
//! values are never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Closed intent set recognized by the router.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ReportRequest,
    RecoveryGuidance,
    BudgetAllocation,
    GeneralAdvice,
    StockInsight,
    TechnicalAnalysis,
    RiskAssessment,
    PortfolioGuidance,
    MacroTrend,
    Unknown,
}

impl Intent {
    /// Parse a lower-cased classifier label. Anything outside the allowed
    /// set maps to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "report_request" => Intent::ReportRequest,
            "recovery_guidance" => Intent::RecoveryGuidance,
            "budget_allocation" => Intent::BudgetAllocation,
            "general_advice" => Intent::GeneralAdvice,
            "stock_insight" => Intent::StockInsight,
            "technical_analysis" => Intent::TechnicalAnalysis,
            "risk_assessment" => Intent::RiskAssessment,
            "portfolio_guidance" => Intent::PortfolioGuidance,
            "macro_trend" => Intent::MacroTrend,
            _ => Intent::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ReportRequest => "report_request",
            Intent::RecoveryGuidance => "recovery_guidance",
            Intent::BudgetAllocation => "budget_allocation",
            Intent::GeneralAdvice => "general_advice",
            Intent::StockInsight => "stock_insight",
            Intent::TechnicalAnalysis => "technical_analysis",
            Intent::RiskAssessment => "risk_assessment",
            Intent::PortfolioGuidance => "portfolio_guidance",
            Intent::MacroTrend => "macro_trend",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    #[default]
    TopGainers,
    TopLosers,
    BudgetPicks,
    NewsDriven,
    LongTermPotential,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeFrame {
    #[default]
    Today,
    ThisWeek,
    ThisMonth,
    LongTerm,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Hold => "hold",
        };
        write!(f, "{}", s)
    }
}

/// `Rejected` is schema-reserved: the simulator never produces it today.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Executed,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NewsSentiment {
    Positive,
    Neutral,
    Negative,
}

//
// ================= Parsed Query =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedQuery {
    pub query_type: QueryType,
    pub time_frame: TimeFrame,
    pub top_n_requested: u32,
    pub company_mentioned: Option<String>,
    pub budget: Option<f64>,
}

impl Default for ParsedQuery {
    fn default() -> Self {
        Self {
            query_type: QueryType::default(),
            time_frame: TimeFrame::default(),
            top_n_requested: 5,
            company_mentioned: None,
            budget: None,
        }
    }
}

//
// ================= Market Data =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub sentiment: Option<NewsSentiment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// One company row in a top-movers result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySnapshot {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub percent_change: f64,
    pub volume: Option<u64>,
    pub market_cap: Option<f64>,
    pub bullish_percent: Option<f64>,
    pub bearish_percent: Option<f64>,
    pub summary: Option<String>,
}

//
// ================= AI Insight =================
//

/// Maximum number of symbols retained in `portfolio_fit`.
const PORTFOLIO_FIT_LIMIT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GptInsight {
    pub sentiment_score: f64,
    pub summary: String,
    pub bullish_indicators: Vec<String>,
    pub bearish_indicators: Vec<String>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_fit: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_summary: Option<String>,
}

impl GptInsight {
    /// Build an insight with all bounded fields clamped into range.
    pub fn new(
        sentiment_score: f64,
        summary: String,
        bullish_indicators: Vec<String>,
        bearish_indicators: Vec<String>,
        confidence: f64,
    ) -> Self {
        Self {
            sentiment_score: sentiment_score.clamp(-1.0, 1.0),
            summary,
            bullish_indicators,
            bearish_indicators,
            confidence: confidence.clamp(0.0, 1.0),
            portfolio_fit: None,
            forecast_summary: None,
        }
    }

    /// Documented neutral fallback: substituted whenever an analysis step's
    /// collaborator call fails. Never leaves `gpt_insight` unset.
    pub fn neutral(summary: &str) -> Self {
        Self::new(0.0, summary.to_string(), Vec::new(), Vec::new(), 0.0)
    }

    pub fn with_portfolio_fit(mut self, mut symbols: Vec<String>) -> Self {
        symbols.truncate(PORTFOLIO_FIT_LIMIT);
        self.portfolio_fit = Some(symbols);
        self
    }

    pub fn with_forecast_summary(mut self, forecast: String) -> Self {
        self.forecast_summary = Some(forecast);
        self
    }
}

//
// ================= Trade =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeSignal {
    pub action: TradeAction,
    pub reasoning: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_position_size: Option<f64>,
}

impl TradeSignal {
    pub fn new(
        action: TradeAction,
        reasoning: String,
        confidence: f64,
        suggested_position_size: Option<f64>,
    ) -> Self {
        Self {
            action,
            reasoning,
            confidence: confidence.clamp(0.0, 1.0),
            suggested_position_size: suggested_position_size.map(|s| s.clamp(0.0, 1.0)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutedTrade {
    pub timestamp: DateTime<Utc>,
    pub action: TradeAction,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub status: TradeStatus,
}

//
// ================= Run-State =================
//

/// The single mutable record describing one user request's progress
/// through the pipeline. Created once per request, discarded after the
/// terminal step produces `user_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    // Assigned once at creation, never mutated.
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,

    /// Caller-supplied ticker; query parsing may overwrite it.
    pub symbol: String,
    pub user_query: String,

    pub intent: Option<Intent>,
    pub parsed_query: Option<ParsedQuery>,

    pub raw_news: Option<Vec<NewsArticle>>,
    pub price_data: Option<Vec<PricePoint>>,
    pub top_movers: Option<Vec<CompanySnapshot>>,

    pub gpt_insight: Option<GptInsight>,
    pub trade_signal: Option<TradeSignal>,
    pub executed_trade: Option<ExecutedTrade>,

    pub user_response: Option<String>,
}

impl RunState {
    /// Seed a fresh run. Only identity, symbol and query are populated;
    /// every other field is written by the step that owns it.
    pub fn new(symbol: impl Into<String>, user_query: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            symbol: symbol.into(),
            user_query: user_query.into(),
            intent: None,
            parsed_query: None,
            raw_news: None,
            price_data: None,
            top_movers: None,
            gpt_insight: None,
            trade_signal: None,
            executed_trade: None,
            user_response: None,
        }
    }

    /// Latest close from price history, if any is present.
    pub fn latest_close(&self) -> Option<f64> {
        self.price_data
            .as_ref()
            .and_then(|points| points.last())
            .map(|p| p.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_label_roundtrip() {
        assert_eq!(Intent::from_label("report_request"), Intent::ReportRequest);
        assert_eq!(Intent::from_label("macro_trend"), Intent::MacroTrend);
        assert_eq!(Intent::from_label("something else"), Intent::Unknown);
        assert_eq!(Intent::ReportRequest.as_str(), "report_request");
    }

    #[test]
    fn test_insight_clamps_ranges() {
        let insight = GptInsight::new(3.5, "hot".into(), vec![], vec![], 1.7);
        assert_eq!(insight.sentiment_score, 1.0);
        assert_eq!(insight.confidence, 1.0);

        let insight = GptInsight::new(-9.0, "cold".into(), vec![], vec![], -0.2);
        assert_eq!(insight.sentiment_score, -1.0);
        assert_eq!(insight.confidence, 0.0);
    }

    #[test]
    fn test_neutral_insight_is_in_range() {
        let fallback = GptInsight::neutral("analysis unavailable");
        assert_eq!(fallback.sentiment_score, 0.0);
        assert_eq!(fallback.confidence, 0.0);
        assert!(fallback.bullish_indicators.is_empty());
        assert!(fallback.bearish_indicators.is_empty());
    }

    #[test]
    fn test_portfolio_fit_truncated() {
        let insight = GptInsight::neutral("n/a").with_portfolio_fit(vec![
            "AAPL".into(),
            "MSFT".into(),
            "NVDA".into(),
            "TSLA".into(),
        ]);
        assert_eq!(insight.portfolio_fit.unwrap().len(), 3);
    }

    #[test]
    fn test_signal_clamps_position_size() {
        let signal = TradeSignal::new(TradeAction::Buy, "r".into(), 2.0, Some(1.5));
        assert_eq!(signal.confidence, 1.0);
        assert_eq!(signal.suggested_position_size, Some(1.0));
    }

    #[test]
    fn test_fresh_state_only_identity_populated() {
        let state = RunState::new("AAPL", "how is apple doing?");
        assert_eq!(state.symbol, "AAPL");
        assert!(state.intent.is_none());
        assert!(state.parsed_query.is_none());
        assert!(state.gpt_insight.is_none());
        assert!(state.executed_trade.is_none());
        assert!(state.user_response.is_none());
    }

    #[test]
    fn test_latest_close() {
        let mut state = RunState::new("AAPL", "q");
        assert!(state.latest_close().is_none());

        state.price_data = Some(vec![
            PricePoint {
                timestamp: Utc::now(),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 10,
            },
            PricePoint {
                timestamp: Utc::now(),
                open: 1.5,
                high: 2.5,
                low: 1.0,
                close: 2.25,
                volume: 12,
            },
        ]);
        assert_eq!(state.latest_close(), Some(2.25));
    }
}
