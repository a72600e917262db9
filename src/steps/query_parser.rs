//! Query-parsing sub-pipeline: raw text to structured `ParsedQuery`.
//!
//! Keyword tables are matched in declaration order (first match wins);
//! an all-caps token is taken as the ticker unless a common-company name
//! match overrides it. Parsing is pure, so re-running it on the same
//! text yields an identical result.

use crate::error::PipelineError;
use crate::graph::StepId;
use crate::models::{ParsedQuery, QueryType, RunState, TimeFrame};
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

/// Static keyword tables; declaration order is the tie-break order.
const QUERY_TYPE_KEYWORDS: &[(QueryType, &[&str])] = &[
    (
        QueryType::TopGainers,
        &[
            "top gainers",
            "most gained",
            "high growth",
            "best performing",
            "top performing",
            "strong stocks",
            "positive return",
        ],
    ),
    (
        QueryType::TopLosers,
        &[
            "top losers",
            "biggest losses",
            "most down",
            "negative trend",
            "worst stocks",
            "loss making",
        ],
    ),
    (
        QueryType::BudgetPicks,
        &[
            "small company",
            "cheap",
            "under $",
            "budget",
            "low price",
            "affordable",
            "low cap",
        ],
    ),
    (
        QueryType::NewsDriven,
        &[
            "today's news",
            "based on news",
            "market news",
            "news impact",
            "latest announcement",
        ],
    ),
    (
        QueryType::LongTermPotential,
        &[
            "long term",
            "future growth",
            "safe long term",
            "next year",
            "5 year",
            "retirement stock",
        ],
    ),
];

const TIMEFRAME_KEYWORDS: &[(TimeFrame, &[&str])] = &[
    (TimeFrame::Today, &["today", "now", "current"]),
    (
        TimeFrame::ThisWeek,
        &["this week", "past 7 days", "week performance"],
    ),
    (
        TimeFrame::ThisMonth,
        &["this month", "past 30 days", "monthly"],
    ),
    (
        TimeFrame::LongTerm,
        &["long term", "next year", "future", "multi-year"],
    ),
];

/// Common brands → tickers (overrides a raw all-caps match).
const COMMON_COMPANIES: &[(&str, &str)] = &[
    ("nvidia", "NVDA"),
    ("apple", "AAPL"),
    ("tesla", "TSLA"),
    ("microsoft", "MSFT"),
    ("amazon", "AMZN"),
    ("google", "GOOGL"),
    ("meta", "META"),
    ("netflix", "NFLX"),
];

lazy_static! {
    static ref TOP_N_RE: Regex = Regex::new(r"top\s+(\d+)").unwrap();
    static ref BUDGET_RE: Regex = Regex::new(r"[\$₹€](\d+(?:\.\d+)?)").unwrap();
    static ref TICKER_RE: Regex = Regex::new(r"\b[A-Z]{2,5}\b").unwrap();
}

/// Pure parsing function, exposed for direct testing.
pub fn parse_user_query(text: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    let lowered = text.to_lowercase();

    if let Some(caps) = TOP_N_RE.captures(&lowered) {
        if let Ok(n) = caps[1].parse::<u32>() {
            parsed.top_n_requested = n.max(1);
        }
    }

    if let Some(caps) = BUDGET_RE.captures(text) {
        if let Ok(budget) = caps[1].parse::<f64>() {
            parsed.budget = Some(budget.max(0.0));
        }
    }

    for (label, phrases) in QUERY_TYPE_KEYWORDS {
        if phrases.iter().any(|p| lowered.contains(p)) {
            parsed.query_type = *label;
            break;
        }
    }

    for (label, phrases) in TIMEFRAME_KEYWORDS {
        if phrases.iter().any(|p| lowered.contains(p)) {
            parsed.time_frame = *label;
            break;
        }
    }

    // All-caps ticker candidate, first match wins.
    if let Some(m) = TICKER_RE.find(text) {
        parsed.company_mentioned = Some(m.as_str().to_string());
    }

    // A known company name overrides the raw all-caps match.
    for (name, ticker) in COMMON_COMPANIES {
        if lowered.contains(name) {
            parsed.company_mentioned = Some((*ticker).to_string());
            break;
        }
    }

    parsed
}

pub struct QueryParserStep;

#[async_trait]
impl Step for QueryParserStep {
    fn id(&self) -> StepId {
        StepId::ParseQuery
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        if state.user_query.trim().is_empty() {
            return Err(PipelineError::MissingInput {
                step: "parse_query",
                field: "user_query",
            });
        }

        let parsed = parse_user_query(&state.user_query);

        // An identified ticker overwrites the caller-supplied symbol.
        if let Some(ticker) = &parsed.company_mentioned {
            state.symbol = ticker.to_uppercase();
            info!(
                run_id = %state.run_id,
                symbol = %state.symbol,
                "symbol set from parsed company"
            );
        }

        info!(
            run_id = %state.run_id,
            query_type = ?parsed.query_type,
            time_frame = ?parsed.time_frame,
            top_n = parsed.top_n_requested,
            "parsed user query"
        );
        state.parsed_query = Some(parsed);
        Ok(state)
    }
}
