//! Top-movers fetch step.
//!
//! Quotes a fixed ticker universe and reduces it per the parsed query
//! type: gainers (percent change descending), losers (ascending), or
//! budget picks (price-capped, cheapest market cap first). Individual
//! quote failures skip the ticker; an entirely empty result is logged
//! and the run continues with an empty table.

use crate::graph::StepId;
use crate::models::{CompanySnapshot, QueryType, RunState};
use crate::ports::MarketDataPort;
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Liquid large-cap universe scanned for gainers and losers.
const LIQUID_UNIVERSE: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "TSLA", "NFLX", "AMD", "INTC",
];

/// Low-price universe scanned for budget picks.
const BUDGET_UNIVERSE: &[&str] = &[
    "SOFI", "PLTR", "F", "NOK", "SIRI", "T", "SNAP", "PLUG", "NIO", "RIVN",
];

/// Budget cap applied when the query carried no explicit amount.
const DEFAULT_BUDGET: f64 = 15.0;

pub struct TopMoversStep {
    market: Arc<dyn MarketDataPort>,
}

impl TopMoversStep {
    pub fn new(market: Arc<dyn MarketDataPort>) -> Self {
        Self { market }
    }

    async fn quote_universe(&self, universe: &[&str]) -> Vec<CompanySnapshot> {
        let mut snapshots = Vec::with_capacity(universe.len());
        for symbol in universe {
            match self.market.quote(symbol).await {
                Ok(quote) => {
                    let (Some(price), Some(percent_change)) = (quote.price, quote.change_percent)
                    else {
                        warn!(symbol, "quote missing price or change, skipping");
                        continue;
                    };
                    snapshots.push(CompanySnapshot {
                        symbol: symbol.to_string(),
                        name: symbol.to_string(),
                        price,
                        percent_change,
                        volume: quote.volume,
                        market_cap: None,
                        bullish_percent: None,
                        bearish_percent: None,
                        summary: None,
                    });
                }
                Err(e) => warn!(symbol, error = %e, "quote failed, skipping"),
            }
        }
        snapshots
    }

    /// Enrich budget candidates with name and market cap so they can be
    /// ranked cheapest-cap first. Overview failures leave the fields unset.
    async fn enrich_overview(&self, snapshot: &mut CompanySnapshot) {
        match self.market.overview(&snapshot.symbol).await {
            Ok(overview) => {
                if let Some(name) = overview.name {
                    snapshot.name = name;
                }
                snapshot.market_cap = overview.market_cap;
            }
            Err(e) => warn!(symbol = %snapshot.symbol, error = %e, "overview failed"),
        }
    }

    async fn fetch(&self, query_type: QueryType, top_n: usize, budget: Option<f64>) -> Vec<CompanySnapshot> {
        match query_type {
            QueryType::TopLosers => {
                let mut snapshots = self.quote_universe(LIQUID_UNIVERSE).await;
                snapshots.sort_by(|a, b| {
                    a.percent_change
                        .partial_cmp(&b.percent_change)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                snapshots.truncate(top_n);
                snapshots
            }
            QueryType::BudgetPicks => {
                let cap = budget.unwrap_or(DEFAULT_BUDGET);
                let mut snapshots = self.quote_universe(BUDGET_UNIVERSE).await;
                snapshots.retain(|s| s.price <= cap);
                for snapshot in &mut snapshots {
                    self.enrich_overview(snapshot).await;
                }
                snapshots.sort_by(|a, b| {
                    let a_cap = a.market_cap.unwrap_or(f64::MAX);
                    let b_cap = b.market_cap.unwrap_or(f64::MAX);
                    a_cap.partial_cmp(&b_cap).unwrap_or(std::cmp::Ordering::Equal)
                });
                snapshots.truncate(top_n);
                snapshots
            }
            // Every other query type reads as a gainers request here.
            _ => {
                let mut snapshots = self.quote_universe(LIQUID_UNIVERSE).await;
                snapshots.sort_by(|a, b| {
                    b.percent_change
                        .partial_cmp(&a.percent_change)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                snapshots.truncate(top_n);
                snapshots
            }
        }
    }
}

#[async_trait]
impl Step for TopMoversStep {
    fn id(&self) -> StepId {
        StepId::FetchTopMovers
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let (query_type, top_n, budget) = state
            .parsed_query
            .as_ref()
            .map(|q| (q.query_type, q.top_n_requested as usize, q.budget))
            .unwrap_or((QueryType::TopGainers, 5, None));

        let movers = self.fetch(query_type, top_n, budget).await;

        if movers.is_empty() {
            error!(run_id = %state.run_id, ?query_type, "no movers collected");
        } else {
            info!(
                run_id = %state.run_id,
                ?query_type,
                count = movers.len(),
                "collected top movers"
            );
        }

        state.top_movers = Some(movers);
        Ok(state)
    }
}
