//! Portfolio-guidance direct-answer step.
//!
//! Reads the ETF tickers the user mentioned (or a default two-fund mix),
//! pulls each profile, and reports equal-weight sector exposure, average
//! expected return, concentration and high-risk warnings. A language
//! model recommendation is appended when available; its failure only
//! drops that section.

use crate::graph::StepId;
use crate::models::RunState;
use crate::ports::{EtfProfile, EtfProfilePort, LanguageModelPort};
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

const APOLOGY: &str =
    "Sorry, I couldn't analyze that portfolio right now. Please try again later.";

/// Fallback two-fund portfolio when the query names no tickers.
const DEFAULT_PORTFOLIO: &[&str] = &["SPY", "BND"];

/// A single sector above this share of the portfolio triggers a
/// concentration warning.
const CONCENTRATION_LIMIT: f64 = 0.5;

lazy_static! {
    static ref ETF_TICKER_RE: Regex = Regex::new(r"\b[A-Z]{2,5}\b").unwrap();
}

/// All-caps ticker candidates from the query, in order, deduplicated.
fn extract_tickers(query: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for m in ETF_TICKER_RE.find_iter(query) {
        let ticker = m.as_str().to_string();
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

pub struct PortfolioStep {
    etf: Arc<dyn EtfProfilePort>,
    llm: Arc<dyn LanguageModelPort>,
}

impl PortfolioStep {
    pub fn new(etf: Arc<dyn EtfProfilePort>, llm: Arc<dyn LanguageModelPort>) -> Self {
        Self { etf, llm }
    }

    fn render(profiles: &[EtfProfile]) -> String {
        let mut out = String::from("Portfolio review:\n");

        for p in profiles {
            out.push_str(&format!(
                "- {} ({}): sector {}, expected return {:.1}%, risk {}\n",
                p.symbol,
                p.name,
                p.top_sector,
                p.expected_return * 100.0,
                p.risk_score
            ));
        }

        // Equal-weight sector exposure across the held funds.
        let mut sector_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for p in profiles {
            *sector_counts.entry(p.top_sector.as_str()).or_insert(0) += 1;
        }
        out.push_str("\nSector weights:\n");
        for (sector, count) in &sector_counts {
            out.push_str(&format!(
                "- {}: {:.0}%\n",
                sector,
                *count as f64 / profiles.len() as f64 * 100.0
            ));
        }

        let avg_return =
            profiles.iter().map(|p| p.expected_return).sum::<f64>() / profiles.len() as f64;
        out.push_str(&format!("\nAverage expected return: {:.1}%\n", avg_return * 100.0));

        for (sector, count) in &sector_counts {
            if *count as f64 / profiles.len() as f64 > CONCENTRATION_LIMIT {
                out.push_str(&format!(
                    "Warning: over half the portfolio is concentrated in {}.\n",
                    sector
                ));
            }
        }
        for p in profiles {
            if p.risk_score.eq_ignore_ascii_case("high") {
                out.push_str(&format!("Warning: {} carries a high risk score.\n", p.symbol));
            }
        }

        out
    }
}

#[async_trait]
impl Step for PortfolioStep {
    fn id(&self) -> StepId {
        StepId::PortfolioGuidance
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let tickers = {
            let mentioned = extract_tickers(&state.user_query);
            if mentioned.is_empty() {
                DEFAULT_PORTFOLIO.iter().map(|s| s.to_string()).collect()
            } else {
                mentioned
            }
        };

        let mut profiles = Vec::with_capacity(tickers.len());
        for ticker in &tickers {
            match self.etf.etf_profile(ticker).await {
                Ok(profile) => profiles.push(profile),
                Err(e) => warn!(symbol = %ticker, error = %e, "etf profile lookup failed"),
            }
        }

        if profiles.is_empty() {
            error!(run_id = %state.run_id, "no etf profiles resolved");
            state.user_response = Some(APOLOGY.to_string());
            return Ok(state);
        }

        let mut response = Self::render(&profiles);

        let prompt = format!(
            "You are a portfolio advisor. Given this review, suggest one concrete rebalancing action in two sentences.\n\n{}",
            response
        );
        match self.llm.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                response.push_str("\nRecommendation: ");
                response.push_str(text.trim());
            }
            Ok(_) => {}
            Err(e) => warn!(run_id = %state.run_id, error = %e, "portfolio recommendation failed"),
        }

        info!(run_id = %state.run_id, funds = profiles.len(), "portfolio guidance rendered");
        state.user_response = Some(response);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::{MockEtfProfiles, MockLanguageModel};

    fn step() -> PortfolioStep {
        PortfolioStep::new(
            Arc::new(MockEtfProfiles),
            Arc::new(MockLanguageModel::new("Shift 10% from equities into bonds.")),
        )
    }

    #[test]
    fn test_ticker_extraction_dedupes_and_keeps_order() {
        assert_eq!(
            extract_tickers("rebalance my QQQ and BND, mostly QQQ"),
            vec!["QQQ".to_string(), "BND".to_string()]
        );
        assert!(extract_tickers("rebalance my portfolio please").is_empty());
    }

    #[tokio::test]
    async fn test_default_portfolio_used_when_no_tickers_mentioned() {
        let state = step()
            .run(RunState::new("", "how should i rebalance my portfolio?"))
            .await
            .unwrap();
        let response = state.user_response.unwrap();
        assert!(response.contains("SPY"));
        assert!(response.contains("BND"));
        assert!(response.contains("Recommendation:"));
    }

    #[tokio::test]
    async fn test_concentration_warning_for_single_sector() {
        // Two technology funds: 100% in one sector.
        let state = step()
            .run(RunState::new("", "review my QQQ and VGT holdings"))
            .await
            .unwrap();
        let response = state.user_response.unwrap();
        assert!(response.contains("concentrated in technology"));
    }

    #[tokio::test]
    async fn test_high_risk_fund_is_flagged() {
        let state = step()
            .run(RunState::new("", "should i keep XLE and BND?"))
            .await
            .unwrap();
        let response = state.user_response.unwrap();
        assert!(response.contains("XLE carries a high risk score"));
        // Balanced two-sector mix: no concentration warning.
        assert!(!response.contains("concentrated"));
    }

    #[tokio::test]
    async fn test_failed_recommendation_keeps_review() {
        struct FailingLlm;

        #[async_trait]
        impl LanguageModelPort for FailingLlm {
            async fn complete(&self, _: &str) -> Result<String> {
                Err(crate::error::PipelineError::Collaborator("down".into()))
            }
        }

        let step = PortfolioStep::new(Arc::new(MockEtfProfiles), Arc::new(FailingLlm));
        let state = step
            .run(RunState::new("", "review SPY and BND"))
            .await
            .unwrap();
        let response = state.user_response.unwrap();
        assert!(response.contains("Portfolio review:"));
        assert!(!response.contains("Recommendation:"));
    }
}
