//! Macro-trend direct-answer step.
//!
//! Combines the headline FRED series with a sector-ETF performance sweep
//! and a language-model summary. Each series or sector that fails renders
//! "Data unavailable" on its line; the step itself never propagates a
//! collaborator failure.

use crate::graph::StepId;
use crate::models::RunState;
use crate::ports::{LanguageModelPort, MacroSeriesPort, MarketDataPort};
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

const UNAVAILABLE: &str = "Data unavailable";

/// Headline macro series: federal funds rate, CPI, unemployment.
const MACRO_SERIES: &[(&str, &str)] = &[
    ("FEDFUNDS", "Federal Funds Rate"),
    ("CPIAUCSL", "Consumer Price Index"),
    ("UNRATE", "Unemployment Rate"),
];

/// SPDR sector ETFs swept for the sector performance table.
const SECTOR_ETFS: &[(&str, &str)] = &[
    ("XLK", "Technology"),
    ("XLF", "Financials"),
    ("XLV", "Health Care"),
    ("XLE", "Energy"),
    ("XLY", "Consumer Discretionary"),
    ("XLP", "Consumer Staples"),
    ("XLU", "Utilities"),
    ("XLI", "Industrials"),
    ("XLC", "Communication Services"),
    ("XLRE", "Real Estate"),
];

pub struct MacroTrendStep {
    macro_series: Arc<dyn MacroSeriesPort>,
    market: Arc<dyn MarketDataPort>,
    llm: Arc<dyn LanguageModelPort>,
}

impl MacroTrendStep {
    pub fn new(
        macro_series: Arc<dyn MacroSeriesPort>,
        market: Arc<dyn MarketDataPort>,
        llm: Arc<dyn LanguageModelPort>,
    ) -> Self {
        Self {
            macro_series,
            market,
            llm,
        }
    }
}

#[async_trait]
impl Step for MacroTrendStep {
    fn id(&self) -> StepId {
        StepId::MacroTrends
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let mut report = String::from("Macro environment:\n");

        for &(series_id, label) in MACRO_SERIES {
            match self.macro_series.latest_observation(series_id).await {
                Ok(obs) => {
                    report.push_str(&format!("- {}: {} (as of {})\n", label, obs.value, obs.date))
                }
                Err(e) => {
                    warn!(series = series_id, error = %e, "macro series lookup failed");
                    report.push_str(&format!("- {}: {}\n", label, UNAVAILABLE));
                }
            }
        }

        report.push_str("\nSector performance (daily change):\n");
        for &(etf, sector) in SECTOR_ETFS {
            match self.market.quote(etf).await {
                Ok(quote) => match quote.change_percent {
                    Some(change) => {
                        report.push_str(&format!("- {} ({}): {:+.2}%\n", sector, etf, change))
                    }
                    None => report.push_str(&format!("- {} ({}): {}\n", sector, etf, UNAVAILABLE)),
                },
                Err(e) => {
                    warn!(symbol = etf, error = %e, "sector quote failed");
                    report.push_str(&format!("- {} ({}): {}\n", sector, etf, UNAVAILABLE));
                }
            }
        }

        let prompt = format!(
            "You are a macro strategist. In three sentences, summarize what this environment means for equity investors.\n\n{}",
            report
        );
        match self.llm.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                report.push_str("\nOutlook: ");
                report.push_str(text.trim());
            }
            Ok(_) => {}
            Err(e) => warn!(run_id = %state.run_id, error = %e, "macro summary failed"),
        }

        info!(run_id = %state.run_id, "macro trend report rendered");
        state.user_response = Some(report);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::{MockLanguageModel, MockMacroSeries, MockMarketData};
    use crate::ports::MacroObservation;

    #[tokio::test]
    async fn test_report_includes_series_and_sectors() {
        let step = MacroTrendStep::new(
            Arc::new(MockMacroSeries),
            Arc::new(MockMarketData),
            Arc::new(MockLanguageModel::new("Stay diversified across sectors.")),
        );
        let state = step
            .run(RunState::new("", "how is the economy affecting stocks?"))
            .await
            .unwrap();
        let report = state.user_response.unwrap();
        assert!(report.contains("Federal Funds Rate: 5.33"));
        assert!(report.contains("Unemployment Rate: 3.9"));
        assert!(report.contains("Technology (XLK):"));
        assert!(report.contains("Real Estate (XLRE):"));
        assert!(report.contains("Outlook: Stay diversified"));
    }

    struct FailingSeries;

    #[async_trait]
    impl MacroSeriesPort for FailingSeries {
        async fn latest_observation(&self, _: &str) -> Result<MacroObservation> {
            Err(crate::error::PipelineError::Collaborator("down".into()))
        }
    }

    #[tokio::test]
    async fn test_failed_series_render_unavailable() {
        let step = MacroTrendStep::new(
            Arc::new(FailingSeries),
            Arc::new(MockMarketData),
            Arc::new(MockLanguageModel::new("")),
        );
        let state = step.run(RunState::new("", "macro?")).await.unwrap();
        let report = state.user_response.unwrap();
        assert!(report.contains("Federal Funds Rate: Data unavailable"));
        assert!(report.contains("Consumer Price Index: Data unavailable"));
        // Empty model text drops the outlook section without failing.
        assert!(!report.contains("Outlook:"));
    }
}
