//! Pipeline graph engine
//!
//! Holds the fixed set of steps and the edge table (including the router
//! as a conditional edge), drives execution from the entry step to a
//! terminal step, and enforces the structural invariants: exactly one
//! entry point, no dangling edges, every router target registered, and
//! no step invoked twice within one run.

use crate::error::PipelineError;
use crate::models::RunState;
use crate::ports::Collaborators;
use crate::router;
use crate::steps::Step;
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Closed enumeration of step identifiers. Replaces string-keyed dynamic
/// routing so transitions are exhaustiveness-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    UserInput,
    ParseQuery,
    ClassifyIntent,
    FetchNews,
    FetchPrices,
    AnalyzeMarket,
    GenerateSignal,
    ExecuteTrade,
    FetchTopMovers,
    AnalyzeMovers,
    StockInsight,
    TechnicalAnalysis,
    RiskAssessment,
    PortfolioGuidance,
    MacroTrends,
    Report,
}

impl StepId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::UserInput => "user_input",
            StepId::ParseQuery => "parse_query",
            StepId::ClassifyIntent => "classify_intent",
            StepId::FetchNews => "fetch_news",
            StepId::FetchPrices => "fetch_prices",
            StepId::AnalyzeMarket => "analyze_market",
            StepId::GenerateSignal => "generate_signal",
            StepId::ExecuteTrade => "execute_trade",
            StepId::FetchTopMovers => "fetch_top_movers",
            StepId::AnalyzeMovers => "analyze_movers",
            StepId::StockInsight => "stock_insight",
            StepId::TechnicalAnalysis => "technical_analysis",
            StepId::RiskAssessment => "risk_assessment",
            StepId::PortfolioGuidance => "portfolio_guidance",
            StepId::MacroTrends => "macro_trends",
            StepId::Report => "report",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outgoing transition of a step: a fixed edge, the conditional router
/// edge, or the end of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(StepId),
    Route,
    End,
}

/// Builder for the pipeline graph. `build` runs structural validation,
/// so a constructed `Pipeline` is always well-formed.
pub struct PipelineBuilder {
    entry: Option<StepId>,
    steps: HashMap<StepId, Arc<dyn Step>>,
    edges: HashMap<StepId, Transition>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            entry: None,
            steps: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    pub fn entry(mut self, id: StepId) -> Self {
        self.entry = Some(id);
        self
    }

    pub fn step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.insert(step.id(), step);
        self
    }

    pub fn edge(mut self, from: StepId, transition: Transition) -> Self {
        self.edges.insert(from, transition);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let entry = self
            .entry
            .ok_or_else(|| PipelineError::Graph("pipeline has no entry point".to_string()))?;

        let pipeline = Pipeline {
            entry,
            steps: self.steps,
            edges: self.edges,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The orchestrator: owns the steps and the edge table, and drives one
/// run-state from entry to a terminal step. Execution is strictly
/// sequential; each step is awaited before the next is selected.
pub struct Pipeline {
    entry: StepId,
    steps: HashMap<StepId, Arc<dyn Step>>,
    edges: HashMap<StepId, Transition>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Structural invariants checked once at build time.
    fn validate(&self) -> Result<()> {
        if !self.steps.contains_key(&self.entry) {
            return Err(PipelineError::Graph(format!(
                "entry step '{}' is not registered",
                self.entry
            )));
        }

        for (from, transition) in &self.edges {
            if !self.steps.contains_key(from) {
                return Err(PipelineError::Graph(format!(
                    "edge declared for unregistered step '{}'",
                    from
                )));
            }
            if let Transition::To(target) = transition {
                if !self.steps.contains_key(target) {
                    return Err(PipelineError::Graph(format!(
                        "dangling edge '{}' -> '{}'",
                        from, target
                    )));
                }
            }
        }

        for id in self.steps.keys() {
            if !self.edges.contains_key(id) {
                return Err(PipelineError::Graph(format!(
                    "step '{}' has no outgoing transition",
                    id
                )));
            }
        }

        // The router is total over its declared targets; every one of
        // them must be a node in this graph.
        if self.edges.values().any(|t| *t == Transition::Route) {
            for target in router::ROUTER_TARGETS {
                if !self.steps.contains_key(target) {
                    return Err(PipelineError::Graph(format!(
                        "router target '{}' is not registered",
                        target
                    )));
                }
            }
        }

        Ok(())
    }

    /// Drive one request to completion. The run-state is owned by this
    /// call for its full lifetime and returned with `user_response` set
    /// by the terminal step.
    pub async fn run(&self, mut state: RunState) -> Result<RunState> {
        let run_id = state.run_id;
        let mut visited: HashSet<StepId> = HashSet::new();
        let mut current = self.entry;

        info!(run_id = %run_id, entry = %current, "pipeline run started");

        loop {
            if !visited.insert(current) {
                return Err(PipelineError::Graph(format!(
                    "step '{}' invoked twice in one run",
                    current
                )));
            }

            let step = self.steps.get(&current).ok_or_else(|| {
                PipelineError::Graph(format!("no step registered for '{}'", current))
            })?;

            debug!(run_id = %run_id, step = %current, "running step");
            state = step.run(state).await?;

            let transition = self.edges.get(&current).ok_or_else(|| {
                PipelineError::Graph(format!("step '{}' has no outgoing transition", current))
            })?;

            match transition {
                Transition::To(next) => current = *next,
                Transition::Route => {
                    let next = router::route(state.intent, state.parsed_query.as_ref());
                    debug!(
                        run_id = %run_id,
                        intent = %state.intent.map(|i| i.as_str()).unwrap_or("unset"),
                        next = %next,
                        "router selected branch"
                    );
                    current = next;
                }
                Transition::End => {
                    info!(run_id = %run_id, terminal = %current, "pipeline run finished");
                    return Ok(state);
                }
            }
        }
    }

    /// The full assistant graph: entry flow, router, trading branch,
    /// top-movers branch, and the direct-answer terminals.
    pub fn assistant(collab: Collaborators) -> Result<Self> {
        use crate::steps::{
            analyst::{MarketAnalystStep, MoversAnalystStep},
            collect::{FetchNewsStep, FetchPricesStep},
            executor::TradeExecutorStep,
            intent::IntentClassifierStep,
            macro_trend::MacroTrendStep,
            portfolio::PortfolioStep,
            query_parser::QueryParserStep,
            report::ReportStep,
            risk::RiskAssessmentStep,
            stock_insight::StockInsightStep,
            strategy::StrategyStep,
            technical::TechnicalAnalysisStep,
            top_movers::TopMoversStep,
            user_query::UserQueryStep,
        };

        Pipeline::builder()
            .entry(StepId::UserInput)
            // Entry flow
            .step(Arc::new(UserQueryStep))
            .step(Arc::new(QueryParserStep))
            .step(Arc::new(IntentClassifierStep::new(collab.llm.clone())))
            // Trading branch
            .step(Arc::new(FetchNewsStep::new(collab.news.clone())))
            .step(Arc::new(FetchPricesStep::new(collab.prices.clone())))
            .step(Arc::new(MarketAnalystStep::new(collab.llm.clone())))
            .step(Arc::new(StrategyStep))
            .step(Arc::new(TradeExecutorStep))
            // Top-movers branch
            .step(Arc::new(TopMoversStep::new(collab.market.clone())))
            .step(Arc::new(MoversAnalystStep::new(collab.llm.clone())))
            // Direct-answer terminals
            .step(Arc::new(StockInsightStep::new(collab.market.clone())))
            .step(Arc::new(TechnicalAnalysisStep::new(
                collab.indicators.clone(),
            )))
            .step(Arc::new(RiskAssessmentStep::new(
                collab.prices.clone(),
                collab.market.clone(),
            )))
            .step(Arc::new(PortfolioStep::new(
                collab.etf.clone(),
                collab.llm.clone(),
            )))
            .step(Arc::new(MacroTrendStep::new(
                collab.macro_series.clone(),
                collab.market.clone(),
                collab.llm.clone(),
            )))
            // Shared report terminal
            .step(Arc::new(ReportStep::new(collab.llm)))
            // Edge table
            .edge(StepId::UserInput, Transition::To(StepId::ParseQuery))
            .edge(StepId::ParseQuery, Transition::To(StepId::ClassifyIntent))
            .edge(StepId::ClassifyIntent, Transition::Route)
            .edge(StepId::FetchNews, Transition::To(StepId::FetchPrices))
            .edge(StepId::FetchPrices, Transition::To(StepId::AnalyzeMarket))
            .edge(StepId::AnalyzeMarket, Transition::To(StepId::GenerateSignal))
            .edge(StepId::GenerateSignal, Transition::To(StepId::ExecuteTrade))
            .edge(StepId::ExecuteTrade, Transition::To(StepId::Report))
            .edge(StepId::FetchTopMovers, Transition::To(StepId::AnalyzeMovers))
            .edge(StepId::AnalyzeMovers, Transition::To(StepId::Report))
            .edge(StepId::StockInsight, Transition::End)
            .edge(StepId::TechnicalAnalysis, Transition::End)
            .edge(StepId::RiskAssessment, Transition::End)
            .edge(StepId::PortfolioGuidance, Transition::End)
            .edge(StepId::MacroTrends, Transition::End)
            .edge(StepId::Report, Transition::End)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::{mock_collaborators, MockLanguageModel};
    use async_trait::async_trait;

    struct NoopStep(StepId);

    #[async_trait]
    impl Step for NoopStep {
        fn id(&self) -> StepId {
            self.0
        }

        async fn run(&self, state: RunState) -> Result<RunState> {
            Ok(state)
        }
    }

    #[test]
    fn test_build_rejects_missing_entry() {
        let result = Pipeline::builder()
            .step(Arc::new(NoopStep(StepId::UserInput)))
            .edge(StepId::UserInput, Transition::End)
            .build();
        assert!(matches!(result, Err(PipelineError::Graph(_))));
    }

    #[test]
    fn test_build_rejects_dangling_edge() {
        let result = Pipeline::builder()
            .entry(StepId::UserInput)
            .step(Arc::new(NoopStep(StepId::UserInput)))
            .edge(StepId::UserInput, Transition::To(StepId::Report))
            .build();
        assert!(matches!(result, Err(PipelineError::Graph(_))));
    }

    #[test]
    fn test_build_rejects_step_without_transition() {
        let result = Pipeline::builder()
            .entry(StepId::UserInput)
            .step(Arc::new(NoopStep(StepId::UserInput)))
            .step(Arc::new(NoopStep(StepId::Report)))
            .edge(StepId::UserInput, Transition::To(StepId::Report))
            .build();
        assert!(matches!(result, Err(PipelineError::Graph(_))));
    }

    #[test]
    fn test_build_rejects_router_edge_without_targets() {
        // A graph with a router edge must register every router target.
        let result = Pipeline::builder()
            .entry(StepId::ClassifyIntent)
            .step(Arc::new(NoopStep(StepId::ClassifyIntent)))
            .edge(StepId::ClassifyIntent, Transition::Route)
            .build();
        assert!(matches!(result, Err(PipelineError::Graph(_))));
    }

    #[test]
    fn test_assistant_graph_is_structurally_valid() {
        let collab = mock_collaborators("ok");
        assert!(Pipeline::assistant(collab).is_ok());
    }

    #[tokio::test]
    async fn test_revisiting_a_step_is_rejected() {
        // Two steps forming a cycle; the visited guard must fire.
        let pipeline = Pipeline::builder()
            .entry(StepId::UserInput)
            .step(Arc::new(NoopStep(StepId::UserInput)))
            .step(Arc::new(NoopStep(StepId::Report)))
            .edge(StepId::UserInput, Transition::To(StepId::Report))
            .edge(StepId::Report, Transition::To(StepId::UserInput))
            .build()
            .unwrap();

        let result = pipeline.run(RunState::new("AAPL", "q")).await;
        assert!(matches!(result, Err(PipelineError::Graph(_))));
    }

    fn insight_json(sentiment: f64, confidence: f64) -> String {
        format!(
            r#"{{"sentiment_score": {}, "summary": "synthetic", "bullish_indicators": [], "bearish_indicators": [], "confidence": {}}}"#,
            sentiment, confidence
        )
    }

    fn collab_with_llm(llm: Arc<MockLanguageModel>) -> Collaborators {
        Collaborators {
            llm,
            ..mock_collaborators("unused")
        }
    }

    #[tokio::test]
    async fn test_run_top_gainers_query_end_to_end() {
        // "top 3 gainers today" parses to top_gainers/3/today and takes
        // the movers branch whatever the classifier answers.
        let llm = Arc::new(MockLanguageModel::new("General market report.").with_queued(vec![
            "general_advice".to_string(),
            insight_json(0.2, 0.7),
        ]));
        let pipeline = Pipeline::assistant(collab_with_llm(llm)).unwrap();

        let state = pipeline
            .run(RunState::new("", "top 3 gainers today"))
            .await
            .unwrap();

        let parsed = state.parsed_query.as_ref().unwrap();
        assert_eq!(parsed.top_n_requested, 3);
        assert_eq!(state.top_movers.unwrap().len(), 3);
        assert_eq!(state.user_response.as_deref(), Some("General market report."));
        // The movers branch never simulates trades.
        assert!(state.executed_trade.is_none());
    }

    #[tokio::test]
    async fn test_run_trading_branch_sell_with_fallback_price() {
        // Confident negative sentiment sells; with no price history the
        // simulated fill uses the fixed fallback price.
        let llm = Arc::new(MockLanguageModel::new("Here is your report.").with_queued(vec![
            "report_request".to_string(),
            insight_json(-0.5, 0.8),
        ]));
        let mut collab = collab_with_llm(llm);
        collab.prices = Arc::new(crate::ports::mock::MockPrices::empty());
        let pipeline = Pipeline::assistant(collab).unwrap();

        let state = pipeline
            .run(RunState::new("AAPL", "market report based on news"))
            .await
            .unwrap();

        let signal = state.trade_signal.as_ref().unwrap();
        assert_eq!(signal.action, crate::models::TradeAction::Sell);
        let trade = state.executed_trade.as_ref().unwrap();
        assert_eq!(trade.price, 100.0);
        assert_eq!(trade.quantity, 10.0);
        assert_eq!(state.user_response.as_deref(), Some("Here is your report."));
    }

    #[tokio::test]
    async fn test_run_unknown_intent_refuses_after_single_model_call() {
        // The classifier call is the only collaborator interaction;
        // the refusal itself must make none.
        let llm = Arc::new(MockLanguageModel::new("poetry_request"));
        let pipeline = Pipeline::assistant(collab_with_llm(llm.clone())).unwrap();

        let state = pipeline
            .run(RunState::new("", "write me a poem about cheap thrills"))
            .await
            .unwrap();

        assert_eq!(
            state.user_response.as_deref(),
            Some(crate::steps::report::REFUSAL)
        );
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_empty_analysis_text_holds_without_trade() {
        // Empty analysis text degrades to the neutral insight, which
        // holds, which leaves no simulated trade.
        let llm = Arc::new(MockLanguageModel::new("Quiet market today.").with_queued(vec![
            "report_request".to_string(),
            String::new(),
        ]));
        let pipeline = Pipeline::assistant(collab_with_llm(llm)).unwrap();

        let state = pipeline
            .run(RunState::new("AAPL", "market report based on news"))
            .await
            .unwrap();

        let insight = state.gpt_insight.as_ref().unwrap();
        assert_eq!(insight.sentiment_score, 0.0);
        assert_eq!(insight.confidence, 0.0);
        let signal = state.trade_signal.as_ref().unwrap();
        assert_eq!(signal.action, crate::models::TradeAction::Hold);
        assert!(state.executed_trade.is_none());
    }

    #[tokio::test]
    async fn test_run_direct_answer_branch_terminates_without_report() {
        let llm = Arc::new(MockLanguageModel::new("risk_assessment"));
        let pipeline = Pipeline::assistant(collab_with_llm(llm.clone())).unwrap();

        let state = pipeline
            .run(RunState::new("AAPL", "how risky is AAPL long term"))
            .await
            .unwrap();

        let response = state.user_response.unwrap();
        assert!(response.contains("Risk profile for AAPL"));
        // Classification only; the risk step is model-free.
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_linear_run_reaches_terminal() {
        let pipeline = Pipeline::builder()
            .entry(StepId::UserInput)
            .step(Arc::new(NoopStep(StepId::UserInput)))
            .step(Arc::new(NoopStep(StepId::Report)))
            .edge(StepId::UserInput, Transition::To(StepId::Report))
            .edge(StepId::Report, Transition::End)
            .build()
            .unwrap();

        let state = pipeline.run(RunState::new("AAPL", "q")).await.unwrap();
        assert_eq!(state.symbol, "AAPL");
    }
}
