//! Intent-driven conditional router
//!
//! Pure function of `(intent, parsed_query)` to the identifier of the
//! next step. The evaluation order is a deliberate precedence rule:
//! a `top_gainers` query type overrides whatever the classifier said.

use crate::graph::StepId;
use crate::models::{Intent, ParsedQuery, QueryType};

/// Every identifier the router can return. The pipeline validates at
/// build time that each of these is a registered node, so routing is
/// total over the edge table.
pub const ROUTER_TARGETS: &[StepId] = &[
    StepId::FetchTopMovers,
    StepId::FetchNews,
    StepId::StockInsight,
    StepId::TechnicalAnalysis,
    StepId::RiskAssessment,
    StepId::PortfolioGuidance,
    StepId::MacroTrends,
    StepId::Report,
];

/// Select the next step. First match wins:
/// 1. `query_type == top_gainers` routes to the top-movers branch,
///    regardless of intent.
/// 2. Otherwise dispatch on intent; anything unclassified (including
///    `unknown`) lands on the report step, which itself special-cases
///    `unknown` into a static refusal.
pub fn route(intent: Option<Intent>, parsed_query: Option<&ParsedQuery>) -> StepId {
    if let Some(parsed) = parsed_query {
        if parsed.query_type == QueryType::TopGainers {
            return StepId::FetchTopMovers;
        }
    }

    match intent {
        Some(Intent::ReportRequest) | Some(Intent::BudgetAllocation) => StepId::FetchNews,
        Some(Intent::RecoveryGuidance) | Some(Intent::GeneralAdvice) => StepId::FetchTopMovers,
        Some(Intent::StockInsight) => StepId::StockInsight,
        Some(Intent::TechnicalAnalysis) => StepId::TechnicalAnalysis,
        Some(Intent::RiskAssessment) => StepId::RiskAssessment,
        Some(Intent::PortfolioGuidance) => StepId::PortfolioGuidance,
        Some(Intent::MacroTrend) => StepId::MacroTrends,
        Some(Intent::Unknown) | None => StepId::Report,
    }
}
