//! Step contract and step implementations
//!
//! A step is a named unit of work: it consumes the run-state by value and
//! produces the updated state. Each step declares its precondition at the
//! top of `run` and owns a documented fallback for every collaborator it
//! calls; the pipeline never aborts mid-flight because a single
//! collaborator failed. Steps are idempotent given identical input state
//! and collaborator responses.

use crate::graph::StepId;
use crate::models::RunState;
use crate::Result;
use async_trait::async_trait;

pub mod analyst;
pub mod collect;
pub mod executor;
pub mod intent;
pub mod macro_trend;
pub mod portfolio;
pub mod query_parser;
pub mod report;
pub mod risk;
pub mod stock_insight;
pub mod strategy;
pub mod technical;
pub mod top_movers;
pub mod user_query;

#[async_trait]
pub trait Step: Send + Sync {
    fn id(&self) -> StepId;

    /// Consume the prior state and produce the updated state. Fatal
    /// precondition violations return `PipelineError::MissingInput`;
    /// collaborator failures are absorbed into the step's fallback.
    async fn run(&self, state: RunState) -> Result<RunState>;
}

/// Resolve the working symbol for a direct-answer step: the state symbol
/// when non-empty, else the ticker the query parser extracted.
pub(crate) fn resolve_symbol(state: &RunState) -> Option<String> {
    if !state.symbol.trim().is_empty() {
        return Some(state.symbol.trim().to_uppercase());
    }
    state
        .parsed_query
        .as_ref()
        .and_then(|q| q.company_mentioned.clone())
        .map(|s| s.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParsedQuery;

    #[test]
    fn test_resolve_symbol_prefers_state() {
        let mut state = RunState::new("AAPL", "q");
        state.parsed_query = Some(ParsedQuery {
            company_mentioned: Some("TSLA".to_string()),
            ..ParsedQuery::default()
        });
        assert_eq!(resolve_symbol(&state).as_deref(), Some("AAPL"));
    }

    #[test]
    fn test_resolve_symbol_falls_back_to_parsed_query() {
        let mut state = RunState::new("  ", "q");
        state.parsed_query = Some(ParsedQuery {
            company_mentioned: Some("tsla".to_string()),
            ..ParsedQuery::default()
        });
        assert_eq!(resolve_symbol(&state).as_deref(), Some("TSLA"));
    }

    #[test]
    fn test_resolve_symbol_none_when_absent() {
        let state = RunState::new("", "q");
        assert!(resolve_symbol(&state).is_none());
    }
}
