//! Entry step: validate and clean the raw user query.

use crate::error::PipelineError;
use crate::graph::StepId;
use crate::models::RunState;
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use tracing::info;

pub struct UserQueryStep;

#[async_trait]
impl Step for UserQueryStep {
    fn id(&self) -> StepId {
        StepId::UserInput
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        // Foundational precondition: an empty query is fatal for the run.
        if state.user_query.trim().is_empty() {
            return Err(PipelineError::MissingInput {
                step: "user_input",
                field: "user_query",
            });
        }

        state.user_query = state.user_query.trim().to_string();
        info!(run_id = %state.run_id, "accepted user query");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trims_query() {
        let state = RunState::new("AAPL", "  what moved today?  ");
        let state = UserQueryStep.run(state).await.unwrap();
        assert_eq!(state.user_query, "what moved today?");
    }

    #[tokio::test]
    async fn test_empty_query_is_fatal() {
        let state = RunState::new("AAPL", "   ");
        let result = UserQueryStep.run(state).await;
        assert!(matches!(
            result,
            Err(PipelineError::MissingInput { field: "user_query", .. })
        ));
    }
}
