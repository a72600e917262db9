//! Trading Assistant Orchestrator
//!
//! A pipeline that answers natural-language equity questions:
//! - Parses the query and classifies intent with a language model
//! - Routes each request through a fixed step graph with a conditional
//!   branch point
//! - Runs the trading branch (news + prices → AI insight → signal →
//!   simulated trade), the top-movers branch, or one of five
//!   direct-answer analyses
//! - Degrades gracefully: collaborator failures become documented
//!   fallbacks, never mid-run aborts
//!
//! PIPELINE:
//! INPUT → PARSE → CLASSIFY → ROUTE → COLLECT → ANALYZE → RESPOND

pub mod error;
pub mod graph;
pub mod models;
pub mod ports;
pub mod providers;
pub mod router;
pub mod steps;

pub use error::Result;

// Re-export common types
pub use graph::{Pipeline, PipelineBuilder, StepId, Transition};
pub use models::*;
pub use ports::Collaborators;
