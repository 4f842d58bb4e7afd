//! Evaluation aggregation and decision engine for startup ideas.

pub mod aggregation;
pub mod analysts;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod evolution;
pub mod generation;
pub mod idea_tools;
pub mod prompts;
pub mod router;
pub mod schemas;
pub mod service;
pub mod simulator;
pub mod tool;

pub use config::*;
pub use error::*;
pub use evaluator::*;
pub use evolution::{DiffSummary, DimensionDelta, SummarySource, VersionDiff};
pub use generation::{generate_validated, GenerationError, StructuredCall};
pub use idea_tools::*;
pub use router::*;
pub use service::*;
pub use tool::*;
