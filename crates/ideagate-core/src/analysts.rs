use ideagate_provider::ResponseFormat;
use ideagate_schema::{IdeaIntake, IdeaReport, MarketReport, TimingReport, Validate};
use serde::de::DeserializeOwned;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::generation::{generate_validated, no_check, StructuredCall};
use crate::prompts;
use crate::router::LlmRouter;
use crate::schemas;

/// A stateless specialist: one prompt, one schema, one report type.
pub trait Analyst {
    type Report: DeserializeOwned + Validate;

    /// Short label used in errors and logs.
    const NAME: &'static str;

    fn system() -> &'static str;
    fn prompt(intake: &IdeaIntake) -> String;
    fn format() -> ResponseFormat;
}

pub struct IdeaAnalyst;
pub struct MarketAnalyst;
pub struct TimingAnalyst;

impl Analyst for IdeaAnalyst {
    type Report = IdeaReport;
    const NAME: &'static str = "idea";

    fn system() -> &'static str {
        prompts::IDEA_ANALYST_SYSTEM
    }

    fn prompt(intake: &IdeaIntake) -> String {
        prompts::idea_analysis(intake)
    }

    fn format() -> ResponseFormat {
        schemas::idea_report()
    }
}

impl Analyst for MarketAnalyst {
    type Report = MarketReport;
    const NAME: &'static str = "market";

    fn system() -> &'static str {
        prompts::MARKET_ANALYST_SYSTEM
    }

    fn prompt(intake: &IdeaIntake) -> String {
        prompts::market_analysis(intake)
    }

    fn format() -> ResponseFormat {
        schemas::market_report()
    }
}

impl Analyst for TimingAnalyst {
    type Report = TimingReport;
    const NAME: &'static str = "timing";

    fn system() -> &'static str {
        prompts::TIMING_ANALYST_SYSTEM
    }

    fn prompt(intake: &IdeaIntake) -> String {
        prompts::timing_analysis(intake)
    }

    fn format() -> ResponseFormat {
        schemas::timing_report()
    }
}

/// Produce one report or fail hard. No degraded report is ever returned.
pub async fn analyze<A: Analyst>(
    router: &LlmRouter,
    config: &EngineConfig,
    intake: &IdeaIntake,
) -> EngineResult<A::Report> {
    tracing::debug!(analyst = A::NAME, "running specialist analysis");
    let call = StructuredCall {
        policy: &config.models.analysis,
        system: A::system(),
        prompt: A::prompt(intake),
        format: A::format(),
    };
    generate_validated(router, call, config.generation.max_attempts, no_check)
        .await
        .map_err(|err| EngineError::AnalysisGenerationFailed {
            analyst: A::NAME,
            reason: err.to_string(),
        })
}
