use std::sync::Arc;

use ideagate_schema::{Evaluation, IdeaIntake, SpecialistReports, Validate};

use crate::aggregation;
use crate::analysts::{analyze, IdeaAnalyst, MarketAnalyst, TimingAnalyst};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::router::LlmRouter;

/// An evaluation together with the specialist reports it was built from.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub evaluation: Evaluation,
    pub reports: SpecialistReports,
}

/// Fan-out over the three analysts, fan-in into aggregation.
#[derive(Clone)]
pub struct Evaluator {
    router: LlmRouter,
    config: Arc<EngineConfig>,
}

impl Evaluator {
    pub fn new(router: LlmRouter, config: Arc<EngineConfig>) -> Self {
        Self { router, config }
    }

    pub fn router(&self) -> &LlmRouter {
        &self.router
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Any analyst failure aborts the run before aggregation starts.
    pub async fn evaluate(&self, intake: &IdeaIntake) -> EngineResult<EvaluationOutcome> {
        intake.validate()?;
        let config = self.config.as_ref();

        let (idea, market, timing) = tokio::try_join!(
            analyze::<IdeaAnalyst>(&self.router, config, intake),
            analyze::<MarketAnalyst>(&self.router, config, intake),
            analyze::<TimingAnalyst>(&self.router, config, intake),
        )?;
        let reports = SpecialistReports {
            idea,
            market,
            timing,
        };
        tracing::debug!("specialist reports complete, aggregating");

        let evaluation = aggregation::aggregate(&self.router, config, intake, &reports).await?;
        Ok(EvaluationOutcome {
            evaluation,
            reports,
        })
    }
}
