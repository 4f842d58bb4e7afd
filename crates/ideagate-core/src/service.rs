//! Versioned idea workflows over the evaluator and the repository.
//!
//! Multi-step writes are ordered, not transactional. A new version is
//! written before its evaluation, and the idea's current-version pointer
//! moves only after the evaluation is stored. Diff-summary attachment is
//! best-effort.

use ideagate_memory::IdeaRepository;
use ideagate_schema::{
    Dimension, EditableField, EvaluationRecord, Idea, IdeaIntake, IdeaVersion, IntakeOverrides,
    Recommendation, SimulationRecord, Validate, Verdict,
};
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::evaluator::Evaluator;
use crate::evolution::{self, DiffSummary, DimensionDelta, VersionDiff};
use crate::simulator;

pub const STALE_SCORES_NOTE: &str =
    "Scores are stale until the idea is re-evaluated with re_evaluate.";

const RUN_EVALUATION_FIRST: &str = "run evaluation first";

#[derive(Debug, Clone, Serialize)]
pub struct EvaluatedVersion {
    pub idea_id: String,
    pub version_id: String,
    pub version_number: u32,
    pub evaluation_id: String,
    pub total_score: u8,
    pub verdict: Verdict,
    pub confidence: u8,
    pub diff_summary: String,
    pub risk_shift: String,
    pub diff: Vec<DimensionDelta>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureProjection {
    pub simulation_id: String,
    pub version_id: String,
    pub feature: String,
    pub summary: String,
    pub projected_total_score: f64,
    pub net_score_change: f64,
    pub recommendation: Recommendation,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldUpdate {
    pub idea_id: String,
    pub field: EditableField,
    pub value: String,
    pub note: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub version: IdeaVersion,
    pub evaluation: Option<EvaluationRecord>,
    pub simulations: Vec<SimulationRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdeaHistory {
    pub idea: Idea,
    /// Oldest first.
    pub entries: Vec<HistoryEntry>,
    /// Version numbers from the current version back to the root.
    pub lineage: Vec<u32>,
    pub improvement_streak: u32,
    pub biggest_gain: Option<(Dimension, i16)>,
}

#[derive(Clone)]
pub struct IdeaService {
    repo: IdeaRepository,
    evaluator: Evaluator,
}

impl IdeaService {
    pub fn new(repo: IdeaRepository, evaluator: Evaluator) -> Self {
        Self { repo, evaluator }
    }

    pub fn repository(&self) -> &IdeaRepository {
        &self.repo
    }

    /// Create an idea with its first evaluated version.
    pub async fn submit_idea(
        &self,
        owner: Option<&str>,
        intake: IdeaIntake,
    ) -> EngineResult<EvaluatedVersion> {
        intake.validate()?;
        let outcome = self.evaluator.evaluate(&intake).await?;

        let idea = self.repo.create_idea(owner, &intake).await?;
        let version = self
            .repo
            .create_version(&idea.id, 1, &intake, &[], None)
            .await?;
        let record = self
            .repo
            .create_evaluation(&idea.id, &version.id, &outcome.evaluation, Some(&outcome.reports))
            .await?;

        let diff = VersionDiff::between(None, &record.evaluation);
        let summary = evolution::fallback_summary(None, &record.evaluation);
        self.attach_summary_best_effort(&version, &summary).await;

        self.repo
            .set_current_version(&idea.id, &intake, &version.id)
            .await?;
        tracing::info!(idea_id = %idea.id, version_id = %version.id, "idea submitted");
        Ok(evaluated(&version, &record, summary, diff))
    }

    /// Merge `overrides` onto the live intake and evaluate it as a new version.
    pub async fn re_evaluate(
        &self,
        idea_id: &str,
        overrides: &IntakeOverrides,
    ) -> EngineResult<EvaluatedVersion> {
        let idea = self.require_idea(idea_id).await?;
        let current_id = idea.current_version_id.as_deref().ok_or_else(|| {
            EngineError::PreconditionNotMet("submit the idea for evaluation first".into())
        })?;
        let current = self
            .repo
            .get_version(current_id)
            .await?
            .ok_or_else(|| EngineError::not_found("version", current_id))?;
        let previous = self.repo.current_evaluation(&current.id).await?;

        let merged = idea.intake.merged_with(overrides);
        merged.validate()?;
        tracing::info!(
            idea_id,
            changed = ?overrides.changed_fields(),
            "re-evaluating idea"
        );
        let outcome = self.evaluator.evaluate(&merged).await?;

        let version_number = self.repo.max_version_number(idea_id).await? + 1;
        let version = self
            .repo
            .create_version(
                idea_id,
                version_number,
                &merged,
                &current.features,
                Some(&current.id),
            )
            .await?;
        let record = self
            .repo
            .create_evaluation(idea_id, &version.id, &outcome.evaluation, Some(&outcome.reports))
            .await?;

        let previous = previous.as_ref().map(|r| &r.evaluation);
        let diff = VersionDiff::between(previous, &record.evaluation);
        let summary = evolution::fallback_summary(previous, &record.evaluation);
        self.attach_summary_best_effort(&version, &summary).await;

        self.repo
            .set_current_version(idea_id, &merged, &version.id)
            .await?;
        tracing::info!(
            idea_id,
            version_number,
            total_score = record.evaluation.total_score,
            "re-evaluation complete"
        );
        Ok(evaluated(&version, &record, summary, diff))
    }

    /// Simulate `feature` against the current evaluation and store the projection.
    pub async fn refine_feature(
        &self,
        idea_id: &str,
        feature: &str,
    ) -> EngineResult<FeatureProjection> {
        let idea = self.require_idea(idea_id).await?;
        let version_id = idea
            .current_version_id
            .as_deref()
            .ok_or_else(|| EngineError::PreconditionNotMet(RUN_EVALUATION_FIRST.into()))?;
        let version = self
            .repo
            .get_version(version_id)
            .await?
            .ok_or_else(|| EngineError::not_found("version", version_id))?;
        let baseline = self
            .repo
            .current_evaluation(&version.id)
            .await?
            .ok_or_else(|| EngineError::PreconditionNotMet(RUN_EVALUATION_FIRST.into()))?;

        let simulation = simulator::simulate(
            self.evaluator.router(),
            self.evaluator.config(),
            &version.snapshot,
            feature,
            &baseline.evaluation,
        )
        .await?;
        let stored = self
            .repo
            .create_simulation(idea_id, &version.id, &baseline.id, &simulation)
            .await?;

        let sim = stored.simulation;
        Ok(FeatureProjection {
            simulation_id: stored.id,
            version_id: stored.version_id,
            feature: sim.feature,
            summary: sim.strategic_impact,
            projected_total_score: sim.projected_total_score,
            net_score_change: sim.net_score_change,
            recommendation: sim.recommendation,
            rationale: sim.rationale,
        })
    }

    /// Edit one intake field on the idea record. No version, no evaluation.
    pub async fn update_field(
        &self,
        idea_id: &str,
        field: &str,
        value: &str,
    ) -> EngineResult<FieldUpdate> {
        let field: EditableField = field.parse()?;
        let value = value.trim();
        if value.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "value for {field} must not be empty"
            )));
        }
        self.require_idea(idea_id).await?;
        self.repo.update_intake_field(idea_id, field, value).await?;
        tracing::info!(idea_id, %field, "intake field updated");

        Ok(FieldUpdate {
            idea_id: idea_id.to_string(),
            field,
            value: value.to_string(),
            note: STALE_SCORES_NOTE,
        })
    }

    /// Generated diff summary for a version against its parent, attached to the version.
    pub async fn summarize_version(&self, version_id: &str) -> EngineResult<DiffSummary> {
        let version = self
            .repo
            .get_version(version_id)
            .await?
            .ok_or_else(|| EngineError::not_found("version", version_id))?;
        let next = self
            .repo
            .current_evaluation(&version.id)
            .await?
            .ok_or_else(|| EngineError::PreconditionNotMet(RUN_EVALUATION_FIRST.into()))?;
        let previous = match version.parent_version_id.as_deref() {
            Some(parent_id) => self.repo.current_evaluation(parent_id).await?,
            None => None,
        };

        let summary = evolution::summarize(
            self.evaluator.router(),
            self.evaluator.config(),
            previous.as_ref().map(|r| &r.evaluation),
            &next.evaluation,
        )
        .await;
        self.repo
            .attach_diff_summary(&version.id, &summary.text)
            .await?;
        Ok(summary)
    }

    pub async fn history(&self, idea_id: &str) -> EngineResult<IdeaHistory> {
        let idea = self.require_idea(idea_id).await?;
        let versions = self.repo.list_versions(idea_id).await?;

        let mut entries = Vec::with_capacity(versions.len());
        for version in &versions {
            let evaluation = self.repo.current_evaluation(&version.id).await?;
            let simulations = self.repo.list_simulations(&version.id).await?;
            entries.push(HistoryEntry {
                version: version.clone(),
                evaluation,
                simulations,
            });
        }

        let evaluated: Vec<_> = entries
            .iter()
            .filter_map(|e| e.evaluation.as_ref().map(|r| &r.evaluation))
            .collect();
        let totals: Vec<u8> = evaluated.iter().map(|e| e.total_score).collect();
        let improvement_streak = evolution::improvement_streak(&totals);
        let biggest_gain = evolution::biggest_gain(&evaluated);
        let lineage = idea
            .current_version_id
            .as_deref()
            .map(|id| {
                evolution::lineage(&versions, id)
                    .iter()
                    .map(|v| v.version_number)
                    .collect()
            })
            .unwrap_or_default();

        Ok(IdeaHistory {
            idea,
            entries,
            lineage,
            improvement_streak,
            biggest_gain,
        })
    }

    async fn require_idea(&self, idea_id: &str) -> EngineResult<Idea> {
        self.repo
            .get_idea(idea_id)
            .await?
            .ok_or_else(|| EngineError::not_found("idea", idea_id))
    }

    async fn attach_summary_best_effort(&self, version: &IdeaVersion, summary: &str) {
        if let Err(err) = self.repo.attach_diff_summary(&version.id, summary).await {
            let failure = EngineError::PersistencePartialFailure {
                step: "attach diff summary",
                reason: format!("{err:#}"),
            };
            tracing::warn!(version_id = %version.id, "{failure}");
        }
    }
}

fn evaluated(
    version: &IdeaVersion,
    record: &EvaluationRecord,
    diff_summary: String,
    diff: VersionDiff,
) -> EvaluatedVersion {
    EvaluatedVersion {
        idea_id: version.idea_id.clone(),
        version_id: version.id.clone(),
        version_number: version.version_number,
        evaluation_id: record.id.clone(),
        total_score: record.evaluation.total_score,
        verdict: record.evaluation.verdict,
        confidence: record.evaluation.confidence,
        diff_summary,
        risk_shift: diff.risk_shift,
        diff: diff.deltas,
    }
}
