//! Deterministic scoring on top of one generated synthesis.

use ideagate_schema::{
    Dimension, Evaluation, IdeaIntake, RiskKey, RiskLevel, RiskProfile, ScoreBreakdown,
    SpecialistReports, Synthesis, Verdict,
};

use crate::config::{EngineConfig, VerdictThresholds, WeightTable};
use crate::error::{EngineError, EngineResult};
use crate::generation::{generate_validated, no_check, StructuredCall};
use crate::prompts;
use crate::router::LlmRouter;
use crate::schemas;

/// Average trimmed length at which an intake counts as fully described.
const COMPLETE_FIELD_CHARS: f64 = 50.0;

const COMPLETENESS_WEIGHT: f64 = 0.4;
const AGREEMENT_WEIGHT: f64 = 0.4;
const CLARITY_WEIGHT: f64 = 0.2;

/// `round(Σ score·w / Σ w)`, always within 0..=100.
pub fn total_score(breakdown: &ScoreBreakdown, weights: &WeightTable) -> u8 {
    let mean = weights.weighted_mean(|d| f64::from(breakdown.score(d)));
    mean.round().clamp(0.0, 100.0) as u8
}

/// How much the founder actually wrote, 0–100. Independent of field order.
///
/// Lengths are taken as stored, surrounding whitespace included.
pub fn completeness(intake: &IdeaIntake) -> f64 {
    let fields = intake.descriptive_fields();
    let total_chars: usize = fields.iter().map(|f| f.chars().count()).sum();
    let average = total_chars as f64 / fields.len() as f64;
    (average / COMPLETE_FIELD_CHARS * 100.0).clamp(0.0, 100.0)
}

/// Consistency of the three core-viability scores, 0–100.
///
/// Population variance over problem, market and differentiation only.
pub fn agreement(breakdown: &ScoreBreakdown) -> f64 {
    let core = [
        Dimension::ProblemStrength,
        Dimension::MarketOpportunity,
        Dimension::DifferentiationStrength,
    ]
    .map(|d| f64::from(breakdown.score(d)));
    let mean = core.iter().sum::<f64>() / core.len() as f64;
    let variance = core.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / core.len() as f64;
    (100.0 - variance / 10.0).max(0.0)
}

pub fn clarity(breakdown: &ScoreBreakdown) -> f64 {
    f64::from(breakdown.score(Dimension::DifferentiationStrength))
}

pub fn confidence(intake: &IdeaIntake, breakdown: &ScoreBreakdown) -> u8 {
    let blended = COMPLETENESS_WEIGHT * completeness(intake)
        + AGREEMENT_WEIGHT * agreement(breakdown)
        + CLARITY_WEIGHT * clarity(breakdown);
    blended.clamp(0.0, 100.0).round() as u8
}

/// Ordered rule chain; the first matching rule decides.
pub fn derive_verdict(
    breakdown: &ScoreBreakdown,
    risks: &RiskProfile,
    total: u8,
    thresholds: &VerdictThresholds,
) -> Verdict {
    let market_risk = risks.level(RiskKey::Market);

    if breakdown.score(Dimension::ProblemStrength) < thresholds.kill_below_problem {
        return Verdict::Kill;
    }
    if market_risk == RiskLevel::Critical {
        return Verdict::Kill;
    }
    if total >= thresholds.go_total {
        if breakdown.score(Dimension::DifferentiationStrength) < thresholds.go_min_differentiation
        {
            return Verdict::Refine;
        }
        if market_risk == RiskLevel::High {
            return Verdict::Refine;
        }
        return Verdict::Go;
    }
    if total >= thresholds.refine_total {
        return Verdict::Refine;
    }
    Verdict::Kill
}

/// Combine a validated synthesis with the derived total, verdict and confidence.
pub fn assemble(intake: &IdeaIntake, synthesis: Synthesis, config: &EngineConfig) -> Evaluation {
    let total = total_score(&synthesis.score_breakdown, &config.weights);
    let verdict = derive_verdict(
        &synthesis.score_breakdown,
        &synthesis.risk_profile,
        total,
        &config.verdict,
    );
    let confidence = confidence(intake, &synthesis.score_breakdown);

    Evaluation {
        score_breakdown: synthesis.score_breakdown,
        risk_profile: synthesis.risk_profile,
        total_score: total,
        verdict,
        confidence,
        executive_summary: synthesis.executive_summary,
        competitive_landscape: synthesis.competitive_landscape,
        strategic_analysis: synthesis.strategic_analysis,
        next_steps: synthesis.next_steps,
    }
}

/// Request the synthesis for `reports` and assemble the evaluation.
pub async fn aggregate(
    router: &LlmRouter,
    config: &EngineConfig,
    intake: &IdeaIntake,
    reports: &SpecialistReports,
) -> EngineResult<Evaluation> {
    let call = StructuredCall {
        policy: &config.models.synthesis,
        system: prompts::SYNTHESIS_SYSTEM,
        prompt: prompts::synthesis(intake, reports),
        format: schemas::synthesis(),
    };
    let synthesis: Synthesis =
        generate_validated(router, call, config.generation.max_attempts, no_check)
            .await
            .map_err(|err| EngineError::AggregationValidationFailed(err.to_string()))?;

    let evaluation = assemble(intake, synthesis, config);
    tracing::info!(
        total_score = evaluation.total_score,
        verdict = %evaluation.verdict,
        confidence = evaluation.confidence,
        "evaluation assembled"
    );
    Ok(evaluation)
}
