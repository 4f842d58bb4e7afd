//! Read-only "what if" projection of one feature against a stored evaluation.

use ideagate_schema::{
    Evaluation, FeatureSimulation, IdeaIntake, Recommendation, SimulationDraft,
};

use crate::config::{EngineConfig, WeightTable};
use crate::error::{EngineError, EngineResult};
use crate::generation::{generate_validated, StructuredCall};
use crate::prompts;
use crate::router::LlmRouter;
use crate::schemas;

/// Reject drafts whose starting point contradicts the baseline.
pub fn check_against_baseline(draft: &SimulationDraft, baseline: &Evaluation) -> Result<(), String> {
    for (dimension, impact) in draft.dimension_impacts.iter() {
        let expected = baseline.score_breakdown.score(dimension);
        if impact.before != expected {
            return Err(format!(
                "dimension_impacts.{}.before is {} but the current score is {expected}",
                dimension.key(),
                impact.before
            ));
        }
    }
    for (key, shift) in draft.risk_shifts.iter() {
        let expected = baseline.risk_profile.level(key);
        if shift.before != expected {
            return Err(format!(
                "risk_shifts.{}.before is {} but the current level is {expected}",
                key.key(),
                shift.before
            ));
        }
    }
    Ok(())
}

/// Weighted mean of the per-dimension deltas, rounded to one decimal.
pub fn net_score_change(draft: &SimulationDraft, weights: &WeightTable) -> f64 {
    let net = weights.weighted_mean(|d| f64::from(draft.dimension_impacts.get(d).delta));
    round_tenth(net)
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Derive the net change and projection for a validated draft.
///
/// `projected_total_score` is exactly `baseline.total_score + net_score_change`
/// and may leave 0..=100 when the baseline sits near an edge.
pub fn finalize(
    feature: &str,
    draft: SimulationDraft,
    baseline: &Evaluation,
    weights: &WeightTable,
) -> FeatureSimulation {
    let net = net_score_change(&draft, weights);
    let projected = round_tenth(f64::from(baseline.total_score) + net);

    let worsened: Vec<&str> = draft
        .risk_shifts
        .iter()
        .filter(|(_, shift)| shift.worsened())
        .map(|(key, _)| key.key())
        .collect();
    if draft.recommendation == Recommendation::Add && (net < 0.0 || !worsened.is_empty()) {
        tracing::warn!(
            net_score_change = net,
            worsened = ?worsened,
            "simulation recommends Add despite a negative net change or worsened risk"
        );
    }
    for (key, shift) in draft.risk_shifts.iter() {
        if shift.before.steps_to(shift.after) > 1 {
            tracing::debug!(
                risk = key.key(),
                before = %shift.before,
                after = %shift.after,
                "risk moved more than one severity step"
            );
        }
    }

    FeatureSimulation {
        feature: feature.trim().to_string(),
        dimension_impacts: draft.dimension_impacts,
        risk_shifts: draft.risk_shifts,
        net_score_change: net,
        projected_total_score: projected,
        strategic_impact: draft.strategic_impact,
        recommendation: draft.recommendation,
        rationale: draft.rationale,
    }
}

/// Project `feature` onto `baseline`. The baseline is never modified.
pub async fn simulate(
    router: &LlmRouter,
    config: &EngineConfig,
    intake: &IdeaIntake,
    feature: &str,
    baseline: &Evaluation,
) -> EngineResult<FeatureSimulation> {
    if feature.trim().is_empty() {
        return Err(EngineError::InvalidInput("feature description is empty".into()));
    }

    let call = StructuredCall {
        policy: &config.models.simulation,
        system: prompts::SIMULATION_SYSTEM,
        prompt: prompts::simulation(intake, feature, baseline),
        format: schemas::simulation_draft(),
    };
    let draft: SimulationDraft = generate_validated(
        router,
        call,
        config.generation.max_attempts,
        |draft: &SimulationDraft| check_against_baseline(draft, baseline),
    )
    .await
    .map_err(|err| EngineError::SimulationFailed(err.to_string()))?;

    let simulation = finalize(feature, draft, baseline, &config.weights);
    tracing::info!(
        net_score_change = simulation.net_score_change,
        projected_total_score = simulation.projected_total_score,
        recommendation = simulation.recommendation.as_str(),
        "feature simulated"
    );
    Ok(simulation)
}

#[cfg(test)]
mod tests {
    use ideagate_schema::{
        CompetitiveLandscape, Dimension, DimensionImpact, DimensionScore, PerDimension, PerRisk,
        RiskAssessment, RiskKey, RiskLevel, RiskShift, StrategicAnalysis, Verdict,
    };

    use super::*;

    fn baseline() -> Evaluation {
        Evaluation {
            score_breakdown: PerDimension::from_fn(|d| DimensionScore {
                score: if d == Dimension::ProblemStrength { 60 } else { 70 },
                insight: "ok".into(),
            }),
            risk_profile: PerRisk::from_fn(|_| RiskAssessment {
                level: RiskLevel::Medium,
                score: 50,
                reason: "typical".into(),
            }),
            total_score: 68,
            verdict: Verdict::Refine,
            confidence: 70,
            executive_summary: "Decent".into(),
            competitive_landscape: CompetitiveLandscape {
                direct_competitors: vec![],
                indirect_competitors: vec![],
                positioning: "Niche".into(),
            },
            strategic_analysis: StrategicAnalysis {
                strengths: vec!["a".into()],
                weaknesses: vec!["b".into()],
            },
            next_steps: vec!["c".into()],
        }
    }

    fn draft(deltas: [i16; 6]) -> SimulationDraft {
        let base = baseline();
        let mut idx = 0;
        SimulationDraft {
            dimension_impacts: PerDimension::from_fn(|d| {
                let before = base.score_breakdown.score(d);
                let delta = deltas[idx];
                idx += 1;
                DimensionImpact {
                    before,
                    after: (i16::from(before) + delta) as u8,
                    delta,
                    reasoning: "projected".into(),
                }
            }),
            risk_shifts: PerRisk::from_fn(|_| RiskShift {
                before: RiskLevel::Medium,
                after: RiskLevel::Medium,
                reasoning: "steady".into(),
            }),
            strategic_impact: "Widens the moat".into(),
            recommendation: Recommendation::Add,
            rationale: "Cheap to build".into(),
        }
    }

    #[test]
    fn before_values_must_match_baseline() {
        let baseline = baseline();
        assert!(check_against_baseline(&draft([0; 6]), &baseline).is_ok());

        let mut wrong = draft([0; 6]);
        wrong.dimension_impacts.problem_strength.before = 65;
        wrong.dimension_impacts.problem_strength.after = 65;
        let err = check_against_baseline(&wrong, &baseline).unwrap_err();
        assert!(err.contains("problem_strength.before is 65 but the current score is 60"));
    }

    #[test]
    fn risk_before_must_match_baseline() {
        let mut wrong = draft([0; 6]);
        wrong.risk_shifts.timing_risk.before = RiskLevel::Low;
        let err = check_against_baseline(&wrong, &baseline()).unwrap_err();
        assert!(err.contains("timing_risk"));
    }

    #[test]
    fn net_change_is_weighted_mean_of_deltas() {
        let weights = WeightTable::default();
        // 10*.25 + 5*.2 + 0 + -4*.1 + 0 + 2*.15 = 2.5 + 1 - .4 + .3 = 3.4
        let net = net_score_change(&draft([10, 5, 0, -4, 0, 2]), &weights);
        assert!((net - 3.4).abs() < 1e-9);
    }

    #[test]
    fn finalize_projects_from_baseline_total() {
        let baseline = baseline();
        let sim = finalize(
            "  Slack integration ",
            draft([10, 5, 0, -4, 0, 2]),
            &baseline,
            &WeightTable::default(),
        );
        assert_eq!(sim.feature, "Slack integration");
        assert!((sim.projected_total_score - 71.4).abs() < 1e-9);
        assert_eq!(sim.dimension_impacts.problem_strength.before, 60);
        assert_eq!(baseline.total_score, 68);
    }

    #[test]
    fn projection_is_total_plus_net_near_the_ceiling() {
        let mut baseline = baseline();
        baseline.total_score = 100;
        // 2*.25 + 0 + 0 + -1*.1 + 0 + 0 = 0.4
        let sim = finalize("x", draft([2, 0, 0, -1, 0, 0]), &baseline, &WeightTable::default());
        assert!((sim.net_score_change - 0.4).abs() < 1e-9);
        assert!((sim.projected_total_score - 100.4).abs() < 1e-9);
    }

    #[test]
    fn risk_worsening_keeps_recommendation() {
        let mut d = draft([-2; 6]);
        d.risk_shifts.market_risk.after = RiskLevel::Critical;
        let sim = finalize("x", d, &baseline(), &WeightTable::default());
        assert_eq!(sim.recommendation, Recommendation::Add);
        assert!(sim.risk_shifts.get(RiskKey::Market).worsened());
        assert!(sim.net_score_change < 0.0);
    }
}
