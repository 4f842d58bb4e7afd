//! Version-over-version comparison and read-only history statistics.

use std::collections::HashSet;

use ideagate_schema::{
    Dimension, Evaluation, IdeaVersion, PerDimension, RiskKey, SchemaError, Validate, Verdict,
};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::generation::{generate_validated, no_check, StructuredCall};
use crate::prompts;
use crate::router::LlmRouter;
use crate::schemas;
use crate::simulator::round_tenth;

pub const RISK_UNCHANGED: &str = "unchanged";
pub const RISK_FIRST_MEASURED: &str = "first measured version";

/// Score movement of one dimension between two evaluations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDelta {
    pub dimension: Dimension,
    pub before: Option<u8>,
    pub after: u8,
    /// `None` when there is no previous evaluation.
    pub delta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDiff {
    pub deltas: Vec<DimensionDelta>,
    pub previous_total: Option<u8>,
    pub next_total: u8,
    pub previous_verdict: Option<Verdict>,
    pub next_verdict: Verdict,
    pub risk_shift: String,
}

impl VersionDiff {
    pub fn between(previous: Option<&Evaluation>, next: &Evaluation) -> Self {
        let deltas = Dimension::ALL
            .into_iter()
            .map(|dimension| {
                let after = next.score_breakdown.score(dimension);
                let before = previous.map(|p| p.score_breakdown.score(dimension));
                DimensionDelta {
                    dimension,
                    before,
                    after,
                    delta: before.map(|b| round_tenth(f64::from(after) - f64::from(b))),
                }
            })
            .collect();

        Self {
            deltas,
            previous_total: previous.map(|p| p.total_score),
            next_total: next.total_score,
            previous_verdict: previous.map(|p| p.verdict),
            next_verdict: next.verdict,
            risk_shift: risk_shift(previous, next),
        }
    }

    pub fn delta(&self, dimension: Dimension) -> Option<f64> {
        self.deltas
            .iter()
            .find(|d| d.dimension == dimension)
            .and_then(|d| d.delta)
    }

    /// Largest strictly positive delta, else largest strictly negative one.
    /// Ties resolve to the earlier dimension.
    pub fn headline_delta(&self) -> Option<(Dimension, f64)> {
        let measured = self
            .deltas
            .iter()
            .filter_map(|d| d.delta.map(|delta| (d.dimension, delta)));

        let mut gain: Option<(Dimension, f64)> = None;
        let mut drop: Option<(Dimension, f64)> = None;
        for (dimension, delta) in measured {
            if delta > 0.0 && gain.map_or(true, |(_, best)| delta > best) {
                gain = Some((dimension, delta));
            }
            if delta < 0.0 && drop.map_or(true, |(_, worst)| delta < worst) {
                drop = Some((dimension, delta));
            }
        }
        gain.or(drop)
    }
}

/// First risk whose level changed, in canonical order.
pub fn risk_shift(previous: Option<&Evaluation>, next: &Evaluation) -> String {
    let Some(previous) = previous else {
        return RISK_FIRST_MEASURED.to_string();
    };
    RiskKey::ALL
        .into_iter()
        .find_map(|key| {
            let before = previous.risk_profile.level(key);
            let after = next.risk_profile.level(key);
            (before != after).then(|| format!("{} moved from {before} to {after}", key.label()))
        })
        .unwrap_or_else(|| RISK_UNCHANGED.to_string())
}

/// Deterministic summary. Total over its inputs.
pub fn fallback_summary(previous: Option<&Evaluation>, next: &Evaluation) -> String {
    let diff = VersionDiff::between(previous, next);
    let mut sentences = Vec::with_capacity(3);

    match (diff.previous_total, diff.previous_verdict) {
        (Some(before), Some(verdict)) => {
            sentences.push(format!("Score {before} → {}.", diff.next_total));
            if verdict == diff.next_verdict {
                sentences.push(format!("Verdict unchanged at {}.", diff.next_verdict));
            } else {
                sentences.push(format!("Verdict {verdict} → {}.", diff.next_verdict));
            }
        }
        _ => {
            sentences.push(format!("Score established at {}.", diff.next_total));
            sentences.push(format!("Verdict set to {}.", diff.next_verdict));
        }
    }

    if let Some((dimension, delta)) = diff.headline_delta() {
        let kind = if delta > 0.0 { "gain" } else { "drop" };
        sentences.push(format!(
            "Biggest {kind} was {} ({}).",
            dimension.label(),
            signed(delta)
        ));
    }

    sentences.join(" ")
}

fn signed(value: f64) -> String {
    let sign = if value > 0.0 { "+" } else { "" };
    if value.fract() == 0.0 {
        format!("{sign}{}", value as i64)
    } else {
        format!("{sign}{value:.1}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub text: String,
    pub source: SummarySource,
}

#[derive(Debug, Deserialize)]
struct GeneratedSummary {
    summary: String,
}

impl Validate for GeneratedSummary {
    fn validate(&self) -> Result<(), SchemaError> {
        if self.summary.trim().is_empty() {
            return Err(SchemaError::missing("summary"));
        }
        Ok(())
    }
}

/// Generated summary with deterministic fallback. Never fails.
pub async fn summarize(
    router: &LlmRouter,
    config: &EngineConfig,
    previous: Option<&Evaluation>,
    next: &Evaluation,
) -> DiffSummary {
    let fallback = fallback_summary(previous, next);
    let diff = VersionDiff::between(previous, next);

    let mut facts = vec![fallback.clone(), format!("Risk shift: {}.", diff.risk_shift)];
    for d in &diff.deltas {
        match d.delta {
            Some(delta) => facts.push(format!("{}: {}", d.dimension.label(), signed(delta))),
            None => facts.push(format!("{}: {} (new)", d.dimension.label(), d.after)),
        }
    }

    let call = StructuredCall {
        policy: &config.models.summary,
        system: prompts::SUMMARY_SYSTEM,
        prompt: prompts::diff_summary(&facts.join("\n")),
        format: schemas::diff_summary(),
    };
    match generate_validated::<GeneratedSummary, _>(
        router,
        call,
        config.generation.max_attempts,
        no_check,
    )
    .await
    {
        Ok(generated) => DiffSummary {
            text: generated.summary.trim().to_string(),
            source: SummarySource::Generated,
        },
        Err(err) => {
            tracing::warn!("diff summary generation failed, using fallback: {err}");
            DiffSummary {
                text: fallback,
                source: SummarySource::Fallback,
            }
        }
    }
}

/// Consecutive strict increases walking back from the latest total.
pub fn improvement_streak(totals: &[u8]) -> u32 {
    let mut streak = 0;
    for pair in totals.windows(2).rev() {
        if pair[1] > pair[0] {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Dimension with the largest increase from the earliest to the latest
/// evaluation. `None` with fewer than two evaluations or no increase.
pub fn biggest_gain(evaluations: &[&Evaluation]) -> Option<(Dimension, i16)> {
    let (first, last) = match evaluations {
        [first, .., last] => (first, last),
        _ => return None,
    };
    let deltas: PerDimension<i16> = PerDimension::from_fn(|d| {
        i16::from(last.score_breakdown.score(d)) - i16::from(first.score_breakdown.score(d))
    });
    deltas
        .iter()
        .filter(|(_, delta)| **delta > 0)
        .fold(None, |best: Option<(Dimension, i16)>, (d, delta)| match best {
            Some((_, top)) if top >= *delta => best,
            _ => Some((d, *delta)),
        })
}

/// Walk `parent_version_id` from `version_id` back to the root.
///
/// Returns the chain newest first. Stops at a missing parent or a cycle.
pub fn lineage<'a>(versions: &'a [IdeaVersion], version_id: &str) -> Vec<&'a IdeaVersion> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(version_id);

    while let Some(id) = cursor {
        if !seen.insert(id) {
            tracing::warn!(version_id = id, "version lineage contains a cycle");
            break;
        }
        let Some(version) = versions.iter().find(|v| v.id == id) else {
            break;
        };
        chain.push(version);
        cursor = version.parent_version_id.as_deref();
    }
    chain
}
