use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require_range, require_text, SchemaError, Validate};
use crate::scoring::{PerDimension, PerRisk, RiskLevel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionImpact {
    pub before: u8,
    pub after: u8,
    pub delta: i16,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskShift {
    pub before: RiskLevel,
    pub after: RiskLevel,
    pub reasoning: String,
}

impl RiskShift {
    pub fn worsened(&self) -> bool {
        self.after > self.before
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Add,
    Skip,
    #[serde(rename = "Needs Research")]
    NeedsResearch,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Skip => "Skip",
            Self::NeedsResearch => "Needs Research",
        }
    }
}

/// Per-dimension and per-risk projection produced by the generation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationDraft {
    pub dimension_impacts: PerDimension<DimensionImpact>,
    pub risk_shifts: PerRisk<RiskShift>,
    pub strategic_impact: String,
    pub recommendation: Recommendation,
    pub rationale: String,
}

impl Validate for SimulationDraft {
    fn validate(&self) -> Result<(), SchemaError> {
        for (dimension, impact) in self.dimension_impacts.iter() {
            let field = format!("dimension_impacts.{}", dimension.key());
            require_range(&format!("{field}.before"), i64::from(impact.before), 0, 100)?;
            require_range(&format!("{field}.after"), i64::from(impact.after), 0, 100)?;
            require_range(&format!("{field}.delta"), i64::from(impact.delta), -100, 100)?;
            let expected = i16::from(impact.after) - i16::from(impact.before);
            if impact.delta != expected {
                return Err(SchemaError::invalid(
                    format!("{field}.delta"),
                    format!("delta {} does not equal after - before ({expected})", impact.delta),
                ));
            }
            require_text(&format!("{field}.reasoning"), &impact.reasoning)?;
        }
        for (key, shift) in self.risk_shifts.iter() {
            require_text(&format!("risk_shifts.{}.reasoning", key.key()), &shift.reasoning)?;
        }
        require_text("strategic_impact", &self.strategic_impact)?;
        require_text("rationale", &self.rationale)
    }
}

/// A hypothetical projection of adding one feature to an evaluated version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSimulation {
    pub feature: String,
    pub dimension_impacts: PerDimension<DimensionImpact>,
    pub risk_shifts: PerRisk<RiskShift>,
    pub net_score_change: f64,
    pub projected_total_score: f64,
    pub strategic_impact: String,
    pub recommendation: Recommendation,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub id: String,
    pub idea_id: String,
    pub version_id: String,
    pub evaluation_id: String,
    pub created_at: DateTime<Utc>,
    pub simulation: FeatureSimulation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Dimension;

    fn draft() -> SimulationDraft {
        SimulationDraft {
            dimension_impacts: PerDimension::from_fn(|_| DimensionImpact {
                before: 60,
                after: 65,
                delta: 5,
                reasoning: "helps".into(),
            }),
            risk_shifts: PerRisk::from_fn(|_| RiskShift {
                before: RiskLevel::Medium,
                after: RiskLevel::Medium,
                reasoning: "no change".into(),
            }),
            strategic_impact: "Broadens the wedge".into(),
            recommendation: Recommendation::Add,
            rationale: "Cheap and differentiating".into(),
        }
    }

    #[test]
    fn consistent_draft_validates() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn delta_must_match_before_and_after() {
        let mut draft = draft();
        draft.dimension_impacts.get_mut(Dimension::FounderLeverage).delta = 9;
        let err = draft.validate().unwrap_err();
        assert!(matches!(err, SchemaError::Invalid { field, .. } if field.contains("founder_leverage")));
    }

    #[test]
    fn recommendation_serializes_needs_research_with_space() {
        let json = serde_json::to_string(&Recommendation::NeedsResearch).unwrap();
        assert_eq!(json, "\"Needs Research\"");
        assert!(serde_json::from_str::<Recommendation>("\"Maybe\"").is_err());
    }

    #[test]
    fn risk_shift_detects_worsening() {
        let shift = RiskShift {
            before: RiskLevel::Low,
            after: RiskLevel::Medium,
            reasoning: "more surface".into(),
        };
        assert!(shift.worsened());
    }
}
