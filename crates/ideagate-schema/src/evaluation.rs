use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require_items, require_text, SchemaError, Validate};
use crate::report::SpecialistReports;
use crate::scoring::{RiskProfile, ScoreBreakdown};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Go,
    Refine,
    Kill,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::Refine => "REFINE",
            Self::Kill => "KILL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitiveLandscape {
    pub direct_competitors: Vec<String>,
    pub indirect_competitors: Vec<String>,
    pub positioning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategicAnalysis {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

/// Raw synthesis requested from the generation provider, before any of the
/// deterministic derivations (total, confidence, verdict) are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    pub score_breakdown: ScoreBreakdown,
    pub risk_profile: RiskProfile,
    pub competitive_landscape: CompetitiveLandscape,
    pub strategic_analysis: StrategicAnalysis,
    pub next_steps: Vec<String>,
    pub executive_summary: String,
}

impl Validate for Synthesis {
    fn validate(&self) -> Result<(), SchemaError> {
        self.score_breakdown.validate()?;
        self.risk_profile.validate()?;
        require_text(
            "competitive_landscape.positioning",
            &self.competitive_landscape.positioning,
        )?;
        require_items("strategic_analysis.strengths", &self.strategic_analysis.strengths)?;
        require_items("strategic_analysis.weaknesses", &self.strategic_analysis.weaknesses)?;
        require_items("next_steps", &self.next_steps)?;
        require_text("executive_summary", &self.executive_summary)
    }
}

/// A complete, quantified verdict on one idea version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score_breakdown: ScoreBreakdown,
    pub risk_profile: RiskProfile,
    pub total_score: u8,
    pub verdict: Verdict,
    pub confidence: u8,
    pub executive_summary: String,
    pub competitive_landscape: CompetitiveLandscape,
    pub strategic_analysis: StrategicAnalysis,
    pub next_steps: Vec<String>,
}

/// A persisted evaluation bound to an idea version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: String,
    pub idea_id: String,
    pub version_id: String,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub evaluation: Evaluation,
    #[serde(default)]
    pub reports: Option<SpecialistReports>,
}
