use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{require_range, require_text, SchemaError, Validate};

/// The six scored dimensions of an idea, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    ProblemStrength,
    MarketOpportunity,
    DifferentiationStrength,
    TimingReadiness,
    FounderLeverage,
    ExecutionFeasibility,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::ProblemStrength,
        Dimension::MarketOpportunity,
        Dimension::DifferentiationStrength,
        Dimension::TimingReadiness,
        Dimension::FounderLeverage,
        Dimension::ExecutionFeasibility,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::ProblemStrength => "problem_strength",
            Self::MarketOpportunity => "market_opportunity",
            Self::DifferentiationStrength => "differentiation_strength",
            Self::TimingReadiness => "timing_readiness",
            Self::FounderLeverage => "founder_leverage",
            Self::ExecutionFeasibility => "execution_feasibility",
        }
    }

    /// Human-readable lowercase label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ProblemStrength => "problem strength",
            Self::MarketOpportunity => "market opportunity",
            Self::DifferentiationStrength => "differentiation strength",
            Self::TimingReadiness => "timing readiness",
            Self::FounderLeverage => "founder leverage",
            Self::ExecutionFeasibility => "execution feasibility",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One value per [`Dimension`]. Every dimension is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerDimension<T> {
    pub problem_strength: T,
    pub market_opportunity: T,
    pub differentiation_strength: T,
    pub timing_readiness: T,
    pub founder_leverage: T,
    pub execution_feasibility: T,
}

impl<T> PerDimension<T> {
    pub fn from_fn(mut f: impl FnMut(Dimension) -> T) -> Self {
        Self {
            problem_strength: f(Dimension::ProblemStrength),
            market_opportunity: f(Dimension::MarketOpportunity),
            differentiation_strength: f(Dimension::DifferentiationStrength),
            timing_readiness: f(Dimension::TimingReadiness),
            founder_leverage: f(Dimension::FounderLeverage),
            execution_feasibility: f(Dimension::ExecutionFeasibility),
        }
    }

    pub fn get(&self, dimension: Dimension) -> &T {
        match dimension {
            Dimension::ProblemStrength => &self.problem_strength,
            Dimension::MarketOpportunity => &self.market_opportunity,
            Dimension::DifferentiationStrength => &self.differentiation_strength,
            Dimension::TimingReadiness => &self.timing_readiness,
            Dimension::FounderLeverage => &self.founder_leverage,
            Dimension::ExecutionFeasibility => &self.execution_feasibility,
        }
    }

    pub fn get_mut(&mut self, dimension: Dimension) -> &mut T {
        match dimension {
            Dimension::ProblemStrength => &mut self.problem_strength,
            Dimension::MarketOpportunity => &mut self.market_opportunity,
            Dimension::DifferentiationStrength => &mut self.differentiation_strength,
            Dimension::TimingReadiness => &mut self.timing_readiness,
            Dimension::FounderLeverage => &mut self.founder_leverage,
            Dimension::ExecutionFeasibility => &mut self.execution_feasibility,
        }
    }

    /// Iterate in canonical dimension order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &T)> {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Dimension, &T) -> U) -> PerDimension<U> {
        PerDimension::from_fn(|d| f(d, self.get(d)))
    }
}

/// A 0–100 score with its supporting insight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub score: u8,
    pub insight: String,
}

pub type ScoreBreakdown = PerDimension<DimensionScore>;

impl ScoreBreakdown {
    pub fn score(&self, dimension: Dimension) -> u8 {
        self.get(dimension).score
    }
}

impl Validate for ScoreBreakdown {
    fn validate(&self) -> Result<(), SchemaError> {
        for (dimension, entry) in self.iter() {
            let field = format!("score_breakdown.{}", dimension.key());
            require_range(&format!("{field}.score"), i64::from(entry.score), 0, 100)?;
            require_text(&format!("{field}.insight"), &entry.insight)?;
        }
        Ok(())
    }
}

/// The four risk categories, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskKey {
    #[serde(rename = "market_risk")]
    Market,
    #[serde(rename = "execution_risk")]
    Execution,
    #[serde(rename = "timing_risk")]
    Timing,
    #[serde(rename = "technical_risk")]
    Technical,
}

impl RiskKey {
    pub const ALL: [RiskKey; 4] = [
        RiskKey::Market,
        RiskKey::Execution,
        RiskKey::Timing,
        RiskKey::Technical,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Market => "market_risk",
            Self::Execution => "execution_risk",
            Self::Timing => "timing_risk",
            Self::Technical => "technical_risk",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Market => "market risk",
            Self::Execution => "execution risk",
            Self::Timing => "timing risk",
            Self::Technical => "technical risk",
        }
    }
}

/// One value per [`RiskKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerRisk<T> {
    pub market_risk: T,
    pub execution_risk: T,
    pub timing_risk: T,
    pub technical_risk: T,
}

impl<T> PerRisk<T> {
    pub fn from_fn(mut f: impl FnMut(RiskKey) -> T) -> Self {
        Self {
            market_risk: f(RiskKey::Market),
            execution_risk: f(RiskKey::Execution),
            timing_risk: f(RiskKey::Timing),
            technical_risk: f(RiskKey::Technical),
        }
    }

    pub fn get(&self, key: RiskKey) -> &T {
        match key {
            RiskKey::Market => &self.market_risk,
            RiskKey::Execution => &self.execution_risk,
            RiskKey::Timing => &self.timing_risk,
            RiskKey::Technical => &self.technical_risk,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RiskKey, &T)> {
        RiskKey::ALL.into_iter().map(move |k| (k, self.get(k)))
    }
}

/// Severity ladder; ordering follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn severity(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    /// Number of severity steps between two levels.
    pub fn steps_to(&self, other: RiskLevel) -> u8 {
        self.severity().abs_diff(other.severity())
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: u8,
    pub reason: String,
}

pub type RiskProfile = PerRisk<RiskAssessment>;

impl RiskProfile {
    pub fn level(&self, key: RiskKey) -> RiskLevel {
        self.get(key).level
    }
}

impl Validate for RiskProfile {
    fn validate(&self) -> Result<(), SchemaError> {
        for (key, entry) in self.iter() {
            let field = format!("risk_profile.{}", key.key());
            require_range(&format!("{field}.score"), i64::from(entry.score), 0, 100)?;
            require_text(&format!("{field}.reason"), &entry.reason)?;
        }
        Ok(())
    }
}
