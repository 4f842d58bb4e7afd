use serde::{Deserialize, Serialize};

use crate::error::{require_items, require_text, SchemaError, Validate};

/// Three-step scale used by several report fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketSaturation {
    #[serde(rename = "Blue Ocean")]
    BlueOcean,
    Competitive,
    Oversaturated,
}

/// Idea / strategy analyst output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaReport {
    pub category: String,
    pub value_proposition: String,
    pub technical_complexity: Level,
    pub tech_notes: String,
    pub monetization: String,
    pub key_assumptions: Vec<String>,
}

impl Validate for IdeaReport {
    fn validate(&self) -> Result<(), SchemaError> {
        require_text("category", &self.category)?;
        require_text("value_proposition", &self.value_proposition)?;
        require_text("tech_notes", &self.tech_notes)?;
        require_text("monetization", &self.monetization)?;
        require_items("key_assumptions", &self.key_assumptions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    pub positioning: String,
}

/// Market / competition analyst output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketReport {
    pub problem_severity: Level,
    pub market_saturation: MarketSaturation,
    pub competitors: Vec<Competitor>,
    pub differentiation: String,
    pub market_size_note: String,
}

impl Validate for MarketReport {
    fn validate(&self) -> Result<(), SchemaError> {
        for (idx, competitor) in self.competitors.iter().enumerate() {
            require_text(&format!("competitors[{idx}].name"), &competitor.name)?;
            require_text(&format!("competitors[{idx}].positioning"), &competitor.positioning)?;
        }
        require_text("differentiation", &self.differentiation)?;
        require_text("market_size_note", &self.market_size_note)
    }
}

/// Timing / leverage analyst output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingReport {
    pub tailwinds: Vec<String>,
    pub headwinds: Vec<String>,
    pub founder_fit: Level,
    pub founder_fit_rationale: String,
    pub why_now: String,
}

impl Validate for TimingReport {
    fn validate(&self) -> Result<(), SchemaError> {
        require_items("tailwinds", &self.tailwinds)?;
        // Headwinds may legitimately be empty, but listed ones must have content.
        for (idx, item) in self.headwinds.iter().enumerate() {
            require_text(&format!("headwinds[{idx}]"), item)?;
        }
        require_text("founder_fit_rationale", &self.founder_fit_rationale)?;
        require_text("why_now", &self.why_now)
    }
}

/// The three specialist reports of one evaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistReports {
    pub idea: IdeaReport,
    pub market: MarketReport,
    pub timing: TimingReport,
}
