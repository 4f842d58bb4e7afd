use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{require_text, SchemaError, Validate};

/// Founder-supplied description of an idea and its context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaIntake {
    pub idea: String,
    #[serde(default)]
    pub target_user: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub alternatives: String,
    /// Why now.
    #[serde(default)]
    pub timing: String,
    /// Why this founder.
    #[serde(default)]
    pub founder_fit: String,
    /// Free-form stage label ("idea", "prototype", "revenue", ...).
    #[serde(default)]
    pub stage: String,
}

impl IdeaIntake {
    /// The six descriptive fields that feed the completeness signal.
    /// `stage` is a label, not a description, and is excluded.
    pub fn descriptive_fields(&self) -> [&str; 6] {
        [
            &self.idea,
            &self.target_user,
            &self.problem,
            &self.alternatives,
            &self.timing,
            &self.founder_fit,
        ]
    }

    pub fn field(&self, field: EditableField) -> &str {
        match field {
            EditableField::Idea => &self.idea,
            EditableField::TargetUser => &self.target_user,
            EditableField::Problem => &self.problem,
            EditableField::Alternatives => &self.alternatives,
            EditableField::Timing => &self.timing,
            EditableField::FounderFit => &self.founder_fit,
            EditableField::Stage => &self.stage,
        }
    }

    pub fn set_field(&mut self, field: EditableField, value: impl Into<String>) {
        let value = value.into();
        match field {
            EditableField::Idea => self.idea = value,
            EditableField::TargetUser => self.target_user = value,
            EditableField::Problem => self.problem = value,
            EditableField::Alternatives => self.alternatives = value,
            EditableField::Timing => self.timing = value,
            EditableField::FounderFit => self.founder_fit = value,
            EditableField::Stage => self.stage = value,
        }
    }

    /// Apply non-empty overrides on top of this intake.
    pub fn merged_with(&self, overrides: &IntakeOverrides) -> IdeaIntake {
        let mut merged = self.clone();
        for field in EditableField::ALL {
            if let Some(value) = overrides.get(field) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    merged.set_field(field, trimmed);
                }
            }
        }
        merged
    }

    /// Render as a labelled block for prompts.
    pub fn to_prompt_text(&self) -> String {
        let mut parts = Vec::new();
        for field in EditableField::ALL {
            let value = self.field(field).trim();
            let value = if value.is_empty() { "(not provided)" } else { value };
            parts.push(format!("{}: {}", field.label(), value));
        }
        parts.join("\n")
    }
}

impl Validate for IdeaIntake {
    fn validate(&self) -> Result<(), SchemaError> {
        require_text("idea", &self.idea)
    }
}

/// Partial intake used by re-evaluation; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntakeOverrides {
    #[serde(default)]
    pub idea: Option<String>,
    #[serde(default)]
    pub target_user: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub alternatives: Option<String>,
    #[serde(default)]
    pub timing: Option<String>,
    #[serde(default)]
    pub founder_fit: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
}

impl IntakeOverrides {
    pub fn get(&self, field: EditableField) -> Option<&str> {
        match field {
            EditableField::Idea => self.idea.as_deref(),
            EditableField::TargetUser => self.target_user.as_deref(),
            EditableField::Problem => self.problem.as_deref(),
            EditableField::Alternatives => self.alternatives.as_deref(),
            EditableField::Timing => self.timing.as_deref(),
            EditableField::FounderFit => self.founder_fit.as_deref(),
            EditableField::Stage => self.stage.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        EditableField::ALL
            .into_iter()
            .all(|f| self.get(f).map(|v| v.trim().is_empty()).unwrap_or(true))
    }

    /// Names of the fields that carry a non-blank override.
    pub fn changed_fields(&self) -> Vec<EditableField> {
        EditableField::ALL
            .into_iter()
            .filter(|f| self.get(*f).map(|v| !v.trim().is_empty()).unwrap_or(false))
            .collect()
    }
}

/// The seven intake fields a founder may edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditableField {
    Idea,
    TargetUser,
    Problem,
    Alternatives,
    Timing,
    FounderFit,
    Stage,
}

impl EditableField {
    pub const ALL: [EditableField; 7] = [
        EditableField::Idea,
        EditableField::TargetUser,
        EditableField::Problem,
        EditableField::Alternatives,
        EditableField::Timing,
        EditableField::FounderFit,
        EditableField::Stage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::TargetUser => "target_user",
            Self::Problem => "problem",
            Self::Alternatives => "alternatives",
            Self::Timing => "timing",
            Self::FounderFit => "founder_fit",
            Self::Stage => "stage",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idea => "Idea",
            Self::TargetUser => "Target user",
            Self::Problem => "Problem",
            Self::Alternatives => "Current alternatives",
            Self::Timing => "Why now",
            Self::FounderFit => "Founder fit",
            Self::Stage => "Stage",
        }
    }
}

impl fmt::Display for EditableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditableField {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| {
                SchemaError::invalid(
                    "field",
                    format!(
                        "unknown field '{s}', expected one of: {}",
                        Self::ALL.map(|f| f.as_str()).join(", ")
                    ),
                )
            })
    }
}
