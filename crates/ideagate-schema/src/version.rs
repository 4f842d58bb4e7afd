use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intake::IdeaIntake;

/// The live idea record. Its intake fields may drift ahead of the current
/// version after `update_field`; scoring is stale until re-evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub intake: IdeaIntake,
    #[serde(default)]
    pub current_version_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of an idea at one point in its evolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaVersion {
    pub id: String,
    pub idea_id: String,
    pub version_number: u32,
    pub snapshot: IdeaIntake,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub parent_version_id: Option<String>,
    /// Attached once both this version's and its parent's evaluations exist.
    #[serde(default)]
    pub diff_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}
