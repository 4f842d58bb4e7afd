//! Typed projection of stored documents.
//!
//! Every entity has one `encode_*` and one `decode_*` function. Nested
//! structures are stored as stringified JSON; decoding accepts either the
//! string form or an inline object, and rejects anything malformed instead of
//! passing it through.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use ideagate_schema::{
    CompetitiveLandscape, Evaluation, EvaluationRecord, FeatureSimulation, Idea, IdeaIntake,
    IdeaVersion, Recommendation, RiskProfile, ScoreBreakdown, SchemaError, SimulationRecord,
    SpecialistReports, StrategicAnalysis, Validate, Verdict,
};

use crate::store::{Collection, Document};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{collection} record {id}: missing field '{field}'")]
    MissingField {
        collection: Collection,
        id: String,
        field: &'static str,
    },

    #[error("{collection} record {id}: malformed field '{field}': {reason}")]
    Malformed {
        collection: Collection,
        id: String,
        field: &'static str,
        reason: String,
    },

    #[error("{collection} record {id}: {source}")]
    Invalid {
        collection: Collection,
        id: String,
        #[source]
        source: SchemaError,
    },

    #[error("failed to encode field '{field}': {reason}")]
    Encode { field: &'static str, reason: String },
}

struct Reader<'a> {
    collection: Collection,
    doc: &'a Document,
}

impl<'a> Reader<'a> {
    fn new(collection: Collection, doc: &'a Document) -> Self {
        Self { collection, doc }
    }

    fn missing(&self, field: &'static str) -> RecordError {
        RecordError::MissingField {
            collection: self.collection,
            id: self.doc.id.clone(),
            field,
        }
    }

    fn malformed(&self, field: &'static str, reason: impl Into<String>) -> RecordError {
        RecordError::Malformed {
            collection: self.collection,
            id: self.doc.id.clone(),
            field,
            reason: reason.into(),
        }
    }

    fn present(&self, field: &'static str) -> Option<&'a Value> {
        self.doc.data.get(field).filter(|v| !v.is_null())
    }

    fn text(&self, field: &'static str) -> Result<String, RecordError> {
        match self.present(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.malformed(field, format!("expected string, got {other}"))),
            None => Err(self.missing(field)),
        }
    }

    fn text_or_default(&self, field: &'static str) -> Result<String, RecordError> {
        match self.present(field) {
            None => Ok(String::new()),
            Some(_) => self.text(field),
        }
    }

    fn opt_text(&self, field: &'static str) -> Result<Option<String>, RecordError> {
        match self.present(field) {
            None => Ok(None),
            Some(_) => self.text(field).map(Some),
        }
    }

    fn bool(&self, field: &'static str) -> Result<bool, RecordError> {
        match self.present(field) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) if n.as_i64() == Some(0) => Ok(false),
            Some(Value::Number(n)) if n.as_i64() == Some(1) => Ok(true),
            Some(other) => Err(self.malformed(field, format!("expected bool, got {other}"))),
            None => Err(self.missing(field)),
        }
    }

    fn int(&self, field: &'static str, min: i64, max: i64) -> Result<i64, RecordError> {
        let value = self
            .present(field)
            .ok_or_else(|| self.missing(field))?
            .as_i64()
            .ok_or_else(|| self.malformed(field, "expected integer"))?;
        if value < min || value > max {
            return Err(self.malformed(field, format!("{value} outside {min}..={max}")));
        }
        Ok(value)
    }

    fn float(&self, field: &'static str) -> Result<f64, RecordError> {
        self.present(field)
            .ok_or_else(|| self.missing(field))?
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.malformed(field, "expected finite number"))
    }

    fn nested<T: DeserializeOwned>(&self, field: &'static str) -> Result<T, RecordError> {
        let raw = self.present(field).ok_or_else(|| self.missing(field))?;
        let value = match raw {
            Value::String(s) => serde_json::from_str::<Value>(s)
                .map_err(|e| self.malformed(field, e.to_string()))?,
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| self.malformed(field, e.to_string()))
    }

    fn opt_nested<T: DeserializeOwned>(&self, field: &'static str) -> Result<Option<T>, RecordError> {
        match self.present(field) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(_) => self.nested(field).map(Some),
        }
    }

    /// Enum fields are stored as their serde string form, never stringified JSON.
    fn nested_enum<T: DeserializeOwned>(&self, field: &'static str) -> Result<T, RecordError> {
        let raw = self.present(field).ok_or_else(|| self.missing(field))?;
        serde_json::from_value(raw.clone()).map_err(|e| self.malformed(field, e.to_string()))
    }

    fn validated<T: Validate>(&self, value: T) -> Result<T, RecordError> {
        value.validate().map_err(|source| RecordError::Invalid {
            collection: self.collection,
            id: self.doc.id.clone(),
            source,
        })?;
        Ok(value)
    }
}

fn stringify<T: Serialize>(field: &'static str, value: &T) -> Result<Value, RecordError> {
    serde_json::to_string(value)
        .map(Value::String)
        .map_err(|e| RecordError::Encode {
            field,
            reason: e.to_string(),
        })
}

fn enum_value<T: Serialize>(field: &'static str, value: &T) -> Result<Value, RecordError> {
    serde_json::to_value(value).map_err(|e| RecordError::Encode {
        field,
        reason: e.to_string(),
    })
}

fn intake_fields(intake: &IdeaIntake, map: &mut Map<String, Value>) {
    map.insert("idea".into(), intake.idea.clone().into());
    map.insert("target_user".into(), intake.target_user.clone().into());
    map.insert("problem".into(), intake.problem.clone().into());
    map.insert("alternatives".into(), intake.alternatives.clone().into());
    map.insert("timing".into(), intake.timing.clone().into());
    map.insert("founder_fit".into(), intake.founder_fit.clone().into());
    map.insert("stage".into(), intake.stage.clone().into());
}

// ---------------------------------------------------------------- ideas

pub fn encode_idea(
    owner: Option<&str>,
    intake: &IdeaIntake,
    current_version_id: Option<&str>,
) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("owner".into(), owner.map(str::to_string).into());
    intake_fields(intake, &mut map);
    map.insert(
        "current_version_id".into(),
        current_version_id.map(str::to_string).into(),
    );
    map
}

/// Patch that moves the live idea to `intake` and points it at `version_id`.
pub fn encode_idea_pointer(intake: &IdeaIntake, version_id: &str) -> Map<String, Value> {
    let mut map = Map::new();
    intake_fields(intake, &mut map);
    map.insert("current_version_id".into(), version_id.into());
    map
}

pub fn decode_idea(doc: &Document) -> Result<Idea, RecordError> {
    let r = Reader::new(Collection::Ideas, doc);
    let intake = IdeaIntake {
        idea: r.text("idea")?,
        target_user: r.text_or_default("target_user")?,
        problem: r.text_or_default("problem")?,
        alternatives: r.text_or_default("alternatives")?,
        timing: r.text_or_default("timing")?,
        founder_fit: r.text_or_default("founder_fit")?,
        stage: r.text_or_default("stage")?,
    };
    Ok(Idea {
        id: doc.id.clone(),
        owner: r.opt_text("owner")?,
        intake,
        current_version_id: r.opt_text("current_version_id")?,
        created_at: doc.created_at,
        updated_at: doc.updated_at,
    })
}

// ---------------------------------------------------------------- versions

pub fn encode_version(
    idea_id: &str,
    version_number: u32,
    snapshot: &IdeaIntake,
    features: &[String],
    parent_version_id: Option<&str>,
) -> Result<Map<String, Value>, RecordError> {
    let mut map = Map::new();
    map.insert("idea_id".into(), idea_id.into());
    map.insert("version_number".into(), version_number.into());
    map.insert("snapshot".into(), stringify("snapshot", snapshot)?);
    map.insert("features".into(), stringify("features", &features)?);
    map.insert(
        "parent_version_id".into(),
        parent_version_id.map(str::to_string).into(),
    );
    map.insert("diff_summary".into(), Value::Null);
    Ok(map)
}

pub fn decode_version(doc: &Document) -> Result<IdeaVersion, RecordError> {
    let r = Reader::new(Collection::IdeaVersions, doc);
    let version_number = r.int("version_number", 1, i64::from(u32::MAX))?;
    Ok(IdeaVersion {
        id: doc.id.clone(),
        idea_id: r.text("idea_id")?,
        version_number: u32::try_from(version_number)
            .map_err(|e| r.malformed("version_number", e.to_string()))?,
        snapshot: r.nested("snapshot")?,
        features: r.opt_nested("features")?.unwrap_or_default(),
        parent_version_id: r.opt_text("parent_version_id")?,
        diff_summary: r.opt_text("diff_summary")?,
        created_at: doc.created_at,
    })
}

// ---------------------------------------------------------------- evaluations

pub fn encode_evaluation(
    idea_id: &str,
    version_id: &str,
    evaluation: &Evaluation,
    reports: Option<&SpecialistReports>,
) -> Result<Map<String, Value>, RecordError> {
    let mut map = Map::new();
    map.insert("idea_id".into(), idea_id.into());
    map.insert("version_id".into(), version_id.into());
    map.insert("is_current".into(), true.into());
    map.insert(
        "score_breakdown".into(),
        stringify("score_breakdown", &evaluation.score_breakdown)?,
    );
    map.insert(
        "risk_profile".into(),
        stringify("risk_profile", &evaluation.risk_profile)?,
    );
    map.insert("total_score".into(), evaluation.total_score.into());
    map.insert("verdict".into(), enum_value("verdict", &evaluation.verdict)?);
    map.insert("confidence".into(), evaluation.confidence.into());
    map.insert(
        "executive_summary".into(),
        evaluation.executive_summary.clone().into(),
    );
    map.insert(
        "competitive_landscape".into(),
        stringify("competitive_landscape", &evaluation.competitive_landscape)?,
    );
    map.insert(
        "strategic_analysis".into(),
        stringify("strategic_analysis", &evaluation.strategic_analysis)?,
    );
    map.insert(
        "next_steps".into(),
        stringify("next_steps", &evaluation.next_steps)?,
    );
    let reports = match reports {
        Some(reports) => stringify("reports", reports)?,
        None => Value::Null,
    };
    map.insert("reports".into(), reports);
    Ok(map)
}

pub fn decode_evaluation(doc: &Document) -> Result<EvaluationRecord, RecordError> {
    let r = Reader::new(Collection::Evaluations, doc);
    let score_breakdown: ScoreBreakdown = r.nested("score_breakdown")?;
    let risk_profile: RiskProfile = r.nested("risk_profile")?;
    let verdict: Verdict = r.nested_enum("verdict")?;
    let evaluation = Evaluation {
        score_breakdown: r.validated(score_breakdown)?,
        risk_profile: r.validated(risk_profile)?,
        total_score: r.int("total_score", 0, 100)? as u8,
        verdict,
        confidence: r.int("confidence", 0, 100)? as u8,
        executive_summary: r.text_or_default("executive_summary")?,
        competitive_landscape: r
            .opt_nested::<CompetitiveLandscape>("competitive_landscape")?
            .unwrap_or_else(|| CompetitiveLandscape {
                direct_competitors: Vec::new(),
                indirect_competitors: Vec::new(),
                positioning: String::new(),
            }),
        strategic_analysis: r
            .opt_nested::<StrategicAnalysis>("strategic_analysis")?
            .unwrap_or_else(|| StrategicAnalysis {
                strengths: Vec::new(),
                weaknesses: Vec::new(),
            }),
        next_steps: r.opt_nested("next_steps")?.unwrap_or_default(),
    };
    Ok(EvaluationRecord {
        id: doc.id.clone(),
        idea_id: r.text("idea_id")?,
        version_id: r.text("version_id")?,
        is_current: r.bool("is_current")?,
        created_at: doc.created_at,
        evaluation,
        reports: r.opt_nested("reports")?,
    })
}

// ---------------------------------------------------------------- simulations

pub fn encode_simulation(
    idea_id: &str,
    version_id: &str,
    evaluation_id: &str,
    simulation: &FeatureSimulation,
) -> Result<Map<String, Value>, RecordError> {
    let mut map = Map::new();
    map.insert("idea_id".into(), idea_id.into());
    map.insert("version_id".into(), version_id.into());
    map.insert("evaluation_id".into(), evaluation_id.into());
    map.insert("feature".into(), simulation.feature.clone().into());
    map.insert(
        "dimension_impacts".into(),
        stringify("dimension_impacts", &simulation.dimension_impacts)?,
    );
    map.insert(
        "risk_shifts".into(),
        stringify("risk_shifts", &simulation.risk_shifts)?,
    );
    map.insert("net_score_change".into(), simulation.net_score_change.into());
    map.insert(
        "projected_total_score".into(),
        simulation.projected_total_score.into(),
    );
    map.insert(
        "strategic_impact".into(),
        simulation.strategic_impact.clone().into(),
    );
    map.insert(
        "recommendation".into(),
        enum_value("recommendation", &simulation.recommendation)?,
    );
    map.insert("rationale".into(), simulation.rationale.clone().into());
    Ok(map)
}

pub fn decode_simulation(doc: &Document) -> Result<SimulationRecord, RecordError> {
    let r = Reader::new(Collection::FeatureSimulations, doc);
    let recommendation: Recommendation = r.nested_enum("recommendation")?;
    let simulation = FeatureSimulation {
        feature: r.text("feature")?,
        dimension_impacts: r.nested("dimension_impacts")?,
        risk_shifts: r.nested("risk_shifts")?,
        net_score_change: r.float("net_score_change")?,
        projected_total_score: r.float("projected_total_score")?,
        strategic_impact: r.text_or_default("strategic_impact")?,
        recommendation,
        rationale: r.text_or_default("rationale")?,
    };
    Ok(SimulationRecord {
        id: doc.id.clone(),
        idea_id: r.text("idea_id")?,
        version_id: r.text("version_id")?,
        evaluation_id: r.text("evaluation_id")?,
        created_at: doc.created_at,
        simulation,
    })
}
