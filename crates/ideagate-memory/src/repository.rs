use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};

use ideagate_schema::{
    EditableField, Evaluation, EvaluationRecord, FeatureSimulation, Idea, IdeaIntake, IdeaVersion,
    SimulationRecord, SpecialistReports,
};

use crate::records;
use crate::store::{Collection, Direction, DocumentStore, Query};

/// Typed access to the engine's four collections.
///
/// Writes are single-document; multi-step sequences are ordered by the caller.
#[derive(Clone)]
pub struct IdeaRepository {
    store: Arc<dyn DocumentStore>,
}

impl IdeaRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create_idea(&self, owner: Option<&str>, intake: &IdeaIntake) -> Result<Idea> {
        let doc = self
            .store
            .create(Collection::Ideas, records::encode_idea(owner, intake, None))
            .await?;
        Ok(records::decode_idea(&doc)?)
    }

    pub async fn get_idea(&self, idea_id: &str) -> Result<Option<Idea>> {
        match self.store.get(Collection::Ideas, idea_id).await? {
            Some(doc) => Ok(Some(records::decode_idea(&doc)?)),
            None => Ok(None),
        }
    }

    /// Move the idea's live fields to `intake` and its pointer to `version_id`.
    pub async fn set_current_version(
        &self,
        idea_id: &str,
        intake: &IdeaIntake,
        version_id: &str,
    ) -> Result<Idea> {
        let doc = self
            .store
            .update(
                Collection::Ideas,
                idea_id,
                records::encode_idea_pointer(intake, version_id),
            )
            .await?;
        Ok(records::decode_idea(&doc)?)
    }

    pub async fn update_intake_field(
        &self,
        idea_id: &str,
        field: EditableField,
        value: &str,
    ) -> Result<Idea> {
        let mut patch = Map::new();
        patch.insert(field.as_str().to_string(), Value::String(value.to_string()));
        let doc = self.store.update(Collection::Ideas, idea_id, patch).await?;
        Ok(records::decode_idea(&doc)?)
    }

    pub async fn create_version(
        &self,
        idea_id: &str,
        version_number: u32,
        snapshot: &IdeaIntake,
        features: &[String],
        parent_version_id: Option<&str>,
    ) -> Result<IdeaVersion> {
        let data = records::encode_version(
            idea_id,
            version_number,
            snapshot,
            features,
            parent_version_id,
        )?;
        let doc = self.store.create(Collection::IdeaVersions, data).await?;
        tracing::debug!(idea_id, version_number, version_id = %doc.id, "version created");
        Ok(records::decode_version(&doc)?)
    }

    pub async fn get_version(&self, version_id: &str) -> Result<Option<IdeaVersion>> {
        match self.store.get(Collection::IdeaVersions, version_id).await? {
            Some(doc) => Ok(Some(records::decode_version(&doc)?)),
            None => Ok(None),
        }
    }

    /// All versions of an idea, oldest first.
    pub async fn list_versions(&self, idea_id: &str) -> Result<Vec<IdeaVersion>> {
        let docs = self
            .store
            .list(
                Collection::IdeaVersions,
                Query::new()
                    .filter("idea_id", idea_id)
                    .order_by("version_number", Direction::Asc),
            )
            .await?;
        docs.iter()
            .map(|doc| records::decode_version(doc).map_err(Into::into))
            .collect()
    }

    /// Highest existing version number, 0 when the idea has none.
    pub async fn max_version_number(&self, idea_id: &str) -> Result<u32> {
        let docs = self
            .store
            .list(
                Collection::IdeaVersions,
                Query::new()
                    .filter("idea_id", idea_id)
                    .order_by("version_number", Direction::Desc)
                    .limit(1),
            )
            .await?;
        match docs.first() {
            Some(doc) => Ok(records::decode_version(doc)?.version_number),
            None => Ok(0),
        }
    }

    pub async fn attach_diff_summary(&self, version_id: &str, summary: &str) -> Result<()> {
        let mut patch = Map::new();
        patch.insert("diff_summary".into(), Value::String(summary.to_string()));
        self.store
            .update(Collection::IdeaVersions, version_id, patch)
            .await?;
        Ok(())
    }

    /// Persist `evaluation` as the current one for its version, demoting any
    /// earlier current evaluation of that version.
    pub async fn create_evaluation(
        &self,
        idea_id: &str,
        version_id: &str,
        evaluation: &Evaluation,
        reports: Option<&SpecialistReports>,
    ) -> Result<EvaluationRecord> {
        let previous = self
            .store
            .list(
                Collection::Evaluations,
                Query::new()
                    .filter("version_id", version_id)
                    .filter("is_current", true),
            )
            .await?;
        for doc in previous {
            let mut patch = Map::new();
            patch.insert("is_current".into(), Value::Bool(false));
            self.store
                .update(Collection::Evaluations, &doc.id, patch)
                .await?;
        }

        let data = records::encode_evaluation(idea_id, version_id, evaluation, reports)?;
        let doc = self.store.create(Collection::Evaluations, data).await?;
        Ok(records::decode_evaluation(&doc)?)
    }

    pub async fn current_evaluation(&self, version_id: &str) -> Result<Option<EvaluationRecord>> {
        let docs = self
            .store
            .list(
                Collection::Evaluations,
                Query::new()
                    .filter("version_id", version_id)
                    .filter("is_current", true)
                    .order_by("created_at", Direction::Desc)
                    .limit(1),
            )
            .await?;
        match docs.first() {
            Some(doc) => Ok(Some(records::decode_evaluation(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn create_simulation(
        &self,
        idea_id: &str,
        version_id: &str,
        evaluation_id: &str,
        simulation: &FeatureSimulation,
    ) -> Result<SimulationRecord> {
        let data = records::encode_simulation(idea_id, version_id, evaluation_id, simulation)?;
        let doc = self
            .store
            .create(Collection::FeatureSimulations, data)
            .await?;
        Ok(records::decode_simulation(&doc)?)
    }

    /// Simulations run against a version, newest first.
    pub async fn list_simulations(&self, version_id: &str) -> Result<Vec<SimulationRecord>> {
        let docs = self
            .store
            .list(
                Collection::FeatureSimulations,
                Query::new()
                    .filter("version_id", version_id)
                    .order_by("created_at", Direction::Desc),
            )
            .await?;
        docs.iter()
            .map(|doc| records::decode_simulation(doc).map_err(Into::into))
            .collect()
    }
}
