use thiserror::Error;

use ideagate_schema::SchemaError;

/// Failure taxonomy of the evaluation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A specialist analyzer produced no schema-conformant output. `analyst`
    /// is `idea`, `market` or `timing`.
    #[error("{analyst} analysis failed: {reason}")]
    AnalysisGenerationFailed {
        analyst: &'static str,
        reason: String,
    },

    /// The synthesis call produced no valid output, either rejected or missing.
    #[error("synthesis failed: {0}")]
    AggregationValidationFailed(String),

    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),

    /// A secondary write failed after the primary write succeeded. Only ever
    /// logged; never returned from an operation.
    #[error("{step} failed after primary write: {reason}")]
    PersistencePartialFailure { step: &'static str, reason: String },

    #[error("feature simulation failed: {0}")]
    SimulationFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether the caller can fix this by changing input or running a prior step.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Self::PreconditionNotMet(_) | Self::InvalidInput(_) | Self::NotFound { .. }
        )
    }

    /// Operation-level message for a conversational or CLI surface.
    pub fn user_message(&self) -> String {
        match self {
            Self::PreconditionNotMet(reason) => format!("Cannot do that yet: {reason}."),
            Self::InvalidInput(reason) => format!("Invalid input: {reason}."),
            Self::NotFound { entity, id } => format!("No {entity} with id {id}."),
            Self::AnalysisGenerationFailed { .. }
            | Self::AggregationValidationFailed(_)
            | Self::SimulationFailed(_) => {
                format!("Generation failed, try again. ({self})")
            }
            Self::PersistencePartialFailure { .. } | Self::Store(_) => {
                format!("Storage error, try again. ({self})")
            }
        }
    }
}

impl From<SchemaError> for EngineError {
    fn from(err: SchemaError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
