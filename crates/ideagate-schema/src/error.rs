use thiserror::Error;

/// Validation failure on a structured object after deserialization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("required field missing or empty: {0}")]
    MissingField(String),

    #[error("{field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl SchemaError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Range and presence checks that serde's structural typing cannot express.
pub trait Validate {
    fn validate(&self) -> Result<(), SchemaError>;
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::missing(field));
    }
    Ok(())
}

pub(crate) fn require_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), SchemaError> {
    if value < min || value > max {
        return Err(SchemaError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

pub(crate) fn require_items(field: &str, items: &[String]) -> Result<(), SchemaError> {
    if items.is_empty() {
        return Err(SchemaError::missing(field));
    }
    for (idx, item) in items.iter().enumerate() {
        require_text(&format!("{field}[{idx}]"), item)?;
    }
    Ok(())
}
