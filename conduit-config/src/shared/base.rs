use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}

impl ValidationError {
    /// Shorthand for the common "must be greater than 0" violation.
    pub(crate) fn zero(field: &str) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.to_string(),
            constraint: "must be greater than 0".to_string(),
        }
    }
}
