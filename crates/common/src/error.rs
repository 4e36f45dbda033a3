//! Common error types.

use thiserror::Error;

/// Main error type for the layer editor.
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Duplicate type identity: {0}")]
    DuplicateType(String),

    #[error("Unknown type identity: {0}")]
    UnknownType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Duplicate layer identity: {0}")]
    DuplicateLayer(String),

    #[error("Layer already mounted: {0}")]
    AlreadyMounted(String),

    #[error("Layer not mounted: {0}")]
    NotMounted(String),

    #[error("Derived computation failed: {0}")]
    Derived(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EditorResult<T> = Result<T, EditorError>;

impl EditorError {
    pub fn duplicate_type(pid: impl Into<String>) -> Self {
        Self::DuplicateType(pid.into())
    }

    pub fn unknown_type(pid: impl Into<String>) -> Self {
        Self::UnknownType(pid.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::LayerNotFound(id.into())
    }

    pub fn derived(msg: impl Into<String>) -> Self {
        Self::Derived(msg.into())
    }

    /// Whether this error is fatal at startup rather than contained to one instance.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DuplicateType(_) | Self::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EditorError::duplicate_type("qrcode").is_fatal());
        assert!(EditorError::config("bad version").is_fatal());
        assert!(!EditorError::unknown_type("nope").is_fatal());
        assert!(!EditorError::derived("encoder crashed").is_fatal());
    }

    #[test]
    fn test_display() {
        let err = EditorError::invalid_field("opacity", "expected a number");
        assert_eq!(err.to_string(), "Invalid field 'opacity': expected a number");
    }
}
