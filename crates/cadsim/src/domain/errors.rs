//! Domain Errors
//!
//! Error types for simulation operations.

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("Invalid condition '{expression}': {reason}")]
    InvalidCondition { expression: String, reason: String },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Oracle call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl DomainError {
    pub fn invalid_scenario<S: AsRef<str>, R: Into<String>>(scenario: S, reason: R) -> Self {
        Self::InvalidScenario {
            scenario: scenario.as_ref().to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_condition<E: AsRef<str>, R: Into<String>>(expression: E, reason: R) -> Self {
        Self::InvalidCondition {
            expression: expression.as_ref().to_string(),
            reason: reason.into(),
        }
    }
}
