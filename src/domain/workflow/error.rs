//! Workflow error types

use thiserror::Error;

use crate::domain::error::DomainError;

/// Errors that can occur while validating or executing a workflow
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Variable resolution failed: {0}")]
    VariableResolution(String),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("Match failure: {0}")]
    MatchFailure(String),

    #[error("Rollback failed: {0}")]
    RollbackFailure(String),

    #[error("Invalid run transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Device session unavailable for '{device}': {message}")]
    SessionUnavailable { device: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl WorkflowError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn variable_resolution(message: impl Into<String>) -> Self {
        Self::VariableResolution(message.into())
    }

    pub fn command_execution(message: impl Into<String>) -> Self {
        Self::CommandExecution(message.into())
    }

    pub fn match_failure(message: impl Into<String>) -> Self {
        Self::MatchFailure(message.into())
    }

    pub fn rollback_failure(message: impl Into<String>) -> Self {
        Self::RollbackFailure(message.into())
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn session_unavailable(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SessionUnavailable {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Whether the error is raised before any command is sent
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }
}

impl From<DomainError> for WorkflowError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::NotFound(message),
            DomainError::Validation { message } => Self::Validation(message),
            other => Self::Persistence(other.to_string()),
        }
    }
}
