//! Workflow definition files
//!
//! Definitions are plain serde documents in JSON or TOML. The format is taken
//! from the file extension, falling back to sniffing the first character.

use std::path::Path;

use tracing::debug;

use crate::domain::{validate_workflow, Workflow, WorkflowError};

/// Serialization format of a workflow definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Json,
    Toml,
}

impl DefinitionFormat {
    /// Guess the format from a path, then from content
    pub fn detect(path: Option<&Path>, content: &str) -> Self {
        let by_extension = path
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match by_extension.as_deref() {
            Some("json") => Self::Json,
            Some("toml") => Self::Toml,
            _ if content.trim_start().starts_with('{') => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Parse and structurally validate a workflow definition
pub fn parse_workflow(content: &str, format: DefinitionFormat) -> Result<Workflow, WorkflowError> {
    let workflow: Workflow = match format {
        DefinitionFormat::Json => serde_json::from_str(content)
            .map_err(|e| WorkflowError::validation(format!("Invalid workflow JSON: {}", e)))?,
        DefinitionFormat::Toml => toml::from_str(content)
            .map_err(|e| WorkflowError::validation(format!("Invalid workflow TOML: {}", e)))?,
    };

    validate_workflow(&workflow)?;
    Ok(workflow)
}

/// Read a workflow definition from disk
pub async fn load_workflow_file(path: impl AsRef<Path>) -> Result<Workflow, WorkflowError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        WorkflowError::validation(format!("Cannot read '{}': {}", path.display(), e))
    })?;

    let format = DefinitionFormat::detect(Some(path), &content);
    debug!(path = %path.display(), format = ?format, "Loading workflow definition");

    parse_workflow(&content, format)
}
