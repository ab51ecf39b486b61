//! Workflow repository trait

use async_trait::async_trait;

use super::entity::{Workflow, WorkflowId};
use crate::domain::DomainError;

/// Read access to workflow definitions
#[async_trait]
pub trait WorkflowRepository: Send + Sync + std::fmt::Debug {
    /// Get a workflow by ID
    async fn get(&self, id: &WorkflowId) -> Result<Option<Workflow>, DomainError>;

    /// List all workflows
    async fn list(&self) -> Result<Vec<Workflow>, DomainError>;

    /// Register a workflow definition
    async fn create(&self, workflow: Workflow) -> Result<Workflow, DomainError>;
}
