//! In-memory run repository implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{DomainError, RunId, RunRepository, RunStatus, WorkflowId, WorkflowRun};

/// In-memory implementation of RunRepository
#[derive(Debug, Clone, Default)]
pub struct InMemoryRunRepository {
    runs: Arc<RwLock<HashMap<String, WorkflowRun>>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored runs
    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}

fn oldest_first(mut runs: Vec<WorkflowRun>) -> Vec<WorkflowRun> {
    runs.sort_by_key(|r| r.created_at());
    runs
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn get(&self, id: &RunId) -> Result<Option<WorkflowRun>, DomainError> {
        let runs = self.runs.read().await;
        Ok(runs.get(id.as_str()).cloned())
    }

    async fn create(&self, run: WorkflowRun) -> Result<WorkflowRun, DomainError> {
        let mut runs = self.runs.write().await;

        if runs.contains_key(run.id().as_str()) {
            return Err(DomainError::conflict(format!(
                "Run '{}' already exists",
                run.id()
            )));
        }

        runs.insert(run.id().as_str().to_string(), run.clone());
        Ok(run)
    }

    async fn update(&self, run: &WorkflowRun) -> Result<WorkflowRun, DomainError> {
        let mut runs = self.runs.write().await;

        match runs.get_mut(run.id().as_str()) {
            Some(stored) => {
                *stored = run.clone();
                Ok(run.clone())
            }
            None => Err(DomainError::not_found(format!("Run '{}' not found", run.id()))),
        }
    }

    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<WorkflowRun>, DomainError> {
        let runs = self.runs.read().await;
        Ok(oldest_first(
            runs.values()
                .filter(|r| r.status() == status)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<WorkflowRun>, DomainError> {
        let runs = self.runs.read().await;
        Ok(oldest_first(
            runs.values()
                .filter(|r| r.workflow_id() == workflow_id)
                .cloned()
                .collect(),
        ))
    }

    async fn delete_terminal_older_than(&self, before: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut runs = self.runs.write().await;
        let initial = runs.len();
        runs.retain(|_, r| !(r.is_terminal() && r.created_at() < before));
        Ok((initial - runs.len()) as u64)
    }
}
