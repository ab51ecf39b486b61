//! In-memory workflow repository implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{DomainError, Workflow, WorkflowId, WorkflowRepository};

/// In-memory implementation of WorkflowRepository
#[derive(Debug)]
pub struct InMemoryWorkflowRepository {
    workflows: Arc<RwLock<HashMap<String, Workflow>>>,
}

impl InMemoryWorkflowRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self {
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a repository pre-populated with workflows.
    ///
    /// A later definition with the same ID replaces an earlier one.
    pub fn with_workflows(workflows: Vec<Workflow>) -> Self {
        let map: HashMap<String, Workflow> = workflows
            .into_iter()
            .map(|w| (w.id().as_str().to_string(), w))
            .collect();

        Self {
            workflows: Arc::new(RwLock::new(map)),
        }
    }
}

impl Default for InMemoryWorkflowRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn get(&self, id: &WorkflowId) -> Result<Option<Workflow>, DomainError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(id.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<Workflow>, DomainError> {
        let workflows = self.workflows.read().await;
        let mut list: Vec<Workflow> = workflows.values().cloned().collect();
        list.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(list)
    }

    async fn create(&self, workflow: Workflow) -> Result<Workflow, DomainError> {
        let mut workflows = self.workflows.write().await;

        if workflows.contains_key(workflow.id().as_str()) {
            return Err(DomainError::conflict(format!(
                "Workflow '{}' already exists",
                workflow.id()
            )));
        }

        workflows.insert(workflow.id().as_str().to_string(), workflow.clone());
        Ok(workflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CommandSpec;

    fn create_test_workflow(id: &str) -> Workflow {
        Workflow::new(WorkflowId::new(id).unwrap(), format!("Test {}", id))
            .with_pre_check(vec![CommandSpec::new("show version")])
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryWorkflowRepository::new();
        let workflow = create_test_workflow("test-1");

        let created = repo.create(workflow.clone()).await.unwrap();
        assert_eq!(created.id().as_str(), "test-1");

        let retrieved = repo.get(created.id()).await.unwrap();
        assert_eq!(retrieved.unwrap().name(), "Test test-1");
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = InMemoryWorkflowRepository::new();
        let retrieved = repo.get(&WorkflowId::new("absent").unwrap()).await.unwrap();
        assert!(retrieved.is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let workflow = create_test_workflow("test-1");
        let repo = InMemoryWorkflowRepository::with_workflows(vec![workflow.clone()]);

        let result = repo.create(workflow).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_list_sorted_by_id() {
        let repo = InMemoryWorkflowRepository::with_workflows(vec![
            create_test_workflow("vlan-add"),
            create_test_workflow("acl-update"),
        ]);

        let ids: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .iter()
            .map(|w| w.id().to_string())
            .collect();
        assert_eq!(ids, vec!["acl-update", "vlan-add"]);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let repo = Arc::new(InMemoryWorkflowRepository::new());

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let workflow = create_test_workflow(&format!("test-{}", i));
                    repo.create(workflow).await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(repo.list().await.unwrap().len(), 10);
    }
}
