//! Run service - invocation entry point for workflow runs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::domain::{
    validate_invocation, CancellationFlag, DeviceSession, DeviceSessionProvider,
    ExecutionRequest, NotificationError, RunId, RunRepository, Workflow, WorkflowError,
    WorkflowExecutor, WorkflowId, WorkflowRepository, WorkflowRun,
};
use crate::infrastructure::notification::create_dispatcher;
use crate::infrastructure::run::InMemoryRunRepository;
use crate::infrastructure::workflow::{OrchestratorConfig, WorkflowOrchestrator};

/// A run that passed validation and holds an open session
struct PreparedRun {
    workflow: Workflow,
    run: WorkflowRun,
    session: Box<dyn DeviceSession>,
    cancel: CancellationFlag,
}

/// Handle to a run executing on its own task
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: RunId,
    pub task: JoinHandle<Result<WorkflowRun, WorkflowError>>,
}

/// Validates requests, manages device sessions and drives runs to completion
pub struct RunService {
    workflows: Arc<dyn WorkflowRepository>,
    runs: Arc<dyn RunRepository>,
    sessions: Arc<dyn DeviceSessionProvider>,
    executor: Arc<dyn WorkflowExecutor>,
    active: Arc<RwLock<HashMap<RunId, CancellationFlag>>>,
}

impl std::fmt::Debug for RunService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunService")
            .field("sessions", &self.sessions)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl RunService {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        runs: Arc<dyn RunRepository>,
        sessions: Arc<dyn DeviceSessionProvider>,
        executor: Arc<dyn WorkflowExecutor>,
    ) -> Self {
        Self {
            workflows,
            runs,
            sessions,
            executor,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get a workflow definition or fail with `NotFound`
    pub async fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow, WorkflowError> {
        self.workflows
            .get(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(id.to_string()))
    }

    /// Dynamic parameters a caller has to supply to run the workflow
    pub async fn required_params(&self, id: &WorkflowId) -> Result<Vec<String>, WorkflowError> {
        Ok(self.get_workflow(id).await?.required_params())
    }

    /// Check a request without opening a session or creating a run
    pub async fn validate(&self, request: &ExecutionRequest) -> Result<Workflow, WorkflowError> {
        let workflow = self.get_workflow(&request.workflow_id).await?;
        validate_invocation(&workflow, &request.dynamic_params)?;
        Ok(workflow)
    }

    async fn prepare(&self, request: ExecutionRequest) -> Result<PreparedRun, WorkflowError> {
        let workflow = self.validate(&request).await?;

        let session = self.sessions.open(&request.device_id).await.map_err(|e| {
            warn!(
                workflow_id = %request.workflow_id,
                device_id = %request.device_id,
                error = %e,
                "Device session unavailable"
            );
            WorkflowError::session_unavailable(request.device_id.to_string(), e.to_string())
        })?;

        let run = WorkflowRun::new(
            request.workflow_id,
            request.device_id,
            request.dynamic_params,
        );
        let run = match self.runs.create(run).await {
            Ok(run) => run,
            Err(e) => {
                Self::close_session(session).await;
                return Err(WorkflowError::persistence(e.to_string()));
            }
        };

        let cancel = CancellationFlag::new();
        self.active
            .write()
            .await
            .insert(run.id().clone(), cancel.clone());

        info!(
            run_id = %run.id(),
            workflow_id = %run.workflow_id(),
            device_id = %run.device_id(),
            "Run created"
        );

        Ok(PreparedRun {
            workflow,
            run,
            session,
            cancel,
        })
    }

    async fn close_session(mut session: Box<dyn DeviceSession>) {
        if let Err(e) = session.close().await {
            warn!(device_id = %session.device_id(), error = %e, "Failed to close device session");
        }
    }

    async fn drive(&self, prepared: PreparedRun) -> Result<WorkflowRun, WorkflowError> {
        let PreparedRun {
            workflow,
            run,
            mut session,
            cancel,
        } = prepared;
        let run_id = run.id().clone();

        let result = self
            .executor
            .execute(&workflow, run, session.as_mut(), &cancel)
            .await;

        Self::close_session(session).await;
        self.active.write().await.remove(&run_id);

        result
    }

    /// Run a request inline and return the terminal run record.
    ///
    /// Validation and session errors are returned before any run is created.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<WorkflowRun, WorkflowError> {
        let prepared = self.prepare(request).await?;
        self.drive(prepared).await
    }

    /// Start a run on its own task.
    ///
    /// The run record exists once this returns, so it can be polled with
    /// [`RunService::get_run`] or stopped with [`RunService::cancel`].
    pub async fn spawn(self: &Arc<Self>, request: ExecutionRequest) -> Result<RunHandle, WorkflowError> {
        let prepared = self.prepare(request).await?;
        let run_id = prepared.run.id().clone();

        let service = Arc::clone(self);
        let task = tokio::spawn(async move { service.drive(prepared).await });

        Ok(RunHandle { run_id, task })
    }

    /// Request cooperative cancellation.
    ///
    /// Returns `false` when the run exists but is no longer executing.
    pub async fn cancel(&self, run_id: &RunId) -> Result<bool, WorkflowError> {
        if let Some(flag) = self.active.read().await.get(run_id) {
            flag.cancel();
            info!(run_id = %run_id, "Cancellation requested");
            return Ok(true);
        }

        match self.runs.get(run_id).await? {
            Some(_) => Ok(false),
            None => Err(WorkflowError::not_found(run_id.to_string())),
        }
    }

    pub async fn get_run(&self, run_id: &RunId) -> Result<Option<WorkflowRun>, WorkflowError> {
        Ok(self.runs.get(run_id).await?)
    }

    /// Runs of one workflow, oldest first
    pub async fn list_runs(&self, workflow_id: &WorkflowId) -> Result<Vec<WorkflowRun>, WorkflowError> {
        Ok(self.runs.list_by_workflow(workflow_id).await?)
    }

    /// Delete terminal runs created more than `retention_days` ago
    pub async fn cleanup_old_runs(&self, retention_days: u32) -> Result<u64, WorkflowError> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(retention_days));
        let deleted = self.runs.delete_terminal_older_than(cutoff).await?;

        if deleted > 0 {
            info!(deleted = deleted, retention_days = retention_days, "Cleaned up old runs");
        } else {
            debug!(retention_days = retention_days, "No runs to clean up");
        }

        Ok(deleted)
    }
}

/// Wire a [`RunService`] from configuration with in-memory run storage
pub fn create_run_service(
    config: &AppConfig,
    workflows: Arc<dyn WorkflowRepository>,
    sessions: Arc<dyn DeviceSessionProvider>,
) -> Result<RunService, NotificationError> {
    let runs: Arc<dyn RunRepository> = Arc::new(InMemoryRunRepository::new());
    let notifier = create_dispatcher(&config.notifications)?;
    let executor = WorkflowOrchestrator::with_config(
        runs.clone(),
        notifier,
        OrchestratorConfig {
            default_command_timeout: config.executor.default_command_timeout(),
        },
    );

    Ok(RunService::new(workflows, runs, sessions, Arc::new(executor)))
}
