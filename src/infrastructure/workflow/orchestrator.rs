//! Workflow orchestrator
//!
//! Drives a run through `pre_check -> implementation -> post_check`, falling
//! back to `rollback` on the first failure. Every transition and every step
//! is persisted as it happens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::command_evaluator::{CommandEvaluator, DEFAULT_COMMAND_TIMEOUT};
use super::stage_runner::{StageRunner, StageStatus, StepSink};
use crate::domain::{
    CancellationFlag, DeviceSession, ExecutionEvent, ExecutionEventType, NotificationDispatcher,
    RunFailure, RunRepository, Stage, StepResult, VariableContext, Workflow, WorkflowError,
    WorkflowExecutor, WorkflowRun,
};

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Timeout for commands that do not set `timeout_ms`
    pub default_command_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Persist a run, logging and converting storage failures
async fn persist(runs: &dyn RunRepository, run: &WorkflowRun) -> Result<(), WorkflowError> {
    runs.update(run).await.map(|_| ()).map_err(|e| {
        error!(run_id = %run.id(), error = %e, "Failed to persist run");
        WorkflowError::persistence(e.to_string())
    })
}

/// Appends steps to the run and persists after each one
struct RunRecorder<'a> {
    run: &'a mut WorkflowRun,
    runs: &'a dyn RunRepository,
}

#[async_trait]
impl StepSink for RunRecorder<'_> {
    async fn record(&mut self, step: StepResult) -> Result<(), WorkflowError> {
        self.run.record_step(step)?;
        persist(self.runs, self.run).await
    }
}

/// Default [`WorkflowExecutor`]
pub struct WorkflowOrchestrator {
    runs: Arc<dyn RunRepository>,
    notifier: Arc<dyn NotificationDispatcher>,
    runner: StageRunner,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("notifier", &self.notifier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WorkflowOrchestrator {
    pub fn new(runs: Arc<dyn RunRepository>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self::with_config(runs, notifier, OrchestratorConfig::default())
    }

    pub fn with_config(
        runs: Arc<dyn RunRepository>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            runs,
            notifier,
            runner: StageRunner::new(CommandEvaluator::new(config.default_command_timeout)),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    async fn notify(&self, event_type: ExecutionEventType, run: &WorkflowRun) {
        self.notifier
            .dispatch(ExecutionEvent::from_run(event_type, run))
            .await;
    }

    /// Persist a terminal run and emit its single terminal event
    async fn finish(&self, run: WorkflowRun) -> Result<WorkflowRun, WorkflowError> {
        persist(self.runs.as_ref(), &run).await?;

        info!(
            run_id = %run.id(),
            workflow_id = %run.workflow_id(),
            device_id = %run.device_id(),
            status = %run.status(),
            steps = run.steps().len(),
            "Run finished"
        );

        if let Some(event_type) = ExecutionEventType::terminal_for(run.status()) {
            self.notify(event_type, &run).await;
        }

        Ok(run)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        workflow: &Workflow,
        run: &mut WorkflowRun,
        context: &mut VariableContext,
        session: &mut dyn DeviceSession,
        cancel: Option<&CancellationFlag>,
    ) -> Result<StageStatus, WorkflowError> {
        let mut recorder = RunRecorder {
            run,
            runs: self.runs.as_ref(),
        };

        self.runner
            .run(
                stage,
                workflow.commands(stage),
                context,
                session,
                &mut recorder,
                cancel,
            )
            .await
    }

    /// Enter rollback after a forward-stage failure.
    ///
    /// Rollback ignores cancellation and is never retried.
    async fn roll_back(
        &self,
        workflow: &Workflow,
        mut run: WorkflowRun,
        failure: RunFailure,
        context: &mut VariableContext,
        session: &mut dyn DeviceSession,
    ) -> Result<WorkflowRun, WorkflowError> {
        warn!(
            run_id = %run.id(),
            stage = %failure.stage,
            command_index = failure.command_index,
            kind = %failure.kind,
            "Stage failed, rolling back"
        );

        run.mark_rolling_back(failure)?;
        persist(self.runs.as_ref(), &run).await?;

        if !workflow.has_rollback() {
            info!(run_id = %run.id(), "No rollback commands defined");
            run.mark_failed(None)?;
            return self.finish(run).await;
        }

        match self
            .run_stage(Stage::Rollback, workflow, &mut run, context, session, None)
            .await?
        {
            StageStatus::Failed(rollback_failure) => {
                error!(
                    run_id = %run.id(),
                    command_index = rollback_failure.command_index,
                    kind = %rollback_failure.kind,
                    "Rollback failed"
                );
                run.mark_failed(Some(rollback_failure))?;
            }
            StageStatus::Passed => {
                run.mark_rolled_back()?;
            }
            StageStatus::Cancelled => {
                run.mark_rolled_back()?;
            }
        }

        self.finish(run).await
    }
}

#[async_trait]
impl WorkflowExecutor for WorkflowOrchestrator {
    async fn execute(
        &self,
        workflow: &Workflow,
        mut run: WorkflowRun,
        session: &mut dyn DeviceSession,
        cancel: &CancellationFlag,
    ) -> Result<WorkflowRun, WorkflowError> {
        if cancel.is_cancelled() {
            info!(run_id = %run.id(), "Run cancelled before start");
            run.mark_cancelled()?;
            return self.finish(run).await;
        }

        let mut context = VariableContext::new(run.dynamic_params().clone());

        run.mark_running(Stage::PreCheck)?;
        persist(self.runs.as_ref(), &run).await?;
        info!(
            run_id = %run.id(),
            workflow_id = %workflow.id(),
            device_id = %run.device_id(),
            "Run started"
        );
        self.notify(ExecutionEventType::ExecutionStarted, &run).await;

        for stage in Stage::FORWARD {
            if stage != Stage::PreCheck {
                if cancel.is_cancelled() {
                    run.mark_cancelled()?;
                    return self.finish(run).await;
                }
                run.enter_stage(stage)?;
                persist(self.runs.as_ref(), &run).await?;
            }

            info!(run_id = %run.id(), stage = %stage, "Entering stage");

            match self
                .run_stage(stage, workflow, &mut run, &mut context, session, Some(cancel))
                .await?
            {
                StageStatus::Passed => {}
                StageStatus::Cancelled => {
                    info!(run_id = %run.id(), stage = %stage, "Run cancelled");
                    run.mark_cancelled()?;
                    return self.finish(run).await;
                }
                StageStatus::Failed(failure) => {
                    return self
                        .roll_back(workflow, run, failure, &mut context, session)
                        .await;
                }
            }
        }

        run.mark_completed()?;
        self.finish(run).await
    }
}
