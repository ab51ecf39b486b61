//! Workflow run entity and state machine

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::step::{RunFailure, StepResult};
use crate::domain::device::DeviceId;
use crate::domain::workflow::{Stage, WorkflowError, WorkflowId};

/// Regex pattern for valid run IDs: run-{uuid}
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^run-[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$").unwrap()
});

/// Validated run identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Result<Self, WorkflowError> {
        let id = id.into();
        if !ID_PATTERN.is_match(&id) {
            return Err(WorkflowError::validation(format!(
                "Invalid run ID '{}': must be in format run-{{uuid}}",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Generate a new run ID with UUID
    pub fn generate() -> Self {
        Self(format!("run-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunId {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, no command sent yet
    #[default]
    Pending,

    /// Walking the forward stages
    Running,

    /// All forward stages passed
    Completed,

    /// Rollback was empty or itself failed
    Failed,

    /// Stopped on request between commands
    Cancelled,

    /// A forward stage failed; rollback commands are running
    RollingBack,

    /// Rollback finished successfully
    RolledBack,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RollingBack => "rolling_back",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::RolledBack
        )
    }

    /// Check if this status can transition to another status
    pub fn can_transition_to(&self, target: RunStatus) -> bool {
        match (self, target) {
            // From Pending
            (Self::Pending, Self::Running) => true,
            (Self::Pending, Self::Cancelled) => true,

            // From Running
            (Self::Running, Self::Completed) => true,
            (Self::Running, Self::RollingBack) => true,
            (Self::Running, Self::Cancelled) => true,

            // Rollback is not cancellable and never re-entered
            (Self::RollingBack, Self::RolledBack) => true,
            (Self::RollingBack, Self::Failed) => true,

            _ => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution record of one workflow against one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    id: RunId,
    workflow_id: WorkflowId,
    device_id: DeviceId,
    status: RunStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    current_stage: Option<Stage>,

    /// Parameters supplied with the execution request
    dynamic_params: BTreeMap<String, String>,

    /// Steps in strict execution order
    steps: Vec<StepResult>,

    /// Failure that sent the run into rollback
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<RunFailure>,

    #[serde(skip_serializing_if = "Option::is_none")]
    rollback_failure: Option<RunFailure>,

    created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    /// Create a new pending run
    pub fn new(
        workflow_id: WorkflowId,
        device_id: DeviceId,
        dynamic_params: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: RunId::generate(),
            workflow_id,
            device_id,
            status: RunStatus::Pending,
            current_stage: None,
            dynamic_params,
            steps: Vec::new(),
            failure: None,
            rollback_failure: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Override the creation time (imports and retention tests)
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    // Getters

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn current_stage(&self) -> Option<Stage> {
        self.current_stage
    }

    pub fn dynamic_params(&self) -> &BTreeMap<String, String> {
        &self.dynamic_params
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// Steps recorded for one stage
    pub fn steps_for(&self, stage: Stage) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(move |s| s.stage == stage)
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    pub fn rollback_failure(&self) -> Option<&RunFailure> {
        self.rollback_failure.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock duration between start and completion
    pub fn duration_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        Some((completed - started).num_milliseconds() as f64 / 1000.0)
    }

    /// Human-readable failure summary, if any
    pub fn error_message(&self) -> Option<String> {
        match (&self.failure, &self.rollback_failure) {
            (Some(failure), Some(rollback)) => {
                Some(format!("{}; rollback: {}", failure, rollback))
            }
            (Some(failure), None) => Some(failure.to_string()),
            (None, Some(rollback)) => Some(format!("rollback: {}", rollback)),
            (None, None) => None,
        }
    }

    fn transition(&mut self, target: RunStatus) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(target) {
            return Err(WorkflowError::invalid_transition(self.status, target));
        }
        self.status = target;
        Ok(())
    }

    /// Pending -> running, entering the first stage
    pub fn mark_running(&mut self, stage: Stage) -> Result<(), WorkflowError> {
        self.transition(RunStatus::Running)?;
        self.current_stage = Some(stage);
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move to the next forward stage while running
    pub fn enter_stage(&mut self, stage: Stage) -> Result<(), WorkflowError> {
        if self.status != RunStatus::Running || stage == Stage::Rollback {
            return Err(WorkflowError::invalid_transition(
                format!("{}({:?})", self.status, self.current_stage.map(|s| s.as_str())),
                format!("running({})", stage),
            ));
        }
        self.current_stage = Some(stage);
        Ok(())
    }

    /// Append a step; terminal runs are immutable
    pub fn record_step(&mut self, step: StepResult) -> Result<(), WorkflowError> {
        if self.is_terminal() {
            return Err(WorkflowError::invalid_transition(self.status, "record_step"));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Running -> rolling_back after a forward stage failed
    pub fn mark_rolling_back(&mut self, failure: RunFailure) -> Result<(), WorkflowError> {
        self.transition(RunStatus::RollingBack)?;
        self.failure = Some(failure);
        self.current_stage = Some(Stage::Rollback);
        Ok(())
    }

    pub fn mark_completed(&mut self) -> Result<(), WorkflowError> {
        self.transition(RunStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_rolled_back(&mut self) -> Result<(), WorkflowError> {
        self.transition(RunStatus::RolledBack)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Rolling_back -> failed; `rollback_failure` is absent when there was
    /// nothing to roll back
    pub fn mark_failed(&mut self, rollback_failure: Option<RunFailure>) -> Result<(), WorkflowError> {
        self.transition(RunStatus::Failed)?;
        self.rollback_failure = rollback_failure;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_cancelled(&mut self) -> Result<(), WorkflowError> {
        self.transition(RunStatus::Cancelled)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
