//! Sequential execution of one stage

use async_trait::async_trait;
use tracing::{debug, warn};

use super::command_evaluator::CommandEvaluator;
use super::condition_resolver::{BranchOutcome, ConditionResolver, SelectedBranch};
use crate::domain::{
    BranchArm, CancellationFlag, CommandSpec, DeviceSession, RunFailure, Stage, StepResult, VariableContext,
    WorkflowError,
};

/// Receives each step as soon as it is finished
#[async_trait]
pub trait StepSink: Send {
    async fn record(&mut self, step: StepResult) -> Result<(), WorkflowError>;
}

#[async_trait]
impl StepSink for Vec<StepResult> {
    async fn record(&mut self, step: StepResult) -> Result<(), WorkflowError> {
        self.push(step);
        Ok(())
    }
}

/// Result of running a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Passed,

    /// Stopped at the first failing command
    Failed(RunFailure),

    /// Stopped between commands on request
    Cancelled,
}

/// Runs the commands of a stage strictly in order
#[derive(Debug, Clone)]
pub struct StageRunner {
    evaluator: CommandEvaluator,
    resolver: ConditionResolver,
}

impl StageRunner {
    pub fn new(evaluator: CommandEvaluator) -> Self {
        Self {
            resolver: ConditionResolver::new(evaluator.clone()),
            evaluator,
        }
    }

    /// Run `commands` as `stage`.
    ///
    /// Passing `None` for `cancel` makes the stage run to completion or first
    /// failure regardless of cancellation requests. An `Err` only comes from
    /// the sink.
    pub async fn run(
        &self,
        stage: Stage,
        commands: &[CommandSpec],
        context: &mut VariableContext,
        session: &mut dyn DeviceSession,
        sink: &mut dyn StepSink,
        cancel: Option<&CancellationFlag>,
    ) -> Result<StageStatus, WorkflowError> {
        debug!(stage = %stage, commands = commands.len(), "Running stage");

        for (index, spec) in commands.iter().enumerate() {
            if cancel.is_some_and(CancellationFlag::is_cancelled) {
                return Ok(StageStatus::Cancelled);
            }

            let step = StepResult::begin(stage, index, &spec.command_template)
                .with_description(spec.description.clone());
            let mut step = self.evaluator.evaluate(spec, step, context, session).await;

            // Conditions only apply to commands that succeeded
            let arm = match (&spec.condition, step.is_success()) {
                (Some(condition), true) => match self.resolver.select(condition, &step, context) {
                    Ok(arm) => Some((condition, arm)),
                    Err(error) => {
                        step.error = Some(error);
                        None
                    }
                },
                _ => None,
            };

            let parent = step.clone();
            sink.record(step).await?;

            if let Some(error) = parent.error {
                return Ok(StageStatus::Failed(RunFailure::new(
                    stage,
                    index,
                    error.kind,
                    error.message,
                )));
            }

            let Some((condition, arm)) = arm else {
                continue;
            };

            let branch = SelectedBranch {
                parent: &parent,
                arm,
                commands: match arm {
                    BranchArm::Then => &condition.then_commands,
                    BranchArm::Else => &condition.else_commands,
                },
            };

            match self
                .resolver
                .run_branch(branch, context, session, sink, cancel)
                .await?
            {
                BranchOutcome::Completed => {}
                BranchOutcome::Cancelled => return Ok(StageStatus::Cancelled),
                BranchOutcome::Failed(error) => {
                    warn!(stage = %stage, command_index = index, arm = arm.as_str(), "Condition branch failed");
                    return Ok(StageStatus::Failed(RunFailure::new(
                        stage,
                        index,
                        error.kind,
                        format!("{} branch: {}", arm.as_str(), error.message),
                    )));
                }
            }
        }

        Ok(StageStatus::Passed)
    }
}
