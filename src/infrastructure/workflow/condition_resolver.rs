//! Conditional branch selection and execution

use tracing::{debug, info};

use super::command_evaluator::CommandEvaluator;
use super::stage_runner::StepSink;
use crate::domain::{
    BranchArm, BranchCommand, BranchInfo, CancellationFlag, ConditionSpec, ConditionType,
    DeviceSession, ErrorKind, StepError, StepResult, VariableContext, WorkflowError,
};

/// How a branch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    Completed,

    /// A branch command hit a transport or resolution error
    Failed(StepError),

    /// The cancellation flag was set before a branch command
    Cancelled,
}

/// The arm chosen for a parent step and the commands it runs
#[derive(Debug, Clone, Copy)]
pub struct SelectedBranch<'a> {
    pub parent: &'a StepResult,
    pub arm: BranchArm,
    pub commands: &'a [BranchCommand],
}

/// Chooses and runs the `then` or `else` list of a command's condition
#[derive(Debug, Clone)]
pub struct ConditionResolver {
    evaluator: CommandEvaluator,
}

impl ConditionResolver {
    pub fn new(evaluator: CommandEvaluator) -> Self {
        Self { evaluator }
    }

    /// Decide which arm applies to the parent's result.
    ///
    /// Condition parameters are resolved through the context, so they may use
    /// `{{param}}` and `{variable}` tokens.
    pub fn select(
        &self,
        condition: &ConditionSpec,
        parent: &StepResult,
        context: &VariableContext,
    ) -> Result<BranchArm, StepError> {
        let resolve = |template: &str| {
            context
                .resolve_template(template)
                .map_err(|e| StepError::new(ErrorKind::VariableResolution, e.to_string()))
        };

        let (subject, parameter) = match &condition.kind {
            ConditionType::IfRegexMatches { pattern } => (parent.raw_output.clone(), resolve(pattern)?),
            ConditionType::IfOutputContains { text } => (parent.raw_output.clone(), resolve(text)?),
            ConditionType::IfExitCodeEquals { exit_code } => (
                parent.exit_code.map(|c| c.to_string()).unwrap_or_default(),
                exit_code.to_string(),
            ),
            ConditionType::IfVariableEquals {
                variable_name,
                value,
            } => {
                let current = context.variable(variable_name).ok_or_else(|| {
                    StepError::new(
                        ErrorKind::VariableResolution,
                        format!("Variable '{}' is not bound", variable_name),
                    )
                })?;
                (current.to_string(), resolve(value)?)
            }
        };

        let operator = condition.effective_operator();
        let holds = operator
            .evaluate(&subject, &parameter)
            .map_err(|e| StepError::new(ErrorKind::InvalidPattern, e.to_string()))?;

        debug!(
            condition = condition.kind.type_name(),
            operator = %operator,
            holds,
            "Evaluated condition"
        );

        Ok(if holds { BranchArm::Then } else { BranchArm::Else })
    }

    /// Run the commands of the selected arm in order.
    ///
    /// Branch commands carry no match rule, so only transport and resolution
    /// errors stop the branch. Each step is handed to `sink` as soon as it
    /// finishes.
    pub async fn run_branch(
        &self,
        branch: SelectedBranch<'_>,
        context: &mut VariableContext,
        session: &mut dyn DeviceSession,
        sink: &mut dyn StepSink,
        cancel: Option<&CancellationFlag>,
    ) -> Result<BranchOutcome, WorkflowError> {
        let SelectedBranch {
            parent,
            arm,
            commands,
        } = branch;

        if !commands.is_empty() {
            info!(
                stage = %parent.stage,
                command_index = parent.command_index,
                arm = arm.as_str(),
                commands = commands.len(),
                "Running condition branch"
            );
        }

        for (index, command) in commands.iter().enumerate() {
            if cancel.is_some_and(CancellationFlag::is_cancelled) {
                return Ok(BranchOutcome::Cancelled);
            }

            let spec = command.to_command_spec();
            let step = StepResult::begin(parent.stage, parent.command_index, &command.command)
                .with_branch(BranchInfo {
                    parent_index: parent.command_index,
                    arm,
                    index,
                })
                .with_description(command.description.clone());

            let step = self.evaluator.evaluate(&spec, step, context, session).await;
            let error = step.error.clone();
            sink.record(step).await?;

            if let Some(error) = error {
                return Ok(BranchOutcome::Failed(error));
            }
        }

        Ok(BranchOutcome::Completed)
    }
}
