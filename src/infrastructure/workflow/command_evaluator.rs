//! Single-command evaluation
//!
//! Resolve the template, send it through the session, check the output and
//! bind any extracted value before the next command runs.

use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::workflow::matcher::{self, MatchFailureReason};
use crate::domain::{
    CommandSpec, DeviceError, DeviceSession, ErrorKind, MatchRule, StepResult, VariableContext,
};

/// Default per-command timeout
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Evaluates one command against a device session
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    default_timeout: Duration,
}

impl Default for CommandEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandEvaluator {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Timeout for a command, honouring its override
    pub fn timeout_for(&self, spec: &CommandSpec) -> Duration {
        spec.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
    }

    /// Evaluate `spec`, filling in `step`.
    ///
    /// Never returns an error: every failure is captured on the step. The
    /// session is neither opened nor closed here.
    pub async fn evaluate(
        &self,
        spec: &CommandSpec,
        mut step: StepResult,
        context: &mut VariableContext,
        session: &mut dyn DeviceSession,
    ) -> StepResult {
        self.evaluate_into(spec, &mut step, context, session).await;
        step.finish();
        step
    }

    async fn evaluate_into(
        &self,
        spec: &CommandSpec,
        step: &mut StepResult,
        context: &mut VariableContext,
        session: &mut dyn DeviceSession,
    ) {
        // No partial send: resolution failures stop before the device is touched
        let command = match context.resolve_template(&spec.command_template) {
            Ok(command) => command,
            Err(e) => {
                warn!(stage = %step.stage, command_index = step.command_index, error = %e, "Command template could not be resolved");
                step.fail(ErrorKind::VariableResolution, e.to_string());
                return;
            }
        };
        step.command_sent = command.clone();

        let timeout = self.timeout_for(spec);
        debug!(
            device_id = %session.device_id(),
            stage = %step.stage,
            command_index = step.command_index,
            timeout_ms = timeout.as_millis() as u64,
            "Dispatching command"
        );

        let result = match tokio::time::timeout(timeout, session.run(&command, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(DeviceError::timeout(timeout)),
        };

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                let kind = if e.is_timeout() {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::CommandExecution
                };
                warn!(stage = %step.stage, command_index = step.command_index, error = %e, "Command failed on device");
                step.fail(kind, e.to_string());
                return;
            }
        };

        step.raw_output = output.raw_output;
        step.exit_code = output.exit_code;

        let rule = match spec.match_rule.as_ref().map(|rule| resolve_rule(rule, context)) {
            Some(Ok(rule)) => Some(rule),
            Some(Err(message)) => {
                step.fail(ErrorKind::VariableResolution, message);
                return;
            }
            None => None,
        };

        let binding = spec.variable_binding.as_ref();
        let outcome = match matcher::evaluate(
            &step.raw_output,
            step.exit_code,
            rule.as_ref(),
            spec.expected_exit_code,
            binding.is_some(),
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                step.fail(ErrorKind::InvalidPattern, e.to_string());
                return;
            }
        };

        step.matched = outcome.matched;

        if let Some(reason) = outcome.failure {
            let kind = match reason {
                MatchFailureReason::PatternNotSatisfied { .. } => ErrorKind::MatchFailure,
                MatchFailureReason::ExitCodeMismatch { .. } => ErrorKind::ExitCodeMismatch,
            };
            warn!(stage = %step.stage, command_index = step.command_index, reason = %reason, "Command output rejected");
            step.fail(kind, reason.to_string());
            return;
        }

        if let (Some(binding), Some(value)) = (binding, outcome.extracted) {
            debug!(variable = %binding.name, "Bound variable");
            context.bind(binding.name.clone(), value.clone());
            step.extracted_value = Some(value);
        }
    }
}

/// Resolve tokens in a match pattern against the current context
fn resolve_rule(rule: &MatchRule, context: &VariableContext) -> Result<MatchRule, String> {
    context
        .resolve_template(&rule.pattern)
        .map(|pattern| MatchRule::new(rule.operator, pattern))
        .map_err(|e| e.to_string())
}
