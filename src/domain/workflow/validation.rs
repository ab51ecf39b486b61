//! Invocation-time validation
//!
//! Everything checked here is rejected before a run record exists and before
//! any command reaches the device.

use std::collections::BTreeMap;

use super::command::{CommandSpec, ConditionType};
use super::context::{is_valid_name, VariableContext};
use super::entity::{Stage, Workflow};
use super::error::WorkflowError;
use super::matcher::compile_pattern;

/// Validate a workflow definition on its own, without invocation parameters
pub fn validate_workflow(workflow: &Workflow) -> Result<(), WorkflowError> {
    for stage in Stage::ALL {
        for (index, command) in workflow.commands(stage).iter().enumerate() {
            validate_command(stage, index, command)?;
        }
    }

    Ok(())
}

/// Validate a workflow against the parameters supplied for one invocation
pub fn validate_invocation(
    workflow: &Workflow,
    params: &BTreeMap<String, String>,
) -> Result<(), WorkflowError> {
    if !workflow.status().accepts_runs() {
        return Err(WorkflowError::validation(format!(
            "Workflow '{}' is {} and cannot be executed",
            workflow.id(),
            workflow.status()
        )));
    }

    validate_workflow(workflow)?;

    let missing: Vec<String> = workflow
        .required_params()
        .into_iter()
        .filter(|name| !params.contains_key(name))
        .collect();

    if !missing.is_empty() {
        return Err(WorkflowError::validation(format!(
            "Missing dynamic parameters: {}",
            missing.join(", ")
        )));
    }

    for stage in Stage::ALL {
        for (index, command) in workflow.commands(stage).iter().enumerate() {
            validate_patterns(stage, index, command, params)?;
        }
    }

    Ok(())
}

fn validate_command(stage: Stage, index: usize, command: &CommandSpec) -> Result<(), WorkflowError> {
    let at = |message: String| {
        WorkflowError::validation(format!("{} command {}: {}", stage, index, message))
    };

    if command.command_template.trim().is_empty() {
        return Err(at("command text is empty".to_string()));
    }

    if let Some(binding) = &command.variable_binding {
        if !is_valid_name(&binding.name) {
            return Err(at(format!("invalid variable name '{}'", binding.name)));
        }
    }

    if let Some(condition) = &command.condition {
        if let ConditionType::IfVariableEquals { variable_name, .. } = &condition.kind {
            if !is_valid_name(variable_name) {
                return Err(at(format!("invalid variable name '{}'", variable_name)));
            }
        }

        for branch in condition
            .then_commands
            .iter()
            .chain(condition.else_commands.iter())
        {
            if branch.command.trim().is_empty() {
                return Err(at("branch command text is empty".to_string()));
            }
        }
    }

    Ok(())
}

/// Check every regex the command will compile, with parameters substituted
/// and variable tokens blanked
fn validate_patterns(
    stage: Stage,
    index: usize,
    command: &CommandSpec,
    params: &BTreeMap<String, String>,
) -> Result<(), WorkflowError> {
    let check = |pattern: &str| {
        compile_pattern(&VariableContext::preview_template(params, pattern))
            .map(|_| ())
            .map_err(|e| {
                WorkflowError::validation(format!("{} command {}: {}", stage, index, e))
            })
    };

    if let Some(rule) = command.match_rule.as_ref().filter(|r| r.operator.is_regex()) {
        check(&rule.pattern)?;
    }

    if let Some(condition) = &command.condition {
        if condition.effective_operator().is_regex() {
            match &condition.kind {
                ConditionType::IfRegexMatches { pattern } => check(pattern)?,
                ConditionType::IfOutputContains { text } => check(text)?,
                ConditionType::IfVariableEquals { value, .. } => check(value)?,
                ConditionType::IfExitCodeEquals { .. } => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::domain::workflow::{
        ConditionSpec, MatchRule, WorkflowId, WorkflowStatus,
    };

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn workflow(implementation: Vec<CommandSpec>) -> Workflow {
        Workflow::new(WorkflowId::new("test").unwrap(), "Test")
            .with_status(WorkflowStatus::Active)
            .with_implementation(implementation)
    }

    #[test]
    fn test_valid_invocation() {
        let wf = workflow(vec![CommandSpec::new("vlan {{vlan_id}}")]);
        assert!(validate_invocation(&wf, &params(&[("vlan_id", "100")])).is_ok());
    }

    #[test]
    fn test_missing_params_listed_in_order() {
        let wf = workflow(vec![
            CommandSpec::new("interface {{ifname}}"),
            CommandSpec::new("switchport access vlan {{vlan_id}}"),
        ]);

        let err = validate_invocation(&wf, &params(&[])).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Validation error: Missing dynamic parameters: ifname, vlan_id"
        );
    }

    #[test]
    fn test_paused_and_archived_rejected() {
        for status in [WorkflowStatus::Paused, WorkflowStatus::Archived] {
            let wf = workflow(vec![CommandSpec::new("show version")]).with_status(status);
            let err = validate_invocation(&wf, &params(&[])).unwrap_err();
            assert!(err.to_string().contains(status.as_str()));
        }

        let wf = workflow(vec![CommandSpec::new("show version")]).with_status(WorkflowStatus::Draft);
        assert!(validate_invocation(&wf, &params(&[])).is_ok());
    }

    #[test]
    fn test_empty_forward_stages_accepted() {
        let wf = Workflow::new(WorkflowId::new("empty").unwrap(), "Empty")
            .with_rollback(vec![CommandSpec::new("write memory")]);
        assert_ok!(validate_workflow(&wf));
        assert_ok!(validate_invocation(&wf, &params(&[])));
    }

    #[test]
    fn test_malformed_pattern_rejected() {
        let wf = workflow(vec![CommandSpec::new("show version").with_match(MatchRule::matches("(IOS"))]);
        let err = assert_err!(validate_invocation(&wf, &params(&[])));
        assert!(err.to_string().contains("implementation command 0"));
    }

    #[test]
    fn test_pattern_checked_after_param_substitution() {
        let wf = workflow(vec![
            CommandSpec::new("show vlan").with_match(MatchRule::matches(r"vlan {{vlan_id}}\s+{state}")),
        ]);
        assert!(validate_invocation(&wf, &params(&[("vlan_id", "10")])).is_ok());

        // The supplied value itself breaks the regex
        assert!(validate_invocation(&wf, &params(&[("vlan_id", "[10")])).is_err());
    }

    #[test]
    fn test_substring_pattern_not_compiled() {
        let wf = workflow(vec![CommandSpec::new("show log").with_match(MatchRule::contains("(oops"))]);
        assert!(validate_invocation(&wf, &params(&[])).is_ok());
    }

    #[test]
    fn test_condition_regex_checked() {
        let wf = workflow(vec![CommandSpec::new("show int").with_condition(ConditionSpec::new(
            ConditionType::IfRegexMatches {
                pattern: "[down".to_string(),
            },
        ))]);
        assert!(validate_invocation(&wf, &params(&[])).is_err());
    }

    #[test]
    fn test_binding_accepted_with_any_rule() {
        let wf = workflow(vec![CommandSpec::new("show version")
            .with_match(MatchRule::contains("IOS"))
            .with_binding("ver")]);
        assert_ok!(validate_invocation(&wf, &params(&[])));

        let wf = workflow(vec![CommandSpec::new("show int").with_binding("ifname")]);
        assert_ok!(validate_invocation(&wf, &params(&[])));

        let wf = workflow(vec![CommandSpec::new("show int")
            .with_match(MatchRule::matches(r"name (\S+)"))
            .with_binding("ifname")]);
        assert!(validate_workflow(&wf).is_ok());
    }

    #[test]
    fn test_invalid_binding_name() {
        let wf = workflow(vec![CommandSpec::new("show int")
            .with_match(MatchRule::matches(r"(\S+)"))
            .with_binding("if-name")]);
        assert!(validate_workflow(&wf).is_err());
    }

    #[test]
    fn test_empty_command_rejected() {
        let wf = workflow(vec![CommandSpec::new("   ")]);
        assert!(validate_workflow(&wf).is_err());
    }
}
