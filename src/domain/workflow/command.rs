//! Command specification types for workflow stages

use serde::{Deserialize, Serialize};

/// Match operators applied to command output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
    /// Case-sensitive substring test
    Contains,

    /// Negated substring test
    NotContains,

    /// Exact match after trimming both sides
    #[serde(alias = "equal")]
    Equals,

    /// Negated exact match after trimming both sides
    NotEqual,

    /// Case-sensitive prefix test
    StartsWith,

    /// Case-sensitive suffix test
    EndsWith,

    /// Regular expression search anywhere in the output
    Matches,
}

impl MatchOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::Equals => "equals",
            Self::NotEqual => "not_equal",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Matches => "matches",
        }
    }

    /// Whether the pattern is interpreted as a regular expression
    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Matches)
    }
}

impl std::fmt::Display for MatchOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Match rule: operator plus pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRule {
    pub operator: MatchOperator,
    pub pattern: String,
}

impl MatchRule {
    pub fn new(operator: MatchOperator, pattern: impl Into<String>) -> Self {
        Self {
            operator,
            pattern: pattern.into(),
        }
    }

    pub fn contains(pattern: impl Into<String>) -> Self {
        Self::new(MatchOperator::Contains, pattern)
    }

    pub fn matches(pattern: impl Into<String>) -> Self {
        Self::new(MatchOperator::Matches, pattern)
    }
}

/// Where to store a value extracted from a command's output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariableBinding {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Condition kinds with their type-specific parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionType {
    /// Regular expression applied to the command output
    IfRegexMatches { pattern: String },

    /// Exit code reported by the device
    IfExitCodeEquals { exit_code: i32 },

    /// Text searched in the command output
    IfOutputContains { text: String },

    /// Value of a bound variable
    IfVariableEquals { variable_name: String, value: String },
}

impl ConditionType {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::IfRegexMatches { .. } => "if_regex_matches",
            Self::IfExitCodeEquals { .. } => "if_exit_code_equals",
            Self::IfOutputContains { .. } => "if_output_contains",
            Self::IfVariableEquals { .. } => "if_variable_equals",
        }
    }

    /// Operator used when the condition does not set one
    pub fn default_operator(&self) -> MatchOperator {
        match self {
            Self::IfRegexMatches { .. } => MatchOperator::Matches,
            Self::IfExitCodeEquals { .. } => MatchOperator::Equals,
            Self::IfOutputContains { .. } => MatchOperator::Contains,
            Self::IfVariableEquals { .. } => MatchOperator::Equals,
        }
    }
}

/// Reduced command spec used inside condition branches.
///
/// Branch commands carry no match rule, binding, or nested condition, which
/// keeps branching one level deep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BranchCommand {
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BranchCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Synthesize a full command spec with no match, binding, or condition
    pub fn to_command_spec(&self) -> CommandSpec {
        CommandSpec {
            command_template: self.command.clone(),
            description: self.description.clone(),
            match_rule: None,
            variable_binding: None,
            condition: None,
            expected_exit_code: None,
            timeout_ms: None,
        }
    }
}

/// Conditional branch attached to a command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConditionSpec {
    #[serde(flatten)]
    pub kind: ConditionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<MatchOperator>,

    #[serde(default, rename = "then")]
    pub then_commands: Vec<BranchCommand>,

    #[serde(default, rename = "else")]
    pub else_commands: Vec<BranchCommand>,
}

impl ConditionSpec {
    pub fn new(kind: ConditionType) -> Self {
        Self {
            kind,
            operator: None,
            then_commands: Vec::new(),
            else_commands: Vec::new(),
        }
    }

    pub fn with_operator(mut self, operator: MatchOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn with_then(mut self, commands: Vec<BranchCommand>) -> Self {
        self.then_commands = commands;
        self
    }

    pub fn with_else(mut self, commands: Vec<BranchCommand>) -> Self {
        self.else_commands = commands;
        self
    }

    pub fn effective_operator(&self) -> MatchOperator {
        self.operator.unwrap_or_else(|| self.kind.default_operator())
    }
}

/// One step of a workflow stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command text; may contain `{{param}}` and `{variable}` tokens
    #[serde(rename = "command")]
    pub command_template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Validation rule; absent means the command always matches
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_rule: Option<MatchRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_binding: Option<VariableBinding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionSpec>,

    /// Checked independently of the match rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_exit_code: Option<i32>,

    /// Per-command timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl CommandSpec {
    pub fn new(command_template: impl Into<String>) -> Self {
        Self {
            command_template: command_template.into(),
            description: None,
            match_rule: None,
            variable_binding: None,
            condition: None,
            expected_exit_code: None,
            timeout_ms: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_match(mut self, rule: MatchRule) -> Self {
        self.match_rule = Some(rule);
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>) -> Self {
        self.variable_binding = Some(VariableBinding::new(name));
        self
    }

    pub fn with_condition(mut self, condition: ConditionSpec) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_expected_exit_code(mut self, exit_code: i32) -> Self {
        self.expected_exit_code = Some(exit_code);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// All text fields that may carry template tokens, in declaration order
    pub fn templates(&self) -> Vec<&str> {
        let mut templates = vec![self.command_template.as_str()];

        if let Some(rule) = &self.match_rule {
            templates.push(&rule.pattern);
        }

        if let Some(condition) = &self.condition {
            match &condition.kind {
                ConditionType::IfRegexMatches { pattern } => templates.push(pattern),
                ConditionType::IfOutputContains { text } => templates.push(text),
                ConditionType::IfVariableEquals { value, .. } => templates.push(value),
                ConditionType::IfExitCodeEquals { .. } => {}
            }

            for branch in condition
                .then_commands
                .iter()
                .chain(condition.else_commands.iter())
            {
                templates.push(&branch.command);
            }
        }

        templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_spec_deserialization() {
        let spec: CommandSpec = serde_json::from_value(json!({
            "command": "show version",
            "match": {"operator": "contains", "pattern": "IOS"}
        }))
        .unwrap();

        assert_eq!(spec.command_template, "show version");
        assert_eq!(spec.match_rule, Some(MatchRule::contains("IOS")));
        assert!(spec.variable_binding.is_none());
        assert!(spec.condition.is_none());
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let result: Result<CommandSpec, _> = serde_json::from_value(json!({
            "command": "show version",
            "match": {"operator": "roughly", "pattern": "IOS"}
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_equal_alias() {
        let rule: MatchRule =
            serde_json::from_value(json!({"operator": "equal", "pattern": "up"})).unwrap();
        assert_eq!(rule.operator, MatchOperator::Equals);
    }

    #[test]
    fn test_condition_deserialization() {
        let condition: ConditionSpec = serde_json::from_value(json!({
            "type": "if_variable_equals",
            "variable_name": "state",
            "value": "down",
            "then": [{"command": "no shutdown", "description": "bring it up"}],
            "else": []
        }))
        .unwrap();

        assert_eq!(
            condition.kind,
            ConditionType::IfVariableEquals {
                variable_name: "state".to_string(),
                value: "down".to_string()
            }
        );
        assert_eq!(condition.effective_operator(), MatchOperator::Equals);
        assert_eq!(condition.then_commands.len(), 1);
        assert!(condition.else_commands.is_empty());
    }

    #[test]
    fn test_branch_command_rejects_nested_condition() {
        let result: Result<ConditionSpec, _> = serde_json::from_value(json!({
            "type": "if_output_contains",
            "text": "down",
            "then": [{
                "command": "no shutdown",
                "condition": {"type": "if_output_contains", "text": "x"}
            }]
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_condition_serialization_uses_type_tag() {
        let condition = ConditionSpec::new(ConditionType::IfExitCodeEquals { exit_code: 0 })
            .with_then(vec![BranchCommand::new("write memory")]);

        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value["type"], "if_exit_code_equals");
        assert_eq!(value["exit_code"], 0);
        assert_eq!(value["then"][0]["command"], "write memory");
    }

    #[test]
    fn test_branch_to_command_spec() {
        let spec = BranchCommand::new("clear counters {ifname}")
            .with_description("reset")
            .to_command_spec();

        assert_eq!(spec.command_template, "clear counters {ifname}");
        assert_eq!(spec.description.as_deref(), Some("reset"));
        assert!(spec.match_rule.is_none());
        assert!(spec.variable_binding.is_none());
        assert!(spec.condition.is_none());
    }

    #[test]
    fn test_templates_cover_condition_and_branches() {
        let spec = CommandSpec::new("show vlan {{vlan_id}}")
            .with_match(MatchRule::contains("{{vlan_id}}"))
            .with_condition(
                ConditionSpec::new(ConditionType::IfOutputContains {
                    text: "{{expected}}".to_string(),
                })
                .with_else(vec![BranchCommand::new("vlan {{vlan_id}}")]),
            );

        assert_eq!(
            spec.templates(),
            vec![
                "show vlan {{vlan_id}}",
                "{{vlan_id}}",
                "{{expected}}",
                "vlan {{vlan_id}}"
            ]
        );
    }
}
