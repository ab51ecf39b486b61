//! Per-run variable context and template resolution
//!
//! Command templates support two token kinds:
//! - `{{param}}` - dynamic parameter supplied when the run is invoked
//! - `{variable}` - value bound by an earlier command in the same run
//!
//! The two namespaces are separate: a dynamic parameter never satisfies a
//! `{variable}` token and a bound variable never satisfies a `{{param}}` token.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::WorkflowError;

/// Double-brace alternative comes first so `{{name}}` is never read as `{name}`
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap()
});

/// Valid variable / parameter name
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Check whether a name can be used as a template token
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// A token found in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateToken {
    /// `{{name}}` dynamic parameter
    Param(String),

    /// `{name}` bound variable
    Variable(String),
}

impl TemplateToken {
    pub fn name(&self) -> &str {
        match self {
            Self::Param(name) | Self::Variable(name) => name,
        }
    }
}

/// Bound variables and dynamic parameters for one run
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// Values extracted by earlier commands
    variables: HashMap<String, String>,

    /// Invocation-time parameters
    params: BTreeMap<String, String>,
}

impl VariableContext {
    /// Create a context seeded with the invocation's dynamic parameters
    pub fn new(params: BTreeMap<String, String>) -> Self {
        Self {
            variables: HashMap::new(),
            params,
        }
    }

    /// Insert or overwrite a bound variable
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Replace every token in `template` with its current value.
    ///
    /// Resolution is a single left-to-right pass, so substituted values are
    /// never scanned for further tokens.
    pub fn resolve_template(&self, template: &str) -> Result<String, WorkflowError> {
        let mut result = String::with_capacity(template.len());
        let mut last = 0;

        for caps in TOKEN_PATTERN.captures_iter(template) {
            let Some(full) = caps.get(0) else { continue };
            result.push_str(&template[last..full.start()]);

            if let Some(param) = caps.get(1) {
                let value = self.param(param.as_str()).ok_or_else(|| {
                    WorkflowError::variable_resolution(format!(
                        "Dynamic parameter '{}' was not supplied",
                        param.as_str()
                    ))
                })?;
                result.push_str(value);
            } else if let Some(variable) = caps.get(2) {
                let value = self.variable(variable.as_str()).ok_or_else(|| {
                    WorkflowError::variable_resolution(format!(
                        "Variable '{}' is not bound",
                        variable.as_str()
                    ))
                })?;
                result.push_str(value);
            }

            last = full.end();
        }

        result.push_str(&template[last..]);
        Ok(result)
    }

    /// Check if a string contains any template tokens
    pub fn has_tokens(template: &str) -> bool {
        TOKEN_PATTERN.is_match(template)
    }

    /// Extract all tokens from a template, in order of appearance
    pub fn extract_tokens(template: &str) -> Vec<TemplateToken> {
        TOKEN_PATTERN
            .captures_iter(template)
            .filter_map(|caps| {
                if let Some(param) = caps.get(1) {
                    Some(TemplateToken::Param(param.as_str().to_string()))
                } else {
                    caps.get(2)
                        .map(|variable| TemplateToken::Variable(variable.as_str().to_string()))
                }
            })
            .collect()
    }

    /// Substitute dynamic parameters and blank out variable tokens.
    ///
    /// Used to check regex patterns before any variable has been bound.
    pub fn preview_template(params: &BTreeMap<String, String>, template: &str) -> String {
        TOKEN_PATTERN
            .replace_all(template, |caps: &regex::Captures<'_>| {
                caps.get(1)
                    .and_then(|param| params.get(param.as_str()).cloned())
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_dynamic_param() {
        let ctx = VariableContext::new(params(&[("vlan_id", "100")]));

        let result = ctx.resolve_template("vlan {{vlan_id}}").unwrap();
        assert_eq!(result, "vlan 100");
    }

    #[test]
    fn test_resolve_bound_variable() {
        let mut ctx = VariableContext::default();
        ctx.bind("ifname", "Gi0/1");

        let result = ctx.resolve_template("show interface {ifname}").unwrap();
        assert_eq!(result, "show interface Gi0/1");
    }

    #[test]
    fn test_unbound_variable_fails() {
        let ctx = VariableContext::default();

        let result = ctx.resolve_template("show interface {ifname}");
        assert!(matches!(result, Err(WorkflowError::VariableResolution(_))));
        assert!(result.unwrap_err().to_string().contains("ifname"));
    }

    #[test]
    fn test_missing_param_fails() {
        let ctx = VariableContext::default();

        let result = ctx.resolve_template("vlan {{vlan_id}}");
        assert!(matches!(result, Err(WorkflowError::VariableResolution(_))));
    }

    #[test]
    fn test_namespaces_are_distinct() {
        let mut ctx = VariableContext::new(params(&[("vlan_id", "100")]));
        ctx.bind("ifname", "Gi0/1");

        // A param does not satisfy a single-brace token and vice versa
        assert!(ctx.resolve_template("vlan {vlan_id}").is_err());
        assert!(ctx.resolve_template("interface {{ifname}}").is_err());
    }

    #[test]
    fn test_bind_overwrites() {
        let mut ctx = VariableContext::default();
        ctx.bind("state", "down");
        ctx.bind("state", "up");

        assert_eq!(ctx.variable("state"), Some("up"));
    }

    #[test]
    fn test_mixed_tokens_and_multiline() {
        let mut ctx = VariableContext::new(params(&[("desc", "uplink")]));
        ctx.bind("ifname", "Gi0/1");

        let result = ctx
            .resolve_template("interface {ifname}\n description {{desc}}\n no shutdown")
            .unwrap();
        assert_eq!(result, "interface Gi0/1\n description uplink\n no shutdown");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let mut ctx = VariableContext::default();
        ctx.bind("a", "{b}");

        let result = ctx.resolve_template("echo {a}").unwrap();
        assert_eq!(result, "echo {b}");
    }

    #[test]
    fn test_non_token_braces_left_alone() {
        let ctx = VariableContext::default();

        let result = ctx.resolve_template(r#"show run | json {"a": 1} \d{3}"#).unwrap();
        assert_eq!(result, r#"show run | json {"a": 1} \d{3}"#);
    }

    #[test]
    fn test_triple_braces() {
        let ctx = VariableContext::new(params(&[("x", "1")]));

        let result = ctx.resolve_template("{{{x}}}").unwrap();
        assert_eq!(result, "{1}");
    }

    #[test]
    fn test_extract_tokens() {
        let tokens =
            VariableContext::extract_tokens("vlan {{vlan_id}} on {ifname} name {{vlan_name}}");

        assert_eq!(
            tokens,
            vec![
                TemplateToken::Param("vlan_id".to_string()),
                TemplateToken::Variable("ifname".to_string()),
                TemplateToken::Param("vlan_name".to_string()),
            ]
        );
    }

    #[test]
    fn test_has_tokens() {
        assert!(VariableContext::has_tokens("{{a}}"));
        assert!(VariableContext::has_tokens("show {b}"));
        assert!(!VariableContext::has_tokens("show version"));
        assert!(!VariableContext::has_tokens(r"\d{1,3}"));
    }

    #[test]
    fn test_preview_template() {
        let preview =
            VariableContext::preview_template(&params(&[("vlan", "10")]), r"vlan {{vlan}} {x}\d+");
        assert_eq!(preview, r"vlan 10 \d+");
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("ifname"));
        assert!(is_valid_name("_vlan2"));
        assert!(!is_valid_name("2vlan"));
        assert!(!is_valid_name("if-name"));
        assert!(!is_valid_name(""));
    }
}
