//! Match evaluation of command output
//!
//! Evaluation is a pure function of its inputs: the same output and rule
//! always produce the same outcome.

use regex::{Regex, RegexBuilder};

use super::command::{MatchOperator, MatchRule};
use super::error::WorkflowError;

/// Why a command's output was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchFailureReason {
    /// The match rule was not satisfied
    PatternNotSatisfied {
        operator: MatchOperator,
        pattern: String,
    },

    /// The device reported a different exit code than expected
    ExitCodeMismatch {
        expected: i32,
        actual: Option<i32>,
    },
}

impl std::fmt::Display for MatchFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PatternNotSatisfied { operator, pattern } => {
                write!(f, "output did not satisfy {} '{}'", operator, pattern)
            }
            Self::ExitCodeMismatch {
                expected,
                actual: Some(actual),
            } => write!(f, "expected exit code {}, got {}", expected, actual),
            Self::ExitCodeMismatch {
                expected,
                actual: None,
            } => write!(f, "expected exit code {}, device reported none", expected),
        }
    }
}

/// Result of applying a match rule to command output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Whether the match rule was satisfied (always true without a rule)
    pub matched: bool,

    /// Candidate value for a variable binding
    pub extracted: Option<String>,

    /// Set when either the rule or the exit code check failed
    pub failure: Option<MatchFailureReason>,
}

impl MatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Compile a pattern the way `matches` evaluates it
pub fn compile_pattern(pattern: &str) -> Result<Regex, WorkflowError> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| WorkflowError::validation(format!("Invalid pattern '{}': {}", pattern, e)))
}

impl MatchOperator {
    /// Evaluate the operator against a subject
    pub fn evaluate(&self, subject: &str, pattern: &str) -> Result<bool, WorkflowError> {
        Ok(match self {
            Self::Contains => subject.contains(pattern),
            Self::NotContains => !subject.contains(pattern),
            Self::Equals => subject.trim() == pattern.trim(),
            Self::NotEqual => subject.trim() != pattern.trim(),
            Self::StartsWith => subject.starts_with(pattern),
            Self::EndsWith => subject.ends_with(pattern),
            Self::Matches => compile_pattern(pattern)?.is_match(subject),
        })
    }
}

impl MatchRule {
    /// Apply the rule to raw output, extracting a value when requested.
    ///
    /// Extraction only happens for `matches`: the first capture group of the
    /// first match, or the whole match when the pattern has no group.
    pub fn apply(&self, raw_output: &str, extract: bool) -> Result<(bool, Option<String>), WorkflowError> {
        if !self.operator.is_regex() {
            return Ok((self.operator.evaluate(raw_output, &self.pattern)?, None));
        }

        let regex = compile_pattern(&self.pattern)?;
        let Some(caps) = regex.captures(raw_output) else {
            return Ok((false, None));
        };

        if !extract {
            return Ok((true, None));
        }

        let value = if regex.captures_len() > 1 {
            caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default()
        } else {
            caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default()
        };

        Ok((true, Some(value)))
    }
}

/// Evaluate a command's output against its optional rule and exit code.
///
/// Returns an error only when the pattern is not a valid regular expression.
pub fn evaluate(
    raw_output: &str,
    exit_code: Option<i32>,
    rule: Option<&MatchRule>,
    expected_exit_code: Option<i32>,
    extract: bool,
) -> Result<MatchOutcome, WorkflowError> {
    let (matched, extracted) = match rule {
        Some(rule) => rule.apply(raw_output, extract)?,
        None => (true, None),
    };

    if let Some(rule) = rule.filter(|_| !matched) {
        return Ok(MatchOutcome {
            matched,
            extracted: None,
            failure: Some(MatchFailureReason::PatternNotSatisfied {
                operator: rule.operator,
                pattern: rule.pattern.clone(),
            }),
        });
    }

    if let Some(expected) = expected_exit_code {
        if exit_code != Some(expected) {
            return Ok(MatchOutcome {
                matched,
                extracted: None,
                failure: Some(MatchFailureReason::ExitCodeMismatch {
                    expected,
                    actual: exit_code,
                }),
            });
        }
    }

    Ok(MatchOutcome {
        matched,
        extracted,
        failure: None,
    })
}
