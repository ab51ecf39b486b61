//! Per-command execution records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::workflow::Stage;

/// Classification of a failed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A `{variable}` or `{{param}}` token had no value
    VariableResolution,

    /// The device session reported a transport failure
    CommandExecution,

    /// The command did not return within its timeout
    Timeout,

    /// Output did not satisfy the match rule
    MatchFailure,

    /// The device reported an unexpected exit code
    ExitCodeMismatch,

    /// A resolved pattern could not be compiled
    InvalidPattern,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VariableResolution => "variable_resolution",
            Self::CommandExecution => "command_execution",
            Self::Timeout => "timeout",
            Self::MatchFailure => "match_failure",
            Self::ExitCodeMismatch => "exit_code_mismatch",
            Self::InvalidPattern => "invalid_pattern",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error captured on a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Which branch of a condition a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchArm {
    Then,
    Else,
}

impl BranchArm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Then => "then",
            Self::Else => "else",
        }
    }
}

/// Position of a branch step relative to the command that declared it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Index of the declaring command in its stage
    pub parent_index: usize,
    pub arm: BranchArm,

    /// Index within the selected branch
    pub index: usize,
}

/// Result of one command, top-level or branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub stage: Stage,

    /// Index of the command in its stage (the parent's index for branch steps)
    pub command_index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Unresolved command text
    pub template: String,

    /// Resolved text sent to the device; empty when resolution failed
    pub command_sent: String,

    pub raw_output: String,
    pub matched: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,

    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepResult {
    /// Start a record for a command about to be evaluated
    pub fn begin(stage: Stage, command_index: usize, template: impl Into<String>) -> Self {
        Self {
            stage,
            command_index,
            branch: None,
            description: None,
            template: template.into(),
            command_sent: String::new(),
            raw_output: String::new(),
            matched: false,
            extracted_value: None,
            exit_code: None,
            error: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn with_branch(mut self, branch: BranchInfo) -> Self {
        self.branch = Some(branch);
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Record a failure on this step
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.error = Some(StepError::new(kind, message));
    }

    /// Stamp the elapsed time since `started_at`
    pub fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_branch(&self) -> bool {
        self.branch.is_some()
    }
}

/// Why a run left the forward stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub stage: Stage,
    pub command_index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl RunFailure {
    pub fn new(stage: Stage, command_index: usize, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            command_index,
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} command {} failed ({}): {}",
            self.stage, self.command_index, self.kind, self.message
        )
    }
}
