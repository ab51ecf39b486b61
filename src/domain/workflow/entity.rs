//! Workflow domain entity

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::command::CommandSpec;
use super::context::{TemplateToken, VariableContext};
use super::error::WorkflowError;

/// Maximum length for workflow IDs
pub const MAX_ID_LENGTH: usize = 64;

/// Regex pattern for valid workflow IDs: alphanumeric, hyphens and underscores
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$").unwrap()
});

/// Validated workflow identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Create a new validated workflow ID
    pub fn new(id: impl Into<String>) -> Result<Self, WorkflowError> {
        let id = id.into();
        validate_workflow_id(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkflowId {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkflowId> for String {
    fn from(id: WorkflowId) -> Self {
        id.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for WorkflowId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a workflow ID string
pub fn validate_workflow_id(id: &str) -> Result<(), WorkflowError> {
    if id.is_empty() {
        return Err(WorkflowError::validation("Workflow ID cannot be empty"));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(WorkflowError::validation(format!(
            "Workflow ID exceeds maximum length of {} characters",
            MAX_ID_LENGTH
        )));
    }

    if !ID_PATTERN.is_match(id) {
        return Err(WorkflowError::validation(format!(
            "Invalid workflow ID '{}': must be alphanumeric with hyphens or underscores, start and end with alphanumeric",
            id
        )));
    }

    Ok(())
}

/// Lifecycle status of a workflow definition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Archived => "archived",
        }
    }

    /// Whether new runs may be started against a workflow in this status
    pub fn accepts_runs(&self) -> bool {
        matches!(self, Self::Draft | Self::Active)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named command list within a workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PreCheck,
    Implementation,
    PostCheck,
    Rollback,
}

impl Stage {
    /// Stages run in order on the happy path
    pub const FORWARD: [Stage; 3] = [Stage::PreCheck, Stage::Implementation, Stage::PostCheck];

    /// Every stage in declaration order
    pub const ALL: [Stage; 4] = [
        Stage::PreCheck,
        Stage::Implementation,
        Stage::PostCheck,
        Stage::Rollback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreCheck => "pre_check",
            Self::Implementation => "implementation",
            Self::PostCheck => "post_check",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A workflow definition.
///
/// Workflows are immutable values from the interpreter's point of view: they
/// are authored elsewhere and only borrowed by a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    /// Unique workflow identifier
    id: WorkflowId,

    /// Human-readable name
    name: String,

    #[serde(default)]
    description: String,

    #[serde(default)]
    status: WorkflowStatus,

    #[serde(default)]
    pre_check: Vec<CommandSpec>,

    #[serde(default)]
    implementation: Vec<CommandSpec>,

    #[serde(default)]
    post_check: Vec<CommandSpec>,

    #[serde(default)]
    rollback: Vec<CommandSpec>,
}

impl Workflow {
    /// Create a new, empty draft workflow
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            status: WorkflowStatus::default(),
            pre_check: Vec::new(),
            implementation: Vec::new(),
            post_check: Vec::new(),
            rollback: Vec::new(),
        }
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_stage(mut self, stage: Stage, commands: Vec<CommandSpec>) -> Self {
        *self.stage_mut(stage) = commands;
        self
    }

    pub fn with_pre_check(self, commands: Vec<CommandSpec>) -> Self {
        self.with_stage(Stage::PreCheck, commands)
    }

    pub fn with_implementation(self, commands: Vec<CommandSpec>) -> Self {
        self.with_stage(Stage::Implementation, commands)
    }

    pub fn with_post_check(self, commands: Vec<CommandSpec>) -> Self {
        self.with_stage(Stage::PostCheck, commands)
    }

    pub fn with_rollback(self, commands: Vec<CommandSpec>) -> Self {
        self.with_stage(Stage::Rollback, commands)
    }

    // Getters

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Commands of one stage, in execution order
    pub fn commands(&self, stage: Stage) -> &[CommandSpec] {
        match stage {
            Stage::PreCheck => &self.pre_check,
            Stage::Implementation => &self.implementation,
            Stage::PostCheck => &self.post_check,
            Stage::Rollback => &self.rollback,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut Vec<CommandSpec> {
        match stage {
            Stage::PreCheck => &mut self.pre_check,
            Stage::Implementation => &mut self.implementation,
            Stage::PostCheck => &mut self.post_check,
            Stage::Rollback => &mut self.rollback,
        }
    }

    pub fn has_rollback(&self) -> bool {
        !self.rollback.is_empty()
    }

    /// Total number of top-level commands across all stages
    pub fn command_count(&self) -> usize {
        Stage::ALL.iter().map(|s| self.commands(*s).len()).sum()
    }

    /// Every distinct `{{param}}` token referenced anywhere in the workflow,
    /// in order of first appearance
    pub fn required_params(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();

        for stage in Stage::ALL {
            for command in self.commands(stage) {
                for template in command.templates() {
                    for token in VariableContext::extract_tokens(template) {
                        if let TemplateToken::Param(name) = token {
                            if !names.contains(&name) {
                                names.push(name);
                            }
                        }
                    }
                }
            }
        }

        names
    }
}
