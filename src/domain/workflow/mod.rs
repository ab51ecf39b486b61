//! Workflow domain module
//!
//! A workflow is an immutable definition made of four ordered command lists:
//! `pre_check`, `implementation`, `post_check` and `rollback`.
//!
//! ## Template tokens
//!
//! - `{{name}}` - dynamic parameter supplied with the execution request
//! - `{name}` - variable bound by an earlier command in the same run

mod command;
mod context;
mod entity;
mod error;
mod executor;
pub mod matcher;
pub mod repository;
mod validation;

pub use command::{
    BranchCommand, CommandSpec, ConditionSpec, ConditionType, MatchOperator, MatchRule,
    VariableBinding,
};
pub use context::{is_valid_name, TemplateToken, VariableContext};
pub use entity::{
    validate_workflow_id, Stage, Workflow, WorkflowId, WorkflowStatus, MAX_ID_LENGTH,
};
pub use error::WorkflowError;
pub use executor::WorkflowExecutor;
pub use matcher::{compile_pattern, MatchFailureReason, MatchOutcome};
pub use repository::WorkflowRepository;
pub use validation::{validate_invocation, validate_workflow};
