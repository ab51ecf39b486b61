//! Workflow interpreter and definition storage

mod command_evaluator;
mod condition_resolver;
mod in_memory_repository;
mod loader;
mod orchestrator;
mod stage_runner;

pub use command_evaluator::{CommandEvaluator, DEFAULT_COMMAND_TIMEOUT};
pub use condition_resolver::{BranchOutcome, ConditionResolver, SelectedBranch};
pub use in_memory_repository::InMemoryWorkflowRepository;
pub use loader::{load_workflow_file, parse_workflow, DefinitionFormat};
pub use orchestrator::{OrchestratorConfig, WorkflowOrchestrator};
pub use stage_runner::{StageRunner, StageStatus, StepSink};
