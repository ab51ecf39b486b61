//! Domain layer - workflow model, execution records and ports

pub mod device;
pub mod error;
pub mod notification;
pub mod run;
pub mod workflow;

pub use device::{CommandOutput, DeviceError, DeviceId, DeviceSession, DeviceSessionProvider};
pub use error::DomainError;
pub use notification::{
    ExecutionEvent, ExecutionEventType, NotificationDispatcher, NotificationError,
};
pub use run::{
    BranchArm, BranchInfo, CancellationFlag, ErrorKind, ExecutionRequest, RunFailure, RunId,
    RunRepository, RunStatus, StepError, StepResult, WorkflowRun,
};
pub use workflow::{
    validate_invocation, validate_workflow, BranchCommand, CommandSpec, ConditionSpec,
    ConditionType, MatchOperator, MatchRule, Stage, VariableBinding, VariableContext, Workflow,
    WorkflowError, WorkflowExecutor, WorkflowId, WorkflowRepository, WorkflowStatus,
};
