//! Run command - executes a workflow against recorded responses

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::domain::{DeviceId, ExecutionRequest, RunStatus};
use crate::infrastructure::device::{ReplayScript, ReplaySessionProvider};
use crate::infrastructure::services::create_run_service;
use crate::infrastructure::workflow::{load_workflow_file, InMemoryWorkflowRepository};

/// Arguments for the run command
#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Workflow definition file (JSON or TOML)
    #[arg(long, short)]
    pub workflow: PathBuf,

    /// Target device identifier
    #[arg(long, short)]
    pub device: String,

    /// Recorded device responses (JSON)
    #[arg(long, short)]
    pub responses: Option<PathBuf>,

    /// Dynamic parameter, repeatable
    #[arg(long = "param", short, value_parser = super::parse_key_val)]
    pub params: Vec<(String, String)>,
}

/// Run a workflow and print the run record as JSON
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let workflow = load_workflow_file(&args.workflow).await?;
    let workflow_id = workflow.id().clone();

    let script = match &args.responses {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading responses from {}", path.display()))?;
            ReplayScript::from_json(&json)
                .with_context(|| format!("parsing responses from {}", path.display()))?
        }
        None => ReplayScript::new(),
    };

    let service = create_run_service(
        &config,
        Arc::new(InMemoryWorkflowRepository::with_workflows(vec![workflow])),
        Arc::new(ReplaySessionProvider::new(script)),
    )?;

    let request = ExecutionRequest::new(workflow_id, DeviceId::new(args.device))
        .with_params(super::collect_params(&args.params));
    let run = service.execute(request).await?;

    println!("{}", serde_json::to_string_pretty(&run)?);

    info!(run_id = %run.id(), status = %run.status(), "Run finished");
    if run.status() != RunStatus::Completed {
        anyhow::bail!("run {} ended with status {}", run.id(), run.status());
    }

    Ok(())
}
