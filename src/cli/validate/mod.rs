//! Validate command - checks a workflow and an invocation without running it

use std::path::PathBuf;

use clap::Args;

use crate::domain::validate_invocation;
use crate::infrastructure::workflow::load_workflow_file;

/// Arguments for the validate command
#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Workflow definition file (JSON or TOML)
    #[arg(long, short)]
    pub workflow: PathBuf,

    /// Dynamic parameter, repeatable
    #[arg(long = "param", short, value_parser = super::parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Only check the definition, not the parameters
    #[arg(long)]
    pub definition_only: bool,
}

pub async fn run(args: ValidateArgs) -> anyhow::Result<()> {
    super::bootstrap()?;

    let workflow = load_workflow_file(&args.workflow).await?;

    if !args.definition_only {
        validate_invocation(&workflow, &super::collect_params(&args.params))?;
    }

    println!(
        "Workflow '{}' is valid ({} commands, status {})",
        workflow.id(),
        workflow.command_count(),
        workflow.status()
    );

    Ok(())
}
