//! Params command - lists required dynamic parameters

use std::path::PathBuf;

use clap::Args;

use crate::domain::{DeviceId, ExecutionRequest};
use crate::infrastructure::workflow::load_workflow_file;

/// Arguments for the params command
#[derive(Args, Clone, Debug)]
pub struct ParamsArgs {
    /// Workflow definition file (JSON or TOML)
    #[arg(long, short)]
    pub workflow: PathBuf,
}

pub async fn run(args: ParamsArgs) -> anyhow::Result<()> {
    super::bootstrap()?;

    let workflow = load_workflow_file(&args.workflow).await?;
    let required = workflow.required_params();

    if required.is_empty() {
        println!("Workflow '{}' takes no dynamic parameters", workflow.id());
    } else {
        println!("Required dynamic parameters for '{}':", workflow.id());
        for name in &required {
            println!("  {}", name);
        }
    }

    let example = ExecutionRequest::new(workflow.id().clone(), DeviceId::new("<device-id>"))
        .with_params(
            required
                .iter()
                .map(|name| (name.clone(), format!("<{}>", name)))
                .collect(),
        );

    println!();
    println!("Example request:");
    println!("{}", serde_json::to_string_pretty(&example)?);

    Ok(())
}
