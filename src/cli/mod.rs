//! CLI module for the netops workflow runner
//!
//! Subcommands:
//! - `run`: execute a workflow against recorded device responses
//! - `validate`: check a workflow definition and an invocation
//! - `params`: list the dynamic parameters a workflow needs

pub mod params;
pub mod run;
pub mod validate;

use std::collections::BTreeMap;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Staged remediation workflows for network devices
#[derive(Parser)]
#[command(name = "netops-workflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute a workflow against a replayed device session
    Run(run::RunArgs),

    /// Validate a workflow definition and dynamic parameters
    Validate(validate::ValidateArgs),

    /// Print the dynamic parameters a workflow requires
    Params(params::ParamsArgs),
}

/// Load `.env`, configuration and logging
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging)?;

    Ok(config)
}

/// Parse a `key=value` argument
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value: no '=' found in '{}'", s))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid key=value: empty key in '{}'", s));
    }

    Ok((key.to_string(), value.to_string()))
}

pub(crate) fn collect_params(pairs: &[(String, String)]) -> BTreeMap<String, String> {
    pairs.iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("vlan_id=120"),
            Ok(("vlan_id".to_string(), "120".to_string()))
        );
        assert_eq!(
            parse_key_val("desc=a=b"),
            Ok(("desc".to_string(), "a=b".to_string()))
        );
        assert_eq!(parse_key_val("empty="), Ok(("empty".to_string(), String::new())));
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "netops-workflow",
            "run",
            "--workflow",
            "wf.toml",
            "--device",
            "sw-01",
            "--param",
            "ifname=Gi0/1",
        ])
        .unwrap();

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.device, "sw-01");
                assert_eq!(args.params, vec![("ifname".to_string(), "Gi0/1".to_string())]);
                assert!(args.responses.is_none());
            }
            _ => panic!("expected run"),
        }
    }
}
