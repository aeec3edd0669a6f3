//! `streamwatch` binary

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use streamwatch_cli::{read_document, replay, ReplayOptions, Scenario};
use streamwatch_core::EngineConfig;
use streamwatch_policy::Policy;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("streamwatch")
        .version(streamwatch_cli::VERSION)
        .about("Streaming presence reconciliation engine")
        .subcommand_required(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay a scenario against in-memory collaborators")
                .arg(
                    Arg::new("scenario")
                        .long("scenario")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Scenario file (yaml, json or toml)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .env("STREAMWATCH_CONFIG")
                        .value_parser(value_parser!(PathBuf))
                        .help("Engine configuration (toml)"),
                )
                .arg(
                    Arg::new("concurrent")
                        .long("concurrent")
                        .action(ArgAction::SetTrue)
                        .help("Deliver events through the concurrent event pump"),
                ),
        )
        .subcommand(
            Command::new("check-policy")
                .about("Validate a policy file")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Policy file (yaml, json or toml)"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("replay", args)) => {
            let scenario_path = args
                .get_one::<PathBuf>("scenario")
                .context("--scenario is required")?;
            let config = match args.get_one::<PathBuf>("config") {
                Some(path) => EngineConfig::from_file(path)?,
                None => EngineConfig::default(),
            };

            let scenario = Scenario::from_file(scenario_path)?;
            let options = ReplayOptions {
                config,
                concurrent: args.get_flag("concurrent"),
            };
            let report = replay(&scenario, options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(("check-policy", args)) => {
            let path = args.get_one::<PathBuf>("file").context("policy file is required")?;
            let policy: Policy = read_document(path)?;
            policy
                .validate()
                .with_context(|| format!("{} is not a valid policy", path.display()))?;
            println!("{}: ok", path.display());
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn parses_replay_flags() {
        let matches = cli()
            .try_get_matches_from(["streamwatch", "replay", "--scenario", "s.yaml", "--json-logs"])
            .unwrap();
        assert!(matches.get_flag("json-logs"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "replay");
        assert_eq!(
            args.get_one::<PathBuf>("scenario"),
            Some(&PathBuf::from("s.yaml"))
        );
    }
}
