use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use evo_cli::{commands, load_requests, VERSION};
use evo_core::EvolutionConfig;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("evo")
        .version(VERSION)
        .about("Evolve - benchmark-gated self-mutation of allow-listed source files")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .default_value("evolve.toml")
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (TOML)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Apply a batch of proposals, keeping only improvements")
                .arg(
                    Arg::new("proposals")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("YAML or JSON list of {target, proposal}"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .default_value(".")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory for the JSON batch report"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Parse, screen and classify a proposal without touching files")
                .arg(
                    Arg::new("proposal")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Proposal text file"),
                ),
        )
        .subcommand(
            Command::new("benchmark")
                .about("Score the configured oracle once")
                .arg(
                    Arg::new("sample-size")
                        .long("sample-size")
                        .value_parser(value_parser!(usize))
                        .help("Items to ask; defaults to the configured baseline size"),
                ),
        )
        .subcommand(
            Command::new("restore")
                .about("Restore an allow-listed file from its sibling backup")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("File relative to the project root"),
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

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing argument {name}"))
}

fn load_config(matches: &ArgMatches) -> Result<EvolutionConfig> {
    let path = path_arg(matches, "config")?;
    EvolutionConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));

    match matches.subcommand() {
        Some(("run", args)) => {
            let config = load_config(args)?;
            let requests = load_requests(path_arg(args, "proposals")?)?;
            let probe = commands::oracle_probe(&config)?;

            let (report, path) =
                commands::run(config, probe, &requests, path_arg(args, "report")?).await?;
            println!("{}", serde_json::to_string_pretty(&report.summary)?);
            println!("report: {}", path.display());
        }
        Some(("check", args)) => {
            let path = path_arg(args, "proposal")?;
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;

            let report = commands::check(&text);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.would_skip() {
                std::process::exit(2);
            }
        }
        Some(("benchmark", args)) => {
            let config = load_config(args)?;
            let sample_size = args
                .get_one::<usize>("sample-size")
                .copied()
                .unwrap_or(config.baseline_sample_size);
            let probe = commands::oracle_probe(&config)?;

            let score = commands::benchmark(&probe, sample_size).await;
            println!("{}", serde_json::to_string_pretty(&score)?);
        }
        Some(("restore", args)) => {
            let config = load_config(args)?;
            let file = path_arg(args, "file")?;
            if !commands::restore(&config, file)? {
                bail!("no backup found for {}", file.display());
            }
            println!("restored {}", file.display());
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}
