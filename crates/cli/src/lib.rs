pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use outbound_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "outbound",
    about = "Outbound operator CLI",
    long_about = "Score prospects against an ICP, inspect and simulate sequence templates, and check configuration readiness.",
    after_help = "Examples:\n  outbound score --icp icp.toml --prospects prospects.json\n  outbound simulate --template standard --skip 2\n  outbound icp-templates code-security > icp.json\n  outbound doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Bulk-score a JSON array of prospects against an ICP file and print the ranking")]
    Score {
        #[arg(long, help = "ICP definition (TOML or JSON)")]
        icp: PathBuf,
        #[arg(long, help = "JSON array of prospects to score")]
        prospects: PathBuf,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the built-in sequence templates as JSON")]
    Templates,
    #[command(about = "List the built-in ICP templates, or print one as an ICP file")]
    IcpTemplates {
        #[arg(help = "Template key; omit to list every template")]
        key: Option<String>,
    },
    #[command(about = "Drive a sequence template to completion and print every transition")]
    Simulate {
        #[arg(long, default_value = "standard", help = "Template key")]
        template: String,
        #[arg(long = "skip", value_name = "ORDER", help = "Skip the step at this order instead of completing it")]
        skip: Vec<u32>,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Validate config and LLM credential readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Score { icp, prospects, json } => commands::score::run(&icp, &prospects, json),
        Command::Templates => commands::templates::run(),
        Command::IcpTemplates { key } => commands::icp_templates::run(key.as_deref()),
        Command::Simulate { template, skip } => commands::simulate::run(&template, &skip),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so command output on stdout stays parseable. A config
/// that fails to load falls back to defaults here; `config` and `doctor`
/// report the failure themselves. `RUST_LOG` wins over `logging.level`.
fn init_logging() {
    let config = AppConfig::load(LoadOptions::default()).unwrap_or_default();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = installed {
        eprintln!("logging was not initialised: {error}");
    }
}
