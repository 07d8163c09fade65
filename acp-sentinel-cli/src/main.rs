//! ACP Sentinel CLI
//!
//! Exit codes:
//! - 0: Success, or a trace with no error findings
//! - 1: A trace with error findings, or the command failed

use clap::Parser;
use tracing_subscriber::EnvFilter;

use acp_sentinel_cli::bench::run_bench;
use acp_sentinel_cli::validate::{run_validate, ValidateArgs};
use acp_sentinel_cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("acp_sentinel=debug,acp_sentinel_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = dispatch_command(cli.command);
    std::process::exit(exit_code);
}

fn dispatch_command(command: Commands) -> i32 {
    match command {
        Commands::Validate {
            trace,
            session,
            stop_on_first_error,
            format,
            config,
        } => result_to_exit(run_validate(&ValidateArgs {
            trace: &trace,
            session: &session,
            stop_on_first_error,
            format,
            config: config.as_deref(),
        })),
        Commands::Bench {
            mode,
            count,
            tokens,
        } => result_to_exit(run_bench(mode, count, tokens).and_then(|report| {
            println!("{}", serde_json::to_string(&report)?);
            Ok(0)
        })),
    }
}

/// Convert a command result to an exit code.
fn result_to_exit(result: anyhow::Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}
