//! CLI definition for the `acp-sentinel` command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// How `validate` prints its findings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// One JSON object per finding
    Json,
}

/// Workload run by `bench`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BenchMode {
    /// Decode one initialize request and encode its result
    ColdStart,
    /// Decode a session/new request, encode and decode its result
    #[default]
    Roundtrip,
    /// Decode a rotating set of sample frames
    Throughput,
    /// Decode a sample frame and encode a result per iteration
    Codec,
    /// Decode large agent message chunks
    Tokens,
}

impl BenchMode {
    pub fn name(&self) -> &'static str {
        match self {
            BenchMode::ColdStart => "cold-start",
            BenchMode::Roundtrip => "roundtrip",
            BenchMode::Throughput => "throughput",
            BenchMode::Codec => "codec",
            BenchMode::Tokens => "tokens",
        }
    }
}

impl std::fmt::Display for BenchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// ACP Sentinel
///
/// Validates recorded Agent Client Protocol traffic and benchmarks the wire codec.
#[derive(Parser, Debug)]
#[command(name = "acp-sentinel")]
#[command(version)]
#[command(about = "Agent Client Protocol trace validator and codec benchmark")]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSONL trace through the validator and print its findings
    Validate {
        /// Trace file, one `{"from": "client"|"agent", "frame": ...}` object per line
        trace: PathBuf,
        /// Session the session-lane checks focus on
        #[arg(long)]
        session: String,
        /// Stop evaluating the state machine after the first protocol error
        #[arg(long)]
        stop_on_first_error: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Configuration file (TOML, YAML or JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run a codec micro-benchmark and print one JSON status line
    Bench {
        #[arg(long, value_enum, default_value_t = BenchMode::Roundtrip)]
        mode: BenchMode,
        /// Iterations for the throughput, codec and tokens modes
        #[arg(long, default_value_t = 100)]
        count: usize,
        /// Words per agent message chunk in tokens mode
        #[arg(long, default_value_t = 100)]
        tokens: usize,
    },
}
