//! Command-line front end for ACP Sentinel.
//!
//! - `acp-sentinel validate <TRACE> --session <ID>` replays a recorded JSONL
//!   trace through the validator and prints its findings
//! - `acp-sentinel bench --mode <MODE>` runs a codec micro-benchmark

pub mod bench;
pub mod cli;
pub mod validate;

pub use cli::{BenchMode, Cli, Commands, OutputFormat};
