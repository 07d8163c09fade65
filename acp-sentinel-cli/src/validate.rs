//! `acp-sentinel validate` - replay a recorded trace and report findings.

use std::path::Path;

use acp_sentinel::validation::{self, decode_jsonl, ValidationFinding, ValidationOptions};
use acp_sentinel::{ProtocolSpec, SentinelConfig};
use anyhow::Context;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::cli::OutputFormat;

/// Maximum length for messages in table display before truncation.
const MAX_MESSAGE_LENGTH: usize = 80;

/// Settings for one validate run
#[derive(Debug, Clone)]
pub struct ValidateArgs<'a> {
    pub trace: &'a Path,
    pub session: &'a str,
    pub stop_on_first_error: bool,
    pub format: OutputFormat,
    pub config: Option<&'a Path>,
}

/// Flat, serializable view of a finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingRow {
    pub severity: String,
    pub lane: String,
    pub code: Option<String>,
    pub message: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<&ValidationFinding> for FindingRow {
    fn from(finding: &ValidationFinding) -> Self {
        Self {
            severity: finding.severity.to_string(),
            lane: finding.lane.to_string(),
            code: finding.code().map(str::to_string),
            message: finding
                .failure
                .as_ref()
                .map(|failure| failure.message.clone())
                .or_else(|| finding.note.clone())
                .unwrap_or_default(),
            subject: finding.subject.to_string(),
            session_id: finding.session_id.as_ref().map(|id| id.to_string()),
            trace_index: finding.trace_index,
            note: finding.failure.as_ref().and(finding.note.clone()),
        }
    }
}

/// Decode `input` and validate it, trace-reading findings first.
pub fn validate_trace(
    input: &str,
    session: &str,
    options: &ValidationOptions,
) -> Vec<ValidationFinding> {
    let trace = decode_jsonl(input);
    if !trace.codec.is_empty() {
        tracing::debug!(
            "{} request(s) in the trace never received a response",
            trace.codec.pending_count()
        );
    }

    let report = validation::run_with(session, &ProtocolSpec::acp(), trace.messages, options);
    match &report.final_phase {
        Ok(phase) => tracing::debug!("final phase: {}", phase.name()),
        Err(err) => tracing::debug!("state machine halted: {}", err),
    }

    let mut findings = trace.findings;
    findings.extend(report.findings);
    findings
}

/// Run the validate command. Returns exit code 1 when any finding is an error.
pub fn run_validate(args: &ValidateArgs<'_>) -> anyhow::Result<i32> {
    let config = match args.config {
        Some(path) => SentinelConfig::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SentinelConfig::load().context("failed to load config")?,
    };
    let mut options = config.validation.options();
    options.stop_on_first_error |= args.stop_on_first_error;

    let input = std::fs::read_to_string(args.trace)
        .with_context(|| format!("failed to read trace {}", args.trace.display()))?;
    let findings = validate_trace(&input, args.session, &options);

    match args.format {
        OutputFormat::Table => print_table(&findings),
        OutputFormat::Json => print!("{}", render_json(&findings)?),
    }

    Ok(if findings.iter().any(ValidationFinding::is_error) {
        1
    } else {
        0
    })
}

fn print_table(findings: &[ValidationFinding]) {
    if findings.is_empty() {
        println!("No findings.");
        return;
    }
    println!("{}", render_table(findings));
    println!();

    let errors = findings.iter().filter(|f| f.is_error()).count();
    println!("{} finding(s), {} error(s)", findings.len(), errors);
}

pub fn render_table(findings: &[ValidationFinding]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Severity", "Lane", "Code", "Subject", "Message"]);

    for finding in findings {
        let row = FindingRow::from(finding);
        table.add_row(vec![
            row.trace_index.map(|i| i.to_string()).unwrap_or_default(),
            row.severity,
            row.lane,
            row.code.unwrap_or_default(),
            row.subject,
            truncate(&row.message, MAX_MESSAGE_LENGTH),
        ]);
    }
    table
}

/// One JSON object per line
pub fn render_json(findings: &[ValidationFinding]) -> anyhow::Result<String> {
    let mut out = String::new();
    for finding in findings {
        out.push_str(&serde_json::to_string(&FindingRow::from(finding))?);
        out.push('\n');
    }
    Ok(out)
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}
