//! JSONL trace files
//!
//! One observed frame per line, tagged with its sender:
//!
//! ```text
//! {"from": "client", "frame": {"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {...}}}
//! {"from": "agent", "frame": {"jsonrpc": "2.0", "id": 0, "result": {...}}}
//! ```
//!
//! Frames are decoded through one codec state in file order. A line that
//! cannot be read or decoded becomes a Transport-lane finding and is left out
//! of the message sequence.

use super::finding::{Lane, Severity, Subject, ValidationFinding};
use crate::codec::{self, CodecState};
use crate::message::{Direction, Message};
use serde::Deserialize;
use serde_json::Value;

pub const MALFORMED_TRACE_LINE: &str = "TRANSPORT.MALFORMED_TRACE_LINE";
pub const UNDECODABLE_FRAME: &str = "TRANSPORT.UNDECODABLE_FRAME";

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Sender {
    Client,
    Agent,
}

impl From<Sender> for Direction {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::Client => Direction::FromClient,
            Sender::Agent => Direction::FromAgent,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TraceLine {
    from: Sender,
    frame: Value,
}

/// Messages decoded from a trace file plus findings for lines that failed
#[derive(Debug, Clone, Default)]
pub struct DecodedTrace {
    pub messages: Vec<Message>,
    pub findings: Vec<ValidationFinding>,
    /// Codec state after the last line; non-empty means unanswered requests
    pub codec: CodecState,
}

pub fn decode_jsonl(input: &str) -> DecodedTrace {
    let mut trace = DecodedTrace::default();

    for (number, line) in input.lines().enumerate().map(|(i, l)| (i + 1, l)) {
        if line.trim().is_empty() {
            continue;
        }

        let parsed: TraceLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                trace.findings.push(line_finding(
                    MALFORMED_TRACE_LINE,
                    format!("trace line is not a {{from, frame}} object: {}", err),
                    number,
                ));
                continue;
            }
        };

        let direction = Direction::from(parsed.from);
        match codec::decode_value(direction, &trace.codec, parsed.frame) {
            Ok((next, message)) => {
                trace.codec = next;
                trace.messages.push(message);
            }
            Err(err) => {
                tracing::debug!("[trace] line {} rejected: {}", number, err);
                trace.findings.push(line_finding(
                    UNDECODABLE_FRAME,
                    format!("frame {} could not be decoded: {}", direction, err),
                    number,
                ));
            }
        }
    }

    trace
}

fn line_finding(code: &str, message: String, line: usize) -> ValidationFinding {
    ValidationFinding::new(
        Lane::Transport,
        Severity::Error,
        code,
        message,
        Subject::Connection,
    )
    .with_note(format!("line {}", line))
}
