//! `acp-sentinel bench` - codec micro-benchmarks.
//!
//! Each mode decodes sample ACP frames through the sentinel codec (and
//! encodes replies where the workload calls for it), then reports one JSON
//! status line so runs can be compared with other SDK implementations.

use std::time::{Duration, Instant};

use acp_sentinel::message::{Direction, FromAgent, Message};
use acp_sentinel::schema::{InitializeResponse, NewSessionResponse, ProtocolVersion, RequestId, SessionId};
use acp_sentinel::{codec, CodecState};
use serde::Serialize;
use serde_json::json;

use crate::cli::BenchMode;

const INITIALIZE_REQUEST: &str = r#"{"jsonrpc":"2.0","method":"initialize","params":{"protocolVersion":1,"clientCapabilities":{"fs":{"readTextFile":true,"writeTextFile":true},"terminal":true},"clientInfo":{"name":"benchmark","version":"1.0.0"}},"id":1}"#;

const SESSION_NEW_REQUEST: &str = r#"{"jsonrpc":"2.0","method":"session/new","params":{"cwd":"/tmp","mcpServers":[]},"id":1}"#;

const SESSION_UPDATE_NOTIFICATION: &str = r#"{"jsonrpc":"2.0","method":"session/update","params":{"sessionId":"sess-001","update":{"sessionUpdate":"agent_message_chunk","content":{"type":"text","text":"Hello, this is a test message."}}}}"#;

const PROMPT_REQUEST: &str = r#"{"jsonrpc":"2.0","method":"session/prompt","params":{"sessionId":"sess-001","prompt":[{"type":"text","text":"What is 2+2?"}]},"id":2}"#;

/// Frames rotated through by the throughput and codec modes, with their sender
const SAMPLE_FRAMES: [(Direction, &str); 4] = [
    (Direction::FromClient, INITIALIZE_REQUEST),
    (Direction::FromClient, SESSION_NEW_REQUEST),
    (Direction::FromAgent, SESSION_UPDATE_NOTIFICATION),
    (Direction::FromClient, PROMPT_REQUEST),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchReport {
    pub status: &'static str,
    pub mode: &'static str,
    /// Codec operations performed (each decode or encode counts once)
    pub ops: usize,
    pub elapsed_ms: u128,
    pub ops_per_sec: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_per_msg: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_per_sec: Option<u64>,
}

impl BenchReport {
    fn new(mode: BenchMode, ops: usize, elapsed: Duration) -> Self {
        Self {
            status: "ok",
            mode: mode.name(),
            ops,
            elapsed_ms: elapsed.as_millis(),
            ops_per_sec: per_second(ops, elapsed),
            tokens_per_msg: None,
            total_tokens: None,
            tokens_per_sec: None,
        }
    }
}

/// Rate over `elapsed`; runs too short to time report `count * 1000`
fn per_second(count: usize, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (count as f64 / secs) as u64
    } else {
        count as u64 * 1000
    }
}

pub fn token_update(token_count: usize) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "session/update",
        "params": {
            "sessionId": "sess-001",
            "update": {
                "sessionUpdate": "agent_message_chunk",
                "content": {"type": "text", "text": "word ".repeat(token_count)}
            }
        }
    })
    .to_string()
}

pub fn run_bench(mode: BenchMode, count: usize, tokens: usize) -> anyhow::Result<BenchReport> {
    tracing::debug!("running {} benchmark (count={}, tokens={})", mode, count, tokens);
    match mode {
        BenchMode::ColdStart => cold_start(),
        BenchMode::Roundtrip => roundtrip(),
        BenchMode::Throughput => throughput(count),
        BenchMode::Codec => codec_ops(count),
        BenchMode::Tokens => token_stream(count, tokens),
    }
}

fn cold_start() -> anyhow::Result<BenchReport> {
    let start = Instant::now();

    codec::decode(Direction::FromClient, &CodecState::new(), INITIALIZE_REQUEST)?;
    let response: Message = FromAgent::InitializeResult(InitializeResponse {
        protocol_version: ProtocolVersion(1),
        ..Default::default()
    })
    .into();
    codec::encode(Some(&RequestId::Number(1)), &response)?;

    Ok(BenchReport::new(BenchMode::ColdStart, 2, start.elapsed()))
}

fn roundtrip() -> anyhow::Result<BenchReport> {
    let start = Instant::now();

    let (state, _) = codec::decode(Direction::FromClient, &CodecState::new(), SESSION_NEW_REQUEST)?;
    let response: Message = FromAgent::SessionNewResult(NewSessionResponse {
        session_id: SessionId::new("sess-benchmark"),
        modes: None,
    })
    .into();
    let frame = codec::encode(Some(&RequestId::Number(1)), &response)?;
    let (state, _) = codec::decode(Direction::FromAgent, &state, &frame)?;
    anyhow::ensure!(state.is_empty(), "session/new result did not resolve its request");

    Ok(BenchReport::new(BenchMode::Roundtrip, 3, start.elapsed()))
}

fn throughput(count: usize) -> anyhow::Result<BenchReport> {
    let start = Instant::now();
    let fresh = CodecState::new();

    for i in 0..count {
        let (direction, frame) = SAMPLE_FRAMES[i % SAMPLE_FRAMES.len()];
        codec::decode(direction, &fresh, frame)?;
    }

    Ok(BenchReport::new(BenchMode::Throughput, count, start.elapsed()))
}

fn codec_ops(count: usize) -> anyhow::Result<BenchReport> {
    let start = Instant::now();
    let fresh = CodecState::new();
    let mut ops = 0usize;

    for i in 0..count {
        let (direction, frame) = SAMPLE_FRAMES[i % SAMPLE_FRAMES.len()];
        codec::decode(direction, &fresh, frame)?;
        ops += 1;

        let response: Message = FromAgent::SessionNewResult(NewSessionResponse {
            session_id: SessionId::new("sess-bench"),
            modes: None,
        })
        .into();
        codec::encode(Some(&RequestId::Number(i as i64)), &response)?;
        ops += 1;
    }

    Ok(BenchReport::new(BenchMode::Codec, ops, start.elapsed()))
}

fn token_stream(count: usize, tokens_per_msg: usize) -> anyhow::Result<BenchReport> {
    let frame = token_update(tokens_per_msg);
    let fresh = CodecState::new();

    let start = Instant::now();
    for _ in 0..count {
        codec::decode(Direction::FromAgent, &fresh, &frame)?;
    }
    let elapsed = start.elapsed();

    let total_tokens = count * tokens_per_msg;
    let mut report = BenchReport::new(BenchMode::Tokens, count, elapsed);
    report.tokens_per_msg = Some(tokens_per_msg);
    report.total_tokens = Some(total_tokens);
    report.tokens_per_sec = Some(per_second(total_tokens, elapsed));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::cold_start(BenchMode::ColdStart, 2)]
    #[case::roundtrip(BenchMode::Roundtrip, 3)]
    #[case::throughput(BenchMode::Throughput, 10)]
    #[case::codec(BenchMode::Codec, 20)]
    #[case::tokens(BenchMode::Tokens, 10)]
    fn test_every_mode_runs(#[case] mode: BenchMode, #[case] ops: usize) {
        let report = run_bench(mode, 10, 5).unwrap();
        assert_eq!(report.status, "ok");
        assert_eq!(report.mode, mode.name());
        assert_eq!(report.ops, ops);
        assert!(report.ops_per_sec > 0);
    }

    #[test]
    fn test_sample_frames_decode() {
        for (direction, frame) in SAMPLE_FRAMES {
            assert!(codec::decode(direction, &CodecState::new(), frame).is_ok(), "{}", frame);
        }
    }

    #[test]
    fn test_tokens_report_fields() {
        let report = run_bench(BenchMode::Tokens, 4, 25).unwrap();
        assert_eq!(report.tokens_per_msg, Some(25));
        assert_eq!(report.total_tokens, Some(100));

        let line: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(line["mode"], "tokens");
        assert!(line.get("tokens_per_sec").is_some());
    }

    #[test]
    fn test_report_omits_token_fields_elsewhere() {
        let line = serde_json::to_value(run_bench(BenchMode::Codec, 1, 0).unwrap()).unwrap();
        assert_eq!(line["ops"], 2);
        assert!(line.get("total_tokens").is_none());
    }

    #[test]
    fn test_token_update_size() {
        let frame: serde_json::Value = serde_json::from_str(&token_update(3)).unwrap();
        assert_eq!(
            frame["params"]["update"]["content"]["text"],
            "word word word "
        );
    }
}
