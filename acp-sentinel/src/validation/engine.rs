//! Trace replay

use super::eval::EvalProfile;
use super::finding::{Lane, Severity, Subject, ValidationFinding};
use super::profile::DomainProfile;
use super::{session_lanes, tool_surface};
use crate::error::ProtocolError;
use crate::message::Message;
use crate::protocol::{Phase, ProtocolSpec};
use crate::schema::SessionId;

/// Ordered record of every message a validation run observed
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTrace {
    pub session_id: SessionId,
    pub messages: Vec<Message>,
}

impl SessionTrace {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Stop evaluating transitions after the first protocol error
    pub stop_on_first_error: bool,
    pub domain_profile: Option<DomainProfile>,
    pub eval_profile: Option<EvalProfile>,
}

impl ValidationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }

    pub fn with_domain_profile(mut self, profile: DomainProfile) -> Self {
        self.domain_profile = Some(profile);
        self
    }

    pub fn with_eval_profile(mut self, profile: EvalProfile) -> Self {
        self.eval_profile = Some(profile);
        self
    }
}

/// Complete outcome of a validation run
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Phase after the fold, or the error that halted it
    pub final_phase: Result<Phase, ProtocolError>,
    pub trace: SessionTrace,
    /// Findings in emission order
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(ValidationFinding::is_error)
    }

    pub fn findings_with_code<'a>(
        &'a self,
        code: &'a str,
    ) -> impl Iterator<Item = &'a ValidationFinding> + 'a {
        self.findings.iter().filter(move |f| f.code() == Some(code))
    }
}

/// Replay `messages` through `spec` and collect every finding.
pub fn run(
    session_id: impl Into<SessionId>,
    spec: &ProtocolSpec,
    messages: impl IntoIterator<Item = Message>,
    stop_on_first_error: bool,
    domain_profile: Option<&DomainProfile>,
) -> ValidationReport {
    let options = ValidationOptions {
        stop_on_first_error,
        domain_profile: domain_profile.cloned(),
        eval_profile: None,
    };
    run_with(session_id, spec, messages, &options)
}

/// [`run`] with the full option bundle, including advisory judges.
///
/// Without `stop_on_first_error` an illegal message is reported and skipped,
/// and the fold resumes from the last legal phase.
pub fn run_with(
    session_id: impl Into<SessionId>,
    spec: &ProtocolSpec,
    messages: impl IntoIterator<Item = Message>,
    options: &ValidationOptions,
) -> ValidationReport {
    let mut trace = SessionTrace::new(session_id);
    let mut findings = Vec::new();
    let mut phase = spec.initial.clone();
    let mut halted: Option<(usize, ProtocolError)> = None;

    for (index, message) in messages.into_iter().enumerate() {
        if halted.is_none() {
            match (spec.step)(&phase, &message) {
                Ok(next) => phase = next,
                Err(err) => {
                    tracing::debug!("[validate] message {} rejected: {}", index, err);
                    findings.push(protocol_finding(index, &message, &err));
                    if options.stop_on_first_error {
                        halted = Some((index, err));
                    }
                }
            }
        }

        if let Some(profile) = &options.domain_profile {
            findings.extend(profile.check(index, &message));
        }
        if let Some(eval) = &options.eval_profile {
            findings.extend(eval.evaluate(index, &message));
        }

        trace.push(message);
    }

    let final_phase = match halted {
        Some((index, err)) => {
            let skipped = trace.len() - index - 1;
            if skipped > 0 {
                findings.push(
                    ValidationFinding::observation(
                        Lane::Implementation,
                        Severity::Info,
                        Subject::Connection,
                        format!(
                            "state machine halted at message {}; {} later message(s) not evaluated",
                            index, skipped
                        ),
                    )
                    .at_index(index),
                );
            }
            Err(err)
        }
        None => Ok(phase),
    };

    findings.extend(session_lanes::check(&trace));
    findings.extend(tool_surface::check(&trace));

    tracing::debug!(
        "[validate] session {}: {} message(s), {} finding(s)",
        trace.session_id,
        trace.len(),
        findings.len()
    );

    ValidationReport {
        final_phase,
        trace,
        findings,
    }
}

fn protocol_finding(index: usize, message: &Message, err: &ProtocolError) -> ValidationFinding {
    let session_id = message.session_id().or_else(|| err.session_id());
    let subject = match session_id {
        Some(id) => Subject::Session(id.clone()),
        None => Subject::message_at(index, message),
    };
    ValidationFinding::new(
        Lane::Protocol,
        Severity::Error,
        err.code(),
        err.to_string(),
        subject,
    )
    .with_session(session_id)
    .at_index(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FromAgent, FromClient};
    use crate::schema::*;

    fn handshake() -> Vec<Message> {
        vec![
            FromClient::InitializeRequest(InitializeRequest::default()).into(),
            FromAgent::InitializeResult(InitializeResponse::default()).into(),
        ]
    }

    #[test]
    fn test_clean_handshake_has_no_findings() {
        let report = run("s1", &ProtocolSpec::acp(), handshake(), false, None);
        assert!(report.findings.is_empty());
        assert!(report.final_phase.unwrap().is_ready());
        assert_eq!(report.trace.len(), 2);
    }

    #[test]
    fn test_protocol_error_without_session_targets_message() {
        let messages: Vec<Message> =
            vec![FromAgent::InitializeResult(InitializeResponse::default()).into()];
        let report = run("s1", &ProtocolSpec::acp(), messages, false, None);
        let finding = &report.findings[0];
        assert_eq!(finding.code(), Some("PROTOCOL.UNEXPECTED_MESSAGE"));
        assert!(matches!(finding.subject, Subject::MessageAt(0, _)));
        assert_eq!(finding.session_id, None);
    }

    #[test]
    fn test_stop_on_first_error_still_records_trace() {
        let mut messages: Vec<Message> =
            vec![FromAgent::AuthenticateResult(AuthenticateResponse {}).into()];
        messages.extend(handshake());
        let report = run("s1", &ProtocolSpec::acp(), messages.clone(), true, None);
        assert!(report.final_phase.is_err());
        assert_eq!(report.trace.messages, messages);
        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.findings[1].lane, Lane::Implementation);

        let resumed = run("s1", &ProtocolSpec::acp(), messages, false, None);
        assert!(resumed.final_phase.as_ref().unwrap().is_ready());
        assert_eq!(resumed.errors().count(), 1);
    }
}
