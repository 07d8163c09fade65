//! Advisory judges
//!
//! Judges look at one message at a time and may emit Eval-lane findings.
//! They never influence the protocol fold.

use super::finding::{Lane, Severity, Subject, ValidationFinding};
use crate::message::{FromClient, Message};
use std::fmt;
use std::sync::Arc;

pub const EMPTY_INSTRUCTION: &str = "EVAL.EMPTY_INSTRUCTION";

pub trait Judge: Send + Sync {
    fn name(&self) -> &str;

    fn judge(&self, index: usize, message: &Message) -> Vec<ValidationFinding>;
}

/// Flags prompts that carry no instruction text at all
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyInstructionJudge;

impl Judge for EmptyInstructionJudge {
    fn name(&self) -> &str {
        "empty-instruction"
    }

    fn judge(&self, index: usize, message: &Message) -> Vec<ValidationFinding> {
        let Message::FromClient(FromClient::SessionPromptRequest(request)) = message else {
            return Vec::new();
        };
        let has_text = request
            .prompt
            .iter()
            .filter_map(|block| block.as_text())
            .any(|text| !text.trim().is_empty());
        let has_other = request.prompt.iter().any(|block| block.as_text().is_none());
        if has_text || has_other {
            return Vec::new();
        }
        vec![ValidationFinding::new(
            Lane::Eval,
            Severity::Warning,
            EMPTY_INSTRUCTION,
            "prompt contains no instruction text",
            Subject::Session(request.session_id.clone()),
        )
        .at_index(index)]
    }
}

/// Set of judges run over every message of a trace
#[derive(Clone, Default)]
pub struct EvalProfile {
    judges: Vec<Arc<dyn Judge>>,
}

impl EvalProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile with the built-in judges
    pub fn standard() -> Self {
        Self::new().with_judge(EmptyInstructionJudge)
    }

    pub fn with_judge(mut self, judge: impl Judge + 'static) -> Self {
        self.judges.push(Arc::new(judge));
        self
    }

    pub fn judges(&self) -> impl Iterator<Item = &dyn Judge> {
        self.judges.iter().map(|j| j.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.judges.is_empty()
    }

    /// Findings of every judge for one message; all land in the Eval lane
    pub fn evaluate(&self, index: usize, message: &Message) -> Vec<ValidationFinding> {
        self.judges
            .iter()
            .flat_map(|judge| {
                judge.judge(index, message).into_iter().map(|mut finding| {
                    finding.lane = Lane::Eval;
                    if finding.trace_index.is_none() {
                        finding.trace_index = Some(index);
                    }
                    finding
                })
            })
            .collect()
    }
}

impl fmt::Debug for EvalProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.judges.iter().map(|j| j.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ContentBlock, PromptRequest};

    fn prompt(blocks: Vec<ContentBlock>) -> Message {
        Message::FromClient(FromClient::SessionPromptRequest(PromptRequest::new("s1", blocks)))
    }

    #[test]
    fn test_empty_instruction() {
        let judge = EmptyInstructionJudge;
        assert_eq!(judge.judge(0, &prompt(vec![])).len(), 1);
        assert_eq!(judge.judge(0, &prompt(vec![ContentBlock::text("  \n")])).len(), 1);
        assert!(judge.judge(0, &prompt(vec![ContentBlock::text("fix the bug")])).is_empty());
    }

    struct Shouting;

    impl Judge for Shouting {
        fn name(&self) -> &str {
            "shouting"
        }

        fn judge(&self, _index: usize, message: &Message) -> Vec<ValidationFinding> {
            let shouted = message
                .content_blocks()
                .into_iter()
                .filter_map(|b| b.as_text())
                .any(|t| t.len() > 3 && t == t.to_uppercase());
            if shouted {
                vec![ValidationFinding::new(
                    Lane::Protocol,
                    Severity::Info,
                    "EVAL.SHOUTING",
                    "all caps",
                    Subject::Connection,
                )]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_profile_forces_eval_lane() {
        let profile = EvalProfile::standard().with_judge(Shouting);
        let findings = profile.evaluate(5, &prompt(vec![ContentBlock::text("HELLO")]));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].lane, Lane::Eval);
        assert_eq!(findings[0].trace_index, Some(5));
        assert_eq!(format!("{:?}", profile), r#"["empty-instruction", "shouting"]"#);
    }
}
