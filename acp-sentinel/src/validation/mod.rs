//! Validation engine
//!
//! Replays a message trace through a [`ProtocolSpec`](crate::protocol::ProtocolSpec),
//! layers the session-lane and tool-surface invariants over the whole trace,
//! applies the optional [`DomainProfile`] content policy and [`EvalProfile`]
//! judges, and merges everything into one [`ValidationReport`]. Recorded
//! traces are read from JSONL with [`decode_jsonl`].

pub mod engine;
pub mod eval;
pub mod finding;
pub mod jsonl;
pub mod profile;
pub mod session_lanes;
pub mod tool_surface;

pub use engine::{run, run_with, SessionTrace, ValidationOptions, ValidationReport};
pub use eval::{EmptyInstructionJudge, EvalProfile, Judge};
pub use finding::{Failure, Lane, Severity, Subject, ValidationFinding};
pub use jsonl::{decode_jsonl, DecodedTrace};
pub use profile::{DomainProfile, MetadataPolicy};
