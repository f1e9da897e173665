//! Typed errors that callers (mostly `main`) need to tell apart.
//!
//! Everything else travels as `anyhow::Error` with context. These types are
//! downcast at the top level to pick an exit code.

use thiserror::Error;

use crate::core::types::Stage;
use crate::exit_codes;

/// Bad arguments: invalid feature slug, non-positive iteration count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// A required artifact or repository state is missing. Raised before any
/// subprocess with side effects is started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("missing {artifact} (run `{remedy}` first)")]
    MissingArtifact { artifact: String, remedy: String },

    #[error(
        "plan not approved: {artifact} has verdict '{verdict}', expected '{expected}' (re-run `{remedy}`)"
    )]
    PlanNotApproved {
        artifact: String,
        verdict: String,
        expected: String,
        remedy: String,
    },

    #[error("Abort: ship requires all feature files to be staged\n{}", files.join("\n"))]
    UnstagedFiles { files: Vec<String> },
}

/// An agent or gate subprocess exited non-zero during a single-stage command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("{stage} failed (exit code {})", display_code(*code))]
    AgentFailed { stage: Stage, code: Option<i32> },

    #[error("{stage} exited 0 but did not write {artifact}")]
    MissingOutput { stage: Stage, artifact: String },

    #[error("gates failed after {stage}: {}", failed.join(", "))]
    GatesFailed { stage: String, failed: Vec<String> },
}

pub(crate) fn display_code(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Map an error chain to the process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.chain().any(|cause| cause.is::<UsageError>()) {
        exit_codes::USAGE
    } else {
        exit_codes::FAILURE
    }
}
