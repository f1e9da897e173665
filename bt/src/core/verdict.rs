//! Verdict extraction from review documents.
//!
//! A verdict is the token after the first `Verdict:` line in a document.
//! Markdown decoration around the label (`**Verdict:**`, `> Verdict:`, `## Verdict:`)
//! is tolerated. The token is kept as written; comparisons ignore case.

use std::sync::LazyLock;

use regex::Regex;

/// Verdict a plan review must carry before implement/loop may run.
pub const PLAN_APPROVED: &str = "APPROVED_PLAN";

/// Review verdicts that end the loop successfully.
const APPROVED_TOKENS: [&str; 2] = ["APPROVED", "APPROVE"];

static VERDICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t>*_#-]*verdict[*_]*[ \t]*:[ \t*_`]*([A-Za-z0-9_-]*)").unwrap()
});

/// Return the first verdict token in document order.
///
/// `None` when no verdict line exists. A verdict line with no token yields
/// `Some("")`, which callers treat like any other non-approving verdict.
pub fn parse_verdict(document: &str) -> Option<String> {
    VERDICT_RE
        .captures(document)
        .map(|caps| caps[1].to_string())
}

/// True if `token` signals convergence (case-insensitive).
pub fn is_approved(token: &str) -> bool {
    APPROVED_TOKENS
        .iter()
        .any(|approved| token.eq_ignore_ascii_case(approved))
}

/// Plan approval state derived from `PLAN_REVIEW.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanApproval {
    Approved,
    /// The plan review document does not exist.
    Missing,
    /// The document exists but its verdict is not [`PLAN_APPROVED`].
    NotApproved { verdict: Option<String> },
}

impl PlanApproval {
    pub fn evaluate(document: Option<&str>) -> Self {
        let Some(document) = document else {
            return PlanApproval::Missing;
        };
        match parse_verdict(document) {
            Some(token) if token.eq_ignore_ascii_case(PLAN_APPROVED) => PlanApproval::Approved,
            verdict => PlanApproval::NotApproved { verdict },
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, PlanApproval::Approved)
    }

    pub fn describe(&self) -> String {
        match self {
            PlanApproval::Approved => "approved".to_string(),
            PlanApproval::Missing => "missing".to_string(),
            PlanApproval::NotApproved { verdict: Some(v) } => format!("not approved ({v})"),
            PlanApproval::NotApproved { verdict: None } => "not approved (no verdict)".to_string(),
        }
    }
}
