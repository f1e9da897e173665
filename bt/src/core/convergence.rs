//! Pure decisions of the loop engine: where to resume, and what follows a verdict.

use crate::core::progress::LoopProgress;
use crate::core::types::LoopResult;
use crate::core::verdict::is_approved;

/// What happens after the review of iteration `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Approved: the loop ends successfully.
    Converged,
    /// Not approved on the last allowed iteration.
    Exhausted,
    /// Not approved, budget remains: run fix, then the next iteration.
    Fix,
}

pub fn decide(verdict: &str, index: u32, max_iterations: u32) -> Decision {
    if is_approved(verdict) {
        Decision::Converged
    } else if index >= max_iterations {
        Decision::Exhausted
    } else {
        Decision::Fix
    }
}

/// Choose the progress record a run works on.
///
/// A prior record whose result is not `success` is resumed: its iterations are
/// kept as a prefix, its `startedAt` is kept, and the iteration budget is
/// replaced by the one requested now. Anything else starts a fresh run.
pub fn plan_start(
    prior: Option<LoopProgress>,
    feature: &str,
    max_iterations: u32,
    now: &str,
) -> LoopProgress {
    match prior {
        Some(prior) if prior.result != LoopResult::Success && prior.feature == feature => {
            let mut resumed = prior.with_result(LoopResult::InProgress, now);
            resumed.max_iterations = max_iterations;
            resumed
        }
        _ => LoopProgress::new(feature, max_iterations, now),
    }
}
