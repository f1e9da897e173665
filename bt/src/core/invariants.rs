//! Semantic invariants of `loop-progress.json` not expressible via JSON Schema.

use crate::core::progress::LoopProgress;
use crate::core::types::{LoopResult, StageStatus};
use crate::core::verdict::is_approved;

/// Check semantic invariants:
/// - `maxIterations > 0`
/// - `completedIterations == len(iterations)`
/// - iteration indices are `1..=n` in order
/// - review never ran after a failed implement, fix never ran without a passing review
/// - `success` implies the last verdict is approving
pub fn validate_progress(progress: &LoopProgress) -> Vec<String> {
    let mut errors = Vec::new();

    if progress.max_iterations == 0 {
        errors.push("maxIterations must be > 0".to_string());
    }

    if progress.completed_iterations as usize != progress.iterations.len() {
        errors.push(format!(
            "completedIterations {} does not match {} recorded iterations",
            progress.completed_iterations,
            progress.iterations.len()
        ));
    }

    for (position, iteration) in progress.iterations.iter().enumerate() {
        let expected = position as u32 + 1;
        if iteration.index != expected {
            errors.push(format!(
                "iteration at position {position} has index {}, expected {expected}",
                iteration.index
            ));
        }
        if iteration.implement_status != StageStatus::Pass
            && iteration.review_status != StageStatus::Skip
        {
            errors.push(format!(
                "iteration {}: review ran without a passing implement",
                iteration.index
            ));
        }
        if iteration.review_status != StageStatus::Pass
            && iteration.fix_status != StageStatus::Skip
        {
            errors.push(format!(
                "iteration {}: fix ran without a passing review",
                iteration.index
            ));
        }
    }

    if progress.result == LoopResult::Success {
        match progress.last_iteration() {
            Some(last) if is_approved(&last.verdict) => {}
            _ => errors.push("result is success but the last verdict is not approving".to_string()),
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::Iteration;

    const T: &str = "2026-01-01T00:00:00.000000Z";

    fn passed(index: u32, verdict: &str) -> Iteration {
        Iteration {
            implement_status: StageStatus::Pass,
            review_status: StageStatus::Pass,
            verdict: verdict.to_string(),
            ..Iteration::new(index)
        }
    }

    #[test]
    fn valid_progress_has_no_errors() {
        let progress = LoopProgress::new("f", 3, T)
            .append(passed(1, "NEEDS_CHANGES"), T)
            .append(passed(2, "APPROVED"), T)
            .with_result(LoopResult::Success, T);
        assert!(validate_progress(&progress).is_empty());
    }

    #[test]
    fn reports_counter_mismatch_and_gaps() {
        let mut progress = LoopProgress::new("f", 3, T).append(passed(2, ""), T);
        progress.completed_iterations = 5;
        let errors = validate_progress(&progress);
        assert!(errors.iter().any(|e| e.contains("completedIterations")));
        assert!(errors.iter().any(|e| e.contains("expected 1")));
    }

    #[test]
    fn reports_review_after_failed_implement() {
        let mut bad = passed(1, "");
        bad.implement_status = StageStatus::Fail;
        let progress = LoopProgress::new("f", 3, T).append(bad, T);
        let errors = validate_progress(&progress);
        assert!(errors.iter().any(|e| e.contains("review ran")));
    }

    #[test]
    fn success_requires_approving_last_verdict() {
        let progress = LoopProgress::new("f", 3, T)
            .append(passed(1, "NEEDS_CHANGES"), T)
            .with_result(LoopResult::Success, T);
        let errors = validate_progress(&progress);
        assert!(errors.iter().any(|e| e.contains("success")));
    }
}
