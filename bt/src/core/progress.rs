//! Typed model of `loop-progress.json`.

use serde::{Deserialize, Serialize};

use crate::core::types::{GatePhase, LoopResult, StageStatus};

/// Current on-disk format version.
pub const PROGRESS_VERSION: u32 = 1;

/// Persisted loop state for one feature. Single source of truth for resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopProgress {
    pub version: u32,
    pub feature: String,
    pub max_iterations: u32,
    pub completed_iterations: u32,
    pub result: LoopResult,
    /// RFC 3339 timestamp of the run that owns `iterations`.
    pub started_at: String,
    pub updated_at: String,
    pub iterations: Vec<Iteration>,
}

/// One implement → review (→ fix) cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    /// 1-based, gapless.
    pub index: u32,
    pub implement_status: StageStatus,
    pub review_status: StageStatus,
    pub fix_status: StageStatus,
    /// Normalized verdict token; empty when the review produced none.
    pub verdict: String,
    pub gates: Vec<GateSummary>,
    /// File name of the history entry under `history/`.
    pub history: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSummary {
    pub stage: GatePhase,
    pub name: String,
    pub status: StageStatus,
}

impl LoopProgress {
    pub fn new(feature: &str, max_iterations: u32, now: &str) -> Self {
        Self {
            version: PROGRESS_VERSION,
            feature: feature.to_string(),
            max_iterations,
            completed_iterations: 0,
            result: LoopResult::InProgress,
            started_at: now.to_string(),
            updated_at: now.to_string(),
            iterations: Vec::new(),
        }
    }

    /// Index the next appended iteration must carry.
    pub fn next_index(&self) -> u32 {
        self.completed_iterations + 1
    }

    /// Return a copy with `iteration` appended and the counter advanced.
    pub fn append(&self, iteration: Iteration, now: &str) -> Self {
        let mut next = self.clone();
        next.iterations.push(iteration);
        next.completed_iterations += 1;
        next.updated_at = now.to_string();
        next
    }

    /// Return a copy carrying `result`.
    pub fn with_result(&self, result: LoopResult, now: &str) -> Self {
        let mut next = self.clone();
        next.result = result;
        next.updated_at = now.to_string();
        next
    }

    pub fn last_iteration(&self) -> Option<&Iteration> {
        self.iterations.last()
    }
}

impl Iteration {
    /// Fresh record: nothing has run yet.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            implement_status: StageStatus::Skip,
            review_status: StageStatus::Skip,
            fix_status: StageStatus::Skip,
            verdict: String::new(),
            gates: Vec::new(),
            history: None,
        }
    }
}
