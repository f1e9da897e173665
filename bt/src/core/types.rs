//! Shared deterministic types for bt core logic.
//!
//! These types define stable contracts between the loop engine and its
//! collaborators. They carry no I/O and serialize to the persisted formats.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Agent stage. Each stage is one invocation of the code-generation agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Research,
    PlanReview,
    Implement,
    Review,
    Fix,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Research,
        Stage::PlanReview,
        Stage::Implement,
        Stage::Review,
        Stage::Fix,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::PlanReview => "plan-review",
            Stage::Implement => "implement",
            Stage::Review => "review",
            Stage::Fix => "fix",
        }
    }

    /// Document the stage is expected to write inside the feature directory.
    ///
    /// `None` for stages whose product is the working tree itself.
    pub fn output_file(self) -> Option<&'static str> {
        match self {
            Stage::Research => Some("RESEARCH.md"),
            Stage::PlanReview => Some("PLAN_REVIEW.md"),
            Stage::Review => Some("REVIEW.md"),
            Stage::Implement | Stage::Fix => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-stage status recorded on an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StageStatus {
    Pass,
    Fail,
    Skip,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Pass => "PASS",
            StageStatus::Fail => "FAIL",
            StageStatus::Skip => "SKIP",
        }
    }

    pub fn from_passed(passed: bool) -> Self {
        if passed {
            StageStatus::Pass
        } else {
            StageStatus::Fail
        }
    }
}

/// Where a gate pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePhase {
    /// Once, before the first iteration (also `bt gates`).
    Preflight,
    /// After an implement stage.
    Implement,
    /// After a fix stage.
    Fix,
    /// Before a pull request is opened.
    Submit,
}

impl GatePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            GatePhase::Preflight => "preflight",
            GatePhase::Implement => "implement",
            GatePhase::Fix => "fix",
            GatePhase::Submit => "submit",
        }
    }
}

impl fmt::Display for GatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted loop result. `InProgress` is written while a run is active or
/// after a crash; every other variant is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopResult {
    InProgress,
    Success,
    MaxIterationsExceeded,
    ImplementFailed,
    ReviewFailed,
    GateFailed,
    PlanNotApproved,
}

impl LoopResult {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopResult::InProgress => "in-progress",
            LoopResult::Success => "success",
            LoopResult::MaxIterationsExceeded => "max-iterations-exceeded",
            LoopResult::ImplementFailed => "implement-failed",
            LoopResult::ReviewFailed => "review-failed",
            LoopResult::GateFailed => "gate-failed",
            LoopResult::PlanNotApproved => "plan-not-approved",
        }
    }
}

impl fmt::Display for LoopResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named quality check run as a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub name: String,
    pub command: String,
}

/// Ordered gate configuration. Empty means "no gates configured", which is
/// never the same thing as "all gates pass".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateSet {
    gates: Vec<Gate>,
}

impl GateSet {
    pub fn new(gates: Vec<Gate>) -> Self {
        let mut set = Self::default();
        for gate in gates {
            set.set(gate.name, gate.command);
        }
        set
    }

    /// Insert or replace a gate, keeping the position of an existing name.
    pub fn set(&mut self, name: impl Into<String>, command: impl Into<String>) {
        let name = name.into();
        let command = command.into();
        match self.gates.iter_mut().find(|gate| gate.name == name) {
            Some(existing) => existing.command = command,
            None => self.gates.push(Gate { name, command }),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.gates.retain(|gate| gate.name != name);
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gate> {
        self.gates.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.gates.iter().map(|gate| gate.name.as_str()).collect()
    }
}
