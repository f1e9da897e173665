//! Agent abstraction for stage invocation.
//!
//! The [`Agent`] trait decouples the loop engine from the actual backend
//! (currently `codex exec`). Tests use scripted agents that record calls and
//! write predetermined documents without spawning processes.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::slug::Feature;
use crate::core::types::Stage;
use crate::io::config::AgentConfig;
use crate::io::process::run_command;

/// Stage-independent inputs of one agent call.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub feature: Feature,
    /// Working directory for the agent process (the project root).
    pub workdir: PathBuf,
    /// Prompt text fed to the agent on stdin.
    pub prompt: String,
    /// Stage-scoped log under the feature's `.artifacts/`.
    pub log_path: PathBuf,
    /// Where the agent must write its document, for review-like stages.
    pub output_path: Option<PathBuf>,
}

/// A fully specified agent call.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub stage: Stage,
    pub input: StageInput,
}

/// How the agent process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentExit {
    /// Exit code; `None` when killed by a signal.
    pub code: Option<i32>,
}

impl AgentExit {
    pub const SUCCESS: AgentExit = AgentExit { code: Some(0) };

    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

/// The code-generation agent, one entry point per stage.
///
/// Implementors provide [`Agent::invoke`]; the per-stage methods bind the stage.
pub trait Agent {
    fn invoke(&self, request: &AgentRequest) -> Result<AgentExit>;

    fn research(&self, input: StageInput) -> Result<AgentExit> {
        self.invoke(&AgentRequest {
            stage: Stage::Research,
            input,
        })
    }

    fn plan_review(&self, input: StageInput) -> Result<AgentExit> {
        self.invoke(&AgentRequest {
            stage: Stage::PlanReview,
            input,
        })
    }

    fn implement(&self, input: StageInput) -> Result<AgentExit> {
        self.invoke(&AgentRequest {
            stage: Stage::Implement,
            input,
        })
    }

    fn review(&self, input: StageInput) -> Result<AgentExit> {
        self.invoke(&AgentRequest {
            stage: Stage::Review,
            input,
        })
    }

    fn fix(&self, input: StageInput) -> Result<AgentExit> {
        self.invoke(&AgentRequest {
            stage: Stage::Fix,
            input,
        })
    }
}

/// Dispatch `input` to the agent method for `stage`.
pub fn call_stage<A: Agent + ?Sized>(agent: &A, stage: Stage, input: StageInput) -> Result<AgentExit> {
    match stage {
        Stage::Research => agent.research(input),
        Stage::PlanReview => agent.plan_review(input),
        Stage::Implement => agent.implement(input),
        Stage::Review => agent.review(input),
        Stage::Fix => agent.fix(input),
    }
}

/// Agent that spawns `codex exec`.
///
/// The stage log path, feature and stage are exported as `BT_CODEX_LOG_FILE`,
/// `BT_FEATURE` and `BT_STAGE`; agent stdout/stderr are appended to the log.
#[derive(Debug, Clone)]
pub struct CodexAgent {
    bin: String,
    reasoning_effort: String,
    output_limit_bytes: usize,
}

impl CodexAgent {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            bin: config.bin.clone(),
            reasoning_effort: config.reasoning_effort.clone(),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    fn command(&self, request: &AgentRequest) -> Command {
        let input = &request.input;
        let mut cmd = Command::new(&self.bin);
        cmd.arg("exec")
            .arg("-c")
            .arg(format!("model_reasoning_effort={}", self.reasoning_effort))
            .arg("--sandbox")
            .arg("danger-full-access")
            .arg("--skip-git-repo-check");
        if let Some(output) = &input.output_path {
            cmd.arg("-o").arg(output);
        }
        cmd.arg("-")
            .current_dir(&input.workdir)
            .env("BT_CODEX_LOG_FILE", &input.log_path)
            .env("BT_FEATURE", input.feature.as_str())
            .env("BT_STAGE", request.stage.as_str());
        cmd
    }
}

impl Agent for CodexAgent {
    #[instrument(skip_all, fields(stage = %request.stage, feature = %request.input.feature))]
    fn invoke(&self, request: &AgentRequest) -> Result<AgentExit> {
        info!(bin = %self.bin, "starting codex exec");
        let output = run_command(
            self.command(request),
            Some(request.input.prompt.as_bytes()),
            self.output_limit_bytes,
            Some(&request.input.log_path),
        )
        .with_context(|| format!("run {} exec for {}", self.bin, request.stage))?;

        let exit = AgentExit {
            code: output.code(),
        };
        if exit.success() {
            debug!("codex exec completed successfully");
        } else {
            warn!(exit_code = ?exit.code, "codex exec failed");
        }
        Ok(exit)
    }
}
