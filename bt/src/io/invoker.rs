//! One stage call: log header, stale-output removal, agent dispatch, output pickup.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::slug::Feature;
use crate::core::types::Stage;
use crate::io::agent::{Agent, StageInput, call_stage};
use crate::io::paths::FeaturePaths;
use crate::io::process::open_append;

/// Outcome of one stage call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The agent exited non-zero (or was killed).
    Failed { exit_code: Option<i32> },
    /// The agent exited zero. `document` is the stage's output file when the
    /// stage has one and the agent wrote it.
    Completed { document: Option<String> },
}

/// Invoke `stage` for `feature` and collect its outcome.
///
/// Any stale output document is removed first, so a document present after
/// the call was written by this call.
#[instrument(skip_all, fields(stage = %stage, feature = %feature))]
pub fn invoke_stage<A: Agent + ?Sized>(
    agent: &A,
    paths: &FeaturePaths,
    feature: &Feature,
    workdir: &Path,
    stage: Stage,
    prompt: String,
    ts: &str,
) -> Result<StageOutcome> {
    fs::create_dir_all(&paths.artifacts_dir)
        .with_context(|| format!("create {}", paths.artifacts_dir.display()))?;
    let log_path = paths.stage_log(stage);
    let mut log = open_append(&log_path)?;
    writeln!(log, "=== bt {stage} {feature} {ts} ===")
        .with_context(|| format!("write {}", log_path.display()))?;
    drop(log);

    let output_path = paths.stage_output(stage);
    if let Some(path) = &output_path
        && path.exists()
    {
        fs::remove_file(path).with_context(|| format!("remove stale {}", path.display()))?;
    }

    info!("invoking agent");
    let exit = call_stage(
        agent,
        stage,
        StageInput {
            feature: feature.clone(),
            workdir: workdir.to_path_buf(),
            prompt,
            log_path,
            output_path: output_path.clone(),
        },
    )?;

    if !exit.success() {
        warn!(exit_code = ?exit.code, "stage failed");
        return Ok(StageOutcome::Failed {
            exit_code: exit.code,
        });
    }

    let document = match &output_path {
        Some(path) if path.exists() => Some(
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?,
        ),
        Some(path) => {
            warn!(path = %path.display(), "stage exited 0 without writing its document");
            None
        }
        None => None,
    };
    Ok(StageOutcome::Completed { document })
}
