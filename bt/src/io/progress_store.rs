//! Progress store: `loop-progress.json` plus one history file per iteration.
//!
//! The loop engine is the only writer during a run. Every write is atomic, so
//! a crash leaves either the previous or the new valid state on disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use jsonschema::Draft;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::history::{history_file_name, parse_history_file_name, run_started_of};
use crate::core::invariants::validate_progress;
use crate::core::progress::{Iteration, LoopProgress};
use crate::io::atomic::{write_atomic, write_json_atomic};
use crate::io::paths::FeaturePaths;

const PROGRESS_SCHEMA: &str = include_str!("../../schemas/loop_progress.schema.json");

#[derive(Debug, Clone)]
pub struct ProgressStore {
    progress_path: PathBuf,
    history_dir: PathBuf,
}

impl ProgressStore {
    pub fn new(progress_path: impl Into<PathBuf>, history_dir: impl Into<PathBuf>) -> Self {
        Self {
            progress_path: progress_path.into(),
            history_dir: history_dir.into(),
        }
    }

    pub fn for_feature(paths: &FeaturePaths) -> Self {
        Self::new(&paths.progress, &paths.history_dir)
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    /// Last persisted progress, or `None` if no run was ever recorded.
    ///
    /// The file must match the schema and the semantic invariants; a corrupt
    /// record is an error, never silently replaced.
    #[instrument(skip_all, fields(path = %self.progress_path.display()))]
    pub fn load(&self) -> Result<Option<LoopProgress>> {
        if !self.progress_path.exists() {
            debug!("no progress recorded");
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.progress_path)
            .with_context(|| format!("read {}", self.progress_path.display()))?;
        let progress = parse_progress(&raw)
            .with_context(|| format!("load {}", self.progress_path.display()))?;
        debug!(
            completed = progress.completed_iterations,
            result = %progress.result,
            "progress loaded"
        );
        Ok(Some(progress))
    }

    /// Atomically replace the progress file.
    pub fn save(&self, progress: &LoopProgress) -> Result<()> {
        let errors = validate_progress(progress);
        if !errors.is_empty() {
            bail!(
                "refusing to write invalid progress:\n- {}",
                errors.join("\n- ")
            );
        }
        write_json_atomic(&self.progress_path, progress)
            .with_context(|| format!("write {}", self.progress_path.display()))
    }

    /// Append `iteration` and persist. Returns the new record.
    pub fn append_iteration(
        &self,
        progress: &LoopProgress,
        iteration: Iteration,
        now: &str,
    ) -> Result<LoopProgress> {
        if iteration.index != progress.next_index() {
            bail!(
                "iteration {} appended out of order (expected {})",
                iteration.index,
                progress.next_index()
            );
        }
        let next = progress.append(iteration, now);
        self.save(&next)?;
        Ok(next)
    }

    /// Write the history entry for `index`, once per run.
    ///
    /// If this run (identified by `run_started_at`) already wrote an entry for
    /// `index`, that file is kept and its name returned. Returns the file name.
    #[instrument(skip_all, fields(index))]
    pub fn write_history(
        &self,
        index: u32,
        content: &str,
        run_started_at: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        for (name, path) in self.history_entries(index)? {
            let existing =
                fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            if run_started_of(&existing) == Some(run_started_at) {
                debug!(file = %name, "history already written for this run");
                return Ok(name);
            }
        }

        let mut at = now;
        let mut name = history_file_name(at, index);
        while self.history_dir.join(&name).exists() {
            at += Duration::seconds(1);
            name = history_file_name(at, index);
        }
        write_atomic(&self.history_dir.join(&name), content.as_bytes())?;
        debug!(file = %name, "history written");
        Ok(name)
    }

    /// History files recorded for `index`, oldest first.
    pub fn history_entries(&self, index: u32) -> Result<Vec<(String, PathBuf)>> {
        if !self.history_dir.exists() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        let entries = fs::read_dir(&self.history_dir)
            .with_context(|| format!("read {}", self.history_dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read {}", self.history_dir.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some((ts, entry_index)) = parse_history_file_name(&name)
                && entry_index == index
            {
                found.push((ts, name, entry.path()));
            }
        }
        found.sort();
        Ok(found
            .into_iter()
            .map(|(_, name, path)| (name, path))
            .collect())
    }
}

/// Parse and validate a progress document: schema conformance + semantic invariants.
pub fn parse_progress(raw: &str) -> Result<LoopProgress> {
    let instance: Value = serde_json::from_str(raw).context("parse progress json")?;
    let schema: Value = serde_json::from_str(PROGRESS_SCHEMA).context("parse progress schema")?;
    validate_schema(&instance, &schema)?;
    let progress: LoopProgress =
        serde_json::from_value(instance).context("parse progress as v1 struct")?;
    let errors = validate_progress(&progress);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(progress)
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
