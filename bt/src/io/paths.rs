//! Canonical on-disk layout of a bt project.

use std::path::{Path, PathBuf};

use crate::core::slug::Feature;
use crate::core::types::Stage;
use crate::io::config::{BtConfig, CONFIG_FILE, ENV_FILE};

/// Project-level paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub env_file: PathBuf,
    pub specs_dir: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    /// Report of the last gate run outside any feature.
    pub global_gates_path: PathBuf,
    pub hooks_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: &Path, config: &BtConfig) -> Self {
        let state_dir = root.join(&config.state_dir);
        Self {
            root: root.to_path_buf(),
            env_file: root.join(ENV_FILE),
            specs_dir: root.join(&config.specs_dir),
            config_path: state_dir.join(CONFIG_FILE),
            global_gates_path: state_dir.join("state").join("gates.json"),
            state_dir,
            hooks_dir: root.join("hooks"),
        }
    }

    pub fn feature(&self, feature: &Feature) -> FeaturePaths {
        FeaturePaths::new(&self.specs_dir.join(feature.as_str()))
    }

    /// `path` relative to the project root, with `/` separators, for messages
    /// and for matching against version-control output.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Paths inside one feature directory (`<specs_dir>/<feature>/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturePaths {
    pub dir: PathBuf,
    pub spec: PathBuf,
    pub research: PathBuf,
    pub plan_review: PathBuf,
    pub review: PathBuf,
    pub progress: PathBuf,
    pub gates: PathBuf,
    pub history_dir: PathBuf,
    pub artifacts_dir: PathBuf,
}

impl FeaturePaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            spec: dir.join("SPEC.md"),
            research: dir.join("RESEARCH.md"),
            plan_review: dir.join("PLAN_REVIEW.md"),
            review: dir.join("REVIEW.md"),
            progress: dir.join("loop-progress.json"),
            gates: dir.join("gates.json"),
            history_dir: dir.join("history"),
            artifacts_dir: dir.join(".artifacts"),
        }
    }

    /// Per-stage agent log, scoped to this feature.
    pub fn stage_log(&self, stage: Stage) -> PathBuf {
        self.artifacts_dir.join(format!("codex-{}.log", stage.as_str()))
    }

    /// Document the stage writes, if it writes one.
    pub fn stage_output(&self, stage: Stage) -> Option<PathBuf> {
        stage.output_file().map(|name| self.dir.join(name))
    }

    pub fn gate_log(&self, gate: &str) -> PathBuf {
        self.artifacts_dir.join(format!("gate-{gate}.log"))
    }
}
