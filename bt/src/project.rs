//! A bt project: its root, resolved configuration and layout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::slug::Feature;
use crate::io::config::{BtConfig, load_config};
use crate::io::paths::{FeaturePaths, ProjectPaths};

/// Environment variable that overrides the project root.
pub const PROJECT_ROOT_ENV: &str = "BT_PROJECT_ROOT";

#[derive(Debug, Clone)]
pub struct Project {
    pub config: BtConfig,
    pub paths: ProjectPaths,
}

impl Project {
    pub fn new(root: &Path, config: BtConfig) -> Self {
        let paths = ProjectPaths::new(root, &config);
        Self { config, paths }
    }

    /// Load configuration for `root` from disk and the environment.
    pub fn load(root: &Path) -> Result<Self> {
        let config = load_config(root).with_context(|| format!("load config for {}", root.display()))?;
        Ok(Self::new(root, config))
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn feature(&self, feature: &Feature) -> FeaturePaths {
        self.paths.feature(feature)
    }

    /// `path` relative to the project root, for messages.
    pub fn display(&self, path: &Path) -> String {
        self.paths.relative(path)
    }
}

/// `BT_PROJECT_ROOT` if set, otherwise the current directory.
pub fn resolve_root() -> Result<PathBuf> {
    match std::env::var_os(PROJECT_ROOT_ENV) {
        Some(root) if !root.is_empty() => Ok(PathBuf::from(root)),
        _ => std::env::current_dir().context("resolve current directory"),
    }
}
