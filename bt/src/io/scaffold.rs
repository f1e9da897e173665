//! Project bootstrap and SPEC.md scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::{debug, info};

use crate::io::paths::{FeaturePaths, ProjectPaths};

const SPEC_TEMPLATE: &str = include_str!("templates/spec.md");

/// What `bootstrap` created or left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub created: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
}

/// Gate commands guessed from the project's build files.
pub fn detect_gates(root: &Path) -> Vec<(&'static str, &'static str)> {
    if root.join("Cargo.toml").exists() {
        vec![
            ("LINT", "cargo clippy --all-targets -- -D warnings"),
            ("TYPECHECK", "cargo check --all-targets"),
            ("TEST", "cargo test"),
        ]
    } else if root.join("package.json").exists() {
        vec![
            ("LINT", "npm run lint"),
            ("TYPECHECK", "npm run typecheck"),
            ("TEST", "npm test"),
        ]
    } else if root.join("Makefile").exists() {
        vec![("LINT", "make lint"), ("TEST", "make test")]
    } else {
        Vec::new()
    }
}

/// Contents of a fresh `.bt.env`.
pub fn render_env_file(root: &Path) -> String {
    let mut out = String::from(
        "# bt project settings. Process environment variables override these.\n\
         # BT_SPECS_DIR=specs\n\
         # BT_STATE_DIR=.bt\n\
         # BT_CODEX_BIN=codex\n\
         # BT_NOTIFY_HOOK=./hooks/notify.sh\n\
         \n\
         # Quality gates run before the loop, after implement/fix, and before `bt pr`.\n\
         # The loop refuses to start when no gate is configured.\n",
    );
    let detected = detect_gates(root);
    if detected.is_empty() {
        out.push_str("# BT_GATE_LINT=\n# BT_GATE_TYPECHECK=\n# BT_GATE_TEST=\n");
    } else {
        for (name, command) in detected {
            out.push_str(&format!("BT_GATE_{name}={}\n", quote_env_value(command)));
        }
    }
    out
}

/// Quote a value so the env-file parser reads it back verbatim.
///
/// Single quotes are literal. Values containing one fall back to double
/// quotes with `\`, `"` and `$` escaped.
pub fn quote_env_value(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Create `.bt.env`, the specs and state directories, and `hooks/`.
///
/// Existing files are kept unless `force` is set.
pub fn bootstrap(paths: &ProjectPaths, force: bool) -> Result<BootstrapReport> {
    let mut report = BootstrapReport::default();

    for dir in [&paths.specs_dir, &paths.state_dir, &paths.hooks_dir] {
        if dir.exists() {
            report.kept.push(dir.clone());
        } else {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
            report.created.push(dir.clone());
        }
    }

    if write_if_missing_or_force(&paths.env_file, &render_env_file(&paths.root), force)? {
        report.created.push(paths.env_file.clone());
    } else {
        report.kept.push(paths.env_file.clone());
    }

    info!(created = report.created.len(), "bootstrap finished");
    Ok(report)
}

/// Seed for a new SPEC.md.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecSeed {
    pub title: String,
    pub url: Option<String>,
    pub body: Option<String>,
}

pub fn render_spec(seed: &SpecSeed) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("spec", SPEC_TEMPLATE)
        .context("load spec template")?;
    let rendered = env.get_template("spec")?.render(context! {
        title => seed.title,
        url => seed.url,
        body => seed.body.as_deref().map(str::trim).filter(|b| !b.is_empty()),
    })?;
    Ok(rendered)
}

/// Write the feature's SPEC.md. Returns false if one exists and `force` is off.
pub fn write_spec(paths: &FeaturePaths, seed: &SpecSeed, force: bool) -> Result<bool> {
    fs::create_dir_all(&paths.dir).with_context(|| format!("create {}", paths.dir.display()))?;
    write_if_missing_or_force(&paths.spec, &render_spec(seed)?, force)
}

fn write_if_missing_or_force(path: &Path, contents: &str, force: bool) -> Result<bool> {
    if !force && path.exists() {
        debug!(path = %path.display(), "keeping existing file");
        return Ok(false);
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(true)
}
