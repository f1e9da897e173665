//! Staged-files guard for submission.
//!
//! Every file under a feature-tracked prefix must be staged before `bt pr`
//! does anything else. The check only reads status; it never stages.

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::core::staging::unstaged_within;
use crate::errors::PreconditionError;
use crate::io::config::SubmitConfig;
use crate::io::git::Git;

/// Tracked prefixes for a feature: configured implementation paths plus the
/// feature's own directory (both relative to the project root).
pub fn tracked_prefixes(submit: &SubmitConfig, feature_dir: &str) -> Vec<String> {
    let mut prefixes: Vec<String> = submit
        .tracked_paths
        .iter()
        .map(|p| p.trim_end_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .collect();
    prefixes.push(feature_dir.trim_end_matches('/').to_string());
    prefixes.dedup();
    prefixes
}

/// Files under `prefixes` that are untracked or have unstaged changes.
///
/// Paths are reported relative to the repository root, as git prints them.
pub fn unstaged_feature_files(git: &Git, prefixes: &[String]) -> Result<Vec<String>> {
    let repo_prefix = git.show_prefix()?;
    let scoped: Vec<String> = prefixes
        .iter()
        .map(|p| format!("{repo_prefix}{p}"))
        .collect();
    let entries = git.status_porcelain()?;
    Ok(unstaged_within(&entries, &scoped))
}

/// Fail closed when any feature-tracked file is not staged.
#[instrument(skip_all)]
pub fn ensure_feature_files_staged(git: &Git, prefixes: &[String]) -> Result<()> {
    let files = unstaged_feature_files(git, prefixes)?;
    if files.is_empty() {
        debug!("all feature files staged");
        return Ok(());
    }
    warn!(count = files.len(), "feature files not staged");
    Err(PreconditionError::UnstagedFiles { files }.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_include_feature_dir() {
        let submit = SubmitConfig {
            tracked_paths: vec!["src/".to_string(), "lib".to_string()],
            ..SubmitConfig::default()
        };
        assert_eq!(
            tracked_prefixes(&submit, "specs/f"),
            vec!["src", "lib", "specs/f"]
        );
    }
}
