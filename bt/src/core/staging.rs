//! Porcelain status filtering for the staged-files guard.

/// Parsed `git status --porcelain=v1` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path relative to the repository root.
    pub path: String,
}

impl StatusEntry {
    /// Untracked, or modified/deleted in the worktree relative to the index.
    pub fn needs_staging(&self) -> bool {
        if self.code == "??" {
            return true;
        }
        matches!(self.code.chars().nth(1), Some(worktree) if worktree != ' ')
    }
}

/// True if `path` is `prefix` itself or lies below it.
pub fn within_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() || prefix == "." {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Paths under any of `prefixes` that are untracked or have unstaged changes.
///
/// Sorted and deduplicated so the failure message is deterministic.
pub fn unstaged_within(entries: &[StatusEntry], prefixes: &[String]) -> Vec<String> {
    let mut files: Vec<String> = entries
        .iter()
        .filter(|entry| entry.needs_staging())
        .filter(|entry| prefixes.iter().any(|p| within_prefix(&entry.path, p)))
        .map(|entry| entry.path.clone())
        .collect();
    files.sort();
    files.dedup();
    files
}
