//! GitHub collaborators, backed by the `gh` CLI.
//!
//! Only the outcome contracts matter to bt: issue metadata in, PR URL out.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Issue metadata used to seed a spec.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueMeta {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
}

pub trait IssueTracker {
    /// Fetch issue `number`, from `repo` (`owner/name`) or the current repository.
    fn fetch_issue(&self, repo: Option<&str>, number: u64) -> Result<IssueMeta>;
}

/// A pull request to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub title: String,
    pub body: String,
    pub base: String,
    pub head: String,
}

pub trait PullRequestHost {
    /// Open the pull request and return its URL.
    fn create(&self, pr: &PullRequest) -> Result<String>;
    /// Add a comment to the pull request at `url`.
    fn comment(&self, url: &str, body: &str) -> Result<()>;
}

/// `gh` invoked in the project root.
#[derive(Debug, Clone)]
pub struct GhCli {
    workdir: PathBuf,
}

impl GhCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = Command::new("gh")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn gh {}", args.first().copied().unwrap_or("")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "gh {} failed: {}",
                args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
                stderr.trim()
            ));
        }
        Ok(output)
    }
}

impl IssueTracker for GhCli {
    #[instrument(skip_all, fields(number))]
    fn fetch_issue(&self, repo: Option<&str>, number: u64) -> Result<IssueMeta> {
        let number = number.to_string();
        let mut args = vec!["issue", "view", number.as_str(), "--json", "title,url,body"];
        if let Some(repo) = repo {
            args.extend(["--repo", repo]);
        }
        let output = self.run_checked(&args)?;
        let meta: IssueMeta =
            serde_json::from_slice(&output.stdout).context("parse gh issue view output")?;
        debug!(title = %meta.title, "issue fetched");
        Ok(meta)
    }
}

impl PullRequestHost for GhCli {
    #[instrument(skip_all, fields(base = %pr.base, head = %pr.head))]
    fn create(&self, pr: &PullRequest) -> Result<String> {
        let output = self.run_checked(&[
            "pr", "create", "--title", &pr.title, "--body", &pr.body, "--base", &pr.base,
            "--head", &pr.head,
        ])?;
        let url = String::from_utf8_lossy(&output.stdout)
            .lines()
            .rev()
            .find(|line| line.trim_start().starts_with("http"))
            .map(|line| line.trim().to_string())
            .ok_or_else(|| anyhow!("gh pr create printed no URL"))?;
        Ok(url)
    }

    fn comment(&self, url: &str, body: &str) -> Result<()> {
        self.run_checked(&["pr", "comment", url, "--body", body])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_meta_parses_gh_json_without_body() {
        let meta: IssueMeta =
            serde_json::from_str(r#"{"title":"Crash on start","url":"https://github.com/a/b/issues/3"}"#)
                .expect("parse");
        assert_eq!(meta.title, "Crash on start");
        assert_eq!(meta.body, "");
    }
}
