//! `bt pr` / `bt ship`: guard, gate, commit, push and open a pull request.
//!
//! The staged-files guard always runs first, even for `--dry-run` and
//! `--no-commit`: those flags only decide how far the flow goes afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, instrument};

use crate::core::slug::Feature;
use crate::core::types::GatePhase;
use crate::io::gates::{GateReport, GateRunner};
use crate::io::gh::{PullRequest, PullRequestHost};
use crate::io::git::Git;
use crate::io::paths::FeaturePaths;
use crate::io::staged::{ensure_feature_files_staged, tracked_prefixes};
use crate::project::Project;
use crate::stages::{read_optional, run_project_gates};

/// Feature documents attached to a pull request, in this order.
const ATTACHED_DOCUMENTS: [&str; 4] = ["SPEC.md", "RESEARCH.md", "PLAN_REVIEW.md", "REVIEW.md"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Print what would be submitted; no gates, no git mutation.
    pub dry_run: bool,
    /// Stop after the gates pass.
    pub no_commit: bool,
    pub base: Option<String>,
    pub title: Option<String>,
}

/// How far a submission got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    DryRun { title: String, artifacts: String },
    GatesPassed { report: GateReport },
    Opened {
        url: String,
        base: String,
        head: String,
        committed: bool,
    },
}

/// Submit `feature`.
#[instrument(skip_all, fields(feature = %feature, dry_run = options.dry_run))]
pub fn submit<G: GateRunner + ?Sized, H: PullRequestHost + ?Sized>(
    project: &Project,
    git: &Git,
    gate_runner: &G,
    host: &H,
    feature: &Feature,
    options: &SubmitOptions,
) -> Result<SubmitOutcome> {
    let paths = project.feature(feature);
    let prefixes = tracked_prefixes(&project.config.submit, &project.display(&paths.dir));
    ensure_feature_files_staged(git, &prefixes)?;

    let title = match &options.title {
        Some(title) => title.clone(),
        None => default_title(feature, &paths)?,
    };
    let artifacts = artifacts_section(project, &paths)?;
    if options.dry_run {
        return Ok(SubmitOutcome::DryRun { title, artifacts });
    }

    let report = run_project_gates(project, gate_runner, Some(&paths), GatePhase::Submit)?;
    if report.is_unconfigured() {
        bail!("no gates configured; refusing to submit {feature}");
    }
    if !report.passed() {
        bail!(
            "gates failed, not submitting {feature}: {}",
            report.failed_names().join(", ")
        );
    }
    if options.no_commit {
        info!("gates passed, stopping before commit");
        return Ok(SubmitOutcome::GatesPassed { report });
    }

    let committed = git.commit_staged(&title)?;
    let head = git.current_branch()?;
    git.push(&head)?;
    let explicit_base = options.base.as_deref().or(project.config.submit.base.as_deref());
    let base = git.resolve_base(explicit_base)?;
    let url = host
        .create(&PullRequest {
            title,
            body: format!(
                "Feature `{feature}`.\n\nSpec, reviews and agent logs are attached in a comment below.\n"
            ),
            base: base.clone(),
            head: head.clone(),
        })
        .context("create pull request")?;
    host.comment(&url, &artifacts)
        .with_context(|| format!("post artifacts comment on {url}"))?;
    info!(url = %url, "pull request opened");
    Ok(SubmitOutcome::Opened {
        url,
        base,
        head,
        committed,
    })
}

/// First Markdown heading of SPEC.md, or `feat: <feature>`.
fn default_title(feature: &Feature, paths: &FeaturePaths) -> Result<String> {
    let heading = read_optional(&paths.spec)?.and_then(|spec| {
        spec.lines()
            .find_map(|line| line.strip_prefix("# "))
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
    });
    Ok(heading.unwrap_or_else(|| format!("feat: {feature}")))
}

/// Markdown section with the feature's documents and every file under
/// `.artifacts/`, each truncated to the configured byte limit.
pub fn artifacts_section(project: &Project, paths: &FeaturePaths) -> Result<String> {
    let limit = project.config.submit.artifact_limit_bytes;
    let mut files: Vec<PathBuf> = ATTACHED_DOCUMENTS
        .iter()
        .map(|name| paths.dir.join(name))
        .filter(|path| path.is_file())
        .collect();
    files.extend(artifact_files(&paths.artifacts_dir)?);

    let mut out = String::from("## Artifacts\n\n");
    for path in files {
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        let content = String::from_utf8_lossy(&bytes);
        let (content, truncated) = truncate_bytes(&content, limit);
        let fence = fence_for(content);
        out.push_str(&format!("### `{}`\n\n", project.display(&path)));
        out.push_str(&fence);
        out.push('\n');
        out.push_str(content);
        if !content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&fence);
        out.push('\n');
        if truncated {
            out.push_str(&format!("\n_(truncated to {limit} bytes)_\n"));
        }
        out.push('\n');
    }
    Ok(out)
}

/// Regular files under `dir`, recursively, sorted by path.
fn artifact_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !dir.is_dir() {
        return Ok(found);
    }
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).with_context(|| format!("read {}", current.display()))? {
            let entry = entry.with_context(|| format!("read {}", current.display()))?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Cut `text` to at most `limit` bytes on a char boundary.
fn truncate_bytes(text: &str, limit: usize) -> (&str, bool) {
    if text.len() <= limit {
        return (text, false);
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}

/// A backtick fence longer than any backtick run inside `content`.
fn fence_for(content: &str) -> String {
    let longest = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(3))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::errors::PreconditionError;
    use crate::test_support::{
        CallLog, ScriptedGateRunner, TestProject, call_log, git, init_git_repo,
    };

    const PR_URL: &str = "https://github.com/acme/app/pull/7";

    struct RecordingHost {
        log: CallLog,
    }

    impl PullRequestHost for RecordingHost {
        fn create(&self, pr: &PullRequest) -> Result<String> {
            self.log
                .borrow_mut()
                .push(format!("create:{}->{}:{}", pr.head, pr.base, pr.title));
            Ok(PR_URL.to_string())
        }

        fn comment(&self, url: &str, body: &str) -> Result<()> {
            assert!(body.starts_with("## Artifacts"));
            self.log.borrow_mut().push(format!("comment:{url}"));
            Ok(())
        }
    }

    /// Git repository with the feature's spec and plan review staged.
    fn staged_project(project: TestProject) -> (TestProject, Feature) {
        init_git_repo(project.root()).expect("git init");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        git(project.root(), &["add", "-A"]).expect("git add");
        (project, feature)
    }

    fn has_commits(root: &Path) -> bool {
        git(root, &["rev-parse", "--verify", "HEAD"]).is_ok()
    }

    #[test]
    fn unstaged_files_abort_before_gates_even_without_commit() {
        let (project, feature) = staged_project(TestProject::new().expect("project"));
        project.write_file("src/app.rs", "fn main() {}\n").expect("src");
        let log = call_log();
        let gates = ScriptedGateRunner::new(&log);
        let host = RecordingHost { log: Rc::clone(&log) };
        let options = SubmitOptions {
            no_commit: true,
            ..SubmitOptions::default()
        };

        let err = submit(
            &project.project(),
            &Git::new(project.root()),
            &gates,
            &host,
            &feature,
            &options,
        )
        .unwrap_err();

        match err.downcast_ref::<PreconditionError>() {
            Some(PreconditionError::UnstagedFiles { files }) => {
                assert_eq!(files, &vec!["src/app.rs".to_string()]);
            }
            other => panic!("expected unstaged files error, got {other:?}"),
        }
        assert!(log.borrow().is_empty());
        assert!(!project.feature_paths(&feature).gates.exists());
    }

    #[test]
    fn zero_gates_refuse_to_submit() {
        let (project, feature) = staged_project(
            TestProject::new()
                .expect("project")
                .with_config(|cfg| cfg.gates = Default::default()),
        );
        let log = call_log();
        let host = RecordingHost { log: Rc::clone(&log) };

        let err = submit(
            &project.project(),
            &Git::new(project.root()),
            &ScriptedGateRunner::new(&log),
            &host,
            &feature,
            &SubmitOptions::default(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("no gates configured"));
        assert!(log.borrow().is_empty());
        assert!(!has_commits(project.root()));
    }

    #[test]
    fn failing_gates_abort_before_commit() {
        let (project, feature) = staged_project(TestProject::new().expect("project"));
        let log = call_log();
        let gates = ScriptedGateRunner::new(&log).with_statuses(vec![1]);
        let host = RecordingHost { log: Rc::clone(&log) };

        let err = submit(
            &project.project(),
            &Git::new(project.root()),
            &gates,
            &host,
            &feature,
            &SubmitOptions::default(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("gates failed, not submitting f: test"));
        assert_eq!(*log.borrow(), vec!["gate:test"]);
        assert!(!has_commits(project.root()));
    }

    #[test]
    fn no_commit_stops_once_gates_pass() {
        let (project, feature) = staged_project(TestProject::new().expect("project"));
        let log = call_log();
        let host = RecordingHost { log: Rc::clone(&log) };
        let options = SubmitOptions {
            no_commit: true,
            ..SubmitOptions::default()
        };

        let outcome = submit(
            &project.project(),
            &Git::new(project.root()),
            &ScriptedGateRunner::new(&log),
            &host,
            &feature,
            &options,
        )
        .expect("submit");

        assert!(matches!(outcome, SubmitOutcome::GatesPassed { ref report } if report.passed()));
        assert_eq!(*log.borrow(), vec!["gate:test"]);
        assert!(!has_commits(project.root()));
        assert!(project.feature_paths(&feature).gates.exists());
    }

    #[test]
    fn submit_commits_pushes_then_opens_and_comments() {
        let (project, feature) = staged_project(TestProject::new().expect("project"));
        let remote = tempfile::tempdir().expect("remote");
        git(remote.path(), &["init", "-q", "--bare"]).expect("bare remote");
        let remote_path = remote.path().display().to_string();
        git(project.root(), &["remote", "add", "origin", remote_path.as_str()]).expect("remote add");
        let log = call_log();
        let host = RecordingHost { log: Rc::clone(&log) };
        let options = SubmitOptions {
            base: Some("develop".to_string()),
            ..SubmitOptions::default()
        };

        let outcome = submit(
            &project.project(),
            &Git::new(project.root()),
            &ScriptedGateRunner::new(&log),
            &host,
            &feature,
            &options,
        )
        .expect("submit");

        assert_eq!(
            outcome,
            SubmitOutcome::Opened {
                url: PR_URL.to_string(),
                base: "develop".to_string(),
                head: "main".to_string(),
                committed: true,
            }
        );
        assert_eq!(
            *log.borrow(),
            vec![
                "gate:test".to_string(),
                "create:main->develop:f".to_string(),
                format!("comment:{PR_URL}"),
            ]
        );
        let subject = git(project.root(), &["log", "-1", "--format=%s"]).expect("log");
        assert_eq!(subject.trim(), "f");
        git(remote.path(), &["rev-parse", "--verify", "main"]).expect("pushed branch");
    }

    #[test]
    fn fence_outgrows_embedded_backticks() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("```rust\nfn x() {}\n```"), "````");
        assert_eq!(fence_for("`````"), "``````");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_bytes("abc", 10), ("abc", false));
        assert_eq!(truncate_bytes("abcdef", 3), ("abc", true));
        // 'é' is two bytes
        assert_eq!(truncate_bytes("aé", 2), ("a", true));
    }

    #[test]
    fn artifacts_list_documents_then_logs() {
        let project = TestProject::new()
            .expect("project")
            .with_config(|cfg| cfg.submit.artifact_limit_bytes = 8);
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        project
            .write_feature_file(&feature, ".artifacts/codex-implement.log", "0123456789")
            .expect("log");
        let bt = project.project();

        let section = artifacts_section(&bt, &project.feature_paths(&feature)).expect("section");

        let spec = section.find("### `specs/f/SPEC.md`").expect("spec heading");
        let plan = section.find("### `specs/f/PLAN_REVIEW.md`").expect("plan heading");
        let log = section
            .find("### `specs/f/.artifacts/codex-implement.log`")
            .expect("log heading");
        assert!(spec < plan && plan < log);
        assert!(!section.contains("RESEARCH.md"));
        assert!(section.contains("```\n01234567\n```\n\n_(truncated to 8 bytes)_"));
    }

    #[test]
    fn title_defaults_to_spec_heading() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        let paths = project.feature_paths(&feature);
        assert_eq!(default_title(&feature, &paths).expect("title"), "feat: f");

        project
            .write_feature_file(&feature, "SPEC.md", "intro\n# Export to CSV\n")
            .expect("spec");
        assert_eq!(default_title(&feature, &paths).expect("title"), "Export to CSV");
    }
}
