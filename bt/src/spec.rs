//! `bt spec`: create a feature and its SPEC.md.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::slug::{Feature, parse_issue_ref, sanitize_slug};
use crate::io::gh::IssueTracker;
use crate::io::scaffold::{SpecSeed, write_spec};
use crate::project::Project;

/// Result of `bt spec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCreated {
    pub feature: Feature,
    /// False when SPEC.md already existed and was kept.
    pub written: bool,
}

/// Create the feature named by `raw`.
///
/// `raw` is either a GitHub issue reference (URL or `#<n>`), which seeds
/// `issue-<n>` from the issue's title, url and body, or a free-form name that
/// is sanitized into a slug. An existing SPEC.md is only replaced with `force`.
#[instrument(skip_all, fields(raw))]
pub fn create_spec<T: IssueTracker + ?Sized>(
    project: &Project,
    tracker: &T,
    raw: &str,
    force: bool,
) -> Result<SpecCreated> {
    let (feature, seed) = match parse_issue_ref(raw) {
        Some(issue) => {
            let meta = tracker
                .fetch_issue(issue.repo.as_deref(), issue.number)
                .with_context(|| format!("fetch issue #{}", issue.number))?;
            let feature = Feature::parse(&issue.feature_slug())?;
            let seed = SpecSeed {
                title: meta.title,
                url: Some(meta.url),
                body: Some(meta.body),
            };
            (feature, seed)
        }
        None => {
            let feature = Feature::parse(&sanitize_slug(raw))?;
            let seed = SpecSeed {
                title: feature.to_string(),
                ..SpecSeed::default()
            };
            (feature, seed)
        }
    };

    let written = write_spec(&project.feature(&feature), &seed, force)?;
    info!(feature = %feature, written, "spec ready");
    Ok(SpecCreated { feature, written })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use anyhow::anyhow;

    use super::*;
    use crate::io::gh::IssueMeta;
    use crate::test_support::TestProject;

    struct FakeTracker {
        calls: RefCell<Vec<(Option<String>, u64)>>,
    }

    impl FakeTracker {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl IssueTracker for FakeTracker {
        fn fetch_issue(&self, repo: Option<&str>, number: u64) -> Result<IssueMeta> {
            self.calls
                .borrow_mut()
                .push((repo.map(str::to_string), number));
            if number == 404 {
                return Err(anyhow!("not found"));
            }
            Ok(IssueMeta {
                title: "Add export button".to_string(),
                url: format!("https://github.com/acme/app/issues/{number}"),
                body: "Users want CSV export.".to_string(),
            })
        }
    }

    #[test]
    fn free_form_name_is_sanitized() {
        let project = TestProject::new().expect("project");
        let tracker = FakeTracker::new();

        let created = create_spec(&project.project(), &tracker, "hello world special!@# chars", false)
            .expect("spec");

        assert_eq!(created.feature.as_str(), "hello_world_special____chars");
        assert!(created.written);
        assert!(project.feature_paths(&created.feature).spec.exists());
        assert!(tracker.calls.borrow().is_empty());
    }

    #[test]
    fn issue_url_seeds_spec_from_tracker() {
        let project = TestProject::new().expect("project");
        let tracker = FakeTracker::new();

        let created = create_spec(
            &project.project(),
            &tracker,
            "https://github.com/acme/app/issues/34",
            false,
        )
        .expect("spec");

        assert_eq!(created.feature.as_str(), "issue-34");
        assert_eq!(
            *tracker.calls.borrow(),
            vec![(Some("acme/app".to_string()), 34)]
        );
        let spec = fs::read_to_string(project.feature_paths(&created.feature).spec).expect("read");
        assert!(spec.contains("Add export button"));
        assert!(spec.contains("https://github.com/acme/app/issues/34"));
        assert!(spec.contains("Users want CSV export."));
    }

    #[test]
    fn existing_spec_is_kept_without_force() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        let path = project
            .write_feature_file(&feature, "SPEC.md", "hand written\n")
            .expect("spec");
        let tracker = FakeTracker::new();

        let kept = create_spec(&project.project(), &tracker, "f", false).expect("spec");
        assert!(!kept.written);
        assert_eq!(fs::read_to_string(&path).expect("read"), "hand written\n");

        let replaced = create_spec(&project.project(), &tracker, "f", true).expect("spec");
        assert!(replaced.written);
        assert_ne!(fs::read_to_string(&path).expect("read"), "hand written\n");
    }

    #[test]
    fn traversal_is_rejected_before_writing() {
        let project = TestProject::new().expect("project");
        let tracker = FakeTracker::new();

        let err = create_spec(&project.project(), &tracker, "..", false).unwrap_err();
        assert_eq!(crate::errors::exit_code_for(&err), crate::exit_codes::USAGE);
        assert!(!project.project().paths.specs_dir.exists());
    }

    #[test]
    fn tracker_failure_is_reported_with_issue_number() {
        let project = TestProject::new().expect("project");
        let tracker = FakeTracker::new();

        let err = create_spec(&project.project(), &tracker, "#404", false).unwrap_err();
        assert!(format!("{err:#}").contains("fetch issue #404: not found"));
    }
}
