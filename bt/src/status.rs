//! `bt status`: read-only summary of configuration and per-feature state.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::core::slug::Feature;
use crate::core::types::LoopResult;
use crate::core::verdict::PlanApproval;
use crate::io::progress_store::ProgressStore;
use crate::project::Project;
use crate::stages::{plan_approval, read_optional};

/// Snapshot of one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureStatus {
    pub feature: Feature,
    pub plan: PlanApproval,
    pub loop_state: Option<LoopState>,
    /// `ts` of the feature's last gate report.
    pub last_gates: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopState {
    pub result: LoopResult,
    pub completed_iterations: u32,
    pub max_iterations: u32,
    pub last_verdict: Option<String>,
}

/// Collect status for `only`, or for every feature directory when `None`.
#[instrument(skip_all)]
pub fn collect_status(project: &Project, only: Option<&Feature>) -> Result<Vec<FeatureStatus>> {
    let features = match only {
        Some(feature) => vec![feature.clone()],
        None => list_features(&project.paths.specs_dir)?,
    };
    features
        .into_iter()
        .map(|feature| feature_status(project, feature))
        .collect()
}

/// Feature directories under `specs_dir`, sorted by name. Entries that are not
/// valid slugs are skipped.
pub fn list_features(specs_dir: &Path) -> Result<Vec<Feature>> {
    if !specs_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut features = Vec::new();
    for entry in
        fs::read_dir(specs_dir).with_context(|| format!("read {}", specs_dir.display()))?
    {
        let entry = entry.with_context(|| format!("read {}", specs_dir.display()))?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match Feature::parse(&name) {
            Ok(feature) => features.push(feature),
            Err(_) => warn!(dir = %name, "skipping directory that is not a feature slug"),
        }
    }
    features.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(features)
}

fn feature_status(project: &Project, feature: Feature) -> Result<FeatureStatus> {
    let paths = project.feature(&feature);
    let plan = plan_approval(&paths)?;
    let loop_state = ProgressStore::for_feature(&paths).load()?.map(|progress| LoopState {
        result: progress.result,
        completed_iterations: progress.completed_iterations,
        max_iterations: progress.max_iterations,
        last_verdict: progress
            .last_iteration()
            .map(|it| it.verdict.clone())
            .filter(|v| !v.is_empty()),
    });
    let last_gates = match read_optional(&paths.gates)? {
        Some(raw) => report_ts(&raw),
        None => None,
    };
    Ok(FeatureStatus {
        feature,
        plan,
        loop_state,
        last_gates,
    })
}

fn report_ts(raw: &str) -> Option<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value.get("ts").and_then(Value::as_str).map(str::to_string),
        Err(err) => {
            warn!(err = %err, "unreadable gate report");
            None
        }
    }
}

/// Human-readable status, one block per feature.
pub fn render_status(project: &Project, features: &[FeatureStatus]) -> String {
    let mut out = String::new();
    let config = &project.config;
    let _ = writeln!(out, "specs_dir: {}", config.specs_dir);
    let _ = writeln!(out, "state_dir: {}", config.state_dir);
    if config.gates.is_empty() {
        let _ = writeln!(out, "gates: (none configured)");
    } else {
        let _ = writeln!(out, "gates:");
        for gate in config.gates.iter() {
            let _ = writeln!(out, "  {}: {}", gate.name, gate.command);
        }
    }

    if features.is_empty() {
        let _ = writeln!(out, "features: (none)");
    }
    for status in features {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", status.feature);
        let _ = writeln!(out, "  plan: {}", status.plan.describe());
        match &status.loop_state {
            Some(state) => {
                let _ = writeln!(
                    out,
                    "  loop: {} ({}/{} iterations)",
                    state.result, state.completed_iterations, state.max_iterations
                );
                let _ = writeln!(
                    out,
                    "  last verdict: {}",
                    state.last_verdict.as_deref().unwrap_or("(none)")
                );
            }
            None => {
                let _ = writeln!(out, "  loop: not started");
            }
        }
        let _ = writeln!(
            out,
            "  last gates: {}",
            status.last_gates.as_deref().unwrap_or("(never run)")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::{Iteration, LoopProgress};
    use crate::core::types::StageStatus;
    use crate::test_support::TestProject;

    #[test]
    fn empty_project_lists_config_only() {
        let project = TestProject::new()
            .expect("project")
            .with_config(|cfg| cfg.gates = Default::default());
        let bt = project.project();

        let features = collect_status(&bt, None).expect("status");
        let text = render_status(&bt, &features);

        assert!(text.starts_with("specs_dir: specs\nstate_dir: .bt\n"));
        assert!(text.contains("gates: (none configured)"));
        assert!(text.contains("features: (none)"));
    }

    #[test]
    fn reports_plan_loop_and_gates_per_feature() {
        let project = TestProject::new().expect("project");
        let a = project.feature("a");
        let b = project.feature("b");
        project.approve_plan(&a).expect("approve");
        project.write_spec(&b).expect("spec");
        project
            .write_feature_file(
                &a,
                "gates.json",
                r#"{"ts":"2026-01-01T00:00:00.000000Z","results":{}}"#,
            )
            .expect("gates");

        let mut it = Iteration::new(1);
        it.implement_status = StageStatus::Pass;
        it.review_status = StageStatus::Pass;
        it.fix_status = StageStatus::Pass;
        it.verdict = "NEEDS_CHANGES".to_string();
        let progress = LoopProgress::new("a", 3, "2026-01-01T00:00:00.000000Z")
            .append(it, "2026-01-01T00:01:00.000000Z")
            .with_result(LoopResult::ImplementFailed, "2026-01-01T00:02:00.000000Z");
        ProgressStore::for_feature(&project.feature_paths(&a))
            .save(&progress)
            .expect("save");

        let bt = project.project();
        let features = collect_status(&bt, None).expect("status");
        assert_eq!(
            features.iter().map(|s| s.feature.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        let text = render_status(&bt, &features);
        assert!(text.contains("  test: true"));
        assert!(text.contains("a\n  plan: approved"));
        assert!(text.contains("  loop: implement-failed (1/3 iterations)"));
        assert!(text.contains("  last verdict: NEEDS_CHANGES"));
        assert!(text.contains("  last gates: 2026-01-01T00:00:00.000000Z"));
        assert!(text.contains("b\n  plan: missing"));
        assert!(text.contains("  loop: not started"));
    }

    #[test]
    fn single_feature_filter() {
        let project = TestProject::new().expect("project");
        project.write_spec(&project.feature("a")).expect("spec");
        project.write_spec(&project.feature("b")).expect("spec");
        let bt = project.project();

        let features = collect_status(&bt, Some(&project.feature("b"))).expect("status");
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].feature.as_str(), "b");
    }
}
