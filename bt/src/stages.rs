//! Single-stage commands (`bt research|plan-review|implement|review|fix`) and
//! the precondition and gate helpers the loop engine shares with them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::slug::Feature;
use crate::core::types::{GatePhase, Stage};
use crate::core::verdict::{PLAN_APPROVED, PlanApproval, parse_verdict};
use crate::errors::{PreconditionError, StageError};
use crate::io::agent::Agent;
use crate::io::clock::now_ts;
use crate::io::gates::{
    GateContext, GateReport, GateRunner, read_failed_gates, run_gates, write_gate_report,
};
use crate::io::invoker::{StageOutcome, invoke_stage};
use crate::io::paths::FeaturePaths;
use crate::io::prompt::{GateFailure, PromptEngine, PromptInputs};
use crate::project::Project;

/// Read a file that may legitimately be absent.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("read {}", path.display()))
}

/// Current plan approval of a feature.
pub fn plan_approval(paths: &FeaturePaths) -> Result<PlanApproval> {
    let document = read_optional(&paths.plan_review)?;
    Ok(PlanApproval::evaluate(document.as_deref()))
}

/// Turn a non-approved plan into the precondition error naming the artifact
/// and the command that fixes it.
pub fn plan_precondition(
    project: &Project,
    feature: &Feature,
    approval: &PlanApproval,
) -> Result<(), PreconditionError> {
    let artifact = project.display(&project.feature(feature).plan_review);
    let remedy = format!("bt plan-review {feature}");
    match approval {
        PlanApproval::Approved => Ok(()),
        PlanApproval::Missing => Err(PreconditionError::MissingArtifact { artifact, remedy }),
        PlanApproval::NotApproved { verdict } => Err(PreconditionError::PlanNotApproved {
            artifact,
            verdict: verdict.clone().unwrap_or_default(),
            expected: PLAN_APPROVED.to_string(),
            remedy,
        }),
    }
}

/// Fail unless the feature's plan review carries the approved-plan verdict.
pub fn require_plan_approval(project: &Project, feature: &Feature) -> Result<()> {
    let approval = plan_approval(&project.feature(feature))?;
    plan_precondition(project, feature, &approval)?;
    Ok(())
}

/// SPEC.md contents, or the precondition error pointing at `bt spec`.
pub fn require_spec(project: &Project, feature: &Feature) -> Result<String> {
    let paths = project.feature(feature);
    match read_optional(&paths.spec)? {
        Some(spec) => Ok(spec),
        None => Err(PreconditionError::MissingArtifact {
            artifact: project.display(&paths.spec),
            remedy: format!("bt spec {feature}"),
        }
        .into()),
    }
}

/// Prompt inputs from the feature's documents as they are on disk now.
pub fn prompt_inputs(project: &Project, feature: &Feature) -> Result<PromptInputs> {
    let paths = project.feature(feature);
    Ok(PromptInputs {
        feature: feature.to_string(),
        spec: read_optional(&paths.spec)?.unwrap_or_default(),
        research: read_optional(&paths.research)?,
        plan_review: read_optional(&paths.plan_review)?,
        review: read_optional(&paths.review)?,
        gate_failures: Vec::new(),
        iteration: 1,
        max_iterations: 1,
        output_path: None,
    })
}

/// Failing gates of the feature's last gate pass, each with the tail of its log.
pub fn last_gate_failures(paths: &FeaturePaths) -> Result<Vec<GateFailure>> {
    let mut failures = Vec::new();
    for (name, command) in read_failed_gates(&paths.gates)? {
        let log = read_optional(&paths.artifacts_dir.join(format!("gate-{name}.log")))?;
        failures.push(GateFailure::new(name, command, log.as_deref().unwrap_or("")));
    }
    Ok(failures)
}

/// Run the configured gates once and persist the report.
///
/// With a feature the report goes to its `gates.json` and per-gate logs to its
/// `.artifacts/`; otherwise to the global report under the state directory.
#[instrument(skip_all, fields(phase = %phase))]
pub fn run_project_gates<G: GateRunner + ?Sized>(
    project: &Project,
    runner: &G,
    feature: Option<&FeaturePaths>,
    phase: GatePhase,
) -> Result<GateReport> {
    let ctx = GateContext {
        workdir: project.root(),
        log_dir: feature.map(|f| f.artifacts_dir.as_path()),
        output_limit_bytes: project.config.gate_output_limit_bytes,
    };
    let report = run_gates(runner, &project.config.gates, &ctx, phase, &now_ts())?;
    let report_path = feature.map_or(&project.paths.global_gates_path, |f| &f.gates);
    write_gate_report(report_path, &report)?;
    Ok(report)
}

/// Render the prompt for `stage` and invoke it.
pub fn call_agent<A: Agent + ?Sized>(
    project: &Project,
    agent: &A,
    feature: &Feature,
    stage: Stage,
    mut inputs: PromptInputs,
    prompts: &PromptEngine,
) -> Result<StageOutcome> {
    let paths = project.feature(feature);
    inputs.output_path = paths.stage_output(stage).map(|p| project.display(&p));
    let prompt = prompts.render(stage, &project.config.gates, &inputs)?;
    invoke_stage(agent, &paths, feature, project.root(), stage, prompt, &now_ts())
}

/// Result of a single-stage command.
#[derive(Debug, Clone)]
pub struct StageRun {
    pub stage: Stage,
    /// The document written by review-like stages.
    pub document: Option<String>,
    /// Parsed verdict for plan-review and review.
    pub verdict: Option<String>,
    /// Gates run after implement/fix, when any are configured.
    pub gates: Option<GateReport>,
}

/// Run one stage outside the loop.
///
/// research, plan-review and review need SPEC.md; implement and fix need an
/// approved plan and are followed by the configured gates.
#[instrument(skip_all, fields(stage = %stage, feature = %feature))]
pub fn run_single_stage<A: Agent + ?Sized, G: GateRunner + ?Sized>(
    project: &Project,
    agent: &A,
    gate_runner: &G,
    feature: &Feature,
    stage: Stage,
) -> Result<StageRun> {
    match stage {
        Stage::Research | Stage::PlanReview | Stage::Review => {
            require_spec(project, feature)?;
        }
        Stage::Implement | Stage::Fix => {
            require_plan_approval(project, feature)?;
        }
    }

    let prompts = PromptEngine::new()?;
    let mut inputs = prompt_inputs(project, feature)?;
    if stage == Stage::Fix {
        inputs.gate_failures = last_gate_failures(&project.feature(feature))?;
        if !inputs.gate_failures.is_empty() {
            info!(count = inputs.gate_failures.len(), "passing failed gates to fix");
        }
    }
    let document = match call_agent(project, agent, feature, stage, inputs, &prompts)? {
        StageOutcome::Failed { exit_code } => {
            return Err(StageError::AgentFailed {
                stage,
                code: exit_code,
            }
            .into());
        }
        StageOutcome::Completed { document } => document,
    };

    if let Some(name) = stage.output_file()
        && document.is_none()
    {
        return Err(StageError::MissingOutput {
            stage,
            artifact: format!("{}/{name}", project.display(&project.feature(feature).dir)),
        }
        .into());
    }

    let verdict = match stage {
        Stage::PlanReview | Stage::Review => document.as_deref().and_then(parse_verdict),
        _ => None,
    };

    let gates = match stage {
        Stage::Implement | Stage::Fix if project.config.gates.is_empty() => {
            warn!("no gates configured, skipping post-stage gates");
            None
        }
        Stage::Implement | Stage::Fix => {
            let phase = if stage == Stage::Fix {
                GatePhase::Fix
            } else {
                GatePhase::Implement
            };
            let report =
                run_project_gates(project, gate_runner, Some(&project.feature(feature)), phase)?;
            if !report.passed() {
                return Err(StageError::GatesFailed {
                    stage: stage.to_string(),
                    failed: report.failed_names(),
                }
                .into());
            }
            Some(report)
        }
        _ => None,
    };

    info!(verdict = ?verdict, "stage finished");
    Ok(StageRun {
        stage,
        document,
        verdict,
        gates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedAgent, ScriptedGateRunner, ScriptedStep, TestProject, call_log};

    #[test]
    fn implement_requires_plan_approval_before_any_call() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.write_spec(&feature).expect("spec");
        let log = call_log();
        let agent = ScriptedAgent::new(&log);
        let gates = ScriptedGateRunner::new(&log);

        let err = run_single_stage(&project.project(), &agent, &gates, &feature, Stage::Implement)
            .unwrap_err();

        assert!(err.to_string().contains("PLAN_REVIEW.md"));
        assert!(err.to_string().contains("bt plan-review f"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn not_approved_plan_names_verdict_and_expected_sentinel() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project
            .write_feature_file(&feature, "PLAN_REVIEW.md", "Verdict: NEEDS_CHANGES\n")
            .expect("plan");
        let err = require_plan_approval(&project.project(), &feature).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("NEEDS_CHANGES"));
        assert!(msg.contains("APPROVED_PLAN"));
    }

    #[test]
    fn plan_review_reports_verdict() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.write_spec(&feature).expect("spec");
        let log = call_log();
        let agent = ScriptedAgent::new(&log);
        let gates = ScriptedGateRunner::new(&log);

        let run = run_single_stage(&project.project(), &agent, &gates, &feature, Stage::PlanReview)
            .expect("plan review");

        assert_eq!(run.verdict.as_deref(), Some("APPROVED_PLAN"));
        assert!(project.feature_paths(&feature).plan_review.exists());
        assert_eq!(*log.borrow(), vec!["plan-review"]);
    }

    #[test]
    fn review_without_document_fails_closed() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.write_spec(&feature).expect("spec");
        let log = call_log();
        let agent = ScriptedAgent::new(&log).script(Stage::Review, vec![ScriptedStep::Silent]);
        let gates = ScriptedGateRunner::new(&log);

        let err = run_single_stage(&project.project(), &agent, &gates, &feature, Stage::Review)
            .unwrap_err();
        assert!(err.to_string().contains("did not write specs/f/REVIEW.md"));
    }

    #[test]
    fn implement_runs_gates_and_fails_on_gate_failure() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log);
        let gates = ScriptedGateRunner::new(&log).with_statuses(vec![1]);

        let err = run_single_stage(&project.project(), &agent, &gates, &feature, Stage::Implement)
            .unwrap_err();

        assert!(err.to_string().contains("gates failed after implement: test"));
        assert_eq!(*log.borrow(), vec!["implement", "gate:test"]);
        assert!(project.feature_paths(&feature).gates.exists());
    }

    #[test]
    fn fix_after_failed_implement_gates_sees_the_failing_gate_log() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log);
        let gates = ScriptedGateRunner::new(&log).with_statuses(vec![1]);
        let bt = project.project();

        run_single_stage(&bt, &agent, &gates, &feature, Stage::Implement).unwrap_err();
        project
            .write_feature_file(&feature, ".artifacts/gate-test.log", "assertion failed: parses_empty_input\n")
            .expect("gate log");
        run_single_stage(&bt, &agent, &gates, &feature, Stage::Fix).expect("fix");

        let prompt = agent.last_prompt(Stage::Fix).expect("fix prompt");
        assert!(prompt.contains("## Failing gates"));
        assert!(prompt.contains("### test (`true`)"));
        assert!(prompt.contains("assertion failed: parses_empty_input"));
        assert!(last_gate_failures(&project.feature_paths(&feature))
            .expect("failures")
            .is_empty());
    }

    #[test]
    fn fix_without_gate_report_has_no_failing_gates_section() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log);
        let gates = ScriptedGateRunner::new(&log);

        run_single_stage(&project.project(), &agent, &gates, &feature, Stage::Fix).expect("fix");

        let prompt = agent.last_prompt(Stage::Fix).expect("fix prompt");
        assert!(!prompt.contains("Failing gates"));
    }

    #[test]
    fn failing_agent_is_a_stage_error() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent =
            ScriptedAgent::new(&log).script(Stage::Fix, vec![ScriptedStep::Fail(5)]);
        let gates = ScriptedGateRunner::new(&log);

        let err = run_single_stage(&project.project(), &agent, &gates, &feature, Stage::Fix)
            .unwrap_err();
        assert_eq!(err.to_string(), "fix failed (exit code 5)");
        assert_eq!(*log.borrow(), vec!["fix"]);
    }
}
