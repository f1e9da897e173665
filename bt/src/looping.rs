//! Loop engine for `bt loop`: the implement → gates → review → fix state machine.
//!
//! ```text
//! Init ─▶ PreflightGates ─▶ ┌ Implement ─▶ StageGates ─▶ Review ─▶ VerdictCheck ┐
//!                           └──────── Fix (─▶ StageGates) ◀── needs changes ────┘
//! ```
//!
//! Every terminal state is returned as a [`LoopTerminal`] value; `Err` is
//! reserved for I/O failures (progress, history, reports, spawning processes).
//! Each iteration is persisted atomically before the engine moves on, so a
//! later run resumes at `completedIterations + 1`.

use std::fmt;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::convergence::{Decision, decide, plan_start};
use crate::core::history::{HistoryRecord, render_history};
use crate::core::progress::{Iteration, LoopProgress};
use crate::core::slug::Feature;
use crate::core::types::{GatePhase, LoopResult, Stage, StageStatus};
use crate::core::verdict::parse_verdict;
use crate::errors::display_code;
use crate::exit_codes;
use crate::io::agent::Agent;
use crate::io::clock::{format_ts, now, now_ts};
use crate::io::gates::{GateReport, GateRunner};
use crate::io::invoker::StageOutcome;
use crate::io::paths::FeaturePaths;
use crate::io::progress_store::ProgressStore;
use crate::io::prompt::{PromptEngine, PromptInputs};
use crate::project::Project;
use crate::stages::{
    call_agent, last_gate_failures, plan_approval, plan_precondition, prompt_inputs,
    run_project_gates,
};

/// Knobs for one loop run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOptions {
    pub max_iterations: u32,
    /// Re-run the gates after a successful fix.
    pub gate_after_fix: bool,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopTerminal {
    /// A review approved the work on `iteration`.
    Success { iteration: u32 },
    /// The budget ran out without an approving review.
    MaxIterationsExceeded { completed: u32, max_iterations: u32 },
    /// The implement stage, or the fix stage which shares its semantics, exited non-zero.
    ImplementFailed {
        iteration: u32,
        stage: Stage,
        exit_code: Option<i32>,
    },
    ReviewFailed {
        iteration: u32,
        exit_code: Option<i32>,
    },
    /// Gates failed. `iteration` is `None` for preflight; an empty `failed`
    /// means no gates were configured.
    GateFailed {
        iteration: Option<u32>,
        phase: GatePhase,
        failed: Vec<String>,
    },
    /// The plan review is missing or not approved. Nothing was written.
    PlanNotApproved { reason: String },
}

impl LoopTerminal {
    pub fn result(&self) -> LoopResult {
        match self {
            LoopTerminal::Success { .. } => LoopResult::Success,
            LoopTerminal::MaxIterationsExceeded { .. } => LoopResult::MaxIterationsExceeded,
            LoopTerminal::ImplementFailed { .. } => LoopResult::ImplementFailed,
            LoopTerminal::ReviewFailed { .. } => LoopResult::ReviewFailed,
            LoopTerminal::GateFailed { .. } => LoopResult::GateFailed,
            LoopTerminal::PlanNotApproved { .. } => LoopResult::PlanNotApproved,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoopTerminal::Success { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            LoopTerminal::Success { .. } => exit_codes::OK,
            LoopTerminal::MaxIterationsExceeded { .. } => exit_codes::EXHAUSTED,
            _ => exit_codes::FAILURE,
        }
    }
}

impl fmt::Display for LoopTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopTerminal::Success { iteration } => write!(f, "loop converged on iter {iteration}"),
            LoopTerminal::MaxIterationsExceeded {
                completed,
                max_iterations,
            } => write!(
                f,
                "max iterations exceeded ({completed}/{max_iterations} iterations without approval)"
            ),
            LoopTerminal::ImplementFailed {
                iteration,
                stage,
                exit_code,
            } => write!(
                f,
                "{stage} failed on iter {iteration} (exit code {})",
                display_code(*exit_code)
            ),
            LoopTerminal::ReviewFailed {
                iteration,
                exit_code,
            } => write!(
                f,
                "review failed on iter {iteration} (exit code {})",
                display_code(*exit_code)
            ),
            LoopTerminal::GateFailed {
                iteration: None,
                failed,
                ..
            } => {
                if failed.is_empty() {
                    write!(f, "preflight gates failed (or none configured): no gates configured")
                } else {
                    write!(
                        f,
                        "preflight gates failed (or none configured): {}",
                        failed.join(", ")
                    )
                }
            }
            LoopTerminal::GateFailed {
                iteration: Some(iteration),
                phase,
                failed,
            } => write!(
                f,
                "gates failed after {phase} on iter {iteration}: {}",
                failed.join(", ")
            ),
            LoopTerminal::PlanNotApproved { reason } => f.write_str(reason),
        }
    }
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// First iteration index this invocation ran (or would have run).
    pub started_at_iter: u32,
    pub terminal: LoopTerminal,
    /// Final persisted record; `None` when nothing was written.
    pub progress: Option<LoopProgress>,
}

/// Observable progress, reported to the caller as it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    Resumed { from: u32 },
    StageStarted { iteration: u32, stage: Stage },
    GatesFinished {
        iteration: Option<u32>,
        phase: GatePhase,
        passed: bool,
    },
    Verdict { iteration: u32, verdict: String },
}

/// Sequences stages, gates and persistence for one feature.
pub struct LoopEngine<'a, A: Agent + ?Sized, G: GateRunner + ?Sized> {
    project: &'a Project,
    agent: &'a A,
    gate_runner: &'a G,
    options: LoopOptions,
}

/// Mutable state of one run.
struct Run<'p> {
    feature: &'p Feature,
    paths: FeaturePaths,
    store: ProgressStore,
    progress: LoopProgress,
    prompts: PromptEngine,
}

impl<'a, A: Agent + ?Sized, G: GateRunner + ?Sized> LoopEngine<'a, A, G> {
    pub fn new(project: &'a Project, agent: &'a A, gate_runner: &'a G, options: LoopOptions) -> Self {
        Self {
            project,
            agent,
            gate_runner,
            options,
        }
    }

    pub fn run(&self, feature: &Feature) -> Result<LoopOutcome> {
        self.run_with(feature, |_| {})
    }

    /// Run the loop, reporting progress through `on_event`.
    #[instrument(skip_all, fields(feature = %feature, max_iterations = self.options.max_iterations))]
    pub fn run_with<F: FnMut(&LoopEvent)>(&self, feature: &Feature, mut on_event: F) -> Result<LoopOutcome> {
        let paths = self.project.feature(feature);

        let approval = plan_approval(&paths)?;
        if let Err(err) = plan_precondition(self.project, feature, &approval) {
            warn!(approval = %approval.describe(), "plan not approved");
            return Ok(LoopOutcome {
                started_at_iter: 1,
                terminal: LoopTerminal::PlanNotApproved {
                    reason: err.to_string(),
                },
                progress: None,
            });
        }

        let store = ProgressStore::for_feature(&paths);
        let prior = store.load()?;
        let progress = plan_start(prior, feature.as_str(), self.options.max_iterations, &now_ts());
        let start = progress.next_index();
        if start > 1 {
            info!(from = start, "resuming loop");
            on_event(&LoopEvent::Resumed { from: start });
        }

        let mut run = Run {
            feature,
            paths,
            store,
            progress,
            prompts: PromptEngine::new()?,
        };

        if start > self.options.max_iterations {
            let terminal = LoopTerminal::MaxIterationsExceeded {
                completed: run.progress.completed_iterations,
                max_iterations: self.options.max_iterations,
            };
            return self.finish(run, start, terminal);
        }

        let report = self.gates(&run, None, GatePhase::Preflight, &mut on_event)?;
        if !report.passed() {
            let terminal = LoopTerminal::GateFailed {
                iteration: None,
                phase: GatePhase::Preflight,
                failed: report.failed_names(),
            };
            return self.finish(run, start, terminal);
        }
        run.store.save(&run.progress)?;

        for index in start..=self.options.max_iterations {
            if let Some(terminal) = self.iteration(&mut run, index, &mut on_event)? {
                return self.finish(run, start, terminal);
            }
        }

        // Only reachable when the last iteration ended in fix, which `decide` rules out.
        let terminal = LoopTerminal::MaxIterationsExceeded {
            completed: run.progress.completed_iterations,
            max_iterations: self.options.max_iterations,
        };
        self.finish(run, start, terminal)
    }

    /// One iteration. `Some` when the loop must stop after it.
    fn iteration<F: FnMut(&LoopEvent)>(
        &self,
        run: &mut Run<'_>,
        index: u32,
        on_event: &mut F,
    ) -> Result<Option<LoopTerminal>> {
        let mut record = Iteration::new(index);

        // Implement
        on_event(&LoopEvent::StageStarted {
            iteration: index,
            stage: Stage::Implement,
        });
        if let StageOutcome::Failed { exit_code } = self.stage(run, index, Stage::Implement)? {
            record.implement_status = StageStatus::Fail;
            self.record(run, record)?;
            return Ok(Some(LoopTerminal::ImplementFailed {
                iteration: index,
                stage: Stage::Implement,
                exit_code,
            }));
        }

        // Stage gates
        let report = self.gates(run, Some(index), GatePhase::Implement, on_event)?;
        record.gates.extend(report.summaries());
        if !report.passed() {
            record.implement_status = StageStatus::Fail;
            self.record(run, record)?;
            return Ok(Some(LoopTerminal::GateFailed {
                iteration: Some(index),
                phase: GatePhase::Implement,
                failed: report.failed_names(),
            }));
        }
        record.implement_status = StageStatus::Pass;

        // Review
        on_event(&LoopEvent::StageStarted {
            iteration: index,
            stage: Stage::Review,
        });
        let review = match self.stage(run, index, Stage::Review)? {
            StageOutcome::Failed { exit_code } => {
                record.review_status = StageStatus::Fail;
                self.record(run, record)?;
                return Ok(Some(LoopTerminal::ReviewFailed {
                    iteration: index,
                    exit_code,
                }));
            }
            StageOutcome::Completed { document } => document,
        };
        record.review_status = StageStatus::Pass;
        record.verdict = match review.as_deref().map(parse_verdict) {
            Some(Some(verdict)) => verdict,
            Some(None) => {
                warn!(iteration = index, "review has no verdict line");
                String::new()
            }
            None => {
                warn!(iteration = index, "review wrote no document, treating as not approved");
                String::new()
            }
        };
        on_event(&LoopEvent::Verdict {
            iteration: index,
            verdict: record.verdict.clone(),
        });
        record.history = Some(self.history(run, &record, review.as_deref())?);

        // Verdict check
        match decide(&record.verdict, index, self.options.max_iterations) {
            Decision::Converged => {
                self.record(run, record)?;
                Ok(Some(LoopTerminal::Success { iteration: index }))
            }
            Decision::Exhausted => {
                let completed = index;
                self.record(run, record)?;
                Ok(Some(LoopTerminal::MaxIterationsExceeded {
                    completed,
                    max_iterations: self.options.max_iterations,
                }))
            }
            Decision::Fix => self.fix(run, record, on_event),
        }
    }

    fn fix<F: FnMut(&LoopEvent)>(
        &self,
        run: &mut Run<'_>,
        mut record: Iteration,
        on_event: &mut F,
    ) -> Result<Option<LoopTerminal>> {
        let index = record.index;
        on_event(&LoopEvent::StageStarted {
            iteration: index,
            stage: Stage::Fix,
        });
        if let StageOutcome::Failed { exit_code } = self.stage(run, index, Stage::Fix)? {
            record.fix_status = StageStatus::Fail;
            self.record(run, record)?;
            return Ok(Some(LoopTerminal::ImplementFailed {
                iteration: index,
                stage: Stage::Fix,
                exit_code,
            }));
        }

        if self.options.gate_after_fix {
            let report = self.gates(run, Some(index), GatePhase::Fix, on_event)?;
            record.gates.extend(report.summaries());
            if !report.passed() {
                record.fix_status = StageStatus::Fail;
                self.record(run, record)?;
                return Ok(Some(LoopTerminal::GateFailed {
                    iteration: Some(index),
                    phase: GatePhase::Fix,
                    failed: report.failed_names(),
                }));
            }
        }

        record.fix_status = StageStatus::Pass;
        self.record(run, record)?;
        Ok(None)
    }

    fn stage(&self, run: &Run<'_>, index: u32, stage: Stage) -> Result<StageOutcome> {
        let mut inputs: PromptInputs = prompt_inputs(self.project, run.feature)?;
        inputs.iteration = index;
        inputs.max_iterations = self.options.max_iterations;
        if stage == Stage::Fix {
            inputs.gate_failures = last_gate_failures(&run.paths)?;
        }
        call_agent(self.project, self.agent, run.feature, stage, inputs, &run.prompts)
    }

    fn gates<F: FnMut(&LoopEvent)>(
        &self,
        run: &Run<'_>,
        iteration: Option<u32>,
        phase: GatePhase,
        on_event: &mut F,
    ) -> Result<GateReport> {
        let report = run_project_gates(self.project, self.gate_runner, Some(&run.paths), phase)?;
        on_event(&LoopEvent::GatesFinished {
            iteration,
            phase,
            passed: report.passed(),
        });
        Ok(report)
    }

    fn history(&self, run: &Run<'_>, record: &Iteration, review: Option<&str>) -> Result<String> {
        let at = now();
        let recorded_at = format_ts(at);
        let content = render_history(&HistoryRecord {
            feature: run.feature.as_str(),
            index: record.index,
            max_iterations: self.options.max_iterations,
            run_started_at: &run.progress.started_at,
            recorded_at: &recorded_at,
            verdict: &record.verdict,
            gates: &record.gates,
            review,
        });
        run.store
            .write_history(record.index, &content, &run.progress.started_at, at)
    }

    fn record(&self, run: &mut Run<'_>, record: Iteration) -> Result<()> {
        info!(
            iteration = record.index,
            implement = record.implement_status.as_str(),
            review = record.review_status.as_str(),
            fix = record.fix_status.as_str(),
            verdict = %record.verdict,
            "iteration recorded"
        );
        run.progress = run.store.append_iteration(&run.progress, record, &now_ts())?;
        Ok(())
    }

    fn finish(&self, run: Run<'_>, started_at_iter: u32, terminal: LoopTerminal) -> Result<LoopOutcome> {
        let progress = run.progress.with_result(terminal.result(), &now_ts());
        run.store.save(&progress)?;
        info!(result = %progress.result, "loop finished");
        Ok(LoopOutcome {
            started_at_iter,
            terminal,
            progress: Some(progress),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedAgent, ScriptedGateRunner, ScriptedStep, TestProject, call_log};

    fn options(max_iterations: u32) -> LoopOptions {
        LoopOptions {
            max_iterations,
            gate_after_fix: true,
        }
    }

    #[test]
    fn approval_on_first_review_skips_fix() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log).reviews(&["APPROVED"]);
        let gates = ScriptedGateRunner::new(&log);
        let project = project.project();

        let outcome = LoopEngine::new(&project, &agent, &gates, options(3))
            .run(&feature)
            .expect("loop");

        assert_eq!(outcome.terminal, LoopTerminal::Success { iteration: 1 });
        assert_eq!(
            *log.borrow(),
            vec!["gate:test", "implement", "gate:test", "review"]
        );
        let progress = outcome.progress.expect("progress");
        assert_eq!(progress.completed_iterations, 1);
        assert_eq!(progress.iterations[0].fix_status, StageStatus::Skip);
    }

    #[test]
    fn verdict_tokens_are_recorded_as_written() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log).reviews(&["needs_changes", "Approved"]);
        let gates = ScriptedGateRunner::new(&log);
        let bt = project.project();

        let outcome = LoopEngine::new(&bt, &agent, &gates, options(3))
            .run(&feature)
            .expect("loop");

        assert_eq!(outcome.terminal, LoopTerminal::Success { iteration: 2 });
        let stored = ProgressStore::for_feature(&project.feature_paths(&feature))
            .load()
            .expect("load")
            .expect("progress");
        let verdicts: Vec<&str> = stored.iterations.iter().map(|it| it.verdict.as_str()).collect();
        assert_eq!(verdicts, vec!["needs_changes", "Approved"]);
    }

    #[test]
    fn plan_not_approved_writes_nothing() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.write_spec(&feature).expect("spec");
        let log = call_log();
        let agent = ScriptedAgent::new(&log);
        let gates = ScriptedGateRunner::new(&log);
        let bt = project.project();

        let outcome = LoopEngine::new(&bt, &agent, &gates, options(3))
            .run(&feature)
            .expect("loop");

        assert!(matches!(outcome.terminal, LoopTerminal::PlanNotApproved { .. }));
        assert!(outcome.terminal.to_string().contains("bt plan-review f"));
        assert!(log.borrow().is_empty());
        assert!(!project.feature_paths(&feature).progress.exists());
    }

    #[test]
    fn implement_failure_skips_gates_and_review() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log).script(Stage::Implement, vec![ScriptedStep::Fail(1)]);
        let gates = ScriptedGateRunner::new(&log);
        let bt = project.project();

        let outcome = LoopEngine::new(&bt, &agent, &gates, options(3))
            .run(&feature)
            .expect("loop");

        assert_eq!(outcome.terminal.to_string(), "implement failed on iter 1 (exit code 1)");
        assert_eq!(*log.borrow(), vec!["gate:test", "implement"]);
        let progress = outcome.progress.expect("progress");
        assert_eq!(progress.result, LoopResult::ImplementFailed);
        let it = &progress.iterations[0];
        assert_eq!(
            (it.implement_status, it.review_status, it.fix_status),
            (StageStatus::Fail, StageStatus::Skip, StageStatus::Skip)
        );
    }

    #[test]
    fn stage_gate_failure_stops_before_review() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log);
        // preflight passes, post-implement fails
        let gates = ScriptedGateRunner::new(&log).with_statuses(vec![0, 2]);
        let bt = project.project();

        let outcome = LoopEngine::new(&bt, &agent, &gates, options(3))
            .run(&feature)
            .expect("loop");

        assert_eq!(
            outcome.terminal,
            LoopTerminal::GateFailed {
                iteration: Some(1),
                phase: GatePhase::Implement,
                failed: vec!["test".to_string()],
            }
        );
        assert_eq!(*log.borrow(), vec!["gate:test", "implement", "gate:test"]);
        let it = &outcome.progress.expect("progress").iterations[0];
        assert_eq!(it.implement_status, StageStatus::Fail);
        assert_eq!(it.review_status, StageStatus::Skip);
        assert_eq!(it.gates[0].status, StageStatus::Fail);
    }

    #[test]
    fn review_failure_is_its_own_terminal() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log).script(Stage::Review, vec![ScriptedStep::Fail(4)]);
        let gates = ScriptedGateRunner::new(&log);
        let bt = project.project();

        let outcome = LoopEngine::new(&bt, &agent, &gates, options(3))
            .run(&feature)
            .expect("loop");

        assert_eq!(
            outcome.terminal,
            LoopTerminal::ReviewFailed {
                iteration: 1,
                exit_code: Some(4)
            }
        );
        assert_eq!(outcome.terminal.exit_code(), exit_codes::FAILURE);
        assert_eq!(
            outcome.progress.expect("progress").result,
            LoopResult::ReviewFailed
        );
    }

    #[test]
    fn fix_failure_shares_implement_failed_reason() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log)
            .reviews(&["NEEDS_CHANGES"])
            .script(Stage::Fix, vec![ScriptedStep::Fail(3)]);
        let gates = ScriptedGateRunner::new(&log);
        let bt = project.project();

        let outcome = LoopEngine::new(&bt, &agent, &gates, options(3))
            .run(&feature)
            .expect("loop");

        assert_eq!(outcome.terminal.to_string(), "fix failed on iter 1 (exit code 3)");
        assert_eq!(
            *log.borrow(),
            vec!["gate:test", "implement", "gate:test", "review", "fix"]
        );
        let progress = outcome.progress.expect("progress");
        assert_eq!(progress.result, LoopResult::ImplementFailed);
        assert_eq!(progress.iterations[0].fix_status, StageStatus::Fail);
        assert!(progress.iterations[0].history.is_some());
    }

    #[test]
    fn gates_after_fix_can_be_disabled() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log).reviews(&["NEEDS_CHANGES", "APPROVED"]);
        let gates = ScriptedGateRunner::new(&log);
        let bt = project.project();

        LoopEngine::new(
            &bt,
            &agent,
            &gates,
            LoopOptions {
                max_iterations: 3,
                gate_after_fix: false,
            },
        )
        .run(&feature)
        .expect("loop");

        assert_eq!(
            *log.borrow(),
            vec![
                "gate:test", "implement", "gate:test", "review", "fix", "implement", "gate:test",
                "review"
            ]
        );
    }

    #[test]
    fn missing_review_document_is_not_convergent() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log).script(Stage::Review, vec![ScriptedStep::Silent]);
        let gates = ScriptedGateRunner::new(&log);
        let bt = project.project();

        let outcome = LoopEngine::new(&bt, &agent, &gates, options(1))
            .run(&feature)
            .expect("loop");

        assert_eq!(
            outcome.terminal,
            LoopTerminal::MaxIterationsExceeded {
                completed: 1,
                max_iterations: 1
            }
        );
        assert_eq!(outcome.terminal.exit_code(), exit_codes::EXHAUSTED);
        assert_eq!(outcome.progress.expect("progress").iterations[0].verdict, "");
    }

    #[test]
    fn events_follow_stage_order() {
        let project = TestProject::new().expect("project");
        let feature = project.feature("f");
        project.approve_plan(&feature).expect("approve");
        let log = call_log();
        let agent = ScriptedAgent::new(&log).reviews(&["APPROVE"]);
        let gates = ScriptedGateRunner::new(&log);
        let bt = project.project();
        let mut events = Vec::new();

        LoopEngine::new(&bt, &agent, &gates, options(2))
            .run_with(&feature, |event| events.push(event.clone()))
            .expect("loop");

        assert_eq!(
            events,
            vec![
                LoopEvent::GatesFinished {
                    iteration: None,
                    phase: GatePhase::Preflight,
                    passed: true
                },
                LoopEvent::StageStarted {
                    iteration: 1,
                    stage: Stage::Implement
                },
                LoopEvent::GatesFinished {
                    iteration: Some(1),
                    phase: GatePhase::Implement,
                    passed: true
                },
                LoopEvent::StageStarted {
                    iteration: 1,
                    stage: Stage::Review
                },
                LoopEvent::Verdict {
                    iteration: 1,
                    verdict: "APPROVE".to_string()
                },
            ]
        );
    }
}
