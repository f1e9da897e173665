//! Test doubles and fixtures shared by unit and integration tests.
//!
//! [`ScriptedAgent`] and [`ScriptedGateRunner`] record every call into a shared
//! [`CallLog`], so tests can assert the exact order of stage and gate calls.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::core::slug::Feature;
use crate::core::types::{Gate, GateSet, Stage};
use crate::io::agent::{Agent, AgentExit, AgentRequest};
use crate::io::config::BtConfig;
use crate::io::gates::{GateRequest, GateResult, GateRunner};
use crate::io::paths::FeaturePaths;
use crate::project::Project;

/// Ordered record of calls: stage names (`implement`) and `gate:<name>`.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// What a scripted agent does on one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedStep {
    /// Exit 0, writing the stage's default document if it has an output file.
    Pass,
    /// Exit 0 and write this document to the output path.
    Write(String),
    /// Exit 0 without writing anything.
    Silent,
    /// Exit with this code without writing anything.
    Fail(i32),
}

/// Agent that replays per-stage scripts. Once a stage's script is exhausted
/// every further call behaves like [`ScriptedStep::Pass`].
pub struct ScriptedAgent {
    log: CallLog,
    scripts: RefCell<HashMap<Stage, VecDeque<ScriptedStep>>>,
    prompts: RefCell<Vec<(Stage, String)>>,
}

impl ScriptedAgent {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: Rc::clone(log),
            scripts: RefCell::new(HashMap::new()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Append `steps` to the script of `stage`.
    pub fn script(self, stage: Stage, steps: Vec<ScriptedStep>) -> Self {
        self.scripts
            .borrow_mut()
            .entry(stage)
            .or_default()
            .extend(steps);
        self
    }

    /// One review per verdict, in order.
    pub fn reviews(self, verdicts: &[&str]) -> Self {
        let steps = verdicts
            .iter()
            .map(|verdict| ScriptedStep::Write(format!("# Review\n\nVerdict: {verdict}\n")))
            .collect();
        self.script(Stage::Review, steps)
    }

    /// Prompt of the most recent call for `stage`.
    pub fn last_prompt(&self, stage: Stage) -> Option<String> {
        self.prompts
            .borrow()
            .iter()
            .rev()
            .find(|(s, _)| *s == stage)
            .map(|(_, prompt)| prompt.clone())
    }

    fn next_step(&self, stage: Stage) -> ScriptedStep {
        self.scripts
            .borrow_mut()
            .get_mut(&stage)
            .and_then(VecDeque::pop_front)
            .unwrap_or(ScriptedStep::Pass)
    }
}

/// Document written for [`ScriptedStep::Pass`].
pub fn default_document(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Research => Some("# Research\n\nNotes.\n"),
        Stage::PlanReview => Some("# Plan review\n\nVerdict: APPROVED_PLAN\n"),
        Stage::Review => Some("# Review\n\nVerdict: APPROVED\n"),
        Stage::Implement | Stage::Fix => None,
    }
}

impl Agent for ScriptedAgent {
    fn invoke(&self, request: &AgentRequest) -> Result<AgentExit> {
        self.log.borrow_mut().push(request.stage.as_str().to_string());
        self.prompts
            .borrow_mut()
            .push((request.stage, request.input.prompt.clone()));
        let document = match self.next_step(request.stage) {
            ScriptedStep::Fail(code) => return Ok(AgentExit { code: Some(code) }),
            ScriptedStep::Silent => None,
            ScriptedStep::Pass => default_document(request.stage).map(str::to_string),
            ScriptedStep::Write(document) => Some(document),
        };
        if let (Some(document), Some(path)) = (document, &request.input.output_path) {
            write_file(path, &document)?;
        }
        Ok(AgentExit::SUCCESS)
    }
}

/// Gate runner that returns queued exit statuses (0 once the queue is empty).
pub struct ScriptedGateRunner {
    log: CallLog,
    statuses: RefCell<VecDeque<i32>>,
}

impl ScriptedGateRunner {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: Rc::clone(log),
            statuses: RefCell::new(VecDeque::new()),
        }
    }

    pub fn with_statuses(self, statuses: Vec<i32>) -> Self {
        self.statuses.borrow_mut().extend(statuses);
        self
    }
}

impl GateRunner for ScriptedGateRunner {
    fn run(&self, request: &GateRequest<'_>) -> Result<GateResult> {
        self.log
            .borrow_mut()
            .push(format!("gate:{}", request.gate.name));
        let status = self.statuses.borrow_mut().pop_front().unwrap_or(0);
        Ok(GateResult {
            name: request.gate.name.clone(),
            command: request.gate.command.clone(),
            status: Some(status),
            output: Some(format!("{} exited {status}\n", request.gate.name)),
        })
    }
}

/// A throwaway project root with a single `test` gate configured.
pub struct TestProject {
    temp: TempDir,
    config: BtConfig,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp project")?;
        let config = BtConfig {
            gates: GateSet::new(vec![Gate {
                name: "test".to_string(),
                command: "true".to_string(),
            }]),
            ..BtConfig::default()
        };
        Ok(Self { temp, config })
    }

    /// Adjust the configuration every later [`TestProject::project`] sees.
    pub fn with_config(mut self, edit: impl FnOnce(&mut BtConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn project(&self) -> Project {
        Project::new(self.root(), self.config.clone())
    }

    pub fn feature(&self, name: &str) -> Feature {
        Feature::parse(name).unwrap_or_else(|err| panic!("invalid test feature {name}: {err}"))
    }

    pub fn feature_paths(&self, feature: &Feature) -> FeaturePaths {
        self.project().feature(feature)
    }

    pub fn write_feature_file(&self, feature: &Feature, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.feature_paths(feature).dir.join(name);
        write_file(&path, content)?;
        Ok(path)
    }

    pub fn write_spec(&self, feature: &Feature) -> Result<PathBuf> {
        self.write_feature_file(feature, "SPEC.md", &format!("# {feature}\n\nBuild it.\n"))
    }

    /// SPEC.md plus a plan review carrying the approved-plan verdict.
    pub fn approve_plan(&self, feature: &Feature) -> Result<()> {
        self.write_spec(feature)?;
        self.write_feature_file(
            feature,
            "PLAN_REVIEW.md",
            "# Plan review\n\nVerdict: APPROVED_PLAN\n",
        )?;
        Ok(())
    }

    pub fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.root().join(relative);
        write_file(&path, content)?;
        Ok(path)
    }
}

/// `git init` with a local identity, so commits work on any machine.
pub fn init_git_repo(root: &Path) -> Result<()> {
    git(root, &["init", "-q", "-b", "main"])?;
    git(root, &["config", "user.email", "bt@example.invalid"])?;
    git(root, &["config", "user.name", "bt tests"])?;
    git(root, &["config", "commit.gpgsign", "false"])?;
    Ok(())
}

/// Run git in `root`, failing on a non-zero exit.
pub fn git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("write {}", path.display()))
}
