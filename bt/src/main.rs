//! `bt`: drive a feature from spec to pull request through an agent loop.

use anyhow::Result;
use clap::{Parser, Subcommand};

use bt::core::slug::Feature;
use bt::core::types::{GatePhase, Stage};
use bt::errors::{UsageError, exit_code_for};
use bt::exit_codes;
use bt::io::agent::CodexAgent;
use bt::io::gates::{GateReport, ShellGateRunner};
use bt::io::gh::GhCli;
use bt::io::git::Git;
use bt::io::notify::notify;
use bt::io::scaffold::bootstrap;
use bt::logging;
use bt::looping::{LoopEngine, LoopEvent, LoopOptions};
use bt::project::{Project, resolve_root};
use bt::spec::create_spec;
use bt::stages::{run_project_gates, run_single_stage};
use bt::status::{collect_status, render_status};
use bt::submit::{SubmitOptions, SubmitOutcome, submit};

#[derive(Parser)]
#[command(
    name = "bt",
    version,
    about = "Spec-driven implement/review/fix loop around a code-generation agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.bt.env`, `specs/`, the state directory and `hooks/`.
    Bootstrap {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Create a feature's SPEC.md from a name, an issue URL or `#<n>`.
    Spec {
        name: String,
        /// Overwrite an existing SPEC.md.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the research stage (writes RESEARCH.md).
    Research {
        #[arg(value_parser = parse_feature)]
        feature: Feature,
    },
    /// Review the plan (writes PLAN_REVIEW.md).
    PlanReview {
        #[arg(value_parser = parse_feature)]
        feature: Feature,
    },
    /// Run the implement stage, then the gates.
    Implement {
        #[arg(value_parser = parse_feature)]
        feature: Feature,
    },
    /// Review the implementation (writes REVIEW.md) and print the verdict.
    Review {
        #[arg(value_parser = parse_feature)]
        feature: Feature,
    },
    /// Apply review feedback, then run the gates.
    Fix {
        #[arg(value_parser = parse_feature)]
        feature: Feature,
    },
    /// Iterate implement, gates, review and fix until approved or out of budget.
    Loop {
        #[arg(value_parser = parse_feature)]
        feature: Feature,
        /// Iteration budget (defaults to the configured value).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_iterations: Option<u32>,
    },
    /// Run all configured gates once.
    Gates {
        #[arg(value_parser = parse_feature)]
        feature: Option<Feature>,
    },
    /// Show configuration and per-feature progress.
    Status {
        #[arg(value_parser = parse_feature)]
        feature: Option<Feature>,
    },
    /// Check staging, run gates, commit, push and open a pull request.
    #[command(visible_alias = "ship")]
    Pr {
        #[arg(value_parser = parse_feature)]
        feature: Feature,
        /// Show what would be submitted without running gates or touching git.
        #[arg(long)]
        dry_run: bool,
        /// Stop after the gates pass.
        #[arg(long)]
        no_commit: bool,
        /// Base branch for the pull request.
        #[arg(long)]
        base: Option<String>,
        /// Pull request title (defaults to the SPEC.md heading).
        #[arg(long)]
        title: Option<String>,
    },
}

fn parse_feature(raw: &str) -> Result<Feature, UsageError> {
    Feature::parse(raw)
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let project = Project::load(&resolve_root()?)?;
    match cli.command {
        Command::Bootstrap { force } => cmd_bootstrap(&project, force),
        Command::Spec { name, force } => cmd_spec(&project, &name, force),
        Command::Research { feature } => cmd_stage(&project, &feature, Stage::Research),
        Command::PlanReview { feature } => cmd_stage(&project, &feature, Stage::PlanReview),
        Command::Implement { feature } => cmd_stage(&project, &feature, Stage::Implement),
        Command::Review { feature } => cmd_stage(&project, &feature, Stage::Review),
        Command::Fix { feature } => cmd_stage(&project, &feature, Stage::Fix),
        Command::Loop {
            feature,
            max_iterations,
        } => cmd_loop(&project, &feature, max_iterations),
        Command::Gates { feature } => cmd_gates(&project, feature.as_ref()),
        Command::Status { feature } => cmd_status(&project, feature.as_ref()),
        Command::Pr {
            feature,
            dry_run,
            no_commit,
            base,
            title,
        } => cmd_pr(
            &project,
            &feature,
            SubmitOptions {
                dry_run,
                no_commit,
                base,
                title,
            },
        ),
    }
}

fn cmd_bootstrap(project: &Project, force: bool) -> Result<i32> {
    let report = bootstrap(&project.paths, force)?;
    for path in &report.created {
        println!("created {}", project.display(path));
    }
    for path in &report.kept {
        println!("kept {}", project.display(path));
    }
    notify_hook(project, "bt bootstrap complete");
    Ok(exit_codes::OK)
}

fn cmd_spec(project: &Project, raw: &str, force: bool) -> Result<i32> {
    let created = create_spec(project, &GhCli::new(project.root()), raw, force)?;
    let spec = project.display(&project.feature(&created.feature).spec);
    if created.written {
        println!("wrote {spec}");
    } else {
        println!("kept existing {spec} (use --force to overwrite)");
    }
    Ok(exit_codes::OK)
}

fn cmd_stage(project: &Project, feature: &Feature, stage: Stage) -> Result<i32> {
    let agent = CodexAgent::new(&project.config.agent);
    let run = run_single_stage(project, &agent, &ShellGateRunner, feature, stage)?;
    if let Some(path) = project.feature(feature).stage_output(stage) {
        println!("wrote {}", project.display(&path));
    }
    if matches!(stage, Stage::PlanReview | Stage::Review) {
        println!("verdict: {}", run.verdict.as_deref().unwrap_or("(none)"));
    }
    if let Some(report) = &run.gates {
        print_gates(report);
    }
    Ok(exit_codes::OK)
}

fn cmd_loop(project: &Project, feature: &Feature, max_iterations: Option<u32>) -> Result<i32> {
    let options = LoopOptions {
        max_iterations: max_iterations.unwrap_or(project.config.loop_cfg.max_iterations),
        gate_after_fix: project.config.loop_cfg.gate_after_fix,
    };
    let agent = CodexAgent::new(&project.config.agent);
    let engine = LoopEngine::new(project, &agent, &ShellGateRunner, options);
    let outcome = engine.run_with(feature, |event| print_event(event, options.max_iterations))?;

    if outcome.terminal.is_success() {
        println!("{}", outcome.terminal);
    } else {
        eprintln!("{}", outcome.terminal);
    }
    notify_hook(
        project,
        &format!("bt loop {feature}: {}", outcome.terminal.result()),
    );
    Ok(outcome.terminal.exit_code())
}

fn print_event(event: &LoopEvent, max_iterations: u32) {
    match event {
        LoopEvent::Resumed { from } => println!("resuming at iter {from}/{max_iterations}"),
        LoopEvent::StageStarted { iteration, stage } => {
            println!("iter {iteration}/{max_iterations}: {stage}");
        }
        LoopEvent::GatesFinished {
            iteration,
            phase,
            passed,
        } => {
            let outcome = if *passed { "passed" } else { "failed" };
            match iteration {
                Some(iteration) => {
                    println!("iter {iteration}/{max_iterations}: {phase} gates {outcome}");
                }
                None => println!("{phase} gates {outcome}"),
            }
        }
        LoopEvent::Verdict { iteration, verdict } => {
            let verdict = if verdict.is_empty() { "(none)" } else { verdict };
            println!("iter {iteration}/{max_iterations}: verdict {verdict}");
        }
    }
}

fn cmd_gates(project: &Project, feature: Option<&Feature>) -> Result<i32> {
    let paths = feature.map(|f| project.feature(f));
    let report = run_project_gates(project, &ShellGateRunner, paths.as_ref(), GatePhase::Preflight)?;
    if report.is_unconfigured() {
        eprintln!("no gates configured (set BT_GATE_<NAME> in .bt.env)");
        return Ok(exit_codes::FAILURE);
    }
    print_gates(&report);
    Ok(if report.passed() {
        exit_codes::OK
    } else {
        exit_codes::FAILURE
    })
}

fn print_gates(report: &GateReport) {
    for result in &report.results {
        let status = if result.passed() { "PASS" } else { "FAIL" };
        println!("{status} {}: {}", result.name, result.command);
    }
}

fn cmd_status(project: &Project, feature: Option<&Feature>) -> Result<i32> {
    let features = collect_status(project, feature)?;
    print!("{}", render_status(project, &features));
    Ok(exit_codes::OK)
}

fn cmd_pr(project: &Project, feature: &Feature, options: SubmitOptions) -> Result<i32> {
    let git = Git::new(project.root());
    let gh = GhCli::new(project.root());
    match submit(project, &git, &ShellGateRunner, &gh, feature, &options)? {
        SubmitOutcome::DryRun { title, artifacts } => {
            println!("Dry run: would submit {feature} as \"{title}\"");
            println!("Artifacts comment would contain:");
            print!("{artifacts}");
        }
        SubmitOutcome::GatesPassed { report } => {
            print_gates(&report);
            println!("gates passed; not committing (--no-commit)");
            notify_hook(project, &format!("bt pr {feature}: gates passed"));
        }
        SubmitOutcome::Opened {
            url,
            base,
            head,
            committed,
        } => {
            if !committed {
                println!("nothing staged to commit; pushing {head} as is");
            }
            println!("opened {url} ({head} -> {base})");
            notify_hook(project, &format!("bt pr {feature}: {url}"));
        }
    }
    Ok(exit_codes::OK)
}

fn notify_hook(project: &Project, message: &str) {
    notify(project.config.notify_hook.as_deref(), project.root(), message);
}
