//! Stage prompts rendered from embedded minijinja templates.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::types::{GateSet, Stage};
use crate::core::verdict::PLAN_APPROVED;

const RESEARCH_TEMPLATE: &str = include_str!("prompts/research.md");
const PLAN_REVIEW_TEMPLATE: &str = include_str!("prompts/plan_review.md");
const IMPLEMENT_TEMPLATE: &str = include_str!("prompts/implement.md");
const REVIEW_TEMPLATE: &str = include_str!("prompts/review.md");
const FIX_TEMPLATE: &str = include_str!("prompts/fix.md");

/// Gate output longer than this is cut from the front in fix prompts.
const GATE_OUTPUT_TAIL_BYTES: usize = 4_000;

#[derive(Debug, Clone, Serialize)]
struct GateLine {
    name: String,
    command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateFailure {
    pub name: String,
    pub command: String,
    pub output: String,
}

impl GateFailure {
    /// Keeps only the tail of `output`.
    pub fn new(name: impl Into<String>, command: impl Into<String>, output: &str) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            output: tail(output, GATE_OUTPUT_TAIL_BYTES),
        }
    }
}

/// Everything a stage prompt may refer to.
#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    pub feature: String,
    pub spec: String,
    pub research: Option<String>,
    pub plan_review: Option<String>,
    pub review: Option<String>,
    pub gate_failures: Vec<GateFailure>,
    pub iteration: u32,
    pub max_iterations: u32,
    pub output_path: Option<String>,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in [
            ("research", RESEARCH_TEMPLATE),
            ("plan-review", PLAN_REVIEW_TEMPLATE),
            ("implement", IMPLEMENT_TEMPLATE),
            ("review", REVIEW_TEMPLATE),
            ("fix", FIX_TEMPLATE),
        ] {
            env.add_template(name, source)
                .with_context(|| format!("load {name} prompt template"))?;
        }
        Ok(Self { env })
    }

    pub fn render(&self, stage: Stage, gates: &GateSet, input: &PromptInputs) -> Result<String> {
        let template = self.env.get_template(stage.as_str())?;
        let gate_lines: Vec<GateLine> = gates
            .iter()
            .map(|g| GateLine {
                name: g.name.clone(),
                command: g.command.clone(),
            })
            .collect();
        let rendered = template
            .render(context! {
                feature => input.feature,
                spec => non_blank(Some(input.spec.as_str())).unwrap_or("(SPEC.md is empty)"),
                research => non_blank(input.research.as_deref()),
                plan_review => non_blank(input.plan_review.as_deref()),
                review => non_blank(input.review.as_deref()),
                gate_failures => input.gate_failures,
                gates => gate_lines,
                iteration => input.iteration,
                max_iterations => input.max_iterations,
                output_path => input.output_path,
                plan_approved => PLAN_APPROVED,
            })
            .with_context(|| format!("render {stage} prompt"))?;
        Ok(rendered)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Last `limit` bytes of `text`, on a char boundary.
fn tail(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("[... {start} bytes cut]\n{}", &text[start..])
}
