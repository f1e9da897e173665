//! Feature-development workflow orchestrator.
//!
//! bt drives a `spec → plan-review → implement → review → fix` loop around an
//! external code-generation agent, gated by configurable quality checks, and
//! leaves an auditable trail per feature (reviews, history, progress, logs).
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (verdict parsing, convergence
//!   decisions, progress invariants, history naming). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, git, `gh`, agent and
//!   gate processes). Behind traits where tests need doubles.
//!
//! Command modules ([`looping`], [`stages`], [`submit`], [`spec`], [`status`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod core;
pub mod errors;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod project;
pub mod spec;
pub mod stages;
pub mod status;
pub mod submit;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
