//! Gate runner: configured shell commands that must pass.
//!
//! A gate exiting non-zero is a normal FAIL outcome returned to the caller;
//! only spawning a gate or writing its report is an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde::ser::{SerializeMap, Serializer};
use tracing::{info, instrument, warn};

use crate::core::progress::GateSummary;
use crate::core::types::{Gate, GatePhase, GateSet, StageStatus};
use crate::io::atomic::write_json_atomic;
use crate::io::process::run_command;

/// One gate execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub name: String,
    pub command: String,
    /// Exit code; `None` when killed by a signal.
    pub status: Option<i32>,
    pub output: Option<String>,
}

impl GateResult {
    pub fn passed(&self) -> bool {
        self.status == Some(0)
    }
}

/// Results of one gate pass, in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReport {
    pub ts: String,
    pub phase: GatePhase,
    pub results: Vec<GateResult>,
}

impl GateReport {
    /// True only if at least one gate ran and all of them passed.
    pub fn passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(GateResult::passed)
    }

    /// No gates were configured for this pass.
    pub fn is_unconfigured(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.passed())
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn summaries(&self) -> Vec<GateSummary> {
        self.results
            .iter()
            .map(|r| GateSummary {
                stage: self.phase,
                name: r.name.clone(),
                status: StageStatus::from_passed(r.passed()),
            })
            .collect()
    }
}

/// On-disk shape: `{ts, results: {<name>: {cmd, status}}}`, names in run order.
impl Serialize for GateReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Results<'a>(&'a [GateResult]);
        #[derive(Serialize)]
        struct Entry<'a> {
            cmd: &'a str,
            status: Option<i32>,
        }
        impl Serialize for Results<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for result in self.0 {
                    map.serialize_entry(
                        &result.name,
                        &Entry {
                            cmd: &result.command,
                            status: result.status,
                        },
                    )?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("ts", &self.ts)?;
        map.serialize_entry("results", &Results(&self.results))?;
        map.end()
    }
}

#[derive(Debug, Deserialize)]
struct StoredGateReport {
    results: BTreeMap<String, StoredGateResult>,
}

#[derive(Debug, Deserialize)]
struct StoredGateResult {
    cmd: String,
    status: Option<i32>,
}

/// Failed gates of the report at `path` as `(name, command)`, by name.
/// A missing report has no failures.
pub fn read_failed_gates(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let report: StoredGateReport = serde_json::from_str(&raw)
        .with_context(|| format!("parse gate report {}", path.display()))?;
    Ok(report
        .results
        .into_iter()
        .filter(|(_, result)| result.status != Some(0))
        .map(|(name, result)| (name, result.cmd))
        .collect())
}

/// Parameters for one gate execution.
#[derive(Debug, Clone)]
pub struct GateRequest<'a> {
    pub gate: &'a Gate,
    pub workdir: &'a Path,
    /// Append gate output here as it runs.
    pub log_path: Option<PathBuf>,
    pub output_limit_bytes: usize,
}

/// Abstraction over gate execution. Tests use scripted runners.
pub trait GateRunner {
    fn run(&self, request: &GateRequest<'_>) -> Result<GateResult>;
}

/// Runs each gate as `sh -c <command>` in the project root.
pub struct ShellGateRunner;

impl GateRunner for ShellGateRunner {
    #[instrument(skip_all, fields(gate = %request.gate.name))]
    fn run(&self, request: &GateRequest<'_>) -> Result<GateResult> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&request.gate.command)
            .current_dir(request.workdir);
        let output = run_command(
            cmd,
            None,
            request.output_limit_bytes,
            request.log_path.as_deref(),
        )
        .with_context(|| format!("run gate {}: {}", request.gate.name, request.gate.command))?;
        Ok(GateResult {
            name: request.gate.name.clone(),
            command: request.gate.command.clone(),
            status: output.code(),
            output: Some(output.combined_text()),
        })
    }
}

/// Where a gate pass runs and logs.
#[derive(Debug, Clone)]
pub struct GateContext<'a> {
    pub workdir: &'a Path,
    /// Per-gate logs go to `<log_dir>/gate-<name>.log` when set.
    pub log_dir: Option<&'a Path>,
    pub output_limit_bytes: usize,
}

/// Run every configured gate once, sequentially, in configured order.
///
/// All gates run even after a failure so the report is complete. An empty
/// `gates` yields an empty report, which never counts as passed.
#[instrument(skip_all, fields(phase = %phase, gates = gates.len()))]
pub fn run_gates<R: GateRunner + ?Sized>(
    runner: &R,
    gates: &GateSet,
    ctx: &GateContext<'_>,
    phase: GatePhase,
    ts: &str,
) -> Result<GateReport> {
    if gates.is_empty() {
        warn!("no gates configured");
    }
    let mut results = Vec::with_capacity(gates.len());
    for gate in gates.iter() {
        let request = GateRequest {
            gate,
            workdir: ctx.workdir,
            log_path: ctx
                .log_dir
                .map(|dir| dir.join(format!("gate-{}.log", gate.name))),
            output_limit_bytes: ctx.output_limit_bytes,
        };
        let result = runner.run(&request)?;
        if result.passed() {
            info!(gate = %gate.name, "gate passed");
        } else {
            warn!(gate = %gate.name, status = ?result.status, "gate failed");
        }
        results.push(result);
    }
    Ok(GateReport {
        ts: ts.to_string(),
        phase,
        results,
    })
}

/// Persist a gate report (global or feature-scoped).
pub fn write_gate_report(path: &Path, report: &GateReport) -> Result<()> {
    write_json_atomic(path, report).with_context(|| format!("write gate report {}", path.display()))
}
