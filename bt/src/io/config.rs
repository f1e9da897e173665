//! bt configuration.
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. `<state_dir>/config.toml`
//! 3. the project env file `.bt.env`
//! 4. `BT_*` variables of the process environment
//!
//! The env file is parsed, never exported into the process environment.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::types::{Gate, GateSet};
use crate::errors::UsageError;

/// Project env file, relative to the project root.
pub const ENV_FILE: &str = ".bt.env";
/// Config file name inside the state directory.
pub const CONFIG_FILE: &str = "config.toml";

const GATE_PREFIX: &str = "BT_GATE_";
/// Env gates are ordered with these first, everything else alphabetically after.
const GATE_PRIORITY: [&str; 3] = ["lint", "typecheck", "test"];

/// Loop settings (`[loop]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Iteration budget when `--max-iterations` is not given.
    pub max_iterations: u32,
    /// Run the gates again after a successful fix stage.
    pub gate_after_fix: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            gate_after_fix: true,
        }
    }
}

/// Agent settings (`[agent]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent executable, looked up on `PATH` unless it contains a separator.
    pub bin: String,
    pub reasoning_effort: String,
    /// Bytes of agent stdout/stderr kept in memory (the stage log gets everything).
    pub output_limit_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bin: "codex".to_string(),
            reasoning_effort: "medium".to_string(),
            output_limit_bytes: 100_000,
        }
    }
}

/// Submission settings (`[submit]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubmitConfig {
    /// Path prefixes whose files must be staged before `bt pr`. The feature's
    /// spec directory is always added.
    pub tracked_paths: Vec<String>,
    /// Base branch for pull requests; resolved from `origin/HEAD` when unset.
    pub base: Option<String>,
    /// Per-file byte limit in the artifacts comment.
    pub artifact_limit_bytes: usize,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            tracked_paths: ["src", "lib", "tests", "scripts", "commands", "prompts", "bin"]
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            base: None,
            artifact_limit_bytes: 20_000,
        }
    }
}

/// Bytes of gate output kept in memory per gate.
const DEFAULT_GATE_OUTPUT_LIMIT: usize = 100_000;

/// Shape of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    #[serde(rename = "loop")]
    pub loop_cfg: LoopConfig,
    pub agent: AgentConfig,
    pub submit: SubmitConfig,
    pub gate_output_limit_bytes: Option<usize>,
    pub gates: Vec<Gate>,
}

/// Fully resolved configuration, built once and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtConfig {
    /// Feature directories live here, relative to the project root.
    pub specs_dir: String,
    /// bt's own state (config, global gate report), relative to the project root.
    pub state_dir: String,
    /// Command run with a one-line message after notable events.
    pub notify_hook: Option<String>,
    pub loop_cfg: LoopConfig,
    pub agent: AgentConfig,
    pub submit: SubmitConfig,
    pub gate_output_limit_bytes: usize,
    pub gates: GateSet,
}

impl Default for BtConfig {
    fn default() -> Self {
        Self {
            specs_dir: "specs".to_string(),
            state_dir: ".bt".to_string(),
            notify_hook: None,
            loop_cfg: LoopConfig::default(),
            agent: AgentConfig::default(),
            submit: SubmitConfig::default(),
            gate_output_limit_bytes: DEFAULT_GATE_OUTPUT_LIMIT,
            gates: GateSet::default(),
        }
    }
}

impl BtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.specs_dir.trim().is_empty() {
            return Err(anyhow!("specs_dir must not be empty"));
        }
        if self.state_dir.trim().is_empty() {
            return Err(anyhow!("state_dir must not be empty"));
        }
        if self.loop_cfg.max_iterations == 0 {
            return Err(UsageError("loop.max_iterations must be > 0".to_string()).into());
        }
        if self.agent.bin.trim().is_empty() {
            return Err(anyhow!("agent.bin must not be empty"));
        }
        if self.agent.output_limit_bytes == 0 {
            return Err(anyhow!("agent.output_limit_bytes must be > 0"));
        }
        if self.submit.artifact_limit_bytes == 0 {
            return Err(anyhow!("submit.artifact_limit_bytes must be > 0"));
        }
        if self.gate_output_limit_bytes == 0 {
            return Err(anyhow!("gate_output_limit_bytes must be > 0"));
        }
        for gate in self.gates.iter() {
            if gate.name.trim().is_empty() {
                return Err(anyhow!("gate names must not be empty"));
            }
            if gate.command.trim().is_empty() {
                return Err(anyhow!("gate '{}' has an empty command", gate.name));
            }
        }
        Ok(())
    }

    fn apply_file(&mut self, file: FileConfig) {
        self.loop_cfg = file.loop_cfg;
        self.agent = file.agent;
        self.submit = file.submit;
        if let Some(limit) = file.gate_output_limit_bytes {
            self.gate_output_limit_bytes = limit;
        }
        self.gates = GateSet::new(file.gates);
    }

    fn apply_env(&mut self, vars: &BTreeMap<String, String>) -> Result<()> {
        if let Some(bin) = non_empty(vars, "BT_CODEX_BIN") {
            self.agent.bin = bin.to_string();
        }
        if let Some(hook) = non_empty(vars, "BT_NOTIFY_HOOK") {
            self.notify_hook = Some(hook.to_string());
        }
        if let Some(raw) = non_empty(vars, "BT_LOOP_MAX_ITERATIONS") {
            self.loop_cfg.max_iterations = raw.parse().map_err(|_| {
                UsageError(format!(
                    "BT_LOOP_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(raw) = non_empty(vars, "BT_TRACKED_PATHS") {
            self.submit.tracked_paths = raw
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(base) = non_empty(vars, "BT_PR_BASE") {
            self.submit.base = Some(base.to_string());
        }

        for (name, command) in env_gates(vars) {
            if command.trim().is_empty() {
                debug!(gate = %name, "env gate is empty, removing");
                self.gates.remove(&name);
            } else {
                self.gates.set(name, command);
            }
        }
        Ok(())
    }
}

/// Load configuration for the project at `root` from disk and the process environment.
pub fn load_config(root: &Path) -> Result<BtConfig> {
    let process_env: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| key.starts_with("BT_"))
        .collect();
    load_config_with_env(root, &process_env)
}

/// Like [`load_config`], with the process environment supplied by the caller.
pub fn load_config_with_env(root: &Path, process_env: &[(String, String)]) -> Result<BtConfig> {
    let mut vars = read_env_file(&root.join(ENV_FILE))?;
    for (key, value) in process_env {
        if key.starts_with("BT_") {
            vars.insert(key.clone(), value.clone());
        }
    }

    let mut cfg = BtConfig::default();
    if let Some(dir) = non_empty(&vars, "BT_SPECS_DIR") {
        cfg.specs_dir = dir.to_string();
    }
    if let Some(dir) = non_empty(&vars, "BT_STATE_DIR") {
        cfg.state_dir = dir.to_string();
    }

    let config_path = root.join(&cfg.state_dir).join(CONFIG_FILE);
    if let Some(file) = load_file_config(&config_path)? {
        cfg.apply_file(file);
    }
    cfg.apply_env(&vars)?;
    cfg.validate()?;
    debug!(gates = ?cfg.gates.names(), specs_dir = %cfg.specs_dir, "config loaded");
    Ok(cfg)
}

/// Load `config.toml`. `None` if the file is missing.
pub fn load_file_config(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: FileConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(cfg))
}

/// Parse a dotenv-style file into a map. Missing file yields an empty map.
pub fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let iter = dotenvy::from_path_iter(path).with_context(|| format!("read {}", path.display()))?;
    for item in iter {
        let (key, value) = item.with_context(|| format!("parse {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// `BT_GATE_<NAME>` entries as `(name, command)`, in gate order.
fn env_gates(vars: &BTreeMap<String, String>) -> Vec<(String, String)> {
    let mut gates: Vec<(String, String)> = vars
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(GATE_PREFIX)?.to_ascii_lowercase();
            if name.is_empty() {
                warn!(key = %key, "ignoring gate variable without a name");
                return None;
            }
            Some((name, value.clone()))
        })
        .collect();
    gates.sort_by(|(a, _), (b, _)| gate_rank(a).cmp(&gate_rank(b)).then_with(|| a.cmp(b)));
    gates
}

fn gate_rank(name: &str) -> usize {
    GATE_PRIORITY
        .iter()
        .position(|p| *p == name)
        .unwrap_or(GATE_PRIORITY.len())
}

fn non_empty<'a>(vars: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::exit_code_for;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn empty_project_loads_defaults_with_no_gates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config_with_env(temp.path(), &[]).expect("load");
        assert_eq!(cfg, BtConfig::default());
        assert!(cfg.gates.is_empty());
    }

    #[test]
    fn env_file_gates_are_ordered_lint_typecheck_test_then_alphabetical() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join(ENV_FILE),
            "BT_GATE_ZEBRA=true\nBT_GATE_TEST='cargo test'\nBT_GATE_AUDIT=\"cargo audit\"\nBT_GATE_LINT='cargo clippy'\n",
        )
        .expect("write env");
        let cfg = load_config_with_env(temp.path(), &[]).expect("load");
        assert_eq!(cfg.gates.names(), vec!["lint", "test", "audit", "zebra"]);
    }

    #[test]
    fn process_env_overrides_env_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join(ENV_FILE),
            "BT_SPECS_DIR=specs\nBT_GATE_LINT='make lint'\nBT_CODEX_BIN=codex\n",
        )
        .expect("write env");
        let cfg = load_config_with_env(
            temp.path(),
            &env(&[
                ("BT_SPECS_DIR", "specz"),
                ("BT_GATE_LINT", ""),
                ("BT_CODEX_BIN", "/opt/stub"),
                ("HOME", "/ignored"),
            ]),
        )
        .expect("load");
        assert_eq!(cfg.specs_dir, "specz");
        assert_eq!(cfg.agent.bin, "/opt/stub");
        assert!(cfg.gates.is_empty());
    }

    #[test]
    fn toml_layer_is_read_from_state_dir_and_env_gate_replaces_in_place() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = temp.path().join(".bt");
        fs::create_dir_all(&state).expect("mkdir");
        fs::write(
            state.join(CONFIG_FILE),
            "[loop]\nmax_iterations = 5\ngate_after_fix = false\n\n[[gates]]\nname = \"test\"\ncommand = \"make test\"\n\n[[gates]]\nname = \"lint\"\ncommand = \"make lint\"\n",
        )
        .expect("write toml");
        let cfg = load_config_with_env(temp.path(), &env(&[("BT_GATE_LINT", "eslint .")]))
            .expect("load");
        assert_eq!(cfg.loop_cfg.max_iterations, 5);
        assert!(!cfg.loop_cfg.gate_after_fix);
        assert_eq!(cfg.gates.names(), vec!["test", "lint"]);
        let lint = cfg.gates.iter().find(|g| g.name == "lint").expect("lint");
        assert_eq!(lint.command, "eslint .");
    }

    #[test]
    fn invalid_max_iterations_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        for raw in ["0", "x", "-3"] {
            let err =
                load_config_with_env(temp.path(), &env(&[("BT_LOOP_MAX_ITERATIONS", raw)]))
                    .unwrap_err();
            assert!(err.to_string().to_lowercase().contains("max_iterations"));
            assert_eq!(exit_code_for(&err), crate::exit_codes::USAGE, "{raw}");
        }

        let state = temp.path().join(".bt");
        fs::create_dir_all(&state).expect("mkdir");
        fs::write(state.join(CONFIG_FILE), "[loop]\nmax_iterations = 0\n").expect("write");
        let err = load_config_with_env(temp.path(), &[]).unwrap_err();
        assert_eq!(exit_code_for(&err), crate::exit_codes::USAGE);
    }

    #[test]
    fn tracked_paths_split_on_commas_and_spaces() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg =
            load_config_with_env(temp.path(), &env(&[("BT_TRACKED_PATHS", "src, app lib")]))
                .expect("load");
        assert_eq!(cfg.submit.tracked_paths, vec!["src", "app", "lib"]);
    }
}
