//! Layered configuration for relay.
//!
//! Settings come from `relay.toml` in the working directory (or the file
//! given with `--config`), then environment variables, then CLI flags.
//! Every section is optional.
//!
//! # Configuration File Format
//!
//! ```toml
//! [context]
//! path = "context.json"
//! write = "atomic"        # or "direct"
//! lock = true
//!
//! [logging]
//! level = "warn"
//! format = "text"         # or "json"
//! file = "relay.log"
//!
//! [devnet]
//! monorepo_root = "../.."
//! cross_l2_inbox = "0x4200000000000000000000000000000000000022"
//!
//! [devnet.rpc]
//! L1 = "http://0.0.0.0:8545"
//! L2_A = "http://0.0.0.0:9145"
//!
//! [[commands]]
//! name = "bootstrap"
//! description = "Run the local bootstrap script"
//! run = "./scripts/bootstrap.sh"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::context::{ContextOptions, DEFAULT_CONTEXT_FILE, WriteMode};
use crate::logging::LoggingConfig;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "relay.toml";

/// Environment variable overriding `[context] path`.
pub const CONTEXT_ENV: &str = "RELAY_CONTEXT";

/// `[context]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    #[serde(default = "default_context_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub write: WriteMode,
    #[serde(default = "default_lock")]
    pub lock: bool,
}

fn default_context_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONTEXT_FILE)
}

fn default_lock() -> bool {
    true
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            path: default_context_path(),
            write: WriteMode::default(),
            lock: default_lock(),
        }
    }
}

/// `[devnet]` section: where the local interop devnet lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevnetConfig {
    /// Root of the monorepo that provides `op-node` and the emitter contracts.
    #[serde(default = "default_monorepo_root")]
    pub monorepo_root: PathBuf,
    /// Mnemonic the dev keys are derived from.
    #[serde(default = "default_mnemonic")]
    pub mnemonic: String,
    /// CrossL2Inbox predeploy address.
    #[serde(default = "default_cross_l2_inbox")]
    pub cross_l2_inbox: String,
    /// Chain alias (name or chain id) to RPC URL.
    #[serde(default = "default_rpc")]
    pub rpc: BTreeMap<String, String>,
}

fn default_monorepo_root() -> PathBuf {
    PathBuf::from("../..")
}

fn default_mnemonic() -> String {
    "test test test test test test test test test test test junk".to_string()
}

fn default_cross_l2_inbox() -> String {
    "0x4200000000000000000000000000000000000022".to_string()
}

fn default_rpc() -> BTreeMap<String, String> {
    let l1 = "http://0.0.0.0:8545";
    let l2_a = "http://0.0.0.0:9145";
    let l2_b = "http://0.0.0.0:9245";
    [
        ("L1", l1),
        ("L2_A", l2_a),
        ("900200", l2_a),
        ("L2_B", l2_b),
        ("900201", l2_b),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            monorepo_root: default_monorepo_root(),
            mnemonic: default_mnemonic(),
            cross_l2_inbox: default_cross_l2_inbox(),
            rpc: default_rpc(),
        }
    }
}

/// A `[[commands]]` entry: a script exposed as a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCommandConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Shell snippet to run. Entries without one are listed but cannot run.
    #[serde(default)]
    pub run: Option<String>,
    /// Working directory for the script, relative to the config file.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// The complete relay.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayToml {
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub devnet: DevnetConfig,
    #[serde(default)]
    pub commands: Vec<ScriptCommandConfig>,
}

impl RelayToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("In config file {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse relay.toml")
    }

    /// Load `relay.toml` from `dir`, or defaults if it doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.context.path.as_os_str().is_empty() {
            warnings.push("[context] path is empty".to_string());
        }

        if !["text", "json"].contains(&self.logging.format.as_str()) {
            warnings.push(format!(
                "Invalid logging format '{}': expected 'text' or 'json'",
                self.logging.format
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for cmd in &self.commands {
            if cmd.name.trim().is_empty() {
                warnings.push("[[commands]] entry without a name".to_string());
                continue;
            }
            if !seen.insert(cmd.name.as_str()) {
                warnings.push(format!("Command '{}' is declared more than once", cmd.name));
            }
            if cmd.run.as_deref().is_none_or(|r| r.trim().is_empty()) {
                warnings.push(format!("Command '{}' has no 'run' entry", cmd.name));
            }
        }

        if !self.devnet.rpc.contains_key("L1") {
            warnings.push("[devnet.rpc] has no 'L1' entry".to_string());
        }

        warnings
    }
}

/// CLI-level overrides applied on top of file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub context: Option<PathBuf>,
    pub lock: Option<bool>,
    pub write: Option<WriteMode>,
}

/// Effective configuration for one invocation.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Directory relative paths in the file resolve against.
    pub base_dir: PathBuf,
    pub toml: RelayToml,
    pub context_path: PathBuf,
    pub context_options: ContextOptions,
}

impl RelayConfig {
    /// Resolve config from an explicit file or `relay.toml` in `base_dir`,
    /// then apply `RELAY_CONTEXT` and the CLI overrides.
    pub fn resolve(base_dir: &Path, file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let (toml, base_dir) = match file {
            Some(path) => {
                let toml = RelayToml::load(path)?;
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| base_dir.to_path_buf());
                (toml, dir)
            }
            None => (RelayToml::load_or_default(base_dir)?, base_dir.to_path_buf()),
        };

        Ok(Self::from_toml(toml, base_dir, env_context(), overrides))
    }

    /// Apply overrides to an already loaded file. `env_context` is the value
    /// of `RELAY_CONTEXT`, if set.
    pub fn from_toml(
        toml: RelayToml,
        base_dir: PathBuf,
        env_context: Option<PathBuf>,
        overrides: &Overrides,
    ) -> Self {
        // CLI and env paths are taken as given; file paths are relative to the file.
        let context_path = overrides
            .context
            .clone()
            .or(env_context)
            .unwrap_or_else(|| resolve_relative(&base_dir, &toml.context.path));

        let context_options = ContextOptions {
            write_mode: overrides.write.unwrap_or(toml.context.write),
            lock: overrides.lock.unwrap_or(toml.context.lock),
        };

        Self {
            base_dir,
            toml,
            context_path,
            context_options,
        }
    }

    /// Devnet settings with `monorepo_root` resolved against the config directory.
    pub fn devnet(&self) -> DevnetConfig {
        let mut devnet = self.toml.devnet.clone();
        devnet.monorepo_root = resolve_relative(&self.base_dir, &devnet.monorepo_root);
        devnet
    }
}

fn env_context() -> Option<PathBuf> {
    std::env::var_os(CONTEXT_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
