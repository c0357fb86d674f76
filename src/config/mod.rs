//! Configuration management for hookguard
//!
//! Configuration is layered with figment. From lowest to highest priority:
//! built-in defaults, the repository config file (`.hookguard.yaml` and
//! friends), an explicit `--config` file, `HOOKGUARD_*` environment
//! variables, and finally command-line overrides.

mod registry;

pub use registry::{HookSource, HookSpec, SourceKind, is_immutable_revision, load_sources};

use crate::error::ConfigError;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file names searched in the repository root, in order
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".hookguard.yaml",
    ".hookguard.yml",
    ".hookguard.toml",
    ".hookguard.json",
];

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "HOOKGUARD_";

/// Main configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookguardConfig {
    /// Maximum hooks running at once (0 = derive from CPU count)
    #[serde(default)]
    pub concurrency: usize,

    /// Default per-hook timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Stop scheduling new hooks after the first failure
    #[serde(default)]
    pub fail_fast: bool,

    /// Extra attempts when fetching a remote hook source
    #[serde(default)]
    pub fetch_retries: u32,

    /// Global exclude globs applied to every hook
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Hook sources in declaration order
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
}

/// One `repos` entry as written in the document.
///
/// Required fields are optional here so that a missing field produces a
/// precise [`ConfigError`] instead of a generic deserialization message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoEntry {
    /// `builtin`, `local`, or a git URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// Pinned revision (required for git URLs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    #[serde(default)]
    pub hooks: Vec<HookEntry>,
}

/// One hook entry inside a repository entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name (defaults to the id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Command line for local hooks, or an override for remote ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Include globs (empty = every file)
    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_filenames: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_run: Option<bool>,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_enabled() -> bool {
    true
}

impl Default for HookguardConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            timeout_secs: default_timeout_secs(),
            fail_fast: false,
            fetch_retries: 0,
            exclude: Vec::new(),
            repos: Vec::new(),
        }
    }
}

/// Values supplied on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,
}

impl HookguardConfig {
    /// Load the layered configuration for a repository rooted at `root`
    pub fn load(
        root: &Path,
        custom_config: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        tracing::trace!("CONFIG LOAD: Starting in {}", root.display());

        let mut figment = Figment::from(Serialized::defaults(HookguardConfig::default()));

        if let Some(path) = Self::find_config_file(root) {
            tracing::debug!("Using repository config {}", path.display());
            figment = Self::merge_file(figment, &path);
        }

        if let Some(path) = custom_config {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            };
            if !path.is_file() {
                return Err(ConfigError::Load(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            tracing::debug!("Using custom config {}", path.display());
            figment = Self::merge_file(figment, &path);
        }

        let figment = figment
            .merge(Env::prefixed(ENV_PREFIX).only(&[
                "concurrency",
                "timeout_secs",
                "fail_fast",
                "fetch_retries",
            ]))
            .merge(Serialized::defaults(overrides));

        let config: HookguardConfig = figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;

        tracing::trace!(
            "CONFIG LOAD: {} repos, concurrency={}, timeout={}s",
            config.repos.len(),
            config.concurrency,
            config.timeout_secs
        );
        Ok(config)
    }

    fn merge_file(figment: Figment, path: &Path) -> Figment {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Yaml::file(path)),
        }
    }

    /// First existing config file in the repository root
    pub fn find_config_file(root: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }

    /// Validate document-level settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs".into(),
                reason: "timeout cannot be 0".into(),
            });
        }
        Ok(())
    }

    /// Default per-hook timeout
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Effective number of concurrent hooks.
    ///
    /// An explicit `concurrency` wins; otherwise 75% of the CPU cores, at least one.
    pub fn worker_count(&self) -> usize {
        if self.concurrency > 0 {
            return self.concurrency;
        }
        std::cmp::max(1, (num_cpus::get() * 75) / 100)
    }
}
