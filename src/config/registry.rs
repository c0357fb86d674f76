//! Validation of the `repos` section into hook sources and specs

use super::{HookEntry, HookguardConfig, RepoEntry};
use crate::error::ConfigError;
use globset::Glob;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Where a hook's implementation comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Checks compiled into hookguard
    Builtin,
    /// Commands from the current repository or `PATH`
    Local,
    /// A git repository pinned to an immutable revision
    Remote { uri: String, rev: String },
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Builtin => write!(f, "builtin"),
            SourceKind::Local => write!(f, "local"),
            SourceKind::Remote { uri, rev } => write!(f, "{uri}@{rev}"),
        }
    }
}

/// A repository entry with its validated hooks
#[derive(Debug, Clone)]
pub struct HookSource {
    pub kind: SourceKind,
    pub hooks: Vec<HookSpec>,
}

/// A declared hook, validated but not yet resolved
#[derive(Debug, Clone)]
pub struct HookSpec {
    pub id: String,
    pub name: Option<String>,
    pub source: SourceKind,
    pub entry: Option<String>,
    pub args: Vec<String>,
    pub enabled: bool,
    pub files: Vec<String>,
    pub exclude: Vec<String>,
    pub timeout: Option<Duration>,
    pub pass_filenames: Option<bool>,
    pub always_run: Option<bool>,
}

impl HookSpec {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Validate every repository entry, preserving declaration order
pub fn load_sources(config: &HookguardConfig) -> Result<Vec<HookSource>, ConfigError> {
    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(config.repos.len());

    for pattern in &config.exclude {
        check_glob("<global>", pattern)?;
    }

    for (index, repo) in config.repos.iter().enumerate() {
        let kind = source_kind(index, repo)?;
        let mut hooks = Vec::with_capacity(repo.hooks.len());

        for (hook_index, entry) in repo.hooks.iter().enumerate() {
            let spec = hook_spec(index, hook_index, &kind, entry)?;
            if !seen.insert(spec.id.clone()) {
                return Err(ConfigError::DuplicateId(spec.id));
            }
            hooks.push(spec);
        }

        sources.push(HookSource { kind, hooks });
    }

    tracing::debug!(
        "Loaded {} hooks from {} sources",
        sources.iter().map(|s| s.hooks.len()).sum::<usize>(),
        sources.len()
    );
    Ok(sources)
}

fn source_kind(index: usize, repo: &RepoEntry) -> Result<SourceKind, ConfigError> {
    let uri = repo
        .repo
        .as_deref()
        .map(str::trim)
        .filter(|uri| !uri.is_empty())
        .ok_or(ConfigError::MissingRepo { index })?;

    match uri {
        "builtin" => Ok(SourceKind::Builtin),
        "local" => Ok(SourceKind::Local),
        _ => {
            let rev = repo
                .rev
                .as_deref()
                .map(str::trim)
                .filter(|rev| !rev.is_empty())
                .ok_or_else(|| ConfigError::MissingRev {
                    index,
                    repo: uri.to_string(),
                })?;
            if !is_immutable_revision(rev) {
                return Err(ConfigError::MutableRev {
                    index,
                    repo: uri.to_string(),
                    rev: rev.to_string(),
                });
            }
            Ok(SourceKind::Remote {
                uri: uri.to_string(),
                rev: rev.to_string(),
            })
        }
    }
}

fn hook_spec(
    index: usize,
    hook_index: usize,
    kind: &SourceKind,
    entry: &HookEntry,
) -> Result<HookSpec, ConfigError> {
    let id = entry
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ConfigError::MissingId {
            index,
            hook: hook_index,
        })?
        .to_string();

    if *kind == SourceKind::Local && entry.entry.as_deref().is_none_or(|e| e.trim().is_empty()) {
        return Err(ConfigError::MissingEntry { id });
    }

    for pattern in entry.files.iter().chain(&entry.exclude) {
        check_glob(&id, pattern)?;
    }

    let timeout = match entry.timeout_secs {
        Some(0) => {
            return Err(ConfigError::InvalidValue {
                field: format!("{id}.timeout_secs"),
                reason: "timeout cannot be 0".into(),
            });
        }
        other => other.map(Duration::from_secs),
    };

    Ok(HookSpec {
        id,
        name: entry.name.clone(),
        source: kind.clone(),
        entry: entry.entry.clone(),
        args: entry.args.clone(),
        enabled: entry.enabled,
        files: entry.files.clone(),
        exclude: entry.exclude.clone(),
        timeout,
        pass_filenames: entry.pass_filenames,
        always_run: entry.always_run,
    })
}

fn check_glob(id: &str, pattern: &str) -> Result<(), ConfigError> {
    Glob::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidGlob {
            id: id.to_string(),
            pattern: pattern.to_string(),
            reason: e.kind().to_string(),
        })
}

/// Whether a revision names an immutable snapshot (tag or commit SHA).
///
/// Tags look like `v1.2.3` or `1.2.3`; SHAs are 7 to 40 hex characters.
/// Anything else is treated as a mutable branch name.
pub fn is_immutable_revision(rev: &str) -> bool {
    if rev.len() > 1 && rev.starts_with('v') && rev[1..].starts_with(|c: char| c.is_ascii_digit()) {
        return true;
    }

    if (7..=40).contains(&rev.len()) && rev.chars().all(|c| c.is_ascii_hexdigit()) {
        return true;
    }

    rev.starts_with(|c: char| c.is_ascii_digit()) && rev.contains('.')
}
