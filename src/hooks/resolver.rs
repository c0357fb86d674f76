//! Binding declared hooks to something runnable

use super::builtin::{BuiltinRegistry, Check};
use super::manifest::{ManifestHook, load_manifest};
use crate::config::{HookSource, HookSpec, SourceKind};
use crate::error::ResolutionError;
use crate::files::FileFilter;
use crate::git::remote::RemoteCache;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// What running a hook means
#[derive(Debug, Clone)]
pub enum HookAction {
    Builtin(Arc<dyn Check>),
    Command(CommandSpec),
}

/// A shell command line; `args` and then the FileSet are appended.
///
/// They become `"$@"` at the end of `entry`, so in a compound entry such as
/// `a && b` only the last command receives them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub entry: String,
    pub args: Vec<String>,
    pub pass_filenames: bool,
}

/// A hook ready to execute
#[derive(Debug, Clone)]
pub struct ResolvedHook {
    /// Position in the run, in declaration order
    pub index: usize,
    pub id: String,
    pub name: String,
    pub source: SourceKind,
    pub filter: FileFilter,
    pub timeout: Duration,
    pub always_run: bool,
    pub action: HookAction,
}

/// Outcome of resolving one declared hook
#[derive(Debug, Clone)]
pub enum Plan {
    Ready(ResolvedHook),
    Unresolved {
        index: usize,
        id: String,
        name: String,
        error: ResolutionError,
    },
}

impl Plan {
    pub fn index(&self) -> usize {
        match self {
            Plan::Ready(hook) => hook.index,
            Plan::Unresolved { index, .. } => *index,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Plan::Ready(hook) => &hook.id,
            Plan::Unresolved { id, .. } => id,
        }
    }
}

/// Enabled hooks (or just `only`) in declaration order; a hook's position
/// here is its run index
pub fn selected_hooks<'s>(
    sources: &'s [HookSource],
    only: Option<&'s str>,
) -> impl Iterator<Item = &'s HookSpec> {
    sources
        .iter()
        .flat_map(|source| &source.hooks)
        .filter(move |spec| {
            if !spec.enabled {
                tracing::debug!("Hook '{}' is disabled", spec.id);
            }
            spec.enabled && only.is_none_or(|id| id == spec.id)
        })
}

pub struct Resolver<'a> {
    builtins: &'a BuiltinRegistry,
    cache: &'a RemoteCache,
    root: &'a Path,
    global_exclude: &'a [String],
    default_timeout: Duration,
}

impl<'a> Resolver<'a> {
    pub fn new(
        builtins: &'a BuiltinRegistry,
        cache: &'a RemoteCache,
        root: &'a Path,
        global_exclude: &'a [String],
        default_timeout: Duration,
    ) -> Self {
        Self {
            builtins,
            cache,
            root,
            global_exclude,
            default_timeout,
        }
    }

    /// Resolve every enabled hook (or just `only`) in declaration order.
    /// Failures are kept per hook so the rest of the run can continue.
    pub fn resolve_all(&self, sources: &[HookSource], only: Option<&str>) -> Vec<Plan> {
        selected_hooks(sources, only)
            .enumerate()
            .map(|(index, spec)| match self.resolve(index, spec) {
                Ok(hook) => Plan::Ready(hook),
                Err(error) => {
                    tracing::warn!("Could not resolve hook '{}': {}", spec.id, error);
                    Plan::Unresolved {
                        index,
                        id: spec.id.clone(),
                        name: spec.display_name().to_string(),
                        error,
                    }
                }
            })
            .collect()
    }

    pub fn resolve(&self, index: usize, spec: &HookSpec) -> Result<ResolvedHook, ResolutionError> {
        tracing::trace!("Resolving '{}' from {}", spec.id, spec.source);
        match &spec.source {
            SourceKind::Builtin => self.resolve_builtin(index, spec),
            SourceKind::Local => self.resolve_local(index, spec),
            SourceKind::Remote { uri, rev } => self.resolve_remote(index, spec, uri, rev),
        }
    }

    fn resolve_builtin(&self, index: usize, spec: &HookSpec) -> Result<ResolvedHook, ResolutionError> {
        let check = self
            .builtins
            .build(&spec.id, &spec.args)
            .ok_or_else(|| ResolutionError::UnknownBuiltin(spec.id.clone()))?
            .map_err(|reason| ResolutionError::InvalidArgs {
                id: spec.id.clone(),
                reason,
            })?;

        let files = if spec.files.is_empty() {
            check.default_files().iter().map(|s| s.to_string()).collect()
        } else {
            spec.files.clone()
        };

        Ok(ResolvedHook {
            index,
            id: spec.id.clone(),
            name: spec.display_name().to_string(),
            source: spec.source.clone(),
            filter: self.filter(&spec.id, &files, &spec.exclude)?,
            timeout: spec.timeout.unwrap_or(self.default_timeout),
            always_run: spec.always_run.unwrap_or_else(|| check.always_run()),
            action: HookAction::Builtin(check),
        })
    }

    fn resolve_local(&self, index: usize, spec: &HookSpec) -> Result<ResolvedHook, ResolutionError> {
        let entry = spec.entry.as_deref().unwrap_or_default();
        let entry = self.locate(&spec.id, entry, None)?;

        Ok(ResolvedHook {
            index,
            id: spec.id.clone(),
            name: spec.display_name().to_string(),
            source: spec.source.clone(),
            filter: self.filter(&spec.id, &spec.files, &spec.exclude)?,
            timeout: spec.timeout.unwrap_or(self.default_timeout),
            always_run: spec.always_run.unwrap_or(false),
            action: HookAction::Command(CommandSpec {
                entry,
                args: spec.args.clone(),
                pass_filenames: spec.pass_filenames.unwrap_or(true),
            }),
        })
    }

    fn resolve_remote(
        &self,
        index: usize,
        spec: &HookSpec,
        uri: &str,
        rev: &str,
    ) -> Result<ResolvedHook, ResolutionError> {
        let checkout = self.cache.checkout(uri, rev)?;
        let published = load_manifest(&checkout).map_err(|reason| ResolutionError::InvalidManifest {
            uri: uri.to_string(),
            rev: rev.to_string(),
            reason,
        })?;
        let manifest = published
            .into_iter()
            .find(|hook| hook.id == spec.id)
            .ok_or_else(|| ResolutionError::NotInManifest {
                id: spec.id.clone(),
                uri: uri.to_string(),
                rev: rev.to_string(),
            })?;

        let merged = merge_with_manifest(spec, manifest);
        let entry = self.locate(&spec.id, &merged.entry, Some(&checkout))?;

        Ok(ResolvedHook {
            index,
            id: spec.id.clone(),
            name: merged.name.unwrap_or_else(|| spec.id.clone()),
            source: spec.source.clone(),
            filter: self.filter(&spec.id, &merged.files, &merged.exclude)?,
            timeout: spec.timeout.unwrap_or(self.default_timeout),
            always_run: merged.always_run,
            action: HookAction::Command(CommandSpec {
                entry,
                args: merged.args,
                pass_filenames: merged.pass_filenames,
            }),
        })
    }

    fn filter(&self, id: &str, files: &[String], exclude: &[String]) -> Result<FileFilter, ResolutionError> {
        FileFilter::new(files, exclude, self.global_exclude).map_err(|e| ResolutionError::InvalidGlob {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Check that the entry's program exists and return the command line to run.
    ///
    /// Relative paths are looked up in `checkout` first (scripts shipped by a
    /// hook repository), then in the repository root; bare names on `PATH`.
    fn locate(&self, id: &str, entry: &str, checkout: Option<&Path>) -> Result<String, ResolutionError> {
        let entry = entry.trim();
        let (program, rest) = match entry.split_once(char::is_whitespace) {
            Some((program, rest)) => (program, rest.trim_start()),
            None => (entry, ""),
        };
        if program.is_empty() {
            return Err(ResolutionError::EmptyEntry { id: id.to_string() });
        }

        let not_found = || ResolutionError::ProgramNotFound {
            id: id.to_string(),
            program: program.to_string(),
        };

        let program = if program.contains('/') {
            let candidate = Path::new(program);
            let found = if candidate.is_absolute() {
                candidate.is_file().then(|| candidate.to_path_buf())
            } else {
                checkout
                    .map(|dir| dir.join(candidate))
                    .filter(|path| path.is_file())
                    .or_else(|| Some(self.root.join(candidate)).filter(|path| path.is_file()))
            };
            shell_quote(&found.ok_or_else(not_found)?.to_string_lossy())
        } else {
            which::which(program).map_err(|_| not_found())?;
            program.to_string()
        };

        Ok(if rest.is_empty() {
            program
        } else {
            format!("{program} {rest}")
        })
    }
}

fn merge_with_manifest(spec: &HookSpec, manifest: ManifestHook) -> ManifestHook {
    let pick = |ours: &Vec<String>, theirs: Vec<String>| {
        if ours.is_empty() { theirs } else { ours.clone() }
    };
    ManifestHook {
        id: manifest.id,
        name: spec.name.clone().or(manifest.name),
        entry: spec.entry.clone().unwrap_or(manifest.entry),
        args: pick(&spec.args, manifest.args),
        files: pick(&spec.files, manifest.files),
        exclude: pick(&spec.exclude, manifest.exclude),
        pass_filenames: spec.pass_filenames.unwrap_or(manifest.pass_filenames),
        always_run: spec.always_run.unwrap_or(manifest.always_run),
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
