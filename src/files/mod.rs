//! File selection
//!
//! A [`Snapshot`] is the candidate set of paths for one run (staged files,
//! every tracked file, or an explicit list). A [`FileFilter`] narrows it down
//! to the [`FileSet`] a single hook runs against.

use crate::git::GitOperations;
use crate::shared::glob::{RankedGlob, best_match, build_globset, build_ranked};
use anyhow::Result;
use globset::GlobSet;
use std::path::Path;

/// Which paths a run considers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Files staged for commit
    Staged,
    /// Every tracked file
    AllFiles,
    /// Paths given on the command line
    Explicit(Vec<String>),
}

/// Candidate paths for one run, repo-relative with forward slashes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    paths: Vec<String>,
}

impl Snapshot {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut paths: Vec<String> = paths
            .into_iter()
            .map(|p| normalize_path(&p.into()))
            .filter(|p| !p.is_empty())
            .collect();
        paths.sort();
        paths.dedup();
        Self { paths }
    }

    /// Collect the snapshot for `source`, dropping paths missing on disk
    pub fn collect(git: &GitOperations, root: &Path, source: &SnapshotSource) -> Result<Self> {
        let paths = match source {
            SnapshotSource::Staged => git.staged_files()?,
            SnapshotSource::AllFiles => git.tracked_files()?,
            SnapshotSource::Explicit(paths) => paths.clone(),
        };

        let snapshot = Self::from_paths(paths.into_iter().filter(|p| root.join(p).is_file()));
        tracing::debug!("Snapshot ({:?}): {} files", source, snapshot.len());
        Ok(snapshot)
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Ordered paths a single hook runs against
pub type FileSet = Vec<String>;

/// Include/exclude policy for one hook.
///
/// A path is selected when it matches an include pattern (no include
/// patterns means everything, at specificity 0) and no exclude pattern at
/// least as specific as the best include match applies. Global excludes
/// always win.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: Vec<RankedGlob>,
    exclude: Vec<RankedGlob>,
    global_exclude: Option<GlobSet>,
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String], global_exclude: &[String]) -> Result<Self> {
        let global_exclude = if global_exclude.is_empty() {
            None
        } else {
            Some(build_globset(global_exclude)?)
        };
        Ok(Self {
            include: build_ranked(include)?,
            exclude: build_ranked(exclude)?,
            global_exclude,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.global_exclude.as_ref().is_some_and(|set| set.is_match(path)) {
            return false;
        }

        let included = if self.include.is_empty() {
            Some(0)
        } else {
            best_match(&self.include, path)
        };

        match (included, best_match(&self.exclude, path)) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(inc), Some(exc)) => inc > exc,
        }
    }

    /// The hook's FileSet, in snapshot order
    pub fn select(&self, snapshot: &Snapshot) -> FileSet {
        snapshot
            .paths()
            .iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect()
    }
}

fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/").trim_start_matches("./").to_string()
}
