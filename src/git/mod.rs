//! Git integration layer for hookguard
//!
//! Repository discovery, the working-tree snapshot (staged or tracked
//! paths), branch lookup and installation of the git hook script.

pub mod remote;

use anyhow::{Context, Result};
use git2::{Repository, Status, StatusOptions};
use std::path::{Path, PathBuf};

/// Git operations handler
pub struct GitOperations {
    repo: Repository,
}

impl GitOperations {
    /// Open the repository containing `path`
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::discover(path.as_ref()).context("No Git repository found")?;

        Ok(Self { repo })
    }

    /// Working directory root
    pub fn root(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .context("Bare repositories are not supported")
    }

    /// The current branch name, or `None` on a detached or unborn HEAD
    pub fn current_branch(&self) -> Option<String> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => head.shorthand().map(str::to_string),
            Ok(_) => None,
            // Unborn branch: read the symbolic target of HEAD directly
            Err(_) => self
                .repo
                .find_reference("HEAD")
                .ok()
                .and_then(|r| r.symbolic_target().map(str::to_string))
                .map(|target| target.trim_start_matches("refs/heads/").to_string()),
        }
    }

    /// Paths staged for commit (added, modified, renamed), repo-relative.
    /// Deletions are dropped since there is nothing left to check.
    pub fn staged_files(&self) -> Result<Vec<String>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .context("Failed to get repository status")?;

        let staged = Status::INDEX_NEW
            | Status::INDEX_MODIFIED
            | Status::INDEX_RENAMED
            | Status::INDEX_TYPECHANGE;

        let mut files: Vec<String> = statuses
            .iter()
            .filter(|entry| entry.status().intersects(staged))
            .filter_map(|entry| {
                entry
                    .head_to_index()
                    .and_then(|delta| delta.new_file().path().map(Path::to_path_buf))
                    .or_else(|| entry.path().map(PathBuf::from))
            })
            .map(|path| path.to_string_lossy().replace('\\', "/"))
            .collect();

        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Every path in the index
    pub fn tracked_files(&self) -> Result<Vec<String>> {
        let index = self.repo.index().context("Failed to read git index")?;
        let mut files: Vec<String> = index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Path of a hook script inside `.git/hooks`
    pub fn hook_path(&self, hook_name: &str) -> PathBuf {
        self.repo.path().join("hooks").join(hook_name)
    }

    /// Install a git hook
    pub fn install_hook(&self, hook_name: &str, hook_content: &str) -> Result<()> {
        let hook_path = self.hook_path(hook_name);
        let hooks_dir = hook_path
            .parent()
            .context("Hook path has no parent directory")?;

        std::fs::create_dir_all(hooks_dir).context("Failed to create hooks directory")?;
        std::fs::write(&hook_path, hook_content).context("Failed to write hook file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&hook_path)
                .context("Failed to get hook file metadata")?
                .permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&hook_path, perms)
                .context("Failed to set hook file permissions")?;
        }

        Ok(())
    }

    /// Remove a git hook
    pub fn remove_hook(&self, hook_name: &str) -> Result<()> {
        let hook_path = self.hook_path(hook_name);

        if hook_path.exists() {
            std::fs::remove_file(&hook_path).context("Failed to remove hook file")?;
        }

        Ok(())
    }

    /// Contents of an installed hook, if any
    pub fn read_hook(&self, hook_name: &str) -> Option<String> {
        std::fs::read_to_string(self.hook_path(hook_name)).ok()
    }
}
