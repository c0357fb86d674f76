//! Fetch cache for remote hook sources
//!
//! Each `(uri, rev)` pair is checked out once into its own directory under
//! the cache root. Revisions are immutable, so an existing checkout is
//! reused as-is and never refreshed.

use crate::error::ResolutionError;
use anyhow::{Context, Result, anyhow};
use git2::{FetchOptions, Oid, RemoteCallbacks, Repository, build::CheckoutBuilder};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Marker written once a checkout is complete
const READY_MARKER: &str = ".hookguard-ready";

/// Granularity at which a retry backoff notices cancellation
const BACKOFF_SLICE: Duration = Duration::from_millis(50);

type CacheKey = (String, String);

pub struct RemoteCache {
    cache_dir: PathBuf,
    retries: u32,
    fetched: Mutex<HashMap<CacheKey, Result<PathBuf, ResolutionError>>>,
    fetch_count: AtomicUsize,
    cancel: CancellationToken,
}

impl RemoteCache {
    pub fn new(cache_dir: PathBuf, retries: u32) -> Self {
        Self {
            cache_dir,
            retries,
            fetched: Mutex::new(HashMap::new()),
            fetch_count: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight fetches and pending retries when `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// `$XDG_CACHE_HOME/hookguard`, or a temp directory fallback
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("hookguard")
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Number of network fetches performed by this cache instance
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Checkout directory for `uri@rev`, fetching it at most once per run
    pub fn checkout(&self, uri: &str, rev: &str) -> Result<PathBuf, ResolutionError> {
        let key = (uri.to_string(), rev.to_string());
        let mut fetched = self
            .fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(result) = fetched.get(&key) {
            tracing::trace!("Cache hit for {}@{}", uri, rev);
            return result.clone();
        }

        let result = self.ensure_checkout(uri, rev).map_err(|e| ResolutionError::Fetch {
            uri: uri.to_string(),
            rev: rev.to_string(),
            reason: format!("{e:#}"),
        });
        if !self.cancel.is_cancelled() {
            fetched.insert(key, result.clone());
        }
        result
    }

    fn ensure_checkout(&self, uri: &str, rev: &str) -> Result<PathBuf> {
        let dest = self.cache_dir.join(cache_key_dir(uri, rev));
        if dest.join(READY_MARKER).is_file() {
            tracing::debug!("Reusing cached checkout {}", dest.display());
            return Ok(dest);
        }

        let mut attempt = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(anyhow!("Fetch cancelled"));
            }
            match self.fetch_into(uri, rev, &dest) {
                Ok(()) => return Ok(dest),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Fetch of {}@{} failed (attempt {}/{}): {:#}",
                        uri,
                        rev,
                        attempt,
                        self.retries + 1,
                        e
                    );
                    self.backoff(Duration::from_millis(500 * u64::from(attempt)));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sleep for `delay`, returning early once cancelled
    fn backoff(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.cancel.is_cancelled() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            std::thread::sleep(left.min(BACKOFF_SLICE));
        }
    }

    fn fetch_into(&self, uri: &str, rev: &str, dest: &Path) -> Result<()> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Fetching {}@{}", uri, rev);

        if dest.exists() {
            std::fs::remove_dir_all(dest)
                .with_context(|| format!("Failed to clear stale checkout {}", dest.display()))?;
        }
        std::fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let repo = Repository::init(dest).context("Failed to initialise checkout")?;
        let mut remote = repo.remote_anonymous(uri)?;
        let mut callbacks = RemoteCallbacks::new();
        let cancel = self.cancel.clone();
        // Returning false from the progress callback aborts the transfer
        callbacks.transfer_progress(move |_| !cancel.is_cancelled());
        let mut opts = FetchOptions::new();
        opts.remote_callbacks(callbacks);
        opts.download_tags(git2::AutotagOption::All);
        remote
            .fetch(
                &[
                    "+refs/tags/*:refs/tags/*",
                    "+refs/heads/*:refs/remotes/origin/*",
                ],
                Some(&mut opts),
                None,
            )
            .with_context(|| format!("Failed to fetch from '{uri}'"))?;

        let commit = match repo.revparse_single(rev) {
            Ok(object) => object.peel_to_commit()?,
            Err(_) => {
                // A full SHA not reachable from any advertised ref
                let oid = Oid::from_str(rev)
                    .map_err(|_| anyhow!("Could not find version '{rev}' in repository"))?;
                repo.find_commit(oid)
                    .map_err(|_| anyhow!("Could not find version '{rev}' in repository"))?
            }
        };

        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
        repo.set_head_detached(commit.id())?;
        std::fs::write(dest.join(READY_MARKER), commit.id().to_string())?;

        tracing::info!("Checked out {}@{} ({})", uri, rev, &commit.id().to_string()[..8]);
        Ok(())
    }

    /// Remove every cached checkout
    pub fn clean(&self) -> Result<()> {
        if self.cache_dir.exists() {
            std::fs::remove_dir_all(&self.cache_dir)
                .with_context(|| format!("Failed to remove {}", self.cache_dir.display()))?;
        }
        Ok(())
    }
}

/// Directory name for a `(uri, rev)` pair
///
/// The readable part is lossy, so a digest of the exact URI keeps distinct
/// sources apart.
fn cache_key_dir(uri: &str, rev: &str) -> String {
    let sanitize = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect()
    };
    let digest = format!("{:x}", Sha256::digest(uri.as_bytes()));
    format!(
        "{}-{}@{}",
        sanitize(uri.trim_end_matches(".git")),
        &digest[..12],
        sanitize(rev)
    )
}
