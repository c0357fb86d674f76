//! Error taxonomy for a hook run
//!
//! Configuration and aggregation errors abort the whole run. Resolution and
//! execution errors are captured per hook and only surface in the report.

use thiserror::Error;

/// Malformed or incomplete configuration. Fatal: nothing executes.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Load(String),

    #[error("repos[{index}]: missing required field `repo`")]
    MissingRepo { index: usize },

    #[error("repos[{index}] ({repo}): missing required field `rev`")]
    MissingRev { index: usize, repo: String },

    #[error("repos[{index}] ({repo}): revision '{rev}' is not immutable (use a tag or commit SHA)")]
    MutableRev {
        index: usize,
        repo: String,
        rev: String,
    },

    #[error("repos[{index}].hooks[{hook}]: missing required field `id`")]
    MissingId { index: usize, hook: usize },

    #[error("Duplicate hook id '{0}'")]
    DuplicateId(String),

    #[error("Hook '{id}': local hooks require an `entry`")]
    MissingEntry { id: String },

    #[error("Hook '{id}': invalid glob '{pattern}': {reason}")]
    InvalidGlob {
        id: String,
        pattern: String,
        reason: String,
    },

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A hook could not be bound to something runnable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unknown builtin hook '{0}'")]
    UnknownBuiltin(String),

    #[error("Invalid arguments for '{id}': {reason}")]
    InvalidArgs { id: String, reason: String },

    #[error("Executable '{program}' not found for hook '{id}'")]
    ProgramNotFound { id: String, program: String },

    #[error("Failed to fetch {uri}@{rev}: {reason}")]
    Fetch {
        uri: String,
        rev: String,
        reason: String,
    },

    #[error("Hook '{id}' is not published by {uri}@{rev}")]
    NotInManifest { id: String, uri: String, rev: String },

    #[error("Hook '{id}' has an empty entry")]
    EmptyEntry { id: String },

    #[error("Invalid hook manifest in {uri}@{rev}: {reason}")]
    InvalidManifest {
        uri: String,
        rev: String,
        reason: String,
    },

    #[error("Hook '{id}': invalid glob: {reason}")]
    InvalidGlob { id: String, reason: String },
}

/// A resolved hook failed while running.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Builtin task aborted: {0}")]
    Join(String),
}

/// Internal inconsistency while folding results. Should not happen.
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("Result for hook index {0} reported twice")]
    DuplicateResult(usize),

    #[error("Result index {index} out of range for {total} hooks")]
    OutOfRange { index: usize, total: usize },

    #[error("No result reported for hook index {0}")]
    Missing(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::MissingRepo { index: 2 };
        assert_eq!(err.to_string(), "repos[2]: missing required field `repo`");

        let err = ResolutionError::UnknownBuiltin("nope".into());
        assert_eq!(err.to_string(), "Unknown builtin hook 'nope'");
    }

    #[test]
    fn test_mutable_rev_mentions_revision() {
        let err = ConfigError::MutableRev {
            index: 0,
            repo: "https://example.com/hooks".into(),
            rev: "main".into(),
        };
        assert!(err.to_string().contains("'main'"));
    }
}
