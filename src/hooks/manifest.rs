//! Hook manifest published by a remote hook repository

use serde::{Deserialize, Serialize};
use std::path::Path;

/// File a hook repository publishes at its root
pub const MANIFEST_FILE: &str = ".hookguard-hooks.yaml";

/// One published hook. Consumer settings override these defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestHook {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    pub entry: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_pass_filenames")]
    pub pass_filenames: bool,

    #[serde(default)]
    pub always_run: bool,
}

fn default_pass_filenames() -> bool {
    true
}

/// Read the manifest of a checked-out hook repository
pub fn load_manifest(checkout: &Path) -> Result<Vec<ManifestHook>, String> {
    let path = checkout.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {MANIFEST_FILE}: {e}"))?;
    serde_yml::from_str(&content).map_err(|e| format!("invalid {MANIFEST_FILE}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_manifest_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"
- id: lint
  name: Lint things
  entry: ./bin/lint --strict
  files: ["*.py"]
- id: fmt
  entry: fmt-check
  pass_filenames: false
"#,
        )
        .unwrap();

        let hooks = load_manifest(dir.path()).unwrap();
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].entry, "./bin/lint --strict");
        assert!(hooks[0].pass_filenames);
        assert!(!hooks[1].pass_filenames);
        assert!(!hooks[1].always_run);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(load_manifest(dir.path()).unwrap_err().contains(MANIFEST_FILE));
    }
}
