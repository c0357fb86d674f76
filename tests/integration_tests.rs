//! Integration tests for the hookguard CLI

use assert_cmd::Command;
use git2::Repository;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Initialise a repository in `dir` and stage `files`
fn repo_with(dir: &Path, files: &[(&str, &str)]) -> Repository {
    let repo = Repository::init(dir).unwrap();
    let mut index = repo.index().unwrap();
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        index.add_path(Path::new(name)).unwrap();
    }
    index.write().unwrap();
    repo
}

fn hookguard(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hookguard").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env("HOOKGUARD_FETCH_RETRIES", "0");
    cmd
}

const LINE_LENGTH_CONFIG: &str = r#"
repos:
  - repo: builtin
    hooks:
      - id: max-line-length
        args: ["--max-line-length=100"]
        files: ["*.py"]
"#;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("hookguard").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "runs the checks declared in .hookguard.yaml",
        ))
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_short_help() {
    let mut cmd = Command::cargo_bin("hookguard").unwrap();
    cmd.arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Declarative pre-commit hook runner"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("hookguard").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hookguard"));
}

#[test]
fn test_invalid_subcommand() {
    let mut cmd = Command::cargo_bin("hookguard").unwrap();
    cmd.arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_long_line_fails_with_exit_one() {
    let dir = TempDir::new().unwrap();
    let long = "x".repeat(120);
    repo_with(
        dir.path(),
        &[
            (".hookguard.yaml", LINE_LENGTH_CONFIG),
            ("app.py", &format!("{long}\n")),
        ],
    );

    hookguard(&dir)
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("app.py:1"))
        .stdout(predicate::str::contains("1 of 1 hooks failed"));
}

#[test]
fn test_default_command_is_run() {
    let dir = TempDir::new().unwrap();
    repo_with(
        dir.path(),
        &[
            (".hookguard.yaml", LINE_LENGTH_CONFIG),
            ("app.py", "print('ok')\n"),
        ],
    );

    hookguard(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Passed"));
}

#[test]
fn test_zero_hooks_succeeds() {
    let dir = TempDir::new().unwrap();
    repo_with(dir.path(), &[(".hookguard.yaml", "repos: []\n")]);

    hookguard(&dir).arg("run").assert().code(0);
}

#[test]
fn test_missing_repo_is_config_error() {
    let dir = TempDir::new().unwrap();
    repo_with(
        dir.path(),
        &[(
            ".hookguard.yaml",
            "repos:\n  - rev: v1.0.0\n    hooks:\n      - id: lint\n",
        )],
    );

    hookguard(&dir)
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing required field `repo`"));
}

#[test]
fn test_mutable_revision_is_rejected() {
    let dir = TempDir::new().unwrap();
    repo_with(
        dir.path(),
        &[(
            ".hookguard.yaml",
            "repos:\n  - repo: https://example.com/hooks.git\n    rev: main\n    hooks:\n      - id: lint\n",
        )],
    );

    hookguard(&dir)
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not immutable"));
}

#[test]
fn test_json_report() {
    let dir = TempDir::new().unwrap();
    repo_with(
        dir.path(),
        &[
            (".hookguard.yaml", LINE_LENGTH_CONFIG),
            ("notes.txt", "no python here\n"),
        ],
    );

    let output = hookguard(&dir)
        .args(["run", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "success");
    assert_eq!(report["results"][0]["id"], "max-line-length");
    assert_eq!(report["results"][0]["status"], "skipped");
}

#[test]
fn test_explicit_files_and_single_hook() {
    let dir = TempDir::new().unwrap();
    repo_with(
        dir.path(),
        &[(
            ".hookguard.yaml",
            r#"
repos:
  - repo: builtin
    hooks:
      - id: check-json
      - id: trailing-whitespace
"#,
        )],
    );
    fs::write(dir.path().join("broken.json"), "{\"a\": ").unwrap();

    hookguard(&dir)
        .args(["run", "--hook", "check-json", "--files", "broken.json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("broken.json"))
        .stdout(predicate::str::contains("trailing-whitespace").not());
}

#[test]
fn test_local_command_hook() {
    let dir = TempDir::new().unwrap();
    repo_with(
        dir.path(),
        &[
            (
                ".hookguard.yaml",
                r#"
repos:
  - repo: local
    hooks:
      - id: no-todo
        name: forbid TODO
        entry: "sh -c '! grep -Hn TODO \"$@\"' sh"
        files: ["*.rs"]
"#,
            ),
            ("src/lib.rs", "// TODO: remove\n"),
        ],
    );

    hookguard(&dir)
        .args(["run", "--all-files"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("forbid TODO"))
        .stdout(predicate::str::contains("src/lib.rs:1"));
}

#[test]
fn test_list_shows_configured_hooks() {
    let dir = TempDir::new().unwrap();
    repo_with(dir.path(), &[(".hookguard.yaml", LINE_LENGTH_CONFIG)]);

    hookguard(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("builtin"))
        .stdout(predicate::str::contains("max-line-length"));
}

#[test]
fn test_validate_reports_unknown_builtin() {
    let dir = TempDir::new().unwrap();
    repo_with(
        dir.path(),
        &[(
            ".hookguard.yaml",
            "repos:\n  - repo: builtin\n    hooks:\n      - id: not-a-check\n",
        )],
    );

    hookguard(&dir)
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown builtin hook 'not-a-check'"));
}

#[test]
fn test_install_and_uninstall() {
    let dir = TempDir::new().unwrap();
    repo_with(dir.path(), &[(".hookguard.yaml", "repos: []\n")]);
    let hook = dir.path().join(".git/hooks/pre-commit");

    hookguard(&dir).arg("install").assert().success();
    let script = fs::read_to_string(&hook).unwrap();
    assert!(script.contains("hookguard run"));

    hookguard(&dir).arg("uninstall").assert().success();
    assert!(!hook.exists());
}

#[test]
fn test_install_keeps_foreign_hook_without_force() {
    let dir = TempDir::new().unwrap();
    repo_with(dir.path(), &[(".hookguard.yaml", "repos: []\n")]);
    let hook = dir.path().join(".git/hooks/pre-commit");
    fs::create_dir_all(hook.parent().unwrap()).unwrap();
    fs::write(&hook, "#!/bin/sh\necho mine\n").unwrap();

    hookguard(&dir).arg("install").assert().code(1);
    assert_eq!(fs::read_to_string(&hook).unwrap(), "#!/bin/sh\necho mine\n");

    hookguard(&dir).arg("uninstall").assert().success();
    assert!(hook.exists());

    hookguard(&dir).args(["install", "--force"]).assert().success();
    assert!(fs::read_to_string(&hook).unwrap().contains("hookguard run"));
}

#[test]
fn test_clean_removes_cache_dir() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("cache");
    fs::create_dir_all(cache.join("some@v1")).unwrap();

    hookguard(&dir)
        .arg("clean")
        .arg("--cache-dir")
        .arg(&cache)
        .assert()
        .success();
    assert!(!cache.exists());
}
