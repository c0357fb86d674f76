//! Built-in checks
//!
//! The registry is a closed mapping from hook id to a factory. Factories
//! parse the hook's `args` with clap when the configuration is resolved, so
//! bad arguments surface before anything runs.

use crate::error::ExecutionError;
use clap::Parser;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Bytes inspected when deciding whether a file is binary
const BINARY_SNIFF_LEN: usize = 8000;

/// Repository state a check may need
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub root: PathBuf,
    pub branch: Option<String>,
}

/// Findings of one check over its FileSet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    pub findings: Vec<String>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }
}

/// A configured built-in check
pub trait Check: Send + Sync + fmt::Debug {
    fn run(&self, ctx: &CheckContext, files: &[String]) -> Result<CheckOutcome, ExecutionError>;

    /// Run even when the FileSet is empty
    fn always_run(&self) -> bool {
        false
    }

    /// Include globs used when the hook declares no `files`
    fn default_files(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Builds a check from its argument list
pub type CheckFactory = fn(&str, &[String]) -> Result<Arc<dyn Check>, String>;

struct BuiltinEntry {
    description: &'static str,
    factory: CheckFactory,
}

/// Registry of built-in checks keyed by hook id
#[derive(Default)]
pub struct BuiltinRegistry {
    entries: BTreeMap<&'static str, BuiltinEntry>,
}

impl BuiltinRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Every check hookguard ships with
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            "trailing-whitespace",
            "Lines must not end in spaces or tabs",
            |_, _| Ok(Arc::new(TrailingWhitespace)),
        );
        registry.register(
            "end-of-file",
            "Files must end with exactly one newline",
            |_, _| Ok(Arc::new(EndOfFile)),
        );
        registry.register(
            "check-merge-conflict",
            "No merge conflict markers",
            |_, _| Ok(Arc::new(MergeConflict)),
        );
        registry.register("check-json", "JSON files must parse", |_, _| {
            Ok(Arc::new(Syntax::Json))
        });
        registry.register("check-yaml", "YAML files must parse", |_, _| {
            Ok(Arc::new(Syntax::Yaml))
        });
        registry.register("check-toml", "TOML files must parse", |_, _| {
            Ok(Arc::new(Syntax::Toml))
        });
        registry.register("check-xml", "XML files must be well-formed", |_, _| {
            Ok(Arc::new(Syntax::Xml))
        });
        registry.register(
            "max-line-length",
            "Lines must not exceed --max-line-length characters",
            |id, args| Ok(Arc::new(parse_args::<MaxLineLength>(id, args)?)),
        );
        registry.register(
            "check-added-large-files",
            "Files must not exceed --maxkb kilobytes",
            |id, args| Ok(Arc::new(parse_args::<LargeFiles>(id, args)?)),
        );
        registry.register(
            "no-commit-to-branch",
            "Refuse commits to protected branches",
            |id, args| Ok(Arc::new(NoCommitToBranch::from_args(parse_args(id, args)?)?)),
        );
        registry
    }

    pub fn register(&mut self, id: &'static str, description: &'static str, factory: CheckFactory) {
        self.entries.insert(id, BuiltinEntry { description, factory });
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn description(&self, id: &str) -> Option<&'static str> {
        self.entries.get(id).map(|e| e.description)
    }

    /// Ids in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Instantiate `id` with `args`. `None` when the id is unknown.
    pub fn build(&self, id: &str, args: &[String]) -> Option<Result<Arc<dyn Check>, String>> {
        self.entries.get(id).map(|entry| (entry.factory)(id, args))
    }
}

fn parse_args<T: Parser>(id: &str, args: &[String]) -> Result<T, String> {
    T::try_parse_from(std::iter::once(id).chain(args.iter().map(String::as_str))).map_err(|e| {
        e.to_string()
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("invalid arguments")
            .trim_start_matches("error: ")
            .to_string()
    })
}

fn read_file(ctx: &CheckContext, path: &str) -> Result<Vec<u8>, ExecutionError> {
    std::fs::read(ctx.root.join(path)).map_err(|source| ExecutionError::Read {
        path: path.to_string(),
        source,
    })
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

/// Run `check` over the raw bytes of every non-binary file
fn scan_files<F>(ctx: &CheckContext, files: &[String], mut check: F) -> Result<CheckOutcome, ExecutionError>
where
    F: FnMut(&str, &[u8], &mut Vec<String>),
{
    let mut findings = Vec::new();
    for path in files {
        let bytes = read_file(ctx, path)?;
        if is_binary(&bytes) {
            tracing::trace!("Skipping binary file {}", path);
            continue;
        }
        check(path, &bytes, &mut findings);
    }
    Ok(CheckOutcome { findings })
}

/// Run `check` over every text file, decoding invalid UTF-8 lossily
fn scan_text_files<F>(ctx: &CheckContext, files: &[String], mut check: F) -> Result<CheckOutcome, ExecutionError>
where
    F: FnMut(&str, &str, &mut Vec<String>),
{
    scan_files(ctx, files, |path, bytes, findings| {
        check(path, &String::from_utf8_lossy(bytes), findings)
    })
}

/// Like [`scan_text_files`], but a file that is not UTF-8 is itself a finding
fn scan_utf8_files<F>(ctx: &CheckContext, files: &[String], mut check: F) -> Result<CheckOutcome, ExecutionError>
where
    F: FnMut(&str, &str, &mut Vec<String>),
{
    scan_files(ctx, files, |path, bytes, findings| match std::str::from_utf8(bytes) {
        Ok(content) => check(path, content, findings),
        Err(e) => findings.push(format!("{path}: not valid UTF-8 ({e})")),
    })
}

/// Lines without their terminators, numbered from 1
fn numbered_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .enumerate()
        .map(|(i, line)| (i + 1, line))
}

#[derive(Debug)]
struct TrailingWhitespace;

impl Check for TrailingWhitespace {
    fn run(&self, ctx: &CheckContext, files: &[String]) -> Result<CheckOutcome, ExecutionError> {
        scan_text_files(ctx, files, |path, content, findings| {
            for (number, line) in numbered_lines(content) {
                if line.ends_with([' ', '\t']) {
                    findings.push(format!("{path}:{number}: trailing whitespace"));
                }
            }
        })
    }
}

#[derive(Debug)]
struct EndOfFile;

impl Check for EndOfFile {
    fn run(&self, ctx: &CheckContext, files: &[String]) -> Result<CheckOutcome, ExecutionError> {
        scan_text_files(ctx, files, |path, content, findings| {
            if content.is_empty() {
                return;
            }
            if content.trim_end_matches(['\n', '\r']).is_empty() {
                findings.push(format!("{path}: file contains only newlines"));
            } else if !content.ends_with('\n') {
                findings.push(format!("{path}: missing newline at end of file"));
            } else if content.ends_with("\n\n") || content.ends_with("\n\r\n") {
                findings.push(format!("{path}: multiple newlines at end of file"));
            }
        })
    }
}

#[derive(Debug)]
struct MergeConflict;

impl Check for MergeConflict {
    fn run(&self, ctx: &CheckContext, files: &[String]) -> Result<CheckOutcome, ExecutionError> {
        scan_text_files(ctx, files, |path, content, findings| {
            for (number, line) in numbered_lines(content) {
                let marker = line.starts_with("<<<<<<< ")
                    || line.starts_with(">>>>>>> ")
                    || line == "======="
                    || line.starts_with("======= ");
                if marker {
                    findings.push(format!("{path}:{number}: merge conflict marker"));
                }
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Syntax {
    Json,
    Yaml,
    Toml,
    Xml,
}

impl Syntax {
    fn validate(self, content: &str) -> Result<(), String> {
        match self {
            Syntax::Json => serde_json::from_str::<serde_json::Value>(content)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Syntax::Yaml => serde_yml::from_str::<serde_yml::Value>(content)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Syntax::Toml => toml::from_str::<toml::Table>(content)
                .map(|_| ())
                .map_err(|e| e.message().to_string()),
            Syntax::Xml => validate_xml(content),
        }
    }
}

impl Check for Syntax {
    fn run(&self, ctx: &CheckContext, files: &[String]) -> Result<CheckOutcome, ExecutionError> {
        scan_utf8_files(ctx, files, |path, content, findings| {
            if let Err(reason) = self.validate(content) {
                findings.push(format!("{path}: {reason}"));
            }
        })
    }

    fn default_files(&self) -> &'static [&'static str] {
        match self {
            Syntax::Json => &["*.json"],
            Syntax::Yaml => &["*.yaml", "*.yml"],
            Syntax::Toml => &["*.toml"],
            Syntax::Xml => &["*.xml"],
        }
    }
}

fn validate_xml(content: &str) -> Result<(), String> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(content);
    let mut depth: usize = 0;
    let mut roots = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::Empty(_)) if depth == 0 => roots += 1,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }

    match (depth, roots) {
        (0, 1) => Ok(()),
        (0, 0) => Err("no root element".to_string()),
        (0, _) => Err("multiple root elements".to_string()),
        _ => Err("unclosed element at end of document".to_string()),
    }
}

#[derive(Debug, Parser)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct MaxLineLength {
    #[arg(long = "max-line-length", default_value_t = 100)]
    max_line_length: usize,
}

impl Check for MaxLineLength {
    fn run(&self, ctx: &CheckContext, files: &[String]) -> Result<CheckOutcome, ExecutionError> {
        scan_text_files(ctx, files, |path, content, findings| {
            for (number, line) in numbered_lines(content) {
                let length = line.chars().count();
                if length > self.max_line_length {
                    findings.push(format!(
                        "{path}:{number}: line too long ({length} > {} characters)",
                        self.max_line_length
                    ));
                }
            }
        })
    }
}

#[derive(Debug, Parser)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct LargeFiles {
    #[arg(long, default_value_t = 500)]
    maxkb: u64,
}

impl Check for LargeFiles {
    fn run(&self, ctx: &CheckContext, files: &[String]) -> Result<CheckOutcome, ExecutionError> {
        let mut findings = Vec::new();
        for path in files {
            let metadata = std::fs::metadata(ctx.root.join(path)).map_err(|source| {
                ExecutionError::Read {
                    path: path.to_string(),
                    source,
                }
            })?;
            let kb = metadata.len().div_ceil(1024);
            if kb > self.maxkb {
                findings.push(format!("{path}: {kb} KB exceeds {} KB", self.maxkb));
            }
        }
        Ok(CheckOutcome { findings })
    }
}

#[derive(Debug, Parser)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct BranchArgs {
    #[arg(short, long = "branch")]
    branches: Vec<String>,

    #[arg(short, long = "pattern")]
    patterns: Vec<String>,
}

#[derive(Debug)]
struct NoCommitToBranch {
    branches: Vec<String>,
    patterns: Vec<Regex>,
}

impl NoCommitToBranch {
    fn from_args(args: BranchArgs) -> Result<Self, String> {
        let patterns = args
            .patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| format!("invalid pattern '{p}': {e}")))
            .collect::<Result<Vec<_>, _>>()?;

        let branches = if args.branches.is_empty() && patterns.is_empty() {
            vec!["main".to_string(), "master".to_string()]
        } else {
            args.branches
        };

        Ok(Self { branches, patterns })
    }

    fn is_protected(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch) || self.patterns.iter().any(|p| p.is_match(branch))
    }
}

impl Check for NoCommitToBranch {
    fn run(&self, ctx: &CheckContext, _files: &[String]) -> Result<CheckOutcome, ExecutionError> {
        let findings = match ctx.branch.as_deref() {
            Some(branch) if self.is_protected(branch) => {
                vec![format!("Direct commits to protected branch '{branch}' are not allowed")]
            }
            _ => Vec::new(),
        };
        Ok(CheckOutcome { findings })
    }

    fn always_run(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup(files: &[(&str, &str)]) -> (TempDir, CheckContext) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let ctx = CheckContext {
            root: dir.path().to_path_buf(),
            branch: Some("feature/x".into()),
        };
        (dir, ctx)
    }

    fn run(id: &str, args: &[&str], ctx: &CheckContext, files: &[&str]) -> CheckOutcome {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let files: Vec<String> = files.iter().map(|s| s.to_string()).collect();
        let check = BuiltinRegistry::standard().build(id, &args).unwrap().unwrap();
        check.run(ctx, &files).unwrap()
    }

    #[test]
    fn test_registry_lists_standard_checks() {
        let registry = BuiltinRegistry::standard();
        assert!(registry.contains("check-xml"));
        assert!(registry.contains("no-commit-to-branch"));
        assert!(!registry.contains("flake8"));
        assert!(registry.build("flake8", &[]).is_none());
        assert_eq!(registry.ids().count(), 10);
    }

    #[test]
    fn test_trailing_whitespace() {
        let (_dir, ctx) = setup(&[("a.txt", "ok\nbad \nalso\t\r\nfine\n")]);
        let outcome = run("trailing-whitespace", &[], &ctx, &["a.txt"]);
        assert_eq!(
            outcome.findings,
            ["a.txt:2: trailing whitespace", "a.txt:3: trailing whitespace"]
        );
    }

    #[test]
    fn test_end_of_file() {
        let (_dir, ctx) = setup(&[
            ("good.txt", "line\n"),
            ("empty.txt", ""),
            ("missing.txt", "line"),
            ("extra.txt", "line\n\n"),
            ("blank.txt", "\n"),
        ]);
        let outcome = run(
            "end-of-file",
            &[],
            &ctx,
            &["good.txt", "empty.txt", "missing.txt", "extra.txt", "blank.txt"],
        );
        assert_eq!(
            outcome.findings,
            [
                "missing.txt: missing newline at end of file",
                "extra.txt: multiple newlines at end of file",
                "blank.txt: file contains only newlines",
            ]
        );
    }

    #[test]
    fn test_merge_conflict_markers() {
        let (_dir, ctx) = setup(&[(
            "a.rs",
            "<<<<<<< HEAD\nlet a = 1;\n=======\nlet a = 2;\n>>>>>>> branch\n",
        )]);
        let outcome = run("check-merge-conflict", &[], &ctx, &["a.rs"]);
        assert_eq!(outcome.findings.len(), 3);

        let (_dir, ctx) = setup(&[("b.md", "Title\n=======\n")]);
        // A setext heading underline is the same marker; flagged like upstream tools
        assert_eq!(run("check-merge-conflict", &[], &ctx, &["b.md"]).findings.len(), 1);
    }

    #[test]
    fn test_syntax_checks() {
        let (_dir, ctx) = setup(&[
            ("ok.json", r#"{"a": [1, 2]}"#),
            ("bad.json", r#"{"a": }"#),
            ("ok.yaml", "a:\n  - 1\n"),
            ("bad.yaml", "a: [1, 2\n"),
            ("ok.toml", "a = 1\n"),
            ("bad.toml", "a = \n"),
            ("ok.xml", "<?xml version=\"1.0\"?>\n<root><a/></root>\n"),
            ("bad.xml", "<root><a></b></root>\n"),
            ("open.xml", "<root><a>\n"),
        ]);

        assert!(run("check-json", &[], &ctx, &["ok.json"]).passed());
        assert!(!run("check-json", &[], &ctx, &["bad.json"]).passed());
        assert!(run("check-yaml", &[], &ctx, &["ok.yaml"]).passed());
        assert!(!run("check-yaml", &[], &ctx, &["bad.yaml"]).passed());
        assert!(run("check-toml", &[], &ctx, &["ok.toml"]).passed());
        assert!(!run("check-toml", &[], &ctx, &["bad.toml"]).passed());
        assert!(run("check-xml", &[], &ctx, &["ok.xml"]).passed());
        assert!(!run("check-xml", &[], &ctx, &["bad.xml"]).passed());
        assert!(!run("check-xml", &[], &ctx, &["open.xml"]).passed());
    }

    #[test]
    fn test_syntax_checks_reject_invalid_utf8() {
        let (_dir, ctx) = setup(&[]);
        std::fs::write(ctx.root.join("latin1.json"), b"{\"name\": \"caf\xe9\"}\n").unwrap();
        std::fs::write(ctx.root.join("latin1.yaml"), b"name: caf\xe9\n").unwrap();

        let outcome = run("check-json", &[], &ctx, &["latin1.json"]);
        assert_eq!(outcome.findings.len(), 1);
        assert!(outcome.findings[0].starts_with("latin1.json: not valid UTF-8"));
        assert!(!run("check-yaml", &[], &ctx, &["latin1.yaml"]).passed());

        // Line-oriented checks still read such files lossily
        assert!(run("trailing-whitespace", &[], &ctx, &["latin1.yaml"]).passed());
    }

    #[test]
    fn test_max_line_length() {
        let long = "x".repeat(120);
        let (_dir, ctx) = setup(&[("a.py", format!("short\n{long}\n").as_str())]);

        let outcome = run("max-line-length", &["--max-line-length=100"], &ctx, &["a.py"]);
        assert_eq!(outcome.findings, ["a.py:2: line too long (120 > 100 characters)"]);

        assert!(run("max-line-length", &["--max-line-length", "120"], &ctx, &["a.py"]).passed());
    }

    #[test]
    fn test_bad_args_rejected_at_build() {
        let registry = BuiltinRegistry::standard();
        let result = registry
            .build("max-line-length", &["--max-line-length=lots".to_string()])
            .unwrap();
        assert!(result.is_err());

        let result = registry.build("check-added-large-files", &["--nope".to_string()]).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_large_files() {
        let big = "a".repeat(3 * 1024);
        let (_dir, ctx) = setup(&[("big.bin", big.as_str()), ("small.txt", "a")]);
        let outcome = run("check-added-large-files", &["--maxkb=2"], &ctx, &["big.bin", "small.txt"]);
        assert_eq!(outcome.findings, ["big.bin: 3 KB exceeds 2 KB"]);
    }

    #[test]
    fn test_binary_files_skipped_by_text_checks() {
        let (dir, ctx) = setup(&[]);
        fs::write(dir.path().join("blob.bin"), b"abc \0def \n").unwrap();
        assert!(run("trailing-whitespace", &[], &ctx, &["blob.bin"]).passed());
    }

    #[test]
    fn test_no_commit_to_branch() {
        let (_dir, mut ctx) = setup(&[]);
        let check = BuiltinRegistry::standard()
            .build("no-commit-to-branch", &["--branch".into(), "master".into()])
            .unwrap()
            .unwrap();
        assert!(check.always_run());
        assert!(check.run(&ctx, &[]).unwrap().passed());

        ctx.branch = Some("master".into());
        assert!(!check.run(&ctx, &[]).unwrap().passed());

        let by_pattern = BuiltinRegistry::standard()
            .build("no-commit-to-branch", &["--pattern".into(), "^release/.*".into()])
            .unwrap()
            .unwrap();
        ctx.branch = Some("release/1.0".into());
        assert!(!by_pattern.run(&ctx, &[]).unwrap().passed());
    }

    #[test]
    fn test_default_protected_branches() {
        let (_dir, mut ctx) = setup(&[]);
        ctx.branch = Some("main".into());
        assert!(!run("no-commit-to-branch", &[], &ctx, &[]).passed());
    }

    #[test]
    fn test_missing_file_is_execution_error() {
        let (_dir, ctx) = setup(&[]);
        let check = BuiltinRegistry::standard().build("check-json", &[]).unwrap().unwrap();
        let err = check.run(&ctx, &["nope.json".to_string()]).unwrap_err();
        assert!(matches!(err, ExecutionError::Read { .. }));
    }
}
