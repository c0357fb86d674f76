//! Hook resolution
//!
//! Every declared hook is bound once, before anything runs, to one of a
//! closed set of actions:
//!
//! - a built-in check from the [`BuiltinRegistry`] (`repo: builtin`)
//! - a shell command from the current repository or `PATH` (`repo: local`)
//! - a command published by a remote hook repository pinned to an
//!   immutable revision and fetched through the [`RemoteCache`]
//!
//! ```yaml
//! repos:
//!   - repo: builtin
//!     hooks:
//!       - id: max-line-length
//!         args: ["--max-line-length=100"]
//!   - repo: local
//!     hooks:
//!       - id: fmt
//!         entry: cargo fmt --check
//!         pass_filenames: false
//!   - repo: https://github.com/org/hooks
//!     rev: v1.4.0
//!     hooks:
//!       - id: lint
//! ```
//!
//! [`RemoteCache`]: crate::git::remote::RemoteCache

pub mod builtin;
pub mod manifest;
mod resolver;

pub use builtin::{BuiltinRegistry, Check, CheckContext, CheckOutcome};
pub use resolver::{CommandSpec, HookAction, Plan, ResolvedHook, Resolver, selected_hooks};
