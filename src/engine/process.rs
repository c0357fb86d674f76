//! Subprocess invocation for command hooks

use crate::error::ExecutionError;
use crate::hooks::CommandSpec;
use crate::report::HookStatus;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Run a command hook from `root` and capture its combined output.
///
/// The entry goes through `sh -c` with `args` and the FileSet as positional
/// parameters, so neither is re-split by the shell. The hook runs in its own
/// process group, and the whole group is killed if this future is dropped
/// (timeout or cancellation).
pub async fn run_command(spec: &CommandSpec, files: &[String], root: &Path) -> (HookStatus, String) {
    match spawn_and_wait(spec, files, root).await {
        Ok((true, output)) => (HookStatus::Passed, output),
        Ok((false, output)) => (HookStatus::Failed, output),
        Err(e) => (HookStatus::Error, e.to_string()),
    }
}

async fn spawn_and_wait(
    spec: &CommandSpec,
    files: &[String],
    root: &Path,
) -> Result<(bool, String), ExecutionError> {
    let script = format!("{} \"$@\"", spec.entry);
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&script)
        .arg("hookguard")
        .args(&spec.args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    if spec.pass_filenames {
        command.args(files);
    }

    tracing::trace!("Spawning: sh -c {:?} ({} args)", script, spec.args.len());
    let child = command.spawn().map_err(|source| ExecutionError::Spawn {
        program: spec.entry.clone(),
        source,
    })?;
    let mut group = GroupGuard { pgid: child.id() };

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| ExecutionError::Spawn {
            program: spec.entry.clone(),
            source,
        })?;
    group.disarm();

    let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !captured.is_empty() && !captured.ends_with('\n') {
            captured.push('\n');
        }
        captured.push_str(&stderr);
    }

    if let Some(code) = output.status.code().filter(|_| !output.status.success()) {
        tracing::debug!("'{}' exited with status {}", spec.entry, code);
    }
    Ok((output.status.success(), captured))
}

/// Kills the hook's process group when dropped before the hook exits
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.and_then(|pid| i32::try_from(pid).ok()) {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                Ok(()) => tracing::debug!("Killed process group {}", pgid),
                Err(e) => tracing::trace!("Process group {} already gone: {}", pgid, e),
            }
        }
    }
}
