//! Child process management - running one test command to completion

use std::fs::File;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{RunError, RunResult};

/// Time a test gets to exit after SIGTERM before it is killed
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Build the platform shell invocation for a rendered command line
fn shell_command(command_line: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        // own process group, so a stop reaches everything the command started
        cmd.arg("-c").arg(command_line).process_group(0);
        cmd
    }
}

/// Run `command_line` in `cwd` with stdout and stderr written to the given
/// files, and wait for it to exit.
///
/// Cancelling `cancel` terminates the child and yields
/// [`RunError::Interrupted`].
pub async fn run_command(
    command_line: &str,
    cwd: &Path,
    stdout_path: &Path,
    stderr_path: &Path,
    cancel: &CancellationToken,
) -> RunResult<ExitStatus> {
    let stdout = File::create(stdout_path)?;
    let stderr = File::create(stderr_path)?;

    let mut child = shell_command(command_line)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RunError::Spawn {
            cwd: cwd.to_path_buf(),
            reason: e.to_string(),
        })?;

    tokio::select! {
        status = child.wait() => Ok(status?),
        _ = cancel.cancelled() => {
            terminate(&mut child).await;
            Err(RunError::Interrupted)
        }
    }
}

/// Stop a running child and its process group: SIGTERM first, SIGKILL for
/// whatever is left after the grace period
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(id) = child.id() {
            info!("Stopping test process group (pid: {})", id);
            let group = Pid::from_raw(id as i32);
            if let Err(e) = killpg(group, Signal::SIGTERM) {
                warn!("Failed to signal process group {}: {}", id, e);
            }
            let exited = tokio::time::timeout(TERMINATE_GRACE, child.wait())
                .await
                .is_ok();
            // ESRCH once every member is gone
            let _ = killpg(group, Signal::SIGKILL);
            if exited {
                return;
            }
        }
    }

    if let Err(e) = child.kill().await {
        warn!("Failed to kill test process: {}", e);
    }
}

/// Exit code of a finished process; `None` when it was ended by a signal
pub fn exit_code(status: &ExitStatus) -> Option<i32> {
    status.code()
}

/// Human description of how a process ended
pub fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit code {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {}", signal);
        }
    }
    "terminated without exit code".to_string()
}
