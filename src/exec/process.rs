// src/exec/process.rs

//! Child process execution for shell runners.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Combined stdout/stderr, in the order lines were read.
    pub output: String,
    /// The process was stopped because the run was cancelled.
    pub cancelled: bool,
}

/// Poll interval while waiting for a terminated process group to drain.
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Build a shell command appropriate for the platform.
///
/// On unix the shell leads its own process group, so signals sent on
/// cancellation reach every process the script starts.
#[cfg(unix)]
fn shell_command(command_line: &str) -> Command {
    let mut c = Command::new("sh");
    c.arg("-c").arg(command_line).process_group(0);
    c
}

#[cfg(not(unix))]
fn shell_command(command_line: &str) -> Command {
    let mut c = Command::new("cmd");
    c.arg("/C").arg(command_line);
    c
}

/// Run `command_line` through the platform shell in `cwd`.
///
/// Output is streamed to `debug` logs and buffered. If `cancel` flips to
/// `true` the child's process group receives a terminate signal, then a
/// forced kill once `grace` has elapsed. The child is spawned with
/// `kill_on_drop` and its group is killed if this future is dropped or
/// returns early, so nothing outlives an interrupted run.
pub async fn run_shell_command(
    label: &str,
    command_line: &str,
    cwd: &Path,
    cancel: &mut watch::Receiver<bool>,
    grace: Duration,
) -> Result<ProcessOutcome> {
    info!(operation = %label, cmd = %command_line, cwd = %cwd.display(), "starting process");

    let mut cmd = shell_command(command_line);
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for '{}'", label))?;
    let mut group = GroupGuard::new(child.id());

    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_line_reader(stdout, label, "stdout", Arc::clone(&lines)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_line_reader(stderr, label, "stderr", Arc::clone(&lines)));
    }

    let (status, cancelled) = tokio::select! {
        res = child.wait() => {
            let status = res.with_context(|| format!("waiting for process of '{}'", label))?;
            (Some(status), false)
        }
        _ = wait_for_cancel(cancel) => {
            info!(operation = %label, "cancellation requested; terminating process");
            (terminate(&mut child, label, grace).await, true)
        }
    };
    group.disarm();

    // A background grandchild may keep the pipes open after the shell exits.
    for reader in readers {
        if tokio::time::timeout(grace, reader).await.is_err() {
            warn!(operation = %label, "output reader did not finish; output may be truncated");
        }
    }

    let output = lines
        .lock()
        .map(|l| l.join("\n"))
        .unwrap_or_default();

    let exit_code = status.and_then(|s| s.code());
    let success = !cancelled && status.is_some_and(|s| s.success());

    info!(
        operation = %label,
        exit_code = ?exit_code,
        success,
        cancelled,
        "process exited"
    );

    Ok(ProcessOutcome {
        exit_code,
        success,
        output,
        cancelled,
    })
}

fn spawn_line_reader<R>(
    stream: R,
    label: &str,
    stream_name: &'static str,
    lines: Arc<Mutex<Vec<String>>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let label = label.to_string();
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            debug!(operation = %label, "{}: {}", stream_name, line);
            if let Ok(mut buf) = lines.lock() {
                buf.push(line);
            }
        }
    })
}

/// Resolves once `cancel` holds `true`; never resolves if the sender is gone.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Ask the process group to stop, then kill whatever is left after `grace`.
async fn terminate(child: &mut Child, label: &str, grace: Duration) -> Option<ExitStatus> {
    let group = child.id();
    let deadline = Instant::now() + grace;
    let mut status = None;

    if signal_group(group, GroupSignal::Terminate) {
        match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(s)) => status = Some(s),
            Ok(Err(e)) => {
                warn!(operation = %label, error = %e, "failed waiting for terminated process");
            }
            Err(_) => {
                warn!(
                    operation = %label,
                    grace_ms = grace.as_millis() as u64,
                    "process ignored terminate signal; killing"
                );
            }
        }

        if status.is_some() {
            while group_alive(group) && Instant::now() < deadline {
                tokio::time::sleep(GROUP_POLL_INTERVAL).await;
            }
            if group_alive(group) {
                warn!(operation = %label, "processes left behind by the script ignored terminate signal; killing");
            }
        }
    }

    if group_alive(group) {
        signal_group(group, GroupSignal::Kill);
    }
    if status.is_none() {
        if let Err(e) = child.kill().await {
            warn!(operation = %label, error = %e, "failed to kill child process on cancellation");
        }
        status = child.try_wait().ok().flatten();
    }
    status
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

/// Kills the child's process group when dropped, unless disarmed.
struct GroupGuard {
    group: Option<u32>,
    armed: bool,
}

impl GroupGuard {
    fn new(group: Option<u32>) -> Self {
        Self { group, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.armed {
            signal_group(self.group, GroupSignal::Kill);
        }
    }
}

#[cfg(unix)]
fn group_pid(group: Option<u32>) -> Option<nix::unistd::Pid> {
    group
        .and_then(|g| i32::try_from(g).ok())
        .map(nix::unistd::Pid::from_raw)
}

#[cfg(unix)]
fn signal_group(group: Option<u32>, signal: GroupSignal) -> bool {
    use nix::sys::signal::{Signal, killpg};

    let Some(pgid) = group_pid(group) else {
        return false;
    };
    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    killpg(pgid, signal).is_ok()
}

/// Whether any process is still in the group. A reaped leader does not count.
#[cfg(unix)]
fn group_alive(group: Option<u32>) -> bool {
    use nix::sys::signal::{Signal, killpg};

    group_pid(group).is_some_and(|pgid| killpg(pgid, None::<Signal>).is_ok())
}

#[cfg(not(unix))]
fn signal_group(_group: Option<u32>, _signal: GroupSignal) -> bool {
    false
}

#[cfg(not(unix))]
fn group_alive(_group: Option<u32>) -> bool {
    false
}
