//! Multi-process mode.
//!
//! With more than one worker configured, the binary runs as a supervisor: it
//! starts that many copies of itself, each running the whole pipeline in the
//! same consumer group, and waits for them. Children hold the read end of a
//! pipe on stdin; closing it asks them to shut down gracefully.

use std::env;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures::future::join_all;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{error, info, warn};

use crate::orchestrator::wait_for_shutdown_signal;
use crate::LogStorageError;

/// Environment variable carrying the worker index of a child process.
pub const WORKER_ID_ENV: &str = "LOG_STORAGE_WORKER_ID";

/// Worker index of the current process, if it was started by a supervisor.
pub fn worker_id() -> Option<usize> {
    parse_worker_id(env::var(WORKER_ID_ENV).ok())
}

fn parse_worker_id(value: Option<String>) -> Option<usize> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Resolve when the supervisor closes this worker's stdin.
pub async fn wait_for_supervisor_exit() {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 64];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}

/// Start `workers` copies of the current executable and wait for them.
///
/// On SIGINT/SIGTERM the children are asked to stop and given `grace` to
/// exit before they are killed.
pub async fn supervise(workers: usize, grace: Duration) -> Result<(), LogStorageError> {
    let exe = env::current_exe()
        .map_err(|e| LogStorageError::supervisor(format!("cannot locate executable: {}", e)))?;
    let args: Vec<_> = env::args_os().skip(1).collect();

    let mut children: Vec<(usize, Child)> = Vec::with_capacity(workers);
    // Held apart from the children: `Child::wait` closes a stdin it still owns.
    let mut pipes: Vec<ChildStdin> = Vec::with_capacity(workers);
    for id in 0..workers {
        let mut child = Command::new(&exe)
            .args(&args)
            .env(WORKER_ID_ENV, id.to_string())
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LogStorageError::supervisor(format!("failed to start worker {}: {}", id, e))
            })?;
        if let Some(stdin) = child.stdin.take() {
            pipes.push(stdin);
        }
        info!(worker_id = id, pid = child.id(), "Started worker process");
        children.push((id, child));
    }

    let signalled = tokio::select! {
        _ = wait_for_shutdown_signal() => true,
        _ = join_all(children.iter_mut().map(|(_, child)| child.wait())) => false,
    };

    if signalled {
        info!(worker_count = workers, "Stopping worker processes");
        drop(pipes);
        let stopped = tokio::time::timeout(
            grace,
            join_all(children.iter_mut().map(|(_, child)| child.wait())),
        )
        .await;
        if stopped.is_err() {
            warn!(grace_secs = grace.as_secs(), "Workers did not stop in time, killing them");
            for (id, child) in children.iter_mut() {
                if let Err(e) = child.kill().await {
                    warn!(worker_id = *id, error = %e, "Failed to kill worker");
                }
            }
        }
    }

    let mut failed = 0;
    for (id, child) in children.iter_mut() {
        match child.wait().await {
            Ok(status) => {
                if !exited_cleanly(status, signalled) {
                    failed += 1;
                    error!(worker_id = *id, status = %status, "Worker process failed");
                } else {
                    info!(worker_id = *id, "Worker process exited");
                }
            }
            Err(e) => {
                failed += 1;
                error!(worker_id = *id, error = %e, "Lost track of worker process");
            }
        }
    }

    if failed > 0 {
        return Err(LogStorageError::supervisor(format!(
            "{} of {} worker processes failed",
            failed, workers
        )));
    }
    Ok(())
}

fn exited_cleanly(status: ExitStatus, signalled: bool) -> bool {
    // Killed stragglers have no exit code.
    status.success() || (signalled && status.code().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_worker_id() {
        assert_eq!(parse_worker_id(Some("3".to_string())), Some(3));
        assert_eq!(parse_worker_id(Some(" 0 ".to_string())), Some(0));
        assert_eq!(parse_worker_id(Some("x".to_string())), None);
        assert_eq!(parse_worker_id(None), None);
    }
}
