//! git::command
//!
//! Bounded invocations of the `git` binary.
//!
//! Rebase, apply, diff, checkout and merge go through the real `git` so
//! that hooks, attributes and worktree handling behave exactly as they do
//! for the user. Every invocation runs with a deadline; a child that
//! outlives it is killed and reported as [`GitError::Timeout`].

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::GitError;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished git process.
#[derive(Debug)]
pub(crate) struct GitOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl GitOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run `git <args>` in `work_dir`, feeding `stdin` if given.
///
/// Returns the output whatever the exit status; callers decide what a
/// non-zero exit means.
pub(crate) fn run(
    work_dir: &Path,
    args: &[&str],
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<GitOutput, GitError> {
    let command = format!("git {}", args.join(" "));
    tracing::debug!(%command, "running git");

    let mut child = Command::new("git")
        .args(args)
        .current_dir(work_dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_EDITOR", "true")
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| GitError::Spawn {
            command: command.clone(),
            source,
        })?;

    let writer = match (child.stdin.take(), stdin) {
        (Some(mut pipe), Some(input)) => {
            let input = input.to_vec();
            Some(thread::spawn(move || {
                // A child that exits early closes the pipe; its exit status
                // reports the real problem.
                let _ = pipe.write_all(&input);
            }))
        }
        _ => None,
    };
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_with_deadline(&mut child, timeout).map_err(|e| match e {
        WaitError::Timeout => GitError::Timeout {
            command: command.clone(),
            after: timeout,
        },
        WaitError::Io(source) => GitError::Spawn {
            command: command.clone(),
            source,
        },
    })?;

    if let Some(handle) = writer {
        let _ = handle.join();
    }

    let output = GitOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    };
    tracing::trace!(%command, status = ?output.status.code(), "git finished");
    Ok(output)
}

/// Run `git <args>` and fail on a non-zero exit.
pub(crate) fn run_checked(
    work_dir: &Path,
    args: &[&str],
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<GitOutput, GitError> {
    let output = run(work_dir, args, stdin, timeout)?;
    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            status: output.status.code(),
            stderr: output.stderr_lossy(),
        });
    }
    Ok(output)
}

enum WaitError {
    Timeout,
    Io(std::io::Error),
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<ExitStatus, WaitError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(WaitError::Io)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(WaitError::Timeout);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
