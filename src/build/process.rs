//! Spawning one external tool and collecting what it printed.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// How often a running tool checks whether the build was cancelled.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exit code reported when the tool could not be started at all.
pub const SPAWN_FAILED: i32 = 127;

/// Exit code reported when the tool was killed by cancellation.
pub const CANCELLED: i32 = -1;

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: Vec<String>,
    pub code: i32,
    pub stdout: String,
    /// Captured error stream, where compilers print diagnostics.
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    fn failed(command: &[String], code: i32, message: String) -> Self {
        Self {
            command: command.to_vec(),
            code,
            stdout: String::new(),
            stderr: message,
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Waits for `child`, killing it once `cancel` is raised.
/// Returns `None` when the child was killed.
fn wait_cancellable(child: &mut Child, cancel: &AtomicBool) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.wait_timeout(POLL_INTERVAL)? {
            return Ok(Some(status));
        }
        if cancel.load(Ordering::SeqCst) {
            if let Err(err) = child.kill() {
                // InvalidInput: the child exited between the poll and the kill
                if err.kind() != io::ErrorKind::InvalidInput {
                    return Err(err);
                }
            }
            if let Err(err) = child.wait() {
                tracing::warn!("failed to reap cancelled tool: {err}");
            }
            return Ok(None);
        }
    }
}

/// Runs `command` in `work_dir`. A tool that cannot be started is reported
/// as a failed outcome rather than an error, so it flows through the same
/// classification as any other nonzero exit.
pub fn run_command(command: &[String], work_dir: &Path, cancel: &AtomicBool) -> CommandOutcome {
    let Some((program, args)) = command.split_first() else {
        return CommandOutcome::failed(command, SPAWN_FAILED, "empty command".to_string());
    };

    let spawned = Command::new(program)
        .args(args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            return CommandOutcome::failed(
                command,
                SPAWN_FAILED,
                format!("failed to execute `{}`: {}", program, e),
            );
        }
    };

    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = wait_cancellable(&mut child, cancel);
    let stdout = join_reader(stdout);
    let stderr = join_reader(stderr);

    match status {
        Ok(Some(status)) => CommandOutcome {
            command: command.to_vec(),
            code: status.code().unwrap_or(CANCELLED),
            stdout,
            stderr,
        },
        Ok(None) => CommandOutcome::failed(command, CANCELLED, "cancelled".to_string()),
        Err(e) => CommandOutcome::failed(
            command,
            SPAWN_FAILED,
            format!("failed to wait for `{}`: {}", program, e),
        ),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_captures_streams_and_code() {
        let cancel = AtomicBool::new(false);
        let out = run_command(&sh("echo hi; echo oops >&2; exit 3"), Path::new("."), &cancel);
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout, "hi\n");
        assert_eq!(out.stderr, "oops\n");
        assert!(!out.success());
    }

    #[test]
    fn test_missing_program_is_a_failed_outcome() {
        let cancel = AtomicBool::new(false);
        let cmd = vec!["xf-definitely-not-a-tool".to_string()];
        let out = run_command(&cmd, Path::new("."), &cancel);
        assert_eq!(out.code, SPAWN_FAILED);
        assert!(out.stderr.contains("failed to execute"));
    }

    #[test]
    fn test_cancel_kills_running_tool() {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let killer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });

        let start = Instant::now();
        let out = run_command(&sh("exec sleep 10"), Path::new("."), &cancel);
        killer.join().unwrap();

        assert_eq!(out.code, CANCELLED);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
