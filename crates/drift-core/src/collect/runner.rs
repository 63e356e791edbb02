//! External command execution for probes.
//!
//! Collectors shell out to system utilities (`systemctl`, `dpkg-query`,
//! `df`, ...). Every invocation goes through [`CommandRunner`], which
//! applies:
//!
//! - a timeout derived from the shared collection deadline
//! - an output size cap to bound memory
//! - a sanitized environment (`LC_ALL=C`) so output is parseable
//! - SIGTERM-then-SIGKILL escalation when a command overruns
//!
//! A missing binary is not an error worth reporting: probes treat it as
//! "this manager/init system is not present" and yield an empty result.

use drift_common::Deadline;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Default per-command timeout when the deadline leaves more room.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default output cap per stream (10 MiB).
const DEFAULT_MAX_OUTPUT: usize = 10 * 1024 * 1024;

/// Grace period between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_millis(200);

/// Poll interval while waiting on a child.
const WAIT_TICK: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum CommandError {
    /// The binary does not exist on PATH.
    #[error("command not found: {0}")]
    NotFound(String),

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

/// Captured output of one command run.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub truncated: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }
}

/// Runner shared by all probes of one collection run.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    default_timeout: Duration,
    max_output_bytes: usize,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT,
        }
    }
}

impl CommandRunner {
    pub fn new(default_timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            default_timeout,
            max_output_bytes,
        }
    }

    /// Run a command to completion under the deadline.
    pub fn run(
        &self,
        cmd: &str,
        args: &[&str],
        deadline: &Deadline,
    ) -> Result<CommandOutput, CommandError> {
        let timeout = deadline.remaining_or(self.default_timeout);

        let mut command = Command::new(cmd);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .env("LC_ALL", "C")
            .env("LANG", "C");
        if let Ok(path) = std::env::var("PATH") {
            command.env("PATH", path);
        }

        debug!(command = cmd, timeout_ms = timeout.as_millis() as u64, "running probe command");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(command = cmd, "command not found");
                return Err(CommandError::NotFound(cmd.to_string()));
            }
            Err(err) => {
                warn!(command = cmd, error = %err, "failed to spawn");
                return Err(CommandError::Spawn {
                    command: cmd.to_string(),
                    source: err,
                });
            }
        };

        let cap = self.max_output_bytes;
        let stdout_handle = child
            .stdout
            .take()
            .map(|stream| thread::spawn(move || read_capped(stream, cap)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|stream| thread::spawn(move || read_capped(stream, cap)));

        let hard_stop = Instant::now() + timeout;
        let mut timed_out = false;
        let exit_code = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status.code(),
                Ok(None) => {
                    if Instant::now() >= hard_stop {
                        timed_out = true;
                        warn!(command = cmd, "command timed out, terminating");
                        kill_with_grace(&mut child);
                        break child.wait().ok().and_then(|s| s.code());
                    }
                    thread::sleep(WAIT_TICK);
                }
                Err(_) => break None,
            }
        };

        let (stdout, stdout_truncated) = join_reader(stdout_handle);
        let (stderr, stderr_truncated) = join_reader(stderr_handle);

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
            timed_out,
            truncated: stdout_truncated || stderr_truncated,
        })
    }

    /// Run a command and return its stdout on success. Missing binaries,
    /// spawn failures, timeouts and non-zero exits all collapse to `None`.
    pub fn stdout(&self, cmd: &str, args: &[&str], deadline: &Deadline) -> Option<String> {
        match self.run(cmd, args, deadline) {
            Ok(output) if output.success() && !output.timed_out => Some(output.stdout_str()),
            Ok(_) => None,
            Err(_) => None,
        }
    }
}

fn read_capped<R: Read>(mut stream: R, cap: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::with_capacity(8192.min(cap));
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() + n > cap {
                    let room = cap - buf.len();
                    buf.extend_from_slice(&chunk[..room]);
                    truncated = true;
                    // keep draining so the child never blocks on a full pipe
                } else {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
            Err(_) => break,
        }
    }
    (buf, truncated)
}

type ReaderHandle = Option<thread::JoinHandle<(Vec<u8>, bool)>>;

fn join_reader(handle: ReaderHandle) -> (Vec<u8>, bool) {
    match handle {
        Some(handle) => handle.join().unwrap_or_default(),
        None => (Vec::new(), false),
    }
}

#[cfg(unix)]
fn kill_with_grace(child: &mut Child) {
    let pid = child.id() as libc::pid_t;
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    let grace_end = Instant::now() + TERM_GRACE;
    while Instant::now() < grace_end {
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_with_grace(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_command_is_not_found() {
        let runner = CommandRunner::default();
        let err = runner
            .run("definitely-not-a-real-binary-42", &[], &Deadline::none())
            .unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
    }

    #[test]
    fn test_captures_stdout() {
        let runner = CommandRunner::default();
        let output = runner
            .run("echo", &["hello"], &Deadline::none())
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_str().trim(), "hello");
        assert!(!output.timed_out);
    }

    #[test]
    fn test_stdout_helper_collapses_failure() {
        let runner = CommandRunner::default();
        assert!(runner
            .stdout("definitely-not-a-real-binary-42", &[], &Deadline::none())
            .is_none());
        assert_eq!(
            runner
                .stdout("echo", &["ok"], &Deadline::none())
                .unwrap()
                .trim(),
            "ok"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_long_running_command() {
        let runner = CommandRunner::default();
        let deadline = Deadline::after(Duration::from_millis(200));
        let start = Instant::now();
        let output = runner.run("sleep", &["30"], &deadline).unwrap();
        assert!(output.timed_out);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
