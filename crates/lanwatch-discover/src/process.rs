//! External tool invocation.
//!
//! Every tool runs under `tokio::process::Command` with a hard wall-clock
//! limit. On overrun the child is killed, not abandoned, and whatever it
//! printed so far is returned with `timed_out` set.
//!
//! On unix the child leads its own process group so a timeout reaches the
//! tool behind `sudo` or a shell wrapper, not just the direct child.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::config::Privilege;
use crate::error::{DiscoverError, Result};

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Same as [`CommandSpec::new`], wrapped in `sudo` when the privilege requires it.
    pub fn privileged<I, S>(privilege: Privilege, program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = Self::new(program, args);
        match privilege {
            Privilege::Sudo => {
                let mut args = vec![spec.program];
                args.extend(spec.args);
                Self {
                    program: "sudo".to_string(),
                    args,
                }
            }
            Privilege::Root | Privilege::Unprivileged => spec,
        }
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of one tool run. Stdout and stderr lines are interleaved
/// in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub lines: Vec<String>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs external commands. Swapped for canned output in tests.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion or until `timeout` elapses.
    ///
    /// Errors only when the process cannot be started.
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<ProcessOutput>;
}

/// Runs commands on the local system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

/// Grace period between SIGTERM and SIGKILL for a timed-out process group.
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<ProcessOutput> {
        let spawn_err = |source| DiscoverError::Spawn {
            command: command.display(),
            source,
        };

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd.spawn().map_err(spawn_err)?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(spawn_err(std::io::Error::other("missing stdio pipes")));
        };
        let mut out = BufReader::new(stdout);
        let mut err = BufReader::new(stderr);
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut lines = Vec::new();
        let mut out_open = true;
        let mut err_open = true;
        let mut timed_out = false;

        while out_open || err_open {
            tokio::select! {
                read = out.read_until(b'\n', &mut out_buf), if out_open => {
                    out_open = take_line(read, &mut out_buf, &mut lines, command);
                }
                read = err.read_until(b'\n', &mut err_buf), if err_open => {
                    err_open = take_line(read, &mut err_buf, &mut lines, command);
                }
                _ = &mut deadline => {
                    timed_out = true;
                    break;
                }
            }
        }
        // Unterminated tail left by a timeout.
        for buf in [&out_buf, &err_buf] {
            if !buf.is_empty() {
                lines.push(decode_line(buf));
            }
        }

        let mut exit_code = None;
        if !timed_out {
            tokio::select! {
                status = child.wait() => {
                    exit_code = status.ok().and_then(|s| s.code());
                }
                _ = &mut deadline => timed_out = true,
            }
        }

        if timed_out {
            tracing::warn!(
                command = %command.display(),
                timeout_secs = timeout.as_secs_f64(),
                "Process exceeded timeout, killing"
            );
            terminate(&mut child, command).await;
        }

        Ok(ProcessOutput {
            lines,
            exit_code,
            timed_out,
        })
    }
}

/// Records the line completed by `read_until`. Returns whether the stream is
/// still open; only EOF or an I/O error close it.
fn take_line(
    read: std::io::Result<usize>,
    buf: &mut Vec<u8>,
    lines: &mut Vec<String>,
    command: &CommandSpec,
) -> bool {
    let open = match read {
        Ok(0) => false,
        Ok(_) => buf.ends_with(b"\n"),
        Err(e) => {
            tracing::warn!(command = %command.display(), error = %e, "Lost process output stream");
            false
        }
    };
    if !buf.is_empty() {
        lines.push(decode_line(buf));
        buf.clear();
    }
    open
}

fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Stops a timed-out child and everything it started.
///
/// SIGTERM goes to the whole group first: `sudo` relays it to the tool it
/// runs, which SIGKILL cannot do. Survivors get SIGKILL after a grace period.
async fn terminate(child: &mut Child, command: &CommandSpec) {
    #[cfg(unix)]
    {
        if let Some(pgid) = child.id() {
            signal_group(pgid, libc::SIGTERM, command);
            if tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_err() {
                tracing::debug!(command = %command.display(), "Process ignored SIGTERM");
            }
            signal_group(pgid, libc::SIGKILL, command);
        }
    }
    if let Err(e) = child.kill().await {
        if e.kind() != std::io::ErrorKind::InvalidInput {
            tracing::warn!(command = %command.display(), error = %e, "Failed to kill process");
        }
    }
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: libc::c_int, command: &CommandSpec) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // A negative pid addresses the process group.
    // SAFETY: kill(2) takes no pointers; an invalid target only yields an errno.
    if unsafe { libc::kill(-pgid, signal) } != 0 {
        let e = std::io::Error::last_os_error();
        if e.raw_os_error() != Some(libc::ESRCH) {
            tracing::debug!(command = %command.display(), signal, error = %e, "Failed to signal process group");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sudo_prefix_only_when_needed() {
        let plain = CommandSpec::privileged(Privilege::Root, "arp-scan", ["10.0.0.0/24"]);
        assert_eq!(plain.display(), "arp-scan 10.0.0.0/24");

        let wrapped = CommandSpec::privileged(Privilege::Sudo, "nmap", ["-sn", "10.0.0.0/24"]);
        assert_eq!(wrapped.program, "sudo");
        assert_eq!(wrapped.display(), "sudo nmap -sn 10.0.0.0/24");

        let unprivileged = CommandSpec::privileged(Privilege::Unprivileged, "nmap", ["-sn"]);
        assert_eq!(unprivileged.program, "nmap");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let out = SystemRunner
            .run(
                &CommandSpec::new("sh", ["-c", "echo one; echo two 1>&2; exit 3"]),
                Duration::from_secs(10),
            )
            .await
            .unwrap();
        assert!(out.lines.contains(&"one".to_string()));
        assert!(out.lines.contains(&"two".to_string()));
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.timed_out);
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kills_on_timeout_and_keeps_partial_output() {
        let started = std::time::Instant::now();
        let out = SystemRunner
            .run(
                &CommandSpec::new("sh", ["-c", "echo early; sleep 30"]),
                Duration::from_millis(500),
            )
            .await
            .unwrap();
        assert!(out.timed_out);
        assert_eq!(out.lines, vec!["early".to_string()]);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_does_not_end_the_stream() {
        let out = SystemRunner
            .run(
                &CommandSpec::new(
                    "sh",
                    ["-c", r"printf '192.168.1.1 NETGEAR\n192.168.1.2 Caf\351 Corp\n192.168.1.3 Acme\n'"],
                ),
                Duration::from_secs(10),
            )
            .await
            .unwrap();
        assert_eq!(
            out.lines,
            vec![
                "192.168.1.1 NETGEAR".to_string(),
                "192.168.1.2 Caf\u{FFFD} Corp".to_string(),
                "192.168.1.3 Acme".to_string(),
            ]
        );
        assert!(out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn keeps_draining_after_invalid_utf8() {
        let out = SystemRunner
            .run(
                &CommandSpec::new("sh", ["-c", r"printf 'bad \377\n'; yes line | head -n 100000"]),
                Duration::from_secs(20),
            )
            .await
            .unwrap();
        assert!(!out.timed_out);
        assert_eq!(out.lines.len(), 100_001);
        assert_eq!(out.lines[0], "bad \u{FFFD}");
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        // Zombies count as gone: they have exited and only wait to be reaped.
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                let state = stat.rsplit_once(')')?.1.trim_start().chars().next()?;
                Some(!matches!(state, 'Z' | 'X'))
            })
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_processes_started_by_the_child() {
        let out = SystemRunner
            .run(
                &CommandSpec::new("sh", ["-c", "sleep 37 & echo $!; wait"]),
                Duration::from_millis(500),
            )
            .await
            .unwrap();
        assert!(out.timed_out);
        let grandchild: u32 = out.lines[0].trim().parse().unwrap();

        let gone = tokio::time::timeout(Duration::from_secs(5), async {
            while is_running(grandchild) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(gone.is_ok(), "sleep {grandchild} outlived the timeout");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let err = SystemRunner
            .run(
                &CommandSpec::new("definitely-not-a-real-tool-xyz", Vec::<String>::new()),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoverError::Spawn { .. }));
    }
}
