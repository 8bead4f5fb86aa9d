// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process helpers shared by the Android and desktop bridges: bounded child
// execution and procfs tracer lookup.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use vigil_core::error::{Result, VigilError};
use wait_timeout::ChildExt;

/// Run `program` and collect its stdout lines, giving up after `timeout`.
///
/// The child leads its own process group on unix; on timeout the whole group
/// is killed. stdout is drained on a detached thread that hands its buffer
/// back over a channel, so descendants holding the pipe open cannot stretch
/// the call past the deadline.
pub(crate) fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Vec<String>> {
    let deadline = Instant::now() + timeout;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command.spawn()?;

    let (tx, rx) = mpsc::channel();
    match child.stdout.take() {
        Some(mut stdout) => {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stdout.read_to_end(&mut buf);
                let _ = tx.send(buf);
            });
        }
        None => drop(tx),
    }

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            kill_tree(&mut child);
            return Err(timed_out(program, timeout));
        }
        Err(e) => {
            kill_tree(&mut child);
            return Err(e.into());
        }
    };

    let output = match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => buf,
        Err(mpsc::RecvTimeoutError::Disconnected) => Vec::new(),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            // The child exited but a descendant still holds stdout.
            kill_tree(&mut child);
            return Err(timed_out(program, timeout));
        }
    };
    tracing::trace!(program, ?status, "child exited");

    Ok(String::from_utf8_lossy(&output)
        .lines()
        .map(str::to_owned)
        .filter(|line| !line.trim().is_empty())
        .collect())
}

fn timed_out(program: &str, timeout: Duration) -> VigilError {
    tracing::debug!(program, timeout_ms = timeout.as_millis() as u64, "child timed out");
    VigilError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut))
}

/// Kill the child's process group (or just the child off unix) and reap it.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: plain syscall; a stale group id only yields ESRCH.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Parse the `TracerPid` field of a `/proc/<pid>/status` document.
pub(crate) fn parse_tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Whether `/proc/self/status` reports a tracer attached to this process.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn procfs_traced() -> Result<bool> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    let pid = parse_tracer_pid(&status)
        .ok_or_else(|| VigilError::Bridge("TracerPid missing from /proc/self/status".into()))?;
    Ok(pid != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracer_pid_parsing() {
        let status = "Name:\tcat\nState:\tR (running)\nTracerPid:\t0\nUid:\t1000\n";
        assert_eq!(parse_tracer_pid(status), Some(0));

        let traced = "Name:\tapp\nTracerPid:\t4242\n";
        assert_eq!(parse_tracer_pid(traced), Some(4242));

        assert_eq!(parse_tracer_pid("Name:\tapp\n"), None);
    }

    #[test]
    fn missing_binary_is_an_error_not_a_panic() {
        let result = run_with_timeout(
            "/definitely/not/a/real/binary",
            &["su"],
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn collects_stdout_lines() {
        let lines = run_with_timeout("/bin/sh", &["-c", "echo one; echo; echo two"], Duration::from_secs(5))
            .expect("sh should run");
        assert_eq!(lines, vec!["one".to_owned(), "two".to_owned()]);
    }

    #[cfg(unix)]
    fn assert_timed_out(result: Result<Vec<String>>) {
        match result {
            Err(VigilError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn hung_child_is_killed() {
        let started = Instant::now();
        let result = run_with_timeout("/bin/sh", &["-c", "sleep 30"], Duration::from_millis(100));
        assert_timed_out(result);
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[test]
    fn hung_grandchild_does_not_outlive_the_timeout() {
        // The shell forks sleep, which inherits stdout and outlives a kill
        // aimed at the shell alone.
        let started = Instant::now();
        let result = run_with_timeout(
            "/bin/sh",
            &["-c", "sleep 5; echo done"],
            Duration::from_millis(100),
        );
        assert_timed_out(result);
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[test]
    fn orphan_holding_stdout_is_bounded() {
        // The shell exits at once; its orphaned child keeps the pipe open.
        let started = Instant::now();
        let result = run_with_timeout(
            "/bin/sh",
            &["-c", "echo early; sleep 30 &"],
            Duration::from_millis(200),
        );
        assert_timed_out(result);
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    }
}
