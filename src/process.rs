//! The bot process capability.
//!
//! The scheduler talks to bots through the [`BotProcess`] trait: start,
//! liveness, suspend/continue, kill/release and non-blocking line I/O.
//! [`OsProcess`] is the real implementation over an OS child process;
//! tests drive the scheduler with scripted implementations instead.

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;

/// One bot's OS process, as the scheduler sees it.
///
/// Reads must be non-blocking: the scheduler polls many bots under one
/// deadline and a hung process must never stall the loop.
pub trait BotProcess: Send + std::fmt::Debug {
    /// Whether the process is still running.
    fn is_alive(&mut self) -> bool;

    /// Suspend the process, stopping its clock.
    fn pause(&mut self);

    /// Continue a suspended process.
    fn resume(&mut self);

    /// Terminate the process. Idempotent.
    fn kill(&mut self);

    /// Reclaim resources. Idempotent; implies [`BotProcess::kill`].
    fn release(&mut self);

    /// Write one newline-terminated line to the bot's input stream.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the pipe is gone.
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Non-blocking read of one complete stdout line, if one is ready.
    fn read_line(&mut self) -> Option<String>;

    /// Non-blocking read of one stderr line, if one is ready.
    fn read_error_line(&mut self) -> Option<String>;
}

/// A real bot child process.
///
/// Stdout and stderr are drained by reader threads into channels, which
/// is what makes [`BotProcess::read_line`] non-blocking.
pub struct OsProcess {
    child: Child,
    stdin: ChildStdin,
    stdout_rx: Receiver<String>,
    stderr_rx: Receiver<String>,
    released: bool,
}

impl std::fmt::Debug for OsProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsProcess")
            .field("pid", &self.child.id())
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

fn spawn_line_reader<R: io::Read + Send + 'static>(stream: R) -> Receiver<String> {
    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

impl OsProcess {
    /// Launch a bot from a shell command.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the process cannot be spawned or a pipe
    /// is missing.
    pub fn spawn(command: &str, working_dir: Option<&Path>) -> io::Result<Self> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        let mut child = cmd.spawn()?;

        let missing = || io::Error::other("child process pipe missing");
        let stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;
        let stderr = child.stderr.take().ok_or_else(missing)?;

        Ok(Self {
            child,
            stdin,
            stdout_rx: spawn_line_reader(stdout),
            stderr_rx: spawn_line_reader(stderr),
            released: false,
        })
    }

    fn signal(&self, signal: libc::c_int) {
        let Ok(pid) = libc::pid_t::try_from(self.child.id()) else {
            return;
        };
        // SAFETY: plain kill(2) on a pid we own; the worst a stale pid can
        // produce is ESRCH, which we ignore.
        unsafe {
            libc::kill(pid, signal);
        }
    }
}

impl BotProcess for OsProcess {
    fn is_alive(&mut self) -> bool {
        !self.released && matches!(self.child.try_wait(), Ok(None))
    }

    fn pause(&mut self) {
        if self.is_alive() {
            self.signal(libc::SIGSTOP);
        }
    }

    fn resume(&mut self) {
        if self.is_alive() {
            self.signal(libc::SIGCONT);
        }
    }

    fn kill(&mut self) {
        // a stopped process still dies to SIGKILL, but continue it first
        // so its runtime can run exit handlers off SIGPIPE and friends
        self.signal(libc::SIGCONT);
        let _ = self.child.kill();
        let _ = self.child.try_wait();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.kill();
        let _ = self.child.wait();
        self.released = true;
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()
    }

    fn read_line(&mut self) -> Option<String> {
        match self.stdout_rx.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn read_error_line(&mut self) -> Option<String> {
        match self.stderr_rx.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for OsProcess {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn read_line_blocking(process: &mut OsProcess, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(line) = process.read_line() {
                return Some(line);
            }
            thread::sleep(Duration::from_millis(3));
        }
        None
    }

    #[test]
    fn test_spawn_echo_roundtrip() {
        let mut process = OsProcess::spawn("cat", None).expect("spawn cat");
        assert!(process.is_alive());
        process.write_line("hello").expect("write");
        let line = read_line_blocking(&mut process, Duration::from_secs(5));
        assert_eq!(line.as_deref(), Some("hello"));
        process.release();
        assert!(!process.is_alive());
    }

    #[test]
    fn test_stderr_capture() {
        let mut process = OsProcess::spawn("echo oops >&2; sleep 5", None).expect("spawn");
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut line = None;
        while Instant::now() < deadline && line.is_none() {
            line = process.read_error_line();
            thread::sleep(Duration::from_millis(3));
        }
        assert_eq!(line.as_deref(), Some("oops"));
        process.release();
    }

    #[test]
    fn test_dead_process_is_not_alive() {
        let mut process = OsProcess::spawn("true", None).expect("spawn");
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && process.is_alive() {
            thread::sleep(Duration::from_millis(3));
        }
        assert!(!process.is_alive());
    }

    #[test]
    fn test_read_line_is_non_blocking() {
        let mut process = OsProcess::spawn("sleep 5", None).expect("spawn");
        let start = Instant::now();
        assert!(process.read_line().is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
        process.release();
    }

    #[test]
    fn test_kill_is_idempotent() {
        let mut process = OsProcess::spawn("sleep 30", None).expect("spawn");
        process.kill();
        process.kill();
        process.release();
        process.release();
        assert!(!process.is_alive());
    }
}
