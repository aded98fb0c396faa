//! Process Runner
//!
//! Runs one external command at a time and captures its merged stdout and
//! stderr. A wall-clock timeout ends the child with SIGTERM, drains whatever
//! it flushes during a grace period, then SIGKILLs it. A memory cap lowers
//! the soft address-space and data-segment limits in the child before exec.

use std::fs::File;
use std::io::Read;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Failed to spawn `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to capture output: {0}")]
    Pipe(#[from] std::io::Error),
}

/// A command and the limits it runs under
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    /// Wall-clock limit; `None` waits for the child to finish
    pub timeout: Option<Duration>,
    /// Soft address-space/data-segment cap in bytes
    pub memory_limit: Option<u64>,
    /// Log the captured output once the command finishes
    pub echo_output: bool,
}

impl CommandSpec {
    pub fn new(argv: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            argv,
            cwd: cwd.into(),
            timeout: None,
            memory_limit: None,
            echo_output: true,
        }
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn memory_limit(mut self, bytes: Option<u64>) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.echo_output = false;
        self
    }

    /// Space-joined command line, for logging
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Captured result of a command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    /// Merged stdout and stderr, trimmed
    pub output: String,
    pub elapsed: Duration,
    /// `None` when killed by a signal or not run
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl RunOutput {
    /// Result of a dry run: no output, zero time
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Executes command specs; the seam between drivers and real processes
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, RunnerError>;
}

/// Runs commands as child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    dry: bool,
    grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            dry: false,
            grace: Duration::from_millis(500),
        }
    }
}

impl ProcessRunner {
    pub fn new(dry: bool, grace: Duration) -> Self {
        Self { dry, grace }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, RunnerError> {
        tracing::info!(
            "Under `{}@{}`: Execute `{}`",
            current_user(),
            spec.cwd.display(),
            spec.display()
        );
        if self.dry {
            return Ok(RunOutput::skipped());
        }

        let program = spec.argv.first().ok_or(RunnerError::EmptyCommand)?;

        let (read_fd, write_fd) = create_pipe()?;
        // Both ends are owned from here on and closed on drop
        let reader = unsafe { File::from_raw_fd(read_fd) };
        let writer = unsafe { File::from_raw_fd(write_fd) };
        let stderr_writer = writer.try_clone()?;

        let mut command = Command::new(program);
        command
            .args(&spec.argv[1..])
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(stderr_writer))
            // Own process group so signals reach everything the launcher starts
            .process_group(0);

        if let Some(bytes) = spec.memory_limit {
            unsafe {
                command.pre_exec(move || apply_memory_limit(bytes));
            }
        }

        let start = Instant::now();
        let spawned = command.spawn();
        // Drop our copies of the write end so EOF arrives when the child exits
        drop(command);
        let child = spawned.map_err(|source| RunnerError::SpawnFailed {
            program: program.clone(),
            source,
        })?;

        let mut capture = Capture {
            child,
            reader,
            read_fd,
            buffer: Vec::new(),
        };
        let deadline = spec.timeout.map(|t| start + t);
        let timed_out = capture.collect(deadline, self.grace)? || capture.reap(deadline, self.grace)?;
        let status = capture.child.wait()?;
        let elapsed = start.elapsed();

        let output = String::from_utf8_lossy(&capture.buffer).trim().to_string();

        if timed_out {
            tracing::warn!(
                "Timed out after {:?}: `{}`",
                spec.timeout.unwrap_or_default(),
                spec.display()
            );
        }
        tracing::info!("Done. Execution time: {} seconds", elapsed.as_secs_f64());
        if spec.echo_output {
            tracing::debug!("Output: {}", output);
        }

        Ok(RunOutput {
            output,
            elapsed,
            exit_code: status.code(),
            timed_out,
        })
    }
}

/// A running child and the read end of its output pipe
struct Capture {
    child: Child,
    reader: File,
    read_fd: RawFd,
    buffer: Vec<u8>,
}

impl Capture {
    /// Read until EOF or the deadline. Returns whether the deadline hit.
    fn collect(&mut self, deadline: Option<Instant>, grace: Duration) -> Result<bool, RunnerError> {
        loop {
            let poll_timeout = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        self.terminate(grace)?;
                        return Ok(true);
                    }
                    remaining.min(Duration::from_millis(100))
                }
                None => Duration::from_millis(100),
            };

            match wait_for_data(self.read_fd, poll_millis(poll_timeout)) {
                PollResult::DataAvailable => {
                    if !self.read_chunk()? {
                        return Ok(false);
                    }
                }
                PollResult::Timeout => continue,
                PollResult::PipeClosed => return Ok(false),
                PollResult::Error(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                PollResult::Error(e) => return Err(RunnerError::Pipe(e)),
            }
        }
    }

    /// Output is closed; wait for the child to exit, still honoring the
    /// deadline. Returns whether the deadline hit.
    fn reap(&mut self, deadline: Option<Instant>, grace: Duration) -> Result<bool, RunnerError> {
        let Some(deadline) = deadline else {
            return Ok(false);
        };
        while self.child.try_wait()?.is_none() {
            if Instant::now() >= deadline {
                self.terminate(grace)?;
                return Ok(true);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(false)
    }

    /// Read one chunk; `false` on EOF
    fn read_chunk(&mut self) -> Result<bool, RunnerError> {
        let mut chunk = [0u8; 8192];
        match self.reader.read(&mut chunk) {
            Ok(0) => Ok(false),
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(true),
            Err(e) => Err(RunnerError::Pipe(e)),
        }
    }

    /// SIGTERM the process group, drain output for `grace`, then SIGKILL.
    fn terminate(&mut self, grace: Duration) -> Result<(), RunnerError> {
        let pid = self.child.id();
        // The child may already be gone
        let _ = signal_group(pid, libc::SIGTERM);

        let drain_deadline = Instant::now() + grace;
        loop {
            let remaining = drain_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match wait_for_data(self.read_fd, poll_millis(remaining)) {
                PollResult::DataAvailable => {
                    if !self.read_chunk()? {
                        break;
                    }
                }
                PollResult::Timeout => continue,
                _ => break,
            }
        }

        let _ = signal_group(pid, libc::SIGKILL);
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
        }
        Ok(())
    }
}

/// Result of polling for data
#[derive(Debug)]
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

/// Wait for data to be available on a file descriptor with timeout
fn wait_for_data(fd: RawFd, timeout_ms: i32) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if result < 0 {
        PollResult::Error(std::io::Error::last_os_error())
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        // Even if the pipe is closing there might be data
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

/// Poll timeout in whole milliseconds, at least 1 and at most `i32::MAX`
fn poll_millis(timeout: Duration) -> i32 {
    timeout.as_millis().clamp(1, i32::MAX as u128) as i32
}

/// Create a close-on-exec pipe pair, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Send `signal` to the process group led by `pid`.
fn signal_group(pid: u32, signal: libc::c_int) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Lower the soft address-space and data-segment limits. Runs in the child
/// between fork and exec, so it only calls async-signal-safe functions.
fn apply_memory_limit(bytes: u64) -> std::io::Result<()> {
    for resource in [libc::RLIMIT_AS, libc::RLIMIT_DATA] {
        let mut limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        if unsafe { libc::getrlimit(resource, &mut limit) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        limit.rlim_cur = (bytes as libc::rlim_t).min(limit.rlim_max);
        if unsafe { libc::setrlimit(resource, &limit) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
