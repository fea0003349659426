//! Direct process execution
//!
//! Spawns the command without a shell, feeds its stdin, captures stdout and
//! samples resident memory until the child exits. Used on its own when no
//! sandbox is requested, and underneath `SandboxedRunner` otherwise.

use async_trait::async_trait;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::libc;
use nix::sys::signal::Signal;
use nix::unistd::dup2;
use std::fs::File;
use std::io::{self, Read, Write};
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ExecutionRequest, ProcessInput, ProcessOutcome, Runner};
use crate::core::{split_command, VerdictStatus};
use crate::error::RunError;

/// Descriptor the auxiliary channel occupies in the child
pub const AUX_FD: RawFd = 3;

/// Default delay between two memory samples
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runner that executes the command directly, without limits
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl ProcessRunner {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Run a command, optionally handing it `aux` as file descriptor 3
    pub async fn run_with_aux(&self, request: ExecutionRequest, aux: Option<File>) -> ProcessOutcome {
        let poll_interval = self.poll_interval;
        let command = request.command.clone();

        let task = tokio::task::spawn_blocking(move || {
            execute(&request.command, request.input, aux.as_ref(), poll_interval)
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => ProcessOutcome::failed(
                VerdictStatus::InternalError,
                RunError::Io(format!("execution task for `{}` failed: {}", command, e)),
            ),
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, request: ExecutionRequest) -> ProcessOutcome {
        self.run_with_aux(request, None).await
    }
}

fn execute(
    command: &str,
    input: ProcessInput,
    aux: Option<&File>,
    poll_interval: Duration,
) -> ProcessOutcome {
    let argv = split_command(command);
    let Some((program, args)) = argv.split_first() else {
        return ProcessOutcome::failed(VerdictStatus::RuntimeError, RunError::EmptyCommand);
    };

    let mut cmd = Command::new(program);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::inherit());

    let pending_input = match input {
        ProcessInput::File(file) => {
            cmd.stdin(Stdio::from(file));
            None
        }
        ProcessInput::Bytes(bytes) => {
            cmd.stdin(Stdio::piped());
            Some(bytes)
        }
    };

    if let Some(aux) = aux {
        let fd = aux.as_raw_fd();
        // SAFETY: the hook only calls dup2/fcntl, both async-signal-safe
        unsafe {
            cmd.pre_exec(move || attach_aux_fd(fd));
        }
    }

    debug!("Spawning process: {:?}", argv);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ProcessOutcome::failed(
                VerdictStatus::RuntimeError,
                RunError::Launch {
                    program: program.clone(),
                    reason: e.to_string(),
                },
            );
        }
    };

    let writer = match (child.stdin.take(), pending_input) {
        (Some(mut stdin), Some(bytes)) => Some(thread::spawn(move || {
            match stdin.write_all(&bytes) {
                // The program may legitimately exit before reading everything
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        })),
        _ => None,
    };

    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = stdout.read_to_end(&mut buf) {
                debug!("Stdout capture stopped early: {}", e);
            }
            buf
        })
    });

    let pid = child.id() as libc::pid_t;
    let mut peak_kb = 0u64;

    let (raw_status, usage) = loop {
        match try_reap(pid) {
            Ok(Some(done)) => break done,
            Ok(None) => {
                if let Some(kb) = sample_memory_kb(pid) {
                    peak_kb = peak_kb.max(kb);
                }
                thread::sleep(poll_interval);
            }
            Err(e) => {
                warn!("wait4 failed for pid {}: {}", pid, e);
                abandon(&mut child, reader, writer);
                return ProcessOutcome::failed(
                    VerdictStatus::InternalError,
                    RunError::Io(format!("waiting for `{}` failed: {}", program, e)),
                );
            }
        }
    };

    let output = join_pipes(reader, writer);

    let time_secs = usage.ru_utime.tv_sec as f64 + usage.ru_utime.tv_usec as f64 / 1_000_000.0;
    // ru_maxrss is in KB on Linux
    let peak_kb = peak_kb.max(usage.ru_maxrss.max(0) as u64);
    let memory_mb = peak_kb as f64 / 1024.0;

    let (status, error) = classify_exit(raw_status);

    debug!(
        "Process {} finished: status={}, time={:.3}s, memory={}KB, stdout={}B",
        pid,
        status,
        time_secs,
        peak_kb,
        output.len()
    );

    ProcessOutcome {
        status,
        time_secs,
        memory_mb,
        output,
        error,
    }
}

/// Kill and reap a child that can no longer be monitored
fn abandon(
    child: &mut Child,
    reader: Option<thread::JoinHandle<Vec<u8>>>,
    writer: Option<thread::JoinHandle<io::Result<()>>>,
) -> Vec<u8> {
    if let Err(e) = child.kill() {
        debug!("Killing pid {} failed: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        warn!("Reaping pid {} failed: {}", child.id(), e);
    }
    join_pipes(reader, writer)
}

/// Wait for the stdio threads; returns the captured stdout
fn join_pipes(
    reader: Option<thread::JoinHandle<Vec<u8>>>,
    writer: Option<thread::JoinHandle<io::Result<()>>>,
) -> Vec<u8> {
    let output = reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();

    if let Some(handle) = writer {
        if let Ok(Err(e)) = handle.join() {
            debug!("Writing stdin failed: {}", e);
        }
    }
    output
}

/// Map a raw wait status to a status tag
fn classify_exit(raw_status: libc::c_int) -> (VerdictStatus, Option<RunError>) {
    if libc::WIFEXITED(raw_status) {
        match libc::WEXITSTATUS(raw_status) {
            0 => (VerdictStatus::Ok, None),
            code => (VerdictStatus::RuntimeError, Some(RunError::ExitCode(code))),
        }
    } else if libc::WIFSIGNALED(raw_status) {
        let sig = libc::WTERMSIG(raw_status);
        let name = Signal::try_from(sig)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|_| format!("signal {}", sig));
        (VerdictStatus::RuntimeError, Some(RunError::Signal(name)))
    } else {
        (
            VerdictStatus::RuntimeError,
            Some(RunError::Io(format!("unexpected wait status {:#x}", raw_status))),
        )
    }
}

/// Non-blocking reap; `None` while the child is still running
fn try_reap(pid: libc::pid_t) -> io::Result<Option<(libc::c_int, libc::rusage)>> {
    let mut status: libc::c_int = 0;
    let mut usage = MaybeUninit::<libc::rusage>::zeroed();

    // SAFETY: both out-pointers are valid for the duration of the call
    let ret = unsafe { libc::wait4(pid, &mut status, libc::WNOHANG, usage.as_mut_ptr()) };

    match ret {
        0 => Ok(None),
        -1 => {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                Ok(None)
            } else {
                Err(err)
            }
        }
        // SAFETY: wait4 filled the struct for the reaped child
        _ => Ok(Some((status, unsafe { usage.assume_init() }))),
    }
}

fn sample_memory_kb(pid: libc::pid_t) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    parse_peak_kb(&status)
}

/// Largest of VmHWM/VmRSS from a /proc status file, in KB
fn parse_peak_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .filter_map(|line| {
            line.strip_prefix("VmHWM:")
                .or_else(|| line.strip_prefix("VmRSS:"))
        })
        .filter_map(|value| value.split_whitespace().next()?.parse::<u64>().ok())
        .max()
}

fn attach_aux_fd(fd: RawFd) -> io::Result<()> {
    if fd == AUX_FD {
        // dup2 onto itself would keep close-on-exec set
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
    } else {
        dup2(fd, AUX_FD)?;
    }
    Ok(())
}
