//! Subprocess supervision for tool-backed streams
//!
//! Owns the `xz` child process, its pipe endpoints, the copier threads that
//! bridge the caller's stream to the child, and the cancellation watcher.
//! The close path reconciles pipe errors with the child's exit status so that
//! neither can mask the other: a pipe-close failure means data may not have
//! reached the tool and outranks a bad exit status.

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
#[cfg(unix)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(unix)]
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};
#[cfg(unix)]
use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::{Result, XzPipeError};
use crate::options::XzOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Compress,
    Decompress,
}

/// Argument vector for one invocation. Level and extreme mode only apply when
/// compressing; `--` terminates option parsing and `-` names stdin.
fn compose_args(mode: Mode, opts: &XzOptions) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let verbosity = if opts.verbose.is_some() { "--verbose" } else { "--quiet" };
    args.push(verbosity.to_string());
    match mode {
        Mode::Compress => {
            args.push("--compress".to_string());
            args.push("--stdout".to_string());
            args.push(format!("-{}", opts.level));
            if opts.extreme {
                args.push("--extreme".to_string());
            }
        }
        Mode::Decompress => {
            args.push("--decompress".to_string());
            args.push("--stdout".to_string());
        }
    }
    args.push("--".to_string());
    args.push("-".to_string());
    args
}

// Not ErrorKind::Interrupted: the std io loops treat that as retryable and
// would spin on a cancelled stream.
pub(crate) fn cancelled_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "xz stream cancelled")
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "xz stream already closed")
}

#[cfg(unix)]
fn apply_unix_options(command: &mut Command, opts: &XzOptions) {
    use std::os::unix::process::CommandExt;

    if opts.process_group {
        command.process_group(0);
    }
    if let Some(niceness) = opts.niceness {
        let priority = niceness as libc::c_int;
        // Runs in the forked child just before exec; a failure here aborts
        // the launch and surfaces as the spawn error.
        unsafe {
            command.pre_exec(move || {
                if libc::setpriority(libc::PRIO_PROCESS as _, 0, priority) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }
}

#[cfg(not(unix))]
fn apply_unix_options(_command: &mut Command, _opts: &XzOptions) {}

/// Kills the child when the stream's cancellation token fires. Disarmed (and
/// joined) before the child is reaped, so it can never signal a recycled pid.
#[cfg(unix)]
struct Watcher {
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    token: CancelToken,
}

#[cfg(unix)]
impl Watcher {
    fn arm(token: &CancelToken, pid: u32) -> Watcher {
        let done = Arc::new(AtomicBool::new(false));
        let thread_done = Arc::clone(&done);
        let thread_token = token.clone();
        let handle = thread::spawn(move || {
            if thread_token.wait(&thread_done) {
                debug!(pid, "cancellation fired, killing xz");
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGKILL);
                }
            }
        });
        Watcher {
            done,
            handle,
            token: token.clone(),
        }
    }

    fn disarm(self) {
        self.done.store(true, Ordering::Release);
        self.token.notify();
        if self.handle.join().is_err() {
            warn!("cancellation watcher panicked");
        }
    }
}

/// Tool-backed write path. Caller bytes go into the child's stdin; a copier
/// thread drains the child's stdout into the destination sink (a `Command`
/// cannot target an arbitrary `Write` directly).
pub(crate) struct ToolWriter<W: Write + Send + 'static> {
    child: Child,
    stdin: Option<ChildStdin>,
    drain: Option<JoinHandle<(W, io::Result<u64>)>>,
    stderr_copier: Option<JoinHandle<()>>,
    #[cfg(unix)]
    watcher: Option<Watcher>,
    token: CancelToken,
}

pub(crate) fn spawn_writer<W: Write + Send + 'static>(
    token: &CancelToken,
    xz: &Path,
    sink: W,
    mut opts: XzOptions,
) -> Result<ToolWriter<W>> {
    if token.is_cancelled() {
        return Err(XzPipeError::Io(cancelled_error()));
    }

    let args = compose_args(Mode::Compress, &opts);
    let verbose = opts.verbose.take();
    debug!(tool = %xz.display(), ?args, "starting xz compressor");

    let mut command = Command::new(xz);
    command
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(if verbose.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
    apply_unix_options(&mut command, &opts);

    let mut child = command.spawn()?;
    #[cfg(unix)]
    let pid = child.id();
    let stdin = match child.stdin.take() {
        Some(stdin) => stdin,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(XzPipeError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "xz stdin was not piped",
            )));
        }
    };
    let mut stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(XzPipeError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "xz stdout was not piped",
            )));
        }
    };

    let drain = thread::spawn(move || {
        let mut sink = sink;
        let result = io::copy(&mut stdout, &mut sink);
        (sink, result)
    });
    let stderr_copier = spawn_stderr_copier(&mut child, verbose);

    Ok(ToolWriter {
        child,
        stdin: Some(stdin),
        drain: Some(drain),
        stderr_copier,
        #[cfg(unix)]
        watcher: Some(Watcher::arm(token, pid)),
        token: token.clone(),
    })
}

fn spawn_stderr_copier(
    child: &mut Child,
    verbose: Option<Box<dyn Write + Send>>,
) -> Option<JoinHandle<()>> {
    match (child.stderr.take(), verbose) {
        (Some(mut stderr), Some(mut sink)) => Some(thread::spawn(move || {
            if let Err(e) = io::copy(&mut stderr, &mut sink) {
                debug!(error = %e, "xz diagnostics copy ended early");
            }
        })),
        _ => None,
    }
}

impl<W: Write + Send + 'static> ToolWriter<W> {
    pub(crate) fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write(buf),
            None => Err(closed_error()),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.flush(),
            None => Err(closed_error()),
        }
    }

    /// Close the child's input, wait for it to exit and drain the copiers.
    /// Error precedence: pipe close, then exit status, then sink copy. The
    /// sink comes back whenever the copier thread completed.
    pub(crate) fn reconcile(&mut self) -> (Option<W>, Result<()>) {
        #[cfg(unix)]
        if let Some(watcher) = self.watcher.take() {
            watcher.disarm();
        }
        if self.token.is_cancelled() {
            let _ = self.child.kill();
        }

        // Dropping our stdin end signals end-of-input to the child.
        let pipe_result = match self.stdin.take() {
            Some(mut stdin) => stdin.flush(),
            None => Ok(()),
        };

        let wait_result = self.child.wait();
        if let Ok(status) = &wait_result {
            debug!(status = %status, "xz compressor exited");
        }

        let (sink, drain_result) = match self.drain.take() {
            Some(handle) => match handle.join() {
                Ok((sink, result)) => (Some(sink), result.map(|_| ())),
                Err(_) => (
                    None,
                    Err(io::Error::new(
                        io::ErrorKind::Other,
                        "output copier panicked",
                    )),
                ),
            },
            None => (None, Ok(())),
        };
        if let Some(handle) = self.stderr_copier.take() {
            let _ = handle.join();
        }

        let result = if let Err(e) = pipe_result {
            Err(XzPipeError::Io(e))
        } else {
            match wait_result {
                Err(e) => Err(XzPipeError::Io(e)),
                Ok(status) if !status.success() => Err(XzPipeError::ToolFailed(status)),
                Ok(_) => drain_result.map_err(XzPipeError::Io),
            }
        };
        (sink, result)
    }
}

/// Tool-backed read path. A copier thread feeds the caller's source into the
/// child's stdin; the adapter reads decompressed bytes from the child's
/// stdout. The first end-of-stream or read error triggers exactly one wait,
/// and a non-zero exit replaces the benign outcome so truncated input never
/// passes as a clean end-of-stream.
pub(crate) struct ToolReader {
    child: Child,
    stdout: Option<ChildStdout>,
    feed: Option<JoinHandle<()>>,
    stderr_copier: Option<JoinHandle<()>>,
    #[cfg(unix)]
    watcher: Option<Watcher>,
    reconciled: Option<ExitStatus>,
}

pub(crate) fn spawn_reader<R: Read + Send + 'static>(
    token: &CancelToken,
    xz: &Path,
    source: R,
    mut opts: XzOptions,
) -> Result<ToolReader> {
    if token.is_cancelled() {
        return Err(XzPipeError::Io(cancelled_error()));
    }

    let args = compose_args(Mode::Decompress, &opts);
    let verbose = opts.verbose.take();
    debug!(tool = %xz.display(), ?args, "starting xz decompressor");

    let mut command = Command::new(xz);
    command
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(if verbose.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
    apply_unix_options(&mut command, &opts);

    let mut child = command.spawn()?;
    #[cfg(unix)]
    let pid = child.id();
    let mut stdin = match child.stdin.take() {
        Some(stdin) => stdin,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(XzPipeError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "xz stdin was not piped",
            )));
        }
    };
    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(XzPipeError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "xz stdout was not piped",
            )));
        }
    };

    let feed = thread::spawn(move || {
        let mut source = source;
        match io::copy(&mut source, &mut stdin) {
            Ok(n) => trace!(bytes = n, "fed compressed input to xz"),
            // Normal when the child stops reading, e.g. on corrupt input.
            Err(e) => debug!(error = %e, "input feed ended early"),
        }
        // stdin drops here, closing the child's input.
    });
    let stderr_copier = spawn_stderr_copier(&mut child, verbose);

    Ok(ToolReader {
        child,
        stdout: Some(stdout),
        feed: Some(feed),
        stderr_copier,
        #[cfg(unix)]
        watcher: Some(Watcher::arm(token, pid)),
        reconciled: None,
    })
}

impl ToolReader {
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(status) = self.reconciled {
            return if status.success() {
                Ok(0)
            } else {
                Err(XzPipeError::ToolFailed(status).into())
            };
        }
        let stdout = match self.stdout.as_mut() {
            Some(stdout) => stdout,
            None => return Err(closed_error()),
        };
        match stdout.read(buf) {
            Ok(0) => {
                let status = self.wait_once()?;
                if status.success() {
                    Ok(0)
                } else {
                    Err(XzPipeError::ToolFailed(status).into())
                }
            }
            Ok(n) => Ok(n),
            Err(e) => {
                // A wait error supersedes the read error, per the close
                // precedence; so does a non-zero exit.
                let status = self.wait_once()?;
                if status.success() {
                    Err(e)
                } else {
                    Err(XzPipeError::ToolFailed(status).into())
                }
            }
        }
    }

    /// One wait per stream; the exit status is cached so every later read
    /// reproduces the same outcome.
    fn wait_once(&mut self) -> io::Result<ExitStatus> {
        #[cfg(unix)]
        if let Some(watcher) = self.watcher.take() {
            watcher.disarm();
        }
        let status = self.child.wait()?;
        debug!(status = %status, "xz decompressor exited");
        self.reconciled = Some(status);
        Ok(status)
    }

    /// Best-effort release: kill a child that is still mid-stream, reap it,
    /// and collect whichever copier threads have already finished.
    pub(crate) fn close(&mut self) -> Result<()> {
        #[cfg(unix)]
        if let Some(watcher) = self.watcher.take() {
            watcher.disarm();
        }
        drop(self.stdout.take());
        if self.reconciled.is_none() {
            trace!("reader closed before end-of-stream, terminating xz");
            let _ = self.child.kill();
            let status = self.child.wait().map_err(XzPipeError::Io)?;
            self.reconciled = Some(status);
        }
        // The feed thread exits once the source ends or the child's stdin
        // breaks; joining it unconditionally could hang on a blocked source.
        if let Some(handle) = self.feed.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                trace!("detaching input feed still blocked on the source");
            }
        }
        if let Some(handle) = self.stderr_copier.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
        Ok(())
    }
}
