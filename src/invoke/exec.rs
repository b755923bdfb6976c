//! Plugin subprocess execution
//!
//! A plugin call is a synchronous request/response exchange: the
//! configuration goes to stdin, the result (or a structured error) comes
//! back on stdout, diagnostics on stderr.

use super::args::InvokeArgs;
use crate::error::{Error, Result};
use crate::types::{CniResult, PluginError};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use std::io::{self, Read, Write};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

const SPAWN_ATTEMPTS: u32 = 5;

/// Cancellation signal shared between a caller and in-flight plugin calls
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; running plugins are killed
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Bounds on a single plugin execution
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecLimits<'a> {
    pub timeout: Option<Duration>,
    pub cancel: Option<&'a CancelToken>,
}

/// Run an ADD-style call and decode its result
pub fn exec_plugin_with_result(
    plugin: &Path,
    stdin: &[u8],
    args: &InvokeArgs,
    limits: &ExecLimits<'_>,
) -> Result<CniResult> {
    let stdout = exec_plugin(plugin, stdin, args, limits)?;
    serde_json::from_slice(&stdout).map_err(|source| Error::MalformedOutput {
        plugin: plugin.to_path_buf(),
        source,
    })
}

/// Run a DEL-style call; any output on success is ignored
pub fn exec_plugin_without_result(
    plugin: &Path,
    stdin: &[u8],
    args: &InvokeArgs,
    limits: &ExecLimits<'_>,
) -> Result<()> {
    exec_plugin(plugin, stdin, args, limits).map(|_| ())
}

/// Run a plugin and return its stdout on success
///
/// On a non-zero exit, stdout is decoded as a `PluginError`; if that fails
/// the error carries the exit status and stderr instead.
///
/// The timeout bounds the whole call, including draining output a
/// background child of the plugin may still hold open.
pub fn exec_plugin(
    plugin: &Path,
    stdin: &[u8],
    args: &InvokeArgs,
    limits: &ExecLimits<'_>,
) -> Result<Vec<u8>> {
    if limits.is_cancelled() {
        return Err(Error::Cancelled {
            plugin: plugin.to_path_buf(),
        });
    }

    debug!(
        plugin = %plugin.display(),
        verb = %args.verb,
        container_id = %args.container_id,
        if_name = %args.if_name,
        "executing plugin"
    );

    let start = Instant::now();
    let mut child = spawn(plugin, args)?;

    let (tx, rx) = mpsc::channel();
    let mut pending = 0;
    if let Some(mut pipe) = child.stdin.take() {
        let data = stdin.to_vec();
        let tx = tx.clone();
        // Dropping the pipe closes the plugin's stdin
        thread::spawn(move || {
            let _ = tx.send(Stream::Stdin(pipe.write_all(&data)));
        });
        pending += 1;
    }
    if let Some(pipe) = child.stdout.take() {
        drain(pipe, tx.clone(), Stream::Stdout);
        pending += 1;
    }
    if let Some(pipe) = child.stderr.take() {
        drain(pipe, tx.clone(), Stream::Stderr);
        pending += 1;
    }
    drop(tx);

    let status = wait(&mut child, plugin, limits, start)?;
    let output = collect(&rx, pending, plugin, limits, start)?;

    if let Some(e) = output.stdin_error {
        // Plugins are free to exit without reading their input
        if e.kind() != io::ErrorKind::BrokenPipe {
            return Err(Error::StdinWrite {
                plugin: plugin.to_path_buf(),
                source: e,
            });
        }
    }

    debug!(plugin = %plugin.display(), status = %describe_status(status), "plugin exited");

    if status.success() {
        return Ok(output.stdout);
    }

    if let Ok(plugin_error) = serde_json::from_slice::<PluginError>(&output.stdout) {
        return Err(Error::Plugin(plugin_error));
    }

    Err(Error::PluginFailed {
        plugin: plugin.to_path_buf(),
        status: describe_status(status),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

impl ExecLimits<'_> {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    /// Timeout or cancellation error once either has been reached
    fn check(&self, plugin: &Path, start: Instant) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled {
                plugin: plugin.to_path_buf(),
            });
        }
        match self.timeout {
            Some(timeout) if start.elapsed() > timeout => Err(Error::Timeout {
                plugin: plugin.to_path_buf(),
                timeout,
            }),
            _ => Ok(()),
        }
    }
}

/// Message from a pipe thread
enum Stream {
    Stdin(io::Result<()>),
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

#[derive(Default)]
struct Output {
    stdin_error: Option<io::Error>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn spawn(plugin: &Path, args: &InvokeArgs) -> Result<Child> {
    let env = args.as_env();
    let mut attempt = 0;
    loop {
        attempt += 1;
        let spawned = Command::new(plugin)
            .envs(env.iter().map(|(k, v)| (*k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        match spawned {
            Ok(child) => return Ok(child),
            // The binary is still open for writing somewhere (install in progress)
            Err(e)
                if e.raw_os_error() == Some(Errno::ETXTBSY as i32)
                    && attempt < SPAWN_ATTEMPTS =>
            {
                thread::sleep(Duration::from_millis(20 * u64::from(attempt)));
            }
            Err(e) => {
                return Err(Error::Spawn {
                    plugin: plugin.to_path_buf(),
                    source: e,
                });
            }
        }
    }
}

/// Wait for the child, enforcing timeout and cancellation
///
/// A token cancelled while the plugin ran wins over its exit status.
fn wait(
    child: &mut Child,
    plugin: &Path,
    limits: &ExecLimits<'_>,
    start: Instant,
) -> Result<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if limits.is_cancelled() {
                    return Err(Error::Cancelled {
                        plugin: plugin.to_path_buf(),
                    });
                }
                return Ok(status);
            }
            Ok(None) => {
                if let Err(e) = limits.check(plugin, start) {
                    terminate(child);
                    return Err(e);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                terminate(child);
                return Err(Error::Wait {
                    plugin: plugin.to_path_buf(),
                    source: e,
                });
            }
        }
    }
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    // Reap so no zombie is left behind
    let _ = child.wait();
}

fn drain<R>(mut pipe: R, tx: Sender<Stream>, wrap: fn(Vec<u8>) -> Stream)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(wrap(buf));
    });
}

/// Gather what the pipe threads produced, within the call's limits
///
/// Pipes stay open as long as any process holds them, so a plugin that
/// leaves a child behind would otherwise block here indefinitely.
fn collect(
    rx: &Receiver<Stream>,
    mut pending: usize,
    plugin: &Path,
    limits: &ExecLimits<'_>,
    start: Instant,
) -> Result<Output> {
    let mut output = Output::default();
    while pending > 0 {
        limits.check(plugin, start)?;
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Stream::Stdin(written)) => output.stdin_error = written.err(),
            Ok(Stream::Stdout(buf)) => output.stdout = buf,
            Ok(Stream::Stderr(buf)) => output.stderr = buf,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
        pending -= 1;
    }
    Ok(output)
}

fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {}", code);
    }
    match status.signal() {
        Some(sig) => match Signal::try_from(sig) {
            Ok(signal) => format!("killed by {}", signal.as_str()),
            Err(_) => format!("killed by signal {}", sig),
        },
        None => "unknown exit status".to_string(),
    }
}
