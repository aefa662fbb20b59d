//! Helpers for running child processes: bounded probes and line streaming.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured output of a short-lived command.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Run a command with a timeout, capturing stdout/stderr without risking pipe deadlocks.
///
/// Used for quick probes (`--version`); the child is killed when `timeout` elapses.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
pub fn run_command_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_all(stdout));
    let stderr_handle = thread::spawn(move || read_all(stderr));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let stdout = join_reader(stdout_handle).context("join stdout")?;
    let stderr = join_reader(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// A single line emitted by a streamed child process (without the newline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    Stdout(String),
    Stderr(String),
}

/// Run a command to completion, delivering each output line to `on_line` as it arrives.
///
/// `stdin`, when given, is written in full and then closed before output is
/// consumed. Lines from stdout and stderr are interleaved in arrival order.
/// `on_stdin_closed` runs once the input has been delivered.
#[instrument(skip_all, fields(with_stdin = stdin.is_some()))]
pub fn stream_command<F, G>(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    on_stdin_closed: G,
    mut on_line: F,
) -> Result<ExitStatus>
where
    F: FnMut(StreamLine),
    G: FnOnce(),
{
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning streamed child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        kill_and_reap(&mut child);
        return Err(anyhow!("stdout/stderr were not piped"));
    };

    let (tx, rx) = mpsc::channel::<Result<StreamLine>>();
    let stdout_tx = tx.clone();
    let stdout_handle = thread::spawn(move || forward_lines(stdout, stdout_tx, StreamLine::Stdout));
    let stderr_handle = thread::spawn(move || forward_lines(stderr, tx, StreamLine::Stderr));

    if let Some(input) = stdin {
        let write = match child.stdin.take() {
            // Dropping the handle at the end of this arm closes the pipe so the child sees EOF.
            Some(mut child_stdin) => child_stdin.write_all(input),
            None => Err(io::Error::other("stdin was not piped")),
        };
        match write {
            Ok(()) => {}
            // The child stopped reading early; its output is still collected below.
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!(bytes = input.len(), "child closed stdin before reading all input");
            }
            Err(err) => {
                kill_and_reap(&mut child);
                drop(rx);
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(anyhow::Error::new(err).context("write stdin"));
            }
        }
    }
    on_stdin_closed();

    // Both senders are owned by the reader threads; the loop ends when both hit EOF.
    let mut read_error = None;
    for message in rx {
        match message {
            Ok(line) => on_line(line),
            Err(err) => {
                warn!(err = %err, "failed to read child output");
                read_error.get_or_insert(err);
            }
        }
    }

    let status = child.wait().context("wait for streamed command")?;
    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    if let Some(err) = read_error {
        return Err(err.context("read child output"));
    }
    debug!(exit_code = ?status.code(), "streamed command finished");
    Ok(status)
}

/// Kill a child that is being abandoned and wait for it so it does not linger.
fn kill_and_reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(err = %err, "kill child (already exited?)");
    }
    if let Err(err) = child.wait() {
        warn!(err = %err, "failed to reap child process");
    }
}

fn forward_lines<R: Read>(
    reader: R,
    tx: mpsc::Sender<Result<StreamLine>>,
    wrap: fn(String) -> StreamLine,
) {
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if tx.send(Ok(wrap(text))).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(Err(anyhow::Error::new(err)));
                break;
            }
        }
    }
}

fn read_all<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).context("read output")?;
    Ok(buf)
}

fn join_reader(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}
