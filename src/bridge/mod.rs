//! Bridge between the request/response transport and the interactive shell
//!
//! [`ProcessBridge`] owns the shell process, writes commands to its input
//! and drains whatever it printed on stdout and stderr through one
//! [`NonBlockingReader`] per stream. Reads never wait on the process itself,
//! only on the readers' buffers for at most the quiescence window.
//!
//! Output has no framing: a drain returns whatever arrived before the stream
//! went quiet for one window, so a slow command's output may be split across
//! several drains. Bytes are never dropped or repeated between drains of the
//! same stream.

mod error;

#[cfg(test)]
mod tests;

pub use error::BridgeError;

use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ShellConfig;
use crate::notify::OutputMonitor;
use crate::subprocess::{
    terminate_group, ExitStatus, InteractiveProcess, NonBlockingReader, ProcessCommandBuilder,
    ProcessError, ReaderState, StreamSource,
};

/// How long shutdown waits for the shell to exit before killing it
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Default drain limit, in quiescence windows
pub const DEFAULT_DRAIN_WINDOWS: u32 = 3;

pub struct ProcessBridge {
    child: Mutex<Child>,
    pid: Option<u32>,
    stdin: Mutex<Option<ChildStdin>>,
    stdout: NonBlockingReader,
    stderr: NonBlockingReader,
    quiescence: Duration,
    max_drain: Duration,
    shutdown: CancellationToken,
}

impl ProcessBridge {
    /// Start the configured shell and change into its home directory.
    ///
    /// The `cd` is sent as the first line of input, so a missing directory
    /// shows up as an error on the shell's stderr rather than failing here.
    pub async fn spawn(shell: &ShellConfig, quiescence: Duration) -> Result<Self, BridgeError> {
        let command = ProcessCommandBuilder::new(&shell.program)
            .args(&shell.args)
            .envs(&shell.env)
            .build();

        let process = InteractiveProcess::spawn(&command)?;
        let bridge = Self::attach(process, quiescence);

        if let Some(home) = &shell.home_dir {
            let home = home.to_string_lossy();
            debug!("Changing shell directory to {}", home);
            bridge
                .write_stdin(&format!("cd {}", shell_words::quote(&home)))
                .await?;
        }

        info!(
            "Shell bridge started: {} (pid {:?})",
            shell.program, bridge.pid
        );

        Ok(bridge)
    }

    /// Wrap an already running process, starting one reader per output pipe.
    pub fn attach(process: InteractiveProcess, quiescence: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let pid = process.id();

        let stdout =
            NonBlockingReader::spawn(StreamSource::Stdout, process.stdout, shutdown.child_token());
        let stderr =
            NonBlockingReader::spawn(StreamSource::Stderr, process.stderr, shutdown.child_token());

        Self {
            child: Mutex::new(process.child),
            pid,
            stdin: Mutex::new(Some(process.stdin)),
            stdout,
            stderr,
            quiescence,
            max_drain: quiescence.saturating_mul(DEFAULT_DRAIN_WINDOWS),
            shutdown,
        }
    }

    /// Bound every drain to `max_drain`, however busy the stream is.
    pub fn with_max_drain(mut self, max_drain: Duration) -> Self {
        self.max_drain = max_drain;
        self
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn quiescence_window(&self) -> Duration {
        self.quiescence
    }

    pub fn max_drain(&self) -> Duration {
        self.max_drain
    }

    /// Write one line of input and flush it straight through to the shell.
    pub async fn write_stdin(&self, text: &str) -> Result<(), BridgeError> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(BridgeError::StdinClosed)?;

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        }
        .await;

        if let Err(e) = written {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                // Nobody will ever read this pipe again
                *guard = None;
            }
            return Err(BridgeError::Stdin(e));
        }

        Ok(())
    }

    pub async fn drain_stdout(&self) -> Result<Vec<u8>, BridgeError> {
        self.drain(StreamSource::Stdout).await
    }

    pub async fn drain_stderr(&self) -> Result<Vec<u8>, BridgeError> {
        self.drain(StreamSource::Stderr).await
    }

    /// Collect everything `source` produced until it goes quiet, and re-arm
    /// its ready flag.
    ///
    /// A drain never takes longer than [`max_drain`](Self::max_drain); output
    /// that keeps coming is left for the next drain. Output collected before the stream closed is returned first; only a
    /// drain that finds the stream closed and nothing left fails with
    /// [`BridgeError::StreamClosed`].
    pub async fn drain(&self, source: StreamSource) -> Result<Vec<u8>, BridgeError> {
        let drained = self
            .reader(source)
            .drain(self.quiescence, self.max_drain)
            .await;

        match drained.closed {
            Some(reason) if drained.data.is_empty() => Err(BridgeError::StreamClosed {
                stream: source,
                reason,
            }),
            _ => Ok(drained.data),
        }
    }

    pub fn has_pending_output(&self) -> bool {
        self.stdout.is_ready() || self.stderr.is_ready()
    }

    pub fn acknowledge_pending(&self) {
        self.stdout.reset_ready();
        self.stderr.reset_ready();
    }

    pub fn reader_state(&self, source: StreamSource) -> ReaderState {
        self.reader(source).state()
    }

    /// Exit status of the shell, or `None` while it is still running
    pub async fn status(&self) -> Result<Option<ExitStatus>, BridgeError> {
        let mut child = self.child.lock().await;
        let status = child.try_wait().map_err(ProcessError::Io)?;
        Ok(status.map(ExitStatus::from))
    }

    /// Stop the readers and the shell, then wait for the readers to finish.
    ///
    /// Input is closed first, then the shell's process group gets SIGTERM and
    /// [`SHUTDOWN_GRACE`] to exit before it is killed. Calling this again is
    /// a no-op.
    pub async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }

        info!("Shutting down shell bridge");

        // Decided before cancelling, which closes both readers
        let reaped = matches!(self.child.lock().await.try_wait(), Ok(Some(_)));
        let pipes_open =
            !(self.stdout.state().is_closed() && self.stderr.state().is_closed());

        self.shutdown.cancel();
        self.stdin.lock().await.take();

        if let Some(pid) = self.pid {
            if should_signal_group(reaped, pipes_open) {
                if let Err(e) = terminate_group(pid) {
                    debug!("Could not signal shell process group {}: {}", pid, e);
                }
            } else {
                debug!("Shell {} already exited, not signalling its group", pid);
            }
        }

        {
            let mut child = self.child.lock().await;
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!("Shell exited: {:?}", ExitStatus::from(status)),
                Ok(Err(e)) => warn!("Failed to wait for shell: {}", e),
                Err(_) => {
                    warn!("Shell did not exit within {:?}, killing it", SHUTDOWN_GRACE);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill shell: {}", e);
                    }
                }
            }
        }

        self.stdout.join().await;
        self.stderr.join().await;

        info!("Shell bridge stopped");
    }

    fn reader(&self, source: StreamSource) -> &NonBlockingReader {
        match source {
            StreamSource::Stdout => &self.stdout,
            StreamSource::Stderr => &self.stderr,
        }
    }
}

/// Whether shutdown should SIGTERM the shell's process group.
///
/// Once the shell is reaped its pid may be reused, so the group is only
/// signalled if something still holds the output pipes open. A background
/// job doing so keeps the group, and with it the id, alive.
fn should_signal_group(reaped: bool, pipes_open: bool) -> bool {
    !reaped || pipes_open
}

impl OutputMonitor for ProcessBridge {
    fn has_pending_output(&self) -> bool {
        ProcessBridge::has_pending_output(self)
    }

    fn acknowledge_pending(&self) {
        ProcessBridge::acknowledge_pending(self)
    }
}
