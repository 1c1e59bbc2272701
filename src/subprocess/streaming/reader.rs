//! Non-blocking reader over a blocking byte stream
//!
//! A background task owns the stream and awaits it continuously, pushing
//! each chunk it receives into an unbounded FIFO. Foreground callers only
//! ever wait on that FIFO, and never longer than the timeout they pass.

use super::types::{CloseReason, Drained, ReadOutcome, ReaderState, StreamSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Upper bound on the size of a single buffered unit
pub const READ_CHUNK_SIZE: usize = 4096;

/// A drain stops collecting once it holds at least this many bytes
pub const MAX_DRAIN_BYTES: usize = 64 * 1024;

/// Pollable, timeout-bounded view of one output stream.
///
/// The `ready` flag is edge-style: it is raised by the collection task the
/// first time data shows up and stays raised until the owner calls
/// [`reset_ready`](Self::reset_ready) (or drains). It says "something arrived
/// since the last reset", not "the buffer is non-empty".
pub struct NonBlockingReader {
    source: StreamSource,
    buffer: Mutex<UnboundedReceiver<Vec<u8>>>,
    ready: Arc<AtomicBool>,
    state: Arc<std::sync::Mutex<ReaderState>>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl NonBlockingReader {
    /// Take ownership of `stream` and start collecting from it immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<R>(source: StreamSource, stream: R, shutdown: CancellationToken) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let ready = Arc::new(AtomicBool::new(false));
        let state = Arc::new(std::sync::Mutex::new(ReaderState::Active));

        let handle = tokio::spawn(collect(
            source,
            stream,
            tx,
            Arc::clone(&ready),
            Arc::clone(&state),
            shutdown,
        ));

        tracing::debug!("Started {} collection task", source);

        Self {
            source,
            buffer: Mutex::new(rx),
            ready,
            state,
            handle: std::sync::Mutex::new(Some(handle)),
        }
    }

    pub fn source(&self) -> StreamSource {
        self.source
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn reset_ready(&self) {
        self.ready.store(false, Ordering::Release);
    }

    pub fn state(&self) -> ReaderState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the next buffered unit.
    ///
    /// With `None` or a zero timeout this never waits, not even for another
    /// consumer currently holding the buffer. Otherwise it waits at most
    /// `timeout` in total. `Closed` is only reported once every unit
    /// collected before the stream ended has been handed out.
    pub async fn read_unit(&self, timeout: Option<Duration>) -> ReadOutcome {
        match timeout.filter(|t| !t.is_zero()) {
            None => match self.buffer.try_lock() {
                Ok(mut rx) => self.receive(&mut rx, None).await,
                Err(_) => ReadOutcome::Empty,
            },
            Some(timeout) => {
                let deadline = tokio::time::Instant::now() + timeout;
                let Ok(mut rx) = tokio::time::timeout_at(deadline, self.buffer.lock()).await
                else {
                    return ReadOutcome::Empty;
                };
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    return self.receive(&mut rx, None).await;
                }
                self.receive(&mut rx, Some(remaining)).await
            }
        }
    }

    /// Collect units until none arrives within `quiescence`, then reset
    /// `ready`.
    ///
    /// This is `read_unit(Some(quiescence))` in a loop, holding the buffer for
    /// the whole drain so concurrent drains cannot interleave their output.
    /// The drain also stops once `limit` has elapsed or [`MAX_DRAIN_BYTES`]
    /// have been collected, so a stream that never goes quiet cannot hold the
    /// caller. Whatever is left stays buffered for the next drain.
    ///
    /// If units remain after the reset, `ready` is raised again so the data
    /// is not left behind without a signal.
    pub async fn drain(&self, quiescence: Duration, limit: Duration) -> Drained {
        let deadline = tokio::time::Instant::now() + limit;
        let mut drained = Drained::default();

        let Ok(mut rx) = tokio::time::timeout_at(deadline, self.buffer.lock()).await else {
            return drained;
        };

        while drained.data.len() < MAX_DRAIN_BYTES {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                tracing::trace!("{} drain hit its {:?} limit", self.source, limit);
                break;
            }

            let window = Some(quiescence.min(remaining)).filter(|w| !w.is_zero());
            match self.receive(&mut rx, window).await {
                ReadOutcome::Unit(chunk) => drained.data.extend_from_slice(&chunk),
                ReadOutcome::Empty => break,
                ReadOutcome::Closed(reason) => {
                    drained.closed = Some(reason);
                    break;
                }
            }
        }

        self.reset_ready();
        if !rx.is_empty() {
            self.ready.store(true, Ordering::Release);
        }

        drained
    }

    /// Wait for the collection task to finish.
    ///
    /// The task only finishes once the stream ends or the shutdown token is
    /// cancelled; call this after cancelling.
    pub async fn join(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("{} collection task panicked: {}", self.source, e);
            }
        }
    }

    async fn receive(
        &self,
        rx: &mut UnboundedReceiver<Vec<u8>>,
        timeout: Option<Duration>,
    ) -> ReadOutcome {
        let received = match timeout {
            None => match rx.try_recv() {
                Ok(chunk) => Some(chunk),
                Err(TryRecvError::Empty) => return ReadOutcome::Empty,
                Err(TryRecvError::Disconnected) => None,
            },
            Some(timeout) => match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(received) => received,
                Err(_) => return ReadOutcome::Empty,
            },
        };

        match received {
            Some(chunk) => ReadOutcome::Unit(chunk),
            None => ReadOutcome::Closed(self.close_reason()),
        }
    }

    fn close_reason(&self) -> CloseReason {
        match self.state() {
            ReaderState::Closed(reason) => reason,
            // The sender is dropped only after the state is recorded
            ReaderState::Active => CloseReason::EndOfStream,
        }
    }
}

async fn collect<R>(
    source: StreamSource,
    mut stream: R,
    tx: UnboundedSender<Vec<u8>>,
    ready: Arc<AtomicBool>,
    state: Arc<std::sync::Mutex<ReaderState>>,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    let reason = loop {
        let read = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break CloseReason::Shutdown,
            read = stream.read(&mut buf) => read,
        };

        match read {
            Ok(0) => break CloseReason::EndOfStream,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break CloseReason::Shutdown;
                }
                ready.store(true, Ordering::Release);
                tracing::trace!("Collected {} bytes from {}", n, source);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => break CloseReason::Io(e.to_string()),
        }
    };

    match &reason {
        CloseReason::Shutdown => tracing::debug!("{} collection stopped on shutdown", source),
        CloseReason::EndOfStream => tracing::warn!(
            "{} reached end of stream; no further output will be delivered",
            source
        ),
        CloseReason::Io(e) => tracing::warn!("{} collection failed: {}", source, e),
    }

    *state.lock().unwrap_or_else(PoisonError::into_inner) = ReaderState::Closed(reason);
    drop(tx);
}
