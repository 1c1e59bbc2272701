//! Terminal client for a [`Characteristic`]
//!
//! Every input line is written to the characteristic as-is. A few control
//! lines stand in for the other client operations:
//!
//! - `:read` reads and prints the current output
//! - `:subscribe` / `:unsubscribe` toggle value-changed events
//!
//! While subscribed, each value-changed event triggers a read whose output
//! is printed. The session ends on end of input, on cancellation, or once
//! the shell has terminated. At end of input, output already on its way is
//! read one last time so piped commands still show their results.

use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, Instrument};
use uuid::Uuid;

use super::{Characteristic, TransportError};
use crate::error::Result;
use crate::notify::ValueChangedSink;

/// Forwards value-changed events to a console session
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ValueChangedSink for ConsoleSink {
    fn value_changed(&self, value: &[u8]) -> std::result::Result<(), TransportError> {
        self.tx
            .send(value.to_vec())
            .map_err(|_| TransportError::Failed("console session is gone".to_string()))
    }
}

/// Create the sink handed to the characteristic and the receiver handed to
/// [`run`].
pub fn channel() -> (Arc<ConsoleSink>, mpsc::UnboundedReceiver<Vec<u8>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ConsoleSink { tx }), rx)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Read,
    Subscribe,
    Unsubscribe,
    Write(String),
}

impl ConsoleCommand {
    /// Only exact control words are treated specially; anything else,
    /// including the shell's own `:` builtin, is shell input and is passed on
    /// byte for byte.
    pub fn parse(line: &str) -> Self {
        match line.trim_end_matches('\r') {
            ":read" => ConsoleCommand::Read,
            ":subscribe" => ConsoleCommand::Subscribe,
            ":unsubscribe" => ConsoleCommand::Unsubscribe,
            _ => ConsoleCommand::Write(line.to_string()),
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Run a console session until input ends, `cancel` fires, or the shell
/// terminates.
///
/// The session subscribes to value-changed events on start.
pub async fn run<C, R, W>(
    characteristic: &C,
    mut events: mpsc::UnboundedReceiver<Vec<u8>>,
    input: R,
    mut output: W,
    cancel: CancellationToken,
) -> Result<()>
where
    C: Characteristic + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session = Uuid::new_v4();
    let span = info_span!("console", %session);

    async move {
        info!("Console session started");
        characteristic.start_notify().await?;

        let mut lines = input.lines();
        let mut events_open = true;

        loop {
            let flow = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Console session cancelled");
                    Flow::Stop
                }
                line = lines.next_line() => match line? {
                    Some(line) => {
                        let command = ConsoleCommand::parse(&line);
                        until_cancelled(&cancel, handle_command(characteristic, command, &mut output))
                            .await?
                    }
                    None => {
                        debug!("End of console input, collecting remaining output");
                        until_cancelled(&cancel, print_output(characteristic, &mut output)).await?;
                        Flow::Stop
                    }
                },
                event = events.recv(), if events_open => match event {
                    Some(_) => {
                        // One read covers every event queued so far
                        while events.try_recv().is_ok() {}
                        trace!("Value changed, reading output");
                        until_cancelled(&cancel, print_output(characteristic, &mut output)).await?
                    }
                    None => {
                        events_open = false;
                        Flow::Continue
                    }
                },
            };

            if let Flow::Stop = flow {
                break;
            }
        }

        if let Err(e) = characteristic.stop_notify().await {
            debug!("Failed to unsubscribe: {}", e);
        }
        output.flush().await?;
        info!("Console session ended");
        Ok(())
    }
    .instrument(span)
    .await
}

/// Run one client operation, giving up as soon as the session is cancelled
async fn until_cancelled<F>(cancel: &CancellationToken, operation: F) -> Result<Flow>
where
    F: Future<Output = Result<Flow>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Console session cancelled during an operation");
            Ok(Flow::Stop)
        }
        flow = operation => flow,
    }
}

async fn handle_command<C, W>(
    characteristic: &C,
    command: ConsoleCommand,
    output: &mut W,
) -> Result<Flow>
where
    C: Characteristic + ?Sized,
    W: AsyncWrite + Unpin,
{
    let result = match command {
        ConsoleCommand::Read => return print_output(characteristic, output).await,
        ConsoleCommand::Subscribe => characteristic.start_notify().await,
        ConsoleCommand::Unsubscribe => characteristic.stop_notify().await,
        ConsoleCommand::Write(line) => characteristic.write_value(line.as_bytes()).await,
    };

    match result {
        Ok(()) => Ok(Flow::Continue),
        Err(e) => report(e, output).await,
    }
}

async fn print_output<C, W>(characteristic: &C, output: &mut W) -> Result<Flow>
where
    C: Characteristic + ?Sized,
    W: AsyncWrite + Unpin,
{
    match characteristic.read_value().await {
        Ok(value) => {
            output.write_all(&value).await?;
            output.flush().await?;
            Ok(Flow::Continue)
        }
        Err(e) => report(e, output).await,
    }
}

async fn report<W>(err: TransportError, output: &mut W) -> Result<Flow>
where
    W: AsyncWrite + Unpin,
{
    output
        .write_all(format!("[{}] {}\n", err.dbus_name(), err).as_bytes())
        .await?;
    output.flush().await?;

    match err {
        TransportError::ProcessTerminated => Ok(Flow::Stop),
        _ => Ok(Flow::Continue),
    }
}
