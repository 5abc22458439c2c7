//! Newline-delimited JSON framing for the command channel

use crate::protocol::{self, DecodeError, Incoming, Message};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Reads one request per line
pub struct RequestReader<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> RequestReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Next decoded request; `None` when the channel is closed
    ///
    /// Blank lines are skipped. Cancel-safe.
    pub async fn next(&mut self) -> io::Result<Option<Result<Incoming, DecodeError>>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("<- {}", line);
            return Ok(Some(protocol::decode(line)));
        }
        Ok(None)
    }
}

/// Non-blocking handle for queuing outbound messages
///
/// Cloneable; the writer task exits once every handle is dropped.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Message>,
}

impl Outbox {
    /// Outbox plus the receiving end, for callers that drain it themselves
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, message: Message) {
        if let Err(e) = self.tx.send(message) {
            warn!("Dropping outbound message, writer is gone: {:?}", e.0);
        }
    }
}

/// Spawn the single writer task; replies and pushes never interleave mid-line
pub fn spawn_writer<W>(writer: W) -> (Outbox, JoinHandle<io::Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox, rx) = Outbox::channel();
    let handle = tokio::spawn(write_loop(writer, rx));
    (outbox, handle)
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Message>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}
