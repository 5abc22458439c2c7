//! Daemon lifecycle: dispatch commands, forward events, decide the exit code

use crate::ipc::{Outbox, RequestReader};
use crate::protocol::{Incoming, Message, Request};
use serde_json::{json, Value};
use std::fmt::Display;
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{error, info, warn};
use watcher::{PollEngine, Signal, WatchConfig, WatchError, WatchedEntry};

/// How the daemon ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Stop command, closed channel or interrupt
    Graceful,
    /// Bad start configuration, missing start root or lost root
    Failure,
}

impl Exit {
    pub fn code(self) -> i32 {
        match self {
            Exit::Graceful => 0,
            Exit::Failure => 1,
        }
    }
}

/// Owns the engine and the outbound side of the channel
pub struct Daemon {
    engine: Option<PollEngine>,
    outbox: Outbox,
    signals_tx: mpsc::UnboundedSender<Signal>,
    signals_rx: Option<mpsc::UnboundedReceiver<Signal>>,
}

impl Daemon {
    pub fn new(outbox: Outbox) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            engine: None,
            outbox,
            signals_tx,
            signals_rx: Some(signals_rx),
        }
    }

    /// Serve until a stop, a closed channel or a fatal fault
    ///
    /// With `initial` set the watcher starts before any command is read.
    pub async fn run<R>(mut self, mut requests: RequestReader<R>, initial: Option<WatchConfig>) -> Exit
    where
        R: AsyncBufRead + Unpin,
    {
        let Some(mut signals) = self.signals_rx.take() else {
            error!("Daemon::run called twice");
            return Exit::Failure;
        };

        self.outbox.send(Message::Ready);

        if let Some(config) = initial {
            if let Err(err) = self.start(config).await {
                self.fail(&err);
                return Exit::Failure;
            }
        }

        loop {
            tokio::select! {
                Some(signal) = signals.recv() => match signal {
                    Signal::Change(event) => self.outbox.send(Message::Change { event }),
                    Signal::Fatal(err) => {
                        self.fail(&err);
                        self.shutdown().await;
                        return Exit::Failure;
                    }
                },
                frame = requests.next() => match frame {
                    Ok(Some(Ok(incoming))) => {
                        if let Some(exit) = self.handle(incoming).await {
                            return exit;
                        }
                    }
                    Ok(Some(Err(decode))) => {
                        warn!("{}", decode);
                        self.outbox.send(Message::failure(decode.id, &decode));
                        if decode.is_start() {
                            self.fail(&decode);
                            self.shutdown().await;
                            return Exit::Failure;
                        }
                    }
                    Ok(None) => {
                        info!("Command channel closed");
                        self.shutdown().await;
                        return Exit::Graceful;
                    }
                    Err(e) => {
                        error!("Failed to read command channel: {}", e);
                        self.shutdown().await;
                        return Exit::Failure;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    self.shutdown().await;
                    return Exit::Graceful;
                }
            }
        }
    }

    /// Reply to one request; returns the exit when the request ends the process
    pub async fn handle(&mut self, incoming: Incoming) -> Option<Exit> {
        let Incoming { id, request } = incoming;

        match request {
            Request::Stop => {
                self.outbox.send(Message::reply(Some(id), json!(true)));
                self.shutdown().await;
                Some(Exit::Graceful)
            }
            Request::Start { config } => match self.start(config).await {
                Ok(files) => {
                    self.outbox.send(Message::reply(Some(id), json!(files)));
                    None
                }
                Err(err) => {
                    self.outbox.send(Message::failure(Some(id), &err));
                    // A repeated start leaves the running engine alone; any
                    // other start failure ends the process
                    if matches!(err, WatchError::AlreadyRunning) {
                        warn!("Start failed: {}", err);
                        return None;
                    }
                    self.fail(&err);
                    self.shutdown().await;
                    Some(Exit::Failure)
                }
            },
            request => {
                let message = match self.dispatch(request).await {
                    Ok(data) => Message::reply(Some(id), data),
                    Err(err) => {
                        warn!("Request {} failed: {}", id, err);
                        Message::failure(Some(id), &err)
                    }
                };
                self.outbox.send(message);
                None
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Result<Value, WatchError> {
        let engine = self.engine.as_ref().ok_or(WatchError::NotStarted)?;

        match request {
            Request::Add { path } => engine.add(path, false).await?,
            Request::AddRecursive { path } => engine.add(path, true).await?,
            Request::Remove { path } => engine.remove(path).await?,
            Request::RemoveRecursive { path } => engine.remove_recursive(path).await?,
            Request::Ignore { paths } => engine.ignore(paths).await?,
            Request::GetWatchedFiles => return Ok(json!(engine.watched_files().await?)),
            Request::Start { .. } | Request::Stop => {
                return Err(WatchError::Config("unexpected lifecycle request".to_string()))
            }
        }
        Ok(json!(true))
    }

    /// Validate, enumerate the roots, then begin ticking
    async fn start(&mut self, config: WatchConfig) -> Result<Vec<WatchedEntry>, WatchError> {
        if self.engine.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        let interval = config.interval()?;
        let roots = config.roots();
        let mut engine = task::spawn_blocking(move || PollEngine::from_config(&config)).await??;
        let files = engine.watched_files().await?;

        engine.start(interval, self.signals_tx.clone())?;
        info!("Watching {} root(s), {} entries", roots.len(), files.len());

        self.engine = Some(engine);
        Ok(files)
    }

    fn fail(&self, err: &impl Display) {
        error!("Fatal: {}", err);
        self.outbox.send(Message::Error {
            message: err.to_string(),
        });
    }

    async fn shutdown(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.stop().await;
        }
    }
}
