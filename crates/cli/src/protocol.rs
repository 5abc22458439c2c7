//! Messages exchanged over the command channel

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;
use watcher::{Event, WatchConfig};

/// A typed command from the caller
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Request {
    Start { config: WatchConfig },
    Add { path: PathBuf },
    AddRecursive { path: PathBuf },
    Remove { path: PathBuf },
    RemoveRecursive { path: PathBuf },
    Ignore { paths: Vec<PathBuf> },
    GetWatchedFiles,
    Stop,
}

/// A request plus the token its reply must carry
#[derive(Debug, Clone)]
pub struct Incoming {
    pub id: u64,
    pub request: Request,
}

/// A line that could not be turned into a [`Request`]
///
/// Carries whatever could be recovered so the reply can still be correlated.
#[derive(Error, Debug)]
#[error("malformed request: {message}")]
pub struct DecodeError {
    pub id: Option<u64>,
    pub command: Option<String>,
    pub message: String,
}

impl DecodeError {
    /// A broken start payload is a configuration error
    pub fn is_start(&self) -> bool {
        self.command.as_deref() == Some("start")
    }
}

/// Decode one request line
pub fn decode(line: &str) -> Result<Incoming, DecodeError> {
    let value: Value = serde_json::from_str(line).map_err(|e| DecodeError {
        id: None,
        command: None,
        message: e.to_string(),
    })?;

    let id = value.get("id").and_then(Value::as_u64);
    let command = value
        .get("command")
        .and_then(Value::as_str)
        .map(str::to_owned);

    let fail = |message: String| DecodeError {
        id,
        command: command.clone(),
        message,
    };

    let request = Request::deserialize(&value).map_err(|e| fail(e.to_string()))?;
    let id = id.ok_or_else(|| fail("missing numeric \"id\"".to_string()))?;

    Ok(Incoming { id, request })
}

/// Everything the process writes to the channel
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Sent once at start-up
    Ready,
    Reply {
        id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Change {
        event: Event,
    },
    /// Fatal fault; the process exits right after
    Error {
        message: String,
    },
}

impl Message {
    pub fn reply(id: Option<u64>, data: Value) -> Self {
        Message::Reply {
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(id: Option<u64>, error: impl Display) -> Self {
        Message::Reply {
            id,
            data: None,
            error: Some(error.to_string()),
        }
    }
}
