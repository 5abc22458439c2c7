//! Drives a live `fsw` process over its stdin/stdout channel
//!
//! Messages are read on a background thread so every wait can time out
//! instead of hanging the test run.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// A running `fsw` binary
pub struct FswProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    messages: Receiver<Value>,
    backlog: VecDeque<Value>,
    next_id: u64,
    timeout: Duration,
}

impl FswProcess {
    /// Spawn with default arguments
    pub fn spawn() -> Result<Self> {
        Self::spawn_with_args(&[])
    }

    pub fn spawn_with_args(args: &[&str]) -> Result<Self> {
        let mut child = Command::new(env!("CARGO_BIN_EXE_fsw"))
            .args(args)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn fsw")?;

        let stdout = child.stdout.take().context("fsw stdout not captured")?;
        let stdin = child.stdin.take();

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                // Anything that is not JSON on stdout is a bug worth surfacing
                let message = serde_json::from_str(&line)
                    .unwrap_or_else(|_| json!({"type": "invalid", "raw": line}));
                if tx.send(message).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            messages: rx,
            backlog: VecDeque::new(),
            next_id: 1,
            timeout: Duration::from_secs(10),
        })
    }

    /// Send a command with extra fields; returns its id
    pub fn send(&mut self, command: &str, fields: Value) -> Result<u64> {
        let id = self.next_id;
        self.next_id += 1;

        let mut request = json!({"id": id, "command": command});
        if let (Some(object), Value::Object(extra)) = (request.as_object_mut(), fields) {
            object.extend(extra);
        }
        self.send_raw(&request.to_string())?;
        Ok(id)
    }

    /// Write one raw line to stdin
    pub fn send_raw(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().context("stdin already closed")?;
        writeln!(stdin, "{}", line)?;
        stdin.flush()?;
        Ok(())
    }

    /// Send a command and wait for its reply
    pub fn call(&mut self, command: &str, fields: Value) -> Result<Value> {
        let id = self.send(command, fields)?;
        self.reply(id)
    }

    pub fn reply(&mut self, id: u64) -> Result<Value> {
        self.wait_for(|m| m["type"] == "reply" && m["id"] == id)
    }

    pub fn next_message(&mut self) -> Result<Value> {
        self.wait_for(|_| true)
    }

    pub fn next_change(&mut self) -> Result<Value> {
        let message = self.wait_for(|m| m["type"] == "change")?;
        Ok(message["event"].clone())
    }

    /// First message matching `pred`; others are kept for later waits
    pub fn wait_for(&mut self, pred: impl Fn(&Value) -> bool) -> Result<Value> {
        if let Some(pos) = self.backlog.iter().position(&pred) {
            return self.backlog.remove(pos).context("backlog index out of range");
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.messages.recv_timeout(remaining) {
                Ok(message) if pred(&message) => return Ok(message),
                Ok(message) => self.backlog.push_back(message),
                Err(RecvTimeoutError::Timeout) => {
                    bail!("Timed out waiting for message; backlog: {:?}", self.backlog)
                }
                Err(RecvTimeoutError::Disconnected) => {
                    bail!("fsw closed stdout; backlog: {:?}", self.backlog)
                }
            }
        }
    }

    /// Change events already received plus any arriving until `quiet` passes
    /// without a new message
    pub fn drain_changes(&mut self, quiet: Duration) -> Vec<Value> {
        while let Ok(message) = self.messages.recv_timeout(quiet) {
            self.backlog.push_back(message);
        }

        let (changes, rest): (Vec<Value>, Vec<Value>) =
            self.backlog.drain(..).partition(|m| m["type"] == "change");
        self.backlog.extend(rest);
        changes.into_iter().map(|m| m["event"].clone()).collect()
    }

    /// Close stdin, which the process treats as a graceful stop
    pub fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Wait for the process to exit and return its exit code
    pub fn wait_exit(&mut self) -> Result<i32> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status.code().unwrap_or(-1));
            }
            if Instant::now() > deadline {
                bail!("fsw did not exit in time");
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for FswProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
