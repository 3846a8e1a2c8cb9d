// src/hal/scripted.rs
//! In-memory board stand-in driven by a script and a mock clock
//!
//! Inbound bytes are queued as chunks; each `read` returns at most one chunk. When nothing is
//! queued the read "waits" by advancing the mock clock by the full timeout, so deadline logic
//! runs without real sleeps. Written bytes can trigger canned replies.

use crate::hal::traits::Transport;
use crate::utils::time::MockTimeProvider;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct ScriptState {
    inbound: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    replies: HashMap<u8, Vec<u8>>,
    one_shot_replies: HashMap<u8, VecDeque<Vec<u8>>>,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
}

pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    clock: Arc<MockTimeProvider>,
}

/// Test-side handle onto a [`ScriptedTransport`] the session owns
#[derive(Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new(clock: Arc<MockTimeProvider>) -> (Self, ScriptHandle) {
        let state = Arc::new(Mutex::new(ScriptState::default()));
        let handle = ScriptHandle {
            state: state.clone(),
        };
        (Self { state, clock }, handle)
    }
}

impl ScriptHandle {
    /// Queue bytes the board "sends"; delivered by one read.
    pub fn push_inbound(&self, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        if !bytes.is_empty() {
            self.state.lock().inbound.push_back(bytes);
        }
    }

    /// Reply queued every time `byte` is written.
    pub fn reply_to(&self, byte: u8, reply: impl Into<Vec<u8>>) {
        self.state.lock().replies.insert(byte, reply.into());
    }

    /// Reply used for the next write of `byte` only, ahead of any standing reply. An empty
    /// reply means silence.
    pub fn reply_once(&self, byte: u8, reply: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .one_shot_replies
            .entry(byte)
            .or_default()
            .push_back(reply.into());
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    pub fn pending_inbound(&self) -> usize {
        self.state.lock().inbound.iter().map(Vec::len).sum()
    }

    pub fn fail_reads(&self, kind: Option<io::ErrorKind>) {
        self.state.lock().read_error = kind;
    }

    pub fn fail_writes(&self, kind: Option<io::ErrorKind>) {
        self.state.lock().write_error = kind;
    }
}

impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let mut state = self.state.lock();
        if let Some(kind) = state.read_error {
            return Err(io::Error::new(kind, "scripted read failure"));
        }

        let Some(mut chunk) = state.inbound.pop_front() else {
            drop(state);
            self.clock.advance(timeout);
            return Ok(0);
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            state.inbound.push_front(chunk);
        }
        Ok(n)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if let Some(kind) = state.write_error {
            return Err(io::Error::new(kind, "scripted write failure"));
        }

        state.written.extend_from_slice(bytes);
        for byte in bytes {
            let reply = match state.one_shot_replies.get_mut(byte).and_then(VecDeque::pop_front) {
                Some(reply) => reply,
                None => state.replies.get(byte).cloned().unwrap_or_default(),
            };
            if !reply.is_empty() {
                state.inbound.push_back(reply);
            }
        }
        Ok(bytes.len())
    }
}
