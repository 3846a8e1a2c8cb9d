// src/session/handshake.rs
//! Command/reply exchange with the board: one byte out, then poll for the reply
//! until a deadline or the end marker

use crate::config::constants::protocol::REPLY_END_MARKER;
use crate::error::{BciError, BciResult};
use crate::hal::Transport;
use crate::utils::time::TimeProvider;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// How to treat the board's answer to each command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPolicy {
    /// Poll until the reply ends with the end marker; missing it is an error
    Await,
    /// Drain whatever arrives until the deadline; never an error
    Flush,
    /// Do not read; pause a fixed settle time after each byte
    None,
}

/// Cancels in-flight handshakes from another thread.
#[derive(Debug, Clone, Default)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Timing of one exchange
#[derive(Debug, Clone, Copy)]
pub struct ExchangeTiming {
    pub timeout: Duration,
    pub poll: Duration,
    pub settle: Duration,
}

pub(crate) struct Exchange<'a, T: ?Sized> {
    pub transport: &'a mut T,
    pub clock: &'a dyn TimeProvider,
    pub close: &'a CloseHandle,
    pub buffer: &'a mut [u8],
}

impl<T: Transport + ?Sized> Exchange<'_, T> {
    /// Send `command` byte by byte and collect the replies. With [`ReplyPolicy::Await`] only
    /// the last byte must see the end marker; earlier bytes wait out their deadline silently.
    pub fn run(&mut self, command: &str, policy: ReplyPolicy, timing: ExchangeTiming) -> BciResult<String> {
        if command.is_empty() {
            return Ok(String::new());
        }

        let mut reply = Vec::new();
        let bytes = command.as_bytes();
        for (i, &byte) in bytes.iter().enumerate() {
            if self.close.is_closed() {
                return Err(BciError::Cancelled);
            }

            trace!(byte = %char::from(byte), "sending to board");
            self.transport
                .write(&[byte])
                .map_err(|e| BciError::transport("write", e))?;

            match policy {
                ReplyPolicy::None => self.clock.sleep(timing.settle),
                ReplyPolicy::Await | ReplyPolicy::Flush => {
                    let mut byte_reply = Vec::new();
                    let finished = self.collect(&mut byte_reply, policy, timing)?;
                    log_reply(&byte_reply, finished);

                    let last = i + 1 == bytes.len();
                    if policy == ReplyPolicy::Await && last && !finished {
                        reply.extend_from_slice(&byte_reply);
                        return Err(BciError::HandshakeTimeout {
                            command: command.to_string(),
                            timeout_ms: timing.timeout.as_millis() as u64,
                            partial_reply: String::from_utf8_lossy(&reply).into_owned(),
                        });
                    }
                    reply.extend_from_slice(&byte_reply);
                }
            }
        }

        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    /// Poll until the deadline. Returns whether the end marker was seen.
    fn collect(&mut self, reply: &mut Vec<u8>, policy: ReplyPolicy, timing: ExchangeTiming) -> BciResult<bool> {
        let deadline = self.clock.now_nanos() + timing.timeout.as_nanos() as u64;
        loop {
            if self.close.is_closed() {
                return Err(BciError::Cancelled);
            }

            let now = self.clock.now_nanos();
            if now >= deadline {
                return Ok(false);
            }

            let wait = timing.poll.min(Duration::from_nanos(deadline - now));
            let n = self
                .transport
                .read(self.buffer, wait)
                .map_err(|e| BciError::transport("read", e))?;
            reply.extend_from_slice(&self.buffer[..n]);

            if policy == ReplyPolicy::Await && reply.ends_with(REPLY_END_MARKER.as_bytes()) {
                return Ok(true);
            }
        }
    }
}

fn log_reply(reply: &[u8], finished: bool) {
    if reply.is_empty() {
        trace!("board did not reply");
    } else {
        trace!(
            size = reply.len(),
            "{} was: {}",
            if finished { "board response" } else { "partial board response" },
            String::from_utf8_lossy(reply)
        );
    }
}
