// src/error.rs
//! Host-side error type
//!
//! Everything the session layer can fail with is a [`BciError`]. Stream desynchronization is
//! not an error (it is counted in the parser stats) and neither is a silent device (it is
//! reported as a stall event from `tick`). Device-side code has its own generic
//! [`DeviceError`](crate::ads1299::DeviceError) because it is parameterized by the bus type.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BciError {
    /// Read or write on the byte transport failed
    #[error("transport {operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("unable to open {port}: {reason}")]
    DeviceOpen { port: String, reason: String },

    #[error("no serial device found")]
    NoDeviceFound,

    /// The board did not answer `command` with a reply ending in the end marker
    #[error("no reply to {command:?} within {timeout_ms} ms (received {partial_reply:?})")]
    HandshakeTimeout {
        command: String,
        timeout_ms: u64,
        partial_reply: String,
    },

    #[error("session closed")]
    Cancelled,

    #[error("session is not open")]
    NotConnected,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("board bring-up failed: {0}")]
    BringUp(#[source] Box<BciError>),
}

pub type BciResult<T> = Result<T, BciError>;

impl BciError {
    pub fn transport(operation: &'static str, source: io::Error) -> Self {
        BciError::Transport { operation, source }
    }

    /// Wrap a failure that happened during `initialize`.
    pub fn bring_up(self) -> Self {
        match self {
            already @ BciError::BringUp(_) => already,
            other => BciError::BringUp(Box::new(other)),
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            BciError::HandshakeTimeout { .. } => true,
            BciError::BringUp(inner) => inner.is_timeout(),
            _ => false,
        }
    }
}

impl From<crate::config::ConfigError> for BciError {
    fn from(err: crate::config::ConfigError) -> Self {
        BciError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = BciError::HandshakeTimeout {
            command: "c".to_string(),
            timeout_ms: 5000,
            partial_reply: "Daisy rem".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("\"c\""));
        assert!(display.contains("5000 ms"));
        assert!(display.contains("Daisy rem"));
    }

    #[test]
    fn test_bring_up_wraps_once() {
        let err = BciError::Cancelled.bring_up().bring_up();
        match err {
            BciError::BringUp(inner) => assert!(matches!(*inner, BciError::Cancelled)),
            other => panic!("Expected bring-up error, got {:?}", other),
        }
    }

    #[test]
    fn test_transport_error_keeps_source() {
        let err = BciError::transport("read", io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("unplugged"));
    }

    #[test]
    fn test_timeout_classification() {
        let timeout = BciError::HandshakeTimeout {
            command: "s".to_string(),
            timeout_ms: 500,
            partial_reply: String::new(),
        };
        assert!(timeout.is_timeout());
        assert!(timeout.bring_up().is_timeout());
        assert!(!BciError::NotConnected.is_timeout());
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BciError>();
    }
}
