// src/session/mod.rs
//! Host-side acquisition session: stream parser, board handshakes, watchdog and recovery

pub mod handshake;
pub mod manager;
pub mod parser;
pub mod watchdog;

pub use handshake::{CloseHandle, ReplyPolicy};
pub use manager::{AcquisitionSession, BciSession, TickOutcome};
pub use parser::{ParsedBlock, ParserState, ParserStats, StreamParser};
pub use watchdog::{DroppedSampleMonitor, StallEvent, Watchdog};
