// src/acquisition/flags.rs
//! State shared between interrupt handlers and the main loop

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Written from interrupt context, drained by the main loop.
///
/// The command slot holds one byte, like a UART receive that is re-armed only once the
/// previous byte has been consumed. Bytes that arrive while the slot is full are dropped
/// and counted.
pub struct InterruptFlags {
    data_ready: AtomicBool,
    command: ArrayQueue<u8>,
    overruns: AtomicU32,
}

impl InterruptFlags {
    pub fn new() -> Self {
        Self {
            data_ready: AtomicBool::new(false),
            command: ArrayQueue::new(1),
            overruns: AtomicU32::new(0),
        }
    }

    /// DRDY falling edge
    pub fn signal_data_ready(&self) {
        self.data_ready.store(true, Ordering::Release);
    }

    /// UART receive complete
    pub fn push_command_byte(&self, byte: u8) {
        if self.command.push(byte).is_err() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn data_ready(&self) -> bool {
        self.data_ready.load(Ordering::Acquire)
    }

    /// Clear after a transfer; edges raised meanwhile are coalesced into it.
    pub fn clear_data_ready(&self) {
        self.data_ready.store(false, Ordering::Release);
    }

    /// Take the pending byte, re-arming the receive slot.
    pub fn take_command_byte(&self) -> Option<u8> {
        self.command.pop()
    }

    pub fn command_overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl Default for InterruptFlags {
    fn default() -> Self {
        Self::new()
    }
}
