// src/ads1299/commands.rs
//! ADS1299 SPI opcodes

use crate::config::constants::chip::{RESET_SETTLE_MS, TOGGLE_SETTLE_MS};

/// Read-register opcode, OR'd with the register address
pub const RREG: u8 = 0x20;
/// Write-register opcode, OR'd with the register address
pub const WREG: u8 = 0x40;
/// Only the low five bits of RREG/WREG carry the address
pub const ADDRESS_MASK: u8 = 0x1F;

/// Single-byte commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Wakeup = 0x02,
    Standby = 0x04,
    Reset = 0x06,
    Start = 0x08,
    Stop = 0x0A,
    /// Read data continuous
    Rdatac = 0x10,
    /// Stop read data continuous
    Sdatac = 0x11,
}

impl Command {
    pub const fn opcode(self) -> u8 {
        self as u8
    }

    /// Time the chip needs before it accepts further bus traffic
    pub const fn settle_ms(self) -> u32 {
        match self {
            Command::Reset => RESET_SETTLE_MS,
            Command::Wakeup | Command::Rdatac | Command::Sdatac => TOGGLE_SETTLE_MS,
            Command::Standby | Command::Start | Command::Stop => 0,
        }
    }
}
