// src/ads1299/mod.rs
//! Device-side ADS1299 support: opcodes, register table, typed settings and the
//! SPI command encoder

pub mod commands;
pub mod driver;
pub mod registers;
pub mod settings;

pub use commands::Command;
pub use driver::{Ads1299, DeviceError, DeviceResult};
pub use registers::{ChannelMask, EncodeError, Field, Register, RegisterLayout};
pub use settings::{ChannelConfig, ChipSettings, Gain, InputMux};
