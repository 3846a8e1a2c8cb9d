// src/hal/mod.rs
//! Host-side hardware abstraction: byte transports and the shared sample types

pub mod scripted;
pub mod serial_driver;
pub mod traits;
pub mod types;

pub use scripted::{ScriptHandle, ScriptedTransport};
pub use serial_driver::{SerialConfig, SerialTransport};
pub use traits::*;
pub use types::*;
