// src/acquisition/mod.rs
//! Device-side acquisition: frame buffer, interrupt flags and the main loop

pub mod device_loop;
pub mod flags;
pub mod frame;

pub use device_loop::*;
pub use flags::InterruptFlags;
pub use frame::RawFrame;
