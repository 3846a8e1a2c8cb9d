//! ModularBCI core: ADS1299 acquisition on the board and stream decoding on the host
//!
//! The crate covers both ends of the serial link:
//!
//! - [`ads1299`]: register encoding and an `embedded-hal` SPI driver for the front end
//! - [`acquisition`]: the interrupt/main-loop hand-off that forwards raw frames
//! - [`decoder`]: 24-bit sample decoding shared by both sides
//! - [`session`]: host-side stream parser, board handshakes and recovery
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use modular_bci::config::ConfigLoader;
//! use modular_bci::session::BciSession;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().load_system_config()?;
//!     let mut session = BciSession::open(&config)?;
//!     session.initialize()?;
//!
//!     for _ in 0..100 {
//!         let outcome = session.tick()?;
//!         for block in &outcome.batch.blocks {
//!             println!("#{} {:?}", block.sequence, block.microvolts);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod ads1299;
pub mod config;
pub mod decoder;
pub mod error;
pub mod hal;
pub mod session;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{ConfigLoader, SystemConfig};
pub use decoder::{sign_extend_24, Sample, SampleDecoder};
pub use error::{BciError, BciResult};
pub use hal::{DaisyInfo, SampleBatch, SampleBlock, Transport};
pub use session::{BciSession, ReplyPolicy, StreamParser};
pub use utils::time::{current_timestamp_nanos, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Capabilities compiled into this build
pub const FEATURES: &[&str] = &[
    "ADS1299 register encoding",
    "Interrupt-driven frame forwarding",
    "Resynchronizing stream parser",
    "Board session recovery",
];

/// Name, version and capabilities of the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub features: &'static [&'static str],
}

pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME,
        version: VERSION,
        features: FEATURES,
    }
}
