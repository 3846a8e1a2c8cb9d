// src/config/mod.rs
//! Configuration management: chip register image, session timing and serial link

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};

use crate::ads1299::ChipSettings;
use crate::hal::SerialConfig;
use serde::{Deserialize, Serialize};

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SystemConfig {
    #[serde(default)]
    pub chip: ChipSettings,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub serial: SerialConfig,
}

/// Host session behaviour and recovery thresholds
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SessionConfig {
    /// Stream 32 channels through the daisy module
    #[serde(default)]
    pub daisy_module: bool,

    /// A daisy module is physically fitted; it is disabled when not requested
    #[serde(default)]
    pub daisy_attached: bool,

    /// Extra board commands, one per line, replayed on every regular reset
    #[serde(default)]
    pub additional_commands: String,

    #[serde(default = "defaults::read_board_reply_timeout_ms")]
    pub read_board_reply_timeout_ms: u64,

    #[serde(default = "defaults::flush_board_reply_timeout_ms")]
    pub flush_board_reply_timeout_ms: u64,

    #[serde(default = "defaults::missing_sample_delay_before_reset_ms")]
    pub missing_sample_delay_before_reset_ms: u64,

    #[serde(default = "defaults::dropped_sample_count_before_reset")]
    pub dropped_sample_count_before_reset: usize,

    #[serde(default = "defaults::dropped_sample_safety_delay_before_reset_ms")]
    pub dropped_sample_safety_delay_before_reset_ms: u64,

    #[serde(default = "defaults::poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    #[serde(default = "defaults::read_buffer_size")]
    pub read_buffer_size: usize,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::session::*;

    pub fn read_board_reply_timeout_ms() -> u64 { DEFAULT_READ_BOARD_REPLY_TIMEOUT_MS }
    pub fn flush_board_reply_timeout_ms() -> u64 { DEFAULT_FLUSH_BOARD_REPLY_TIMEOUT_MS }
    pub fn missing_sample_delay_before_reset_ms() -> u64 { DEFAULT_MISSING_SAMPLE_DELAY_MS }
    pub fn dropped_sample_count_before_reset() -> usize { DEFAULT_DROPPED_SAMPLE_COUNT }
    pub fn dropped_sample_safety_delay_before_reset_ms() -> u64 { DEFAULT_DROPPED_SAMPLE_SAFETY_DELAY_MS }
    pub fn poll_timeout_ms() -> u64 { DEFAULT_POLL_TIMEOUT_MS }
    pub fn read_buffer_size() -> usize { DEFAULT_READ_BUFFER_SIZE }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            daisy_module: false,
            daisy_attached: false,
            additional_commands: String::new(),
            read_board_reply_timeout_ms: defaults::read_board_reply_timeout_ms(),
            flush_board_reply_timeout_ms: defaults::flush_board_reply_timeout_ms(),
            missing_sample_delay_before_reset_ms: defaults::missing_sample_delay_before_reset_ms(),
            dropped_sample_count_before_reset: defaults::dropped_sample_count_before_reset(),
            dropped_sample_safety_delay_before_reset_ms: defaults::dropped_sample_safety_delay_before_reset_ms(),
            poll_timeout_ms: defaults::poll_timeout_ms(),
            read_buffer_size: defaults::read_buffer_size(),
        }
    }
}

impl SessionConfig {
    /// Non-empty lines of `additional_commands`, carriage returns stripped
    pub fn additional_command_lines(&self) -> impl Iterator<Item = &str> {
        self.additional_commands
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        use constants::session::{MAX_READ_BUFFER_SIZE, MIN_READ_BUFFER_SIZE};
        let mut errors = Vec::new();

        if self.read_board_reply_timeout_ms == 0 {
            errors.push("Board reply timeout must be greater than 0".to_string());
        }
        if self.poll_timeout_ms == 0 || self.poll_timeout_ms > self.read_board_reply_timeout_ms {
            errors.push(format!(
                "Poll timeout ({} ms) must be between 1 and the board reply timeout ({} ms)",
                self.poll_timeout_ms, self.read_board_reply_timeout_ms
            ));
        }
        if self.missing_sample_delay_before_reset_ms == 0 {
            errors.push("Missing sample delay must be greater than 0".to_string());
        }
        if self.dropped_sample_count_before_reset == 0 {
            errors.push("Dropped sample count must be greater than 0".to_string());
        }
        if !(MIN_READ_BUFFER_SIZE..=MAX_READ_BUFFER_SIZE).contains(&self.read_buffer_size) {
            errors.push(format!("Invalid read buffer size: {}", self.read_buffer_size));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl SystemConfig {
    /// Validate every section, collecting all problems
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for result in [self.chip.validate(), self.session.validate(), self.serial.validate()] {
            if let Err(mut section) = result {
                errors.append(&mut section);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
