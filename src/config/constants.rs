// src/config/constants.rs
//! System-wide configuration constants

/// Analog front-end (ADS1299) constants
pub mod chip {
    /// Reference voltage assumed by the scale factor. The datasheet says 4.5 V but the
    /// board measures closer to 4.5 V × 1.2.
    pub const DEFAULT_REFERENCE_VOLTAGE: f32 = 4.5 * 1.2;
    /// PGA gain assumed by the scale factor
    pub const DEFAULT_ASSUMED_GAIN: f32 = 24.0;
    /// Largest positive 24-bit code (2^23 - 1)
    pub const FULL_SCALE_CODE: f32 = 8_388_607.0;
    pub const MICROVOLTS_PER_VOLT: f32 = 1_000_000.0;

    pub const CHANNELS_PER_CHIP: usize = 8;
    pub const BYTES_PER_SAMPLE: usize = 3;
    /// 24-bit status word that precedes the channel data of every chip
    pub const STATUS_BYTES: usize = 3;
    pub const FRAME_BYTES_PER_CHIP: usize = STATUS_BYTES + CHANNELS_PER_CHIP * BYTES_PER_SAMPLE;
    pub const MAX_DAISY_CHIPS: usize = 4;

    /// CONFIG1 DR code for 250 SPS
    pub const DEFAULT_DATA_RATE: u8 = 6;

    pub const RESET_SETTLE_MS: u32 = 12;
    pub const TOGGLE_SETTLE_MS: u32 = 3;
}

/// Host link framing constants
pub mod protocol {
    /// Status word emitted by the chip when lead-off detection is disabled
    pub const SYNC_BYTES: [u8; 3] = [0xC0, 0x00, 0x00];
    /// Forwarding toggle: start sending frames to the host
    pub const FORWARD_ENABLE: u8 = b'b';
    /// Forwarding toggle: stop sending frames to the host
    pub const FORWARD_DISABLE: u8 = b's';
    /// Tail of a complete board reply
    pub const REPLY_END_MARKER: &str = "$$$";

    pub const CMD_STOP_STREAM: &str = "s";
    pub const CMD_DISABLE_DAISY: &str = "c";
    pub const CMD_START_STREAM: &str = "b";
}

/// Daisy table constants
pub mod daisy {
    pub const DEFAULT_SAMPLING_HZ: u32 = 250;
    pub const DEFAULT_EEG_CHANNEL_COUNT: usize = 8;
    pub const DEFAULT_ACC_CHANNEL_COUNT: usize = 0;
    pub const DAISY_CHANNEL_MULTIPLIER: usize = 4;
}

/// Session and recovery constants
pub mod session {
    pub const DEFAULT_READ_BOARD_REPLY_TIMEOUT_MS: u64 = 5000;
    pub const DEFAULT_FLUSH_BOARD_REPLY_TIMEOUT_MS: u64 = 500;
    pub const DEFAULT_MISSING_SAMPLE_DELAY_MS: u64 = 1000;
    pub const DEFAULT_DROPPED_SAMPLE_COUNT: usize = 5;
    pub const DEFAULT_DROPPED_SAMPLE_SAFETY_DELAY_MS: u64 = 1000;
    /// Bounded wait of a single read inside a handshake or tick
    pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 10;
    pub const DEFAULT_READ_BUFFER_SIZE: usize = 16 * 1024;
    pub const MIN_READ_BUFFER_SIZE: usize = 64;
    pub const MAX_READ_BUFFER_SIZE: usize = 1_048_576;
    /// Pause after each byte of a command that expects no reply
    pub const NO_REPLY_SETTLE_MS: u64 = 100;
    pub const DAISY_DISABLE_ATTEMPTS: u32 = 2;
}

/// Serial port constants
pub mod serial {
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    pub const MAX_BAUD_RATE: u32 = 4_000_000;
    pub const DEFAULT_DATA_BITS: u8 = 8;
    pub const DEFAULT_STOP_BITS: u8 = 1;
    /// Number of /dev/ttyUSB* candidates probed during discovery
    pub const MAX_USB_TTY: u32 = 32;
    /// Number of /dev/ttyS* (or COM*) candidates probed during discovery
    pub const MAX_SERIAL_TTY: u32 = 32;
}

/// Configuration file locations
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "modular_bci.toml";
    pub const SYSTEM_CONFIG_FILE: &str = "/etc/modular_bci/config.toml";
    pub const ENV_PREFIX: &str = "MODULAR_BCI_";
}
