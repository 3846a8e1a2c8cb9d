// src/decoder.rs
//! 24-bit sample decoding shared by the firmware loop and the host parser
//!
//! The ADS1299 shifts out every channel as a 24-bit big-endian two's-complement code.
//! Both sides of the link decode through [`sign_extend_24`] so that a frame checked on
//! the device and a frame parsed from the live stream always agree.

use crate::config::constants::chip::{FULL_SCALE_CODE, MICROVOLTS_PER_VOLT};

/// Smallest code the chip can produce (-2^23)
pub const MIN_CODE: i32 = -8_388_608;
/// Largest code the chip can produce (2^23 - 1)
pub const MAX_CODE: i32 = 8_388_607;

/// Sign-extend a big-endian 24-bit field (`b1` most significant) into an `i32`.
#[inline]
pub fn sign_extend_24(b1: u8, b2: u8, b3: u8) -> i32 {
    let top: u32 = if b1 >= 0x80 { 0xFF } else { 0x00 };
    ((top << 24) | (u32::from(b1) << 16) | (u32::from(b2) << 8) | u32::from(b3)) as i32
}

/// Microvolts per LSB for a given reference voltage (volts) and PGA gain.
pub fn scale_factor(reference_voltage: f32, gain: f32) -> f32 {
    (reference_voltage * MICROVOLTS_PER_VOLT) / (FULL_SCALE_CODE * gain)
}

/// One decoded channel value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub channel: usize,
    pub raw: i32,
    pub microvolts: f32,
}

/// Converts raw codes to microvolts with a scale fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleDecoder {
    scale: f32,
}

impl SampleDecoder {
    pub fn new(reference_voltage: f32, gain: f32) -> Self {
        Self {
            scale: scale_factor(reference_voltage, gain),
        }
    }

    /// Microvolts per LSB
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[inline]
    pub fn to_microvolts(&self, raw: i32) -> f32 {
        raw as f32 * self.scale
    }

    /// Decode one 3-byte triplet for `channel`.
    #[inline]
    pub fn decode(&self, channel: usize, bytes: [u8; 3]) -> Sample {
        let raw = sign_extend_24(bytes[0], bytes[1], bytes[2]);
        Sample {
            channel,
            raw,
            microvolts: self.to_microvolts(raw),
        }
    }

    /// Decode a run of consecutive triplets; a trailing partial triplet is ignored.
    pub fn decode_all(&self, bytes: &[u8]) -> Vec<Sample> {
        bytes
            .chunks_exact(3)
            .enumerate()
            .map(|(channel, t)| self.decode(channel, [t[0], t[1], t[2]]))
            .collect()
    }
}

impl Default for SampleDecoder {
    fn default() -> Self {
        use crate::config::constants::chip::{DEFAULT_ASSUMED_GAIN, DEFAULT_REFERENCE_VOLTAGE};
        Self::new(DEFAULT_REFERENCE_VOLTAGE, DEFAULT_ASSUMED_GAIN)
    }
}
