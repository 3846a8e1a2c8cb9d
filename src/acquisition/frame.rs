// src/acquisition/frame.rs
//! Raw data frame buffer filled by one SPI transfer

use crate::config::constants::chip::{
    BYTES_PER_SAMPLE, CHANNELS_PER_CHIP, FRAME_BYTES_PER_CHIP, MAX_DAISY_CHIPS, STATUS_BYTES,
};
use crate::config::constants::protocol::SYNC_BYTES;
use crate::decoder::{sign_extend_24, Sample, SampleDecoder};

/// `27 × chip_count` bytes: per chip a 24-bit status word followed by eight 24-bit channels.
/// Allocated once and reused for every transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
    chip_count: usize,
}

impl RawFrame {
    pub fn new(chip_count: usize) -> Result<Self, String> {
        if chip_count == 0 || chip_count > MAX_DAISY_CHIPS {
            return Err(format!(
                "chip count {} outside 1..={}",
                chip_count, MAX_DAISY_CHIPS
            ));
        }

        Ok(Self {
            bytes: vec![0; chip_count * FRAME_BYTES_PER_CHIP],
            chip_count,
        })
    }

    pub fn chip_count(&self) -> usize {
        self.chip_count
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn chip_bytes(&self, chip: usize) -> Option<&[u8]> {
        let start = chip.checked_mul(FRAME_BYTES_PER_CHIP)?;
        self.bytes.get(start..start + FRAME_BYTES_PER_CHIP)
    }

    pub fn status_word(&self, chip: usize) -> Option<[u8; STATUS_BYTES]> {
        self.chip_bytes(chip)
            .map(|bytes| [bytes[0], bytes[1], bytes[2]])
    }

    /// What goes out on the host link: the first chip's status word, then the
    /// channel data of every chip. Later status words are dropped so the host
    /// sees `3 + 24 × chip_count` bytes.
    pub fn forwarded_segments(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.bytes
            .chunks_exact(FRAME_BYTES_PER_CHIP)
            .enumerate()
            .map(|(chip, bytes)| if chip == 0 { bytes } else { &bytes[STATUS_BYTES..] })
    }

    pub fn forwarded_len(&self) -> usize {
        STATUS_BYTES + self.chip_count * (FRAME_BYTES_PER_CHIP - STATUS_BYTES)
    }

    /// Whether `chip` carries the sentinel status word the host synchronizes on.
    pub fn has_sync(&self, chip: usize) -> bool {
        self.status_word(chip) == Some(SYNC_BYTES)
    }

    /// Sign-extended channel codes of one chip.
    pub fn channel_codes(&self, chip: usize) -> Option<[i32; CHANNELS_PER_CHIP]> {
        let bytes = self.chip_bytes(chip)?;
        let mut codes = [0i32; CHANNELS_PER_CHIP];
        for (code, triplet) in codes
            .iter_mut()
            .zip(bytes[STATUS_BYTES..].chunks_exact(BYTES_PER_SAMPLE))
        {
            *code = sign_extend_24(triplet[0], triplet[1], triplet[2]);
        }
        Some(codes)
    }

    /// Every channel of every chip, numbered across the chain.
    pub fn samples(&self, decoder: &SampleDecoder) -> Vec<Sample> {
        (0..self.chip_count)
            .filter_map(|chip| self.chip_bytes(chip))
            .flat_map(|bytes| decoder.decode_all(&bytes[STATUS_BYTES..]))
            .enumerate()
            .map(|(channel, sample)| Sample { channel, ..sample })
            .collect()
    }
}
