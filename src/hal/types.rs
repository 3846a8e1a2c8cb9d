// src/hal/types.rs
//! Core host-side data types

use crate::config::constants::daisy::*;
use serde::{Deserialize, Serialize};

/// Channel layout of the board, one of two fixed entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaisyInfo {
    pub eeg_channel_count: usize,
    pub acc_channel_count: usize,
    pub sampling_hz: u32,
}

impl DaisyInfo {
    pub const INACTIVE: DaisyInfo = DaisyInfo {
        eeg_channel_count: DEFAULT_EEG_CHANNEL_COUNT,
        acc_channel_count: DEFAULT_ACC_CHANNEL_COUNT,
        sampling_hz: DEFAULT_SAMPLING_HZ,
    };

    pub const ACTIVE: DaisyInfo = DaisyInfo {
        eeg_channel_count: DEFAULT_EEG_CHANNEL_COUNT * DAISY_CHANNEL_MULTIPLIER,
        acc_channel_count: DEFAULT_ACC_CHANNEL_COUNT,
        sampling_hz: DEFAULT_SAMPLING_HZ,
    };

    pub const fn lookup(daisy: bool) -> DaisyInfo {
        if daisy {
            DaisyInfo::ACTIVE
        } else {
            DaisyInfo::INACTIVE
        }
    }

    pub const fn total_channels(&self) -> usize {
        self.eeg_channel_count + self.acc_channel_count
    }

    /// Unit for every channel, EEG first
    pub fn channel_units(&self) -> Vec<ChannelUnit> {
        let eeg = std::iter::repeat(ChannelUnit::MICROVOLTS).take(self.eeg_channel_count);
        let acc = std::iter::repeat(ChannelUnit::UNSPECIFIED).take(self.acc_channel_count);
        eeg.chain(acc).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Microvolts,
    Unspecified,
}

/// Unit and multiplier the host framework applies to a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelUnit {
    pub unit: Unit,
    pub factor: f32,
}

impl ChannelUnit {
    pub const MICROVOLTS: ChannelUnit = ChannelUnit {
        unit: Unit::Microvolts,
        factor: 1.0,
    };

    pub const UNSPECIFIED: ChannelUnit = ChannelUnit {
        unit: Unit::Unspecified,
        factor: 1.0,
    };
}

/// One completed channel block
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    pub sequence: u64,
    pub timestamp_nanos: u64,
    pub microvolts: Vec<f32>,
    pub raw: Vec<i32>,
}

/// Blocks completed during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBatch {
    pub channel_count: usize,
    pub blocks: Vec<SampleBlock>,
}

impl SampleBatch {
    pub fn new(channel_count: usize) -> Self {
        Self {
            channel_count,
            blocks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.blocks.iter().map(|b| b.timestamp_nanos).collect()
    }

    /// All samples of channel 0, then all of channel 1, and so on.
    pub fn to_channel_major(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.channel_count * self.blocks.len());
        for channel in 0..self.channel_count {
            out.extend(
                self.blocks
                    .iter()
                    .map(|block| block.microvolts.get(channel).copied().unwrap_or(0.0)),
            );
        }
        out
    }
}
