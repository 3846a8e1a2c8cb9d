// src/ads1299/settings.rs
//! Typed chip settings consumed by the register encoder

use crate::ads1299::registers::{fields, ChannelMask};
use crate::config::constants::chip;
use serde::{Deserialize, Serialize};

/// Programmable gain (CHnSET GAIN code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Gain {
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X6 = 3,
    X8 = 4,
    X12 = 5,
    X24 = 6,
}

impl Gain {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn multiplier(self) -> u8 {
        match self {
            Gain::X1 => 1,
            Gain::X2 => 2,
            Gain::X4 => 4,
            Gain::X6 => 6,
            Gain::X8 => 8,
            Gain::X12 => 12,
            Gain::X24 => 24,
        }
    }
}

/// Channel input selection (CHnSET MUX code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum InputMux {
    Normal = 0,
    /// Offset or noise measurement; required for powered-down channels
    InputShorted = 1,
    /// Used with BIAS_MEAS
    BiasMeasure = 2,
    Mvdd = 3,
    Temperature = 4,
    TestSignal = 5,
    BiasDrp = 6,
    BiasDrn = 7,
}

impl InputMux {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// One CHnSET register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// 1..=8
    pub index: u8,
    pub power_down: bool,
    pub gain: Gain,
    pub srb2: bool,
    pub mux: InputMux,
}

impl ChannelConfig {
    pub fn enabled(index: u8, gain: Gain) -> Self {
        Self {
            index,
            power_down: false,
            gain,
            srb2: false,
            mux: InputMux::Normal,
        }
    }

    /// Powered-down channel with its inputs shorted
    pub fn powered_down(index: u8, gain: Gain) -> Self {
        Self {
            index,
            power_down: true,
            gain,
            srb2: false,
            mux: InputMux::InputShorted,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=chip::CHANNELS_PER_CHIP as u8).contains(&self.index) {
            return Err(format!("channel index {} outside 1..=8", self.index));
        }
        if self.power_down && self.mux != InputMux::InputShorted {
            return Err(format!(
                "channel {} is powered down but its mux is {:?} instead of input shorted",
                self.index, self.mux
            ));
        }
        Ok(())
    }
}

/// Full register image written during bring-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipSettings {
    #[serde(default = "defaults::reference_voltage")]
    pub reference_voltage: f32,
    #[serde(default = "defaults::assumed_gain")]
    pub assumed_gain: f32,

    /// CONFIG1 DAISY_EN; false selects daisy-chain mode
    #[serde(default)]
    pub multiple_readback: bool,
    #[serde(default = "defaults::enabled")]
    pub clock_output: bool,
    #[serde(default = "defaults::data_rate")]
    pub data_rate: u8,

    #[serde(default = "defaults::enabled")]
    pub internal_test_signal: bool,
    #[serde(default)]
    pub test_amplitude: u8,
    #[serde(default)]
    pub test_frequency: u8,

    #[serde(default = "defaults::enabled")]
    pub reference_buffer: bool,
    #[serde(default)]
    pub bias_measure: bool,
    #[serde(default = "defaults::enabled")]
    pub bias_reference_internal: bool,
    #[serde(default = "defaults::enabled")]
    pub bias_buffer: bool,
    #[serde(default = "defaults::enabled")]
    pub bias_lead_off_sense: bool,

    #[serde(default)]
    pub lead_off_threshold: u8,
    #[serde(default)]
    pub lead_off_current: u8,
    #[serde(default)]
    pub lead_off_frequency: u8,

    #[serde(default = "defaults::channels")]
    pub channels: Vec<ChannelConfig>,

    #[serde(default = "defaults::bias_mask")]
    pub bias_sensp: ChannelMask,
    #[serde(default = "defaults::bias_mask")]
    pub bias_sensn: ChannelMask,
    #[serde(default)]
    pub lead_off_sensp: ChannelMask,
    #[serde(default)]
    pub lead_off_sensn: ChannelMask,
    #[serde(default)]
    pub lead_off_flip: ChannelMask,

    /// MISC1 SRB1, referential montage
    #[serde(default = "defaults::enabled")]
    pub srb1: bool,
    #[serde(default)]
    pub single_shot: bool,
    #[serde(default)]
    pub lead_off_comparators: bool,
}

mod defaults {
    use super::*;

    pub fn reference_voltage() -> f32 { chip::DEFAULT_REFERENCE_VOLTAGE }
    pub fn assumed_gain() -> f32 { chip::DEFAULT_ASSUMED_GAIN }
    pub fn data_rate() -> u8 { chip::DEFAULT_DATA_RATE }
    pub fn enabled() -> bool { true }
    pub fn bias_mask() -> ChannelMask { ChannelMask::from_channels(&[1]) }

    pub fn channels() -> Vec<ChannelConfig> {
        (1..=chip::CHANNELS_PER_CHIP as u8)
            .map(|index| {
                if index <= 4 {
                    ChannelConfig::enabled(index, Gain::X24)
                } else {
                    ChannelConfig::powered_down(index, Gain::X24)
                }
            })
            .collect()
    }
}

impl Default for ChipSettings {
    fn default() -> Self {
        Self {
            reference_voltage: defaults::reference_voltage(),
            assumed_gain: defaults::assumed_gain(),
            multiple_readback: false,
            clock_output: true,
            data_rate: defaults::data_rate(),
            internal_test_signal: true,
            test_amplitude: 0,
            test_frequency: 0,
            reference_buffer: true,
            bias_measure: false,
            bias_reference_internal: true,
            bias_buffer: true,
            bias_lead_off_sense: true,
            lead_off_threshold: 0,
            lead_off_current: 0,
            lead_off_frequency: 0,
            channels: defaults::channels(),
            bias_sensp: defaults::bias_mask(),
            bias_sensn: defaults::bias_mask(),
            lead_off_sensp: ChannelMask::NONE,
            lead_off_sensn: ChannelMask::NONE,
            lead_off_flip: ChannelMask::NONE,
            srb1: true,
            single_shot: false,
            lead_off_comparators: false,
        }
    }
}

impl ChipSettings {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.reference_voltage <= 0.0 {
            errors.push(format!("reference voltage must be positive, got {}", self.reference_voltage));
        }
        if self.assumed_gain <= 0.0 {
            errors.push(format!("assumed gain must be positive, got {}", self.assumed_gain));
        }
        if self.data_rate > 6 {
            errors.push(format!("data rate code {} outside 0..=6", self.data_rate));
        }
        for (field, value) in [
            (fields::CAL_AMP, self.test_amplitude),
            (fields::CAL_FREQ, self.test_frequency),
            (fields::COMP_TH, self.lead_off_threshold),
            (fields::ILEAD_OFF, self.lead_off_current),
            (fields::FLEAD_OFF, self.lead_off_frequency),
        ] {
            if value > field.max_value() {
                errors.push(format!(
                    "{} value {} outside 0..={}",
                    field.name,
                    value,
                    field.max_value()
                ));
            }
        }
        if self.channels.len() > chip::CHANNELS_PER_CHIP {
            errors.push(format!("{} channel entries for an 8-channel chip", self.channels.len()));
        }

        let mut seen = [false; chip::CHANNELS_PER_CHIP];
        for channel in &self.channels {
            if let Err(e) = channel.validate() {
                errors.push(e);
                continue;
            }
            let slot = usize::from(channel.index - 1);
            if seen[slot] {
                errors.push(format!("channel {} configured twice", channel.index));
            }
            seen[slot] = true;
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
