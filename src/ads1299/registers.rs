// src/ads1299/registers.rs
//! ADS1299 register map and declarative field table
//!
//! Every multi-bit setting is declared once as a [`Field`] (bit offset and width) inside a
//! [`RegisterLayout`]. [`RegisterLayout::encode`] packs named values into the register byte
//! and [`RegisterLayout::decode`] extracts them again, so no setter hand-rolls its shifts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Register address (0x00-0x17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register(u8);

impl Register {
    pub const ID: Register = Register(0x00);
    pub const CONFIG1: Register = Register(0x01);
    pub const CONFIG2: Register = Register(0x02);
    pub const CONFIG3: Register = Register(0x03);
    pub const LOFF: Register = Register(0x04);
    pub const CH1SET: Register = Register(0x05);
    pub const CH8SET: Register = Register(0x0C);
    pub const BIAS_SENSP: Register = Register(0x0D);
    pub const BIAS_SENSN: Register = Register(0x0E);
    pub const LOFF_SENSP: Register = Register(0x0F);
    pub const LOFF_SENSN: Register = Register(0x10);
    pub const LOFF_FLIP: Register = Register(0x11);
    pub const LOFF_STATP: Register = Register(0x12);
    pub const LOFF_STATN: Register = Register(0x13);
    pub const GPIO: Register = Register(0x14);
    pub const MISC1: Register = Register(0x15);
    pub const MISC2: Register = Register(0x16);
    pub const CONFIG4: Register = Register(0x17);

    /// Highest valid address
    pub const LAST: Register = Register::CONFIG4;

    /// Register for an arbitrary address, if it exists on the chip.
    pub const fn new(address: u8) -> Option<Register> {
        if address <= Register::LAST.0 {
            Some(Register(address))
        } else {
            None
        }
    }

    /// CHnSET register for channel `channel` (1..=8).
    pub const fn channel(channel: u8) -> Option<Register> {
        if channel >= 1 && channel <= 8 {
            Some(Register(Register::CH1SET.0 + channel - 1))
        } else {
            None
        }
    }

    pub const fn address(self) -> u8 {
        self.0
    }

    /// Registers the host must never write
    pub const fn is_read_only(self) -> bool {
        matches!(self.0, 0x00 | 0x12 | 0x13)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// A named bit field inside one register byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: u8,
    pub width: u8,
}

impl Field {
    pub const fn new(name: &'static str, offset: u8, width: u8) -> Self {
        Self { name, offset, width }
    }

    /// Unshifted mask covering the field width
    pub const fn max_value(self) -> u8 {
        ((1u16 << self.width) - 1) as u8
    }

    pub const fn mask(self) -> u8 {
        self.max_value() << self.offset
    }
}

/// Errors raised while packing a register value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("value {value} does not fit field {field} ({width} bits)")]
    ValueTooWide {
        field: &'static str,
        width: u8,
        value: u8,
    },
    #[error("field {field} does not belong to register {register}")]
    UnknownField {
        field: &'static str,
        register: Register,
    },
    #[error("register {0} is read-only")]
    ReadOnly(Register),
}

/// Layout of one register: the bits the chip requires set plus its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLayout {
    pub register: Register,
    pub fixed_bits: u8,
    pub fields: &'static [Field],
}

impl RegisterLayout {
    /// The same layout addressed at another register (CHnSET, channel masks).
    pub const fn at(self, register: Register) -> Self {
        Self { register, ..self }
    }

    /// Pack `(field, value)` pairs into a register byte. Fields not listed stay zero.
    pub fn encode(&self, values: &[(Field, u8)]) -> Result<u8, EncodeError> {
        if self.register.is_read_only() {
            return Err(EncodeError::ReadOnly(self.register));
        }

        values.iter().try_fold(self.fixed_bits, |byte, &(field, value)| {
            if !self.fields.contains(&field) {
                return Err(EncodeError::UnknownField {
                    field: field.name,
                    register: self.register,
                });
            }
            if value > field.max_value() {
                return Err(EncodeError::ValueTooWide {
                    field: field.name,
                    width: field.width,
                    value,
                });
            }
            Ok((byte & !field.mask()) | (value << field.offset))
        })
    }

    /// Extract `field` from a register byte.
    pub fn decode(&self, byte: u8, field: Field) -> Option<u8> {
        self.fields
            .contains(&field)
            .then(|| (byte & field.mask()) >> field.offset)
    }
}

/// Field declarations, grouped by register
pub mod fields {
    use super::Field;

    // CONFIG1
    /// 0 = daisy-chain mode, 1 = multiple readback mode
    pub const DAISY_EN: Field = Field::new("DAISY_EN", 6, 1);
    pub const CLK_EN: Field = Field::new("CLK_EN", 5, 1);
    pub const DR: Field = Field::new("DR", 0, 3);

    // CONFIG2
    pub const INT_CAL: Field = Field::new("INT_CAL", 4, 1);
    pub const CAL_AMP: Field = Field::new("CAL_AMP", 2, 1);
    pub const CAL_FREQ: Field = Field::new("CAL_FREQ", 0, 2);

    // CONFIG3
    pub const PD_REFBUF: Field = Field::new("PD_REFBUF", 7, 1);
    pub const BIAS_MEAS: Field = Field::new("BIAS_MEAS", 4, 1);
    pub const BIASREF_INT: Field = Field::new("BIASREF_INT", 3, 1);
    pub const PD_BIAS: Field = Field::new("PD_BIAS", 2, 1);
    pub const BIAS_LOFF_SENS: Field = Field::new("BIAS_LOFF_SENS", 1, 1);
    pub const BIAS_STAT: Field = Field::new("BIAS_STAT", 0, 1);

    // LOFF
    pub const COMP_TH: Field = Field::new("COMP_TH", 5, 3);
    pub const ILEAD_OFF: Field = Field::new("ILEAD_OFF", 2, 2);
    pub const FLEAD_OFF: Field = Field::new("FLEAD_OFF", 0, 2);

    // CHnSET
    pub const PD: Field = Field::new("PD", 7, 1);
    pub const GAIN: Field = Field::new("GAIN", 4, 3);
    pub const SRB2: Field = Field::new("SRB2", 3, 1);
    pub const MUX: Field = Field::new("MUX", 0, 3);

    // Per-channel masks: channel n lives at bit n - 1
    pub const CH: [Field; 8] = [
        Field::new("CH1", 0, 1),
        Field::new("CH2", 1, 1),
        Field::new("CH3", 2, 1),
        Field::new("CH4", 3, 1),
        Field::new("CH5", 4, 1),
        Field::new("CH6", 5, 1),
        Field::new("CH7", 6, 1),
        Field::new("CH8", 7, 1),
    ];

    // MISC1
    pub const SRB1: Field = Field::new("SRB1", 5, 1);

    // CONFIG4
    pub const SINGLE_SHOT: Field = Field::new("SINGLE_SHOT", 3, 1);
    pub const PD_LOFF_COMP: Field = Field::new("PD_LOFF_COMP", 1, 1);
}

use fields::*;

pub const CONFIG1: RegisterLayout = RegisterLayout {
    register: Register::CONFIG1,
    fixed_bits: 0x90,
    fields: &[DAISY_EN, CLK_EN, DR],
};

pub const CONFIG2: RegisterLayout = RegisterLayout {
    register: Register::CONFIG2,
    fixed_bits: 0xC0,
    fields: &[INT_CAL, CAL_AMP, CAL_FREQ],
};

pub const CONFIG3: RegisterLayout = RegisterLayout {
    register: Register::CONFIG3,
    fixed_bits: 0x60,
    fields: &[PD_REFBUF, BIAS_MEAS, BIASREF_INT, PD_BIAS, BIAS_LOFF_SENS, BIAS_STAT],
};

pub const LOFF: RegisterLayout = RegisterLayout {
    register: Register::LOFF,
    fixed_bits: 0x00,
    fields: &[COMP_TH, ILEAD_OFF, FLEAD_OFF],
};

/// Addressed at CH1SET; use [`RegisterLayout::at`] for the other channels.
pub const CHSET: RegisterLayout = RegisterLayout {
    register: Register::CH1SET,
    fixed_bits: 0x00,
    fields: &[PD, GAIN, SRB2, MUX],
};

/// Shared by BIAS_SENSP/N, LOFF_SENSP/N and LOFF_FLIP.
pub const CHANNEL_MASK: RegisterLayout = RegisterLayout {
    register: Register::BIAS_SENSP,
    fixed_bits: 0x00,
    fields: &fields::CH,
};

pub const MISC1: RegisterLayout = RegisterLayout {
    register: Register::MISC1,
    fixed_bits: 0x00,
    fields: &[SRB1],
};

pub const CONFIG4: RegisterLayout = RegisterLayout {
    register: Register::CONFIG4,
    fixed_bits: 0x00,
    fields: &[SINGLE_SHOT, PD_LOFF_COMP],
};

/// Eight per-channel flags packed with the canonical layout (channel 1 = bit 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMask(pub [bool; 8]);

impl ChannelMask {
    pub const NONE: ChannelMask = ChannelMask([false; 8]);
    pub const ALL: ChannelMask = ChannelMask([true; 8]);

    /// Mask with only the listed channels (1..=8) set; others are ignored.
    pub fn from_channels(channels: &[u8]) -> Self {
        let mut mask = [false; 8];
        for &ch in channels {
            if (1..=8).contains(&ch) {
                mask[usize::from(ch - 1)] = true;
            }
        }
        ChannelMask(mask)
    }

    pub fn field_values(&self) -> Vec<(Field, u8)> {
        fields::CH
            .iter()
            .zip(self.0.iter())
            .map(|(&field, &on)| (field, u8::from(on)))
            .collect()
    }

    pub fn to_byte(&self) -> u8 {
        self.0
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, &on)| acc | (u8::from(on) << bit))
    }
}
