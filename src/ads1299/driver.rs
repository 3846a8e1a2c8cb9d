// src/ads1299/driver.rs
//! Register command encoder for one ADS1299 on an `embedded-hal` SPI device

use crate::ads1299::commands::{Command, ADDRESS_MASK, RREG, WREG};
use crate::ads1299::registers::{
    self, fields, ChannelMask, EncodeError, Field, Register, RegisterLayout,
};
use crate::ads1299::settings::{ChannelConfig, ChipSettings};
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};
use tracing::{debug, trace};

/// Device-side failures. `B` is the SPI error, `L` the host-link error.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError<B, L = Infallible> {
    #[error("SPI bus error: {0:?}")]
    Bus(B),

    #[error("host link error: {0:?}")]
    Link(L),

    #[error("register encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("invalid channel configuration: {0}")]
    InvalidChannel(String),

    #[error("invalid chip settings: {0}")]
    InvalidSettings(String),

    #[error("register {register} read back 0x{actual:02X}, expected 0x{expected:02X}")]
    Verify {
        register: Register,
        expected: u8,
        actual: u8,
    },
}

pub type DeviceResult<T, B> = Result<T, DeviceError<B>>;

pub struct Ads1299<SPI, D> {
    spi: SPI,
    delay: D,
}

impl<SPI, D> Ads1299<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    pub fn new(spi: SPI, delay: D) -> Self {
        Self { spi, delay }
    }

    /// Give back the bus and delay provider.
    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }

    /// Issue a single-byte command, then wait out its settle time.
    pub fn send_command(&mut self, command: Command) -> DeviceResult<(), SPI::Error> {
        trace!(opcode = command.opcode(), "ads1299 command {:?}", command);
        self.spi.write(&[command.opcode()]).map_err(DeviceError::Bus)?;

        let settle = command.settle_ms();
        if settle > 0 {
            self.delay.delay_ms(settle);
        }
        Ok(())
    }

    /// `[WREG | R, 0x00, V]` in one transaction
    pub fn write_register(&mut self, register: Register, value: u8) -> DeviceResult<(), SPI::Error> {
        if register.is_read_only() {
            return Err(EncodeError::ReadOnly(register).into());
        }

        trace!(%register, value, "wreg");
        let opcode = WREG | (register.address() & ADDRESS_MASK);
        self.spi
            .write(&[opcode, 0x00, value])
            .map_err(DeviceError::Bus)
    }

    /// `[RREG | R, 0x00]` followed by one dummy exchange that clocks the value in
    pub fn read_register(&mut self, register: Register) -> DeviceResult<u8, SPI::Error> {
        let opcode = RREG | (register.address() & ADDRESS_MASK);
        let mut value = [0x00];
        self.spi
            .transaction(&mut [
                Operation::Write(&[opcode, 0x00]),
                Operation::TransferInPlace(&mut value),
            ])
            .map_err(DeviceError::Bus)?;

        trace!(%register, value = value[0], "rreg");
        Ok(value[0])
    }

    /// Clock one data frame (status word plus channels) into `frame`.
    /// DIN is held at zero for the whole transfer so no opcode reaches the chip
    /// during RDATAC.
    pub fn read_data(&mut self, frame: &mut [u8]) -> DeviceResult<(), SPI::Error> {
        frame.fill(0x00);
        self.spi.transfer_in_place(frame).map_err(DeviceError::Bus)
    }

    fn write_fields(
        &mut self,
        layout: RegisterLayout,
        values: &[(Field, u8)],
    ) -> DeviceResult<u8, SPI::Error> {
        let byte = layout.encode(values)?;
        self.write_register(layout.register, byte)?;
        Ok(byte)
    }

    pub fn set_config1(
        &mut self,
        multiple_readback: bool,
        clock_output: bool,
        data_rate: u8,
    ) -> DeviceResult<u8, SPI::Error> {
        self.write_fields(
            registers::CONFIG1,
            &[
                (fields::DAISY_EN, u8::from(multiple_readback)),
                (fields::CLK_EN, u8::from(clock_output)),
                (fields::DR, data_rate),
            ],
        )
    }

    pub fn set_config2(
        &mut self,
        internal_cal: bool,
        cal_amplitude: u8,
        cal_frequency: u8,
    ) -> DeviceResult<u8, SPI::Error> {
        self.write_fields(
            registers::CONFIG2,
            &[
                (fields::INT_CAL, u8::from(internal_cal)),
                (fields::CAL_AMP, cal_amplitude),
                (fields::CAL_FREQ, cal_frequency),
            ],
        )
    }

    pub fn set_config3(
        &mut self,
        reference_buffer: bool,
        bias_measure: bool,
        bias_reference_internal: bool,
        bias_buffer: bool,
        bias_lead_off_sense: bool,
    ) -> DeviceResult<u8, SPI::Error> {
        self.write_fields(
            registers::CONFIG3,
            &[
                (fields::PD_REFBUF, u8::from(reference_buffer)),
                (fields::BIAS_MEAS, u8::from(bias_measure)),
                (fields::BIASREF_INT, u8::from(bias_reference_internal)),
                (fields::PD_BIAS, u8::from(bias_buffer)),
                (fields::BIAS_LOFF_SENS, u8::from(bias_lead_off_sense)),
            ],
        )
    }

    pub fn set_lead_off(
        &mut self,
        threshold: u8,
        current: u8,
        frequency: u8,
    ) -> DeviceResult<u8, SPI::Error> {
        self.write_fields(
            registers::LOFF,
            &[
                (fields::COMP_TH, threshold),
                (fields::ILEAD_OFF, current),
                (fields::FLEAD_OFF, frequency),
            ],
        )
    }

    /// Program one CHnSET register. Invalid channels are rejected before any bus traffic.
    pub fn set_channel(&mut self, channel: &ChannelConfig) -> DeviceResult<u8, SPI::Error> {
        channel.validate().map_err(DeviceError::InvalidChannel)?;
        let register = Register::channel(channel.index)
            .ok_or_else(|| DeviceError::InvalidChannel(format!("channel {}", channel.index)))?;

        self.write_fields(
            registers::CHSET.at(register),
            &[
                (fields::PD, u8::from(channel.power_down)),
                (fields::GAIN, channel.gain.code()),
                (fields::SRB2, u8::from(channel.srb2)),
                (fields::MUX, channel.mux.code()),
            ],
        )
    }

    fn set_mask(&mut self, register: Register, mask: ChannelMask) -> DeviceResult<u8, SPI::Error> {
        self.write_fields(registers::CHANNEL_MASK.at(register), &mask.field_values())
    }

    pub fn set_bias_sensp(&mut self, mask: ChannelMask) -> DeviceResult<u8, SPI::Error> {
        self.set_mask(Register::BIAS_SENSP, mask)
    }

    pub fn set_bias_sensn(&mut self, mask: ChannelMask) -> DeviceResult<u8, SPI::Error> {
        self.set_mask(Register::BIAS_SENSN, mask)
    }

    pub fn set_loff_sensp(&mut self, mask: ChannelMask) -> DeviceResult<u8, SPI::Error> {
        self.set_mask(Register::LOFF_SENSP, mask)
    }

    pub fn set_loff_sensn(&mut self, mask: ChannelMask) -> DeviceResult<u8, SPI::Error> {
        self.set_mask(Register::LOFF_SENSN, mask)
    }

    pub fn set_loff_flip(&mut self, mask: ChannelMask) -> DeviceResult<u8, SPI::Error> {
        self.set_mask(Register::LOFF_FLIP, mask)
    }

    pub fn set_misc1(&mut self, srb1: bool) -> DeviceResult<u8, SPI::Error> {
        self.write_fields(registers::MISC1, &[(fields::SRB1, u8::from(srb1))])
    }

    pub fn set_config4(
        &mut self,
        single_shot: bool,
        lead_off_comparators: bool,
    ) -> DeviceResult<u8, SPI::Error> {
        self.write_fields(
            registers::CONFIG4,
            &[
                (fields::SINGLE_SHOT, u8::from(single_shot)),
                (fields::PD_LOFF_COMP, u8::from(lead_off_comparators)),
            ],
        )
    }

    /// Full bring-up: reset, program every register, verify MISC1, then start
    /// continuous conversion.
    pub fn configure(&mut self, settings: &ChipSettings) -> DeviceResult<(), SPI::Error> {
        settings
            .validate()
            .map_err(|errors| DeviceError::InvalidSettings(errors.join("; ")))?;

        self.send_command(Command::Reset)?;
        self.send_command(Command::Sdatac)?;

        self.set_config1(settings.multiple_readback, settings.clock_output, settings.data_rate)?;
        self.set_config2(
            settings.internal_test_signal,
            settings.test_amplitude,
            settings.test_frequency,
        )?;
        self.set_config3(
            settings.reference_buffer,
            settings.bias_measure,
            settings.bias_reference_internal,
            settings.bias_buffer,
            settings.bias_lead_off_sense,
        )?;
        self.set_lead_off(
            settings.lead_off_threshold,
            settings.lead_off_current,
            settings.lead_off_frequency,
        )?;

        for channel in &settings.channels {
            self.set_channel(channel)?;
        }

        self.set_bias_sensp(settings.bias_sensp)?;
        self.set_bias_sensn(settings.bias_sensn)?;
        self.set_loff_sensp(settings.lead_off_sensp)?;
        self.set_loff_sensn(settings.lead_off_sensn)?;
        self.set_loff_flip(settings.lead_off_flip)?;
        let misc1 = self.set_misc1(settings.srb1)?;
        self.set_config4(settings.single_shot, settings.lead_off_comparators)?;

        let actual = self.read_register(Register::MISC1)?;
        if actual != misc1 {
            return Err(DeviceError::Verify {
                register: Register::MISC1,
                expected: misc1,
                actual,
            });
        }

        self.send_command(Command::Rdatac)?;
        self.send_command(Command::Start)?;
        debug!("ads1299 configured, continuous conversion started");
        Ok(())
    }
}

impl<B> DeviceError<B> {
    /// Widen a bus-only error so it can sit next to host-link errors.
    pub fn with_link<L>(self) -> DeviceError<B, L> {
        match self {
            DeviceError::Bus(e) => DeviceError::Bus(e),
            DeviceError::Link(never) => match never {},
            DeviceError::Encode(e) => DeviceError::Encode(e),
            DeviceError::InvalidChannel(s) => DeviceError::InvalidChannel(s),
            DeviceError::InvalidSettings(s) => DeviceError::InvalidSettings(s),
            DeviceError::Verify {
                register,
                expected,
                actual,
            } => DeviceError::Verify {
                register,
                expected,
                actual,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads1299::settings::{Gain, InputMux};
    use embedded_hal::spi::{ErrorKind, ErrorType};
    use embedded_hal_mock::eh1::delay::{
        CheckedDelay, NoopDelay, Transaction as DelayTransaction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    /// One chip-select assertion shifting out `bytes`
    fn write(bytes: &[u8]) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(bytes.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    fn register_read(opcode: u8, value: u8) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![opcode, 0x00]),
            SpiTransaction::transfer_in_place(vec![0x00], vec![value]),
            SpiTransaction::transaction_end(),
        ]
    }

    fn finish(chip: Ads1299<SpiMock<u8>, NoopDelay>) {
        let (mut spi, _delay) = chip.release();
        spi.done();
    }

    struct FailingBus;

    impl ErrorType for FailingBus {
        type Error = ErrorKind;
    }

    impl SpiDevice for FailingBus {
        fn transaction(&mut self, _operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            Err(ErrorKind::Other)
        }
    }

    #[test]
    fn test_channel_register_write_is_one_transaction() {
        let spi = SpiMock::new(&write(&[0x47, 0x00, 0x60]));
        let mut chip = Ads1299::new(spi, NoopDelay::new());

        let channel = ChannelConfig::enabled(3, Gain::X24);
        assert_eq!(chip.set_channel(&channel).unwrap(), 0x60);
        finish(chip);
    }

    #[test]
    fn test_command_settle_has_no_bus_traffic() {
        let expectations: Vec<_> = [0x06, 0x08, 0x11].iter().flat_map(|&op| write(&[op])).collect();
        let spi = SpiMock::new(&expectations);
        let delay = CheckedDelay::new(&[DelayTransaction::delay_ms(12), DelayTransaction::delay_ms(3)]);
        let mut chip = Ads1299::new(spi, delay);

        chip.send_command(Command::Reset).unwrap();
        chip.send_command(Command::Start).unwrap();
        chip.send_command(Command::Sdatac).unwrap();

        let (mut spi, mut delay) = chip.release();
        spi.done();
        delay.done();
    }

    #[test]
    fn test_read_register_clocks_dummy_byte() {
        let spi = SpiMock::new(&register_read(0x20, 0x3E));
        let mut chip = Ads1299::new(spi, NoopDelay::new());

        assert_eq!(chip.read_register(Register::ID).unwrap(), 0x3E);
        finish(chip);
    }

    #[test]
    fn test_read_data_shifts_out_zeros() {
        let mut response = vec![0xC0, 0x00, 0x00];
        response.extend((1..=24).map(|b| b as u8));
        let spi = SpiMock::new(&[
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0x00; 27], response.clone()),
            SpiTransaction::transaction_end(),
        ]);
        let mut chip = Ads1299::new(spi, NoopDelay::new());

        let mut frame = [0xFF; 27];
        chip.read_data(&mut frame).unwrap();
        assert_eq!(frame.to_vec(), response);
        finish(chip);
    }

    #[test]
    fn test_powered_down_channel_with_live_mux_is_rejected() {
        let mut chip = Ads1299::new(SpiMock::new(&[]), NoopDelay::new());

        let channel = ChannelConfig {
            index: 6,
            power_down: true,
            gain: Gain::X24,
            srb2: false,
            mux: InputMux::Normal,
        };
        let result = chip.set_channel(&channel);

        assert!(matches!(result, Err(DeviceError::InvalidChannel(_))));
        finish(chip);
    }

    #[test]
    fn test_read_only_register_write_is_rejected() {
        let mut chip = Ads1299::new(SpiMock::new(&[]), NoopDelay::new());

        let result = chip.write_register(Register::LOFF_STATN, 0x01);
        assert!(matches!(
            result,
            Err(DeviceError::Encode(EncodeError::ReadOnly(Register::LOFF_STATN)))
        ));
        finish(chip);
    }

    #[test]
    fn test_bus_errors_propagate() {
        let mut chip = Ads1299::new(FailingBus, NoopDelay::new());

        assert!(matches!(chip.send_command(Command::Stop), Err(DeviceError::Bus(_))));
        assert!(matches!(chip.set_misc1(true), Err(DeviceError::Bus(_))));
        assert!(matches!(chip.read_data(&mut [0; 27]), Err(DeviceError::Bus(_))));
    }

    #[test]
    fn test_bias_masks_use_canonical_bits() {
        let mut expectations = write(&[0x4D, 0x00, 0x02]);
        expectations.extend(write(&[0x4E, 0x00, 0x80]));
        let mut chip = Ads1299::new(SpiMock::new(&expectations), NoopDelay::new());

        chip.set_bias_sensp(ChannelMask::from_channels(&[2])).unwrap();
        chip.set_bias_sensn(ChannelMask::from_channels(&[8])).unwrap();
        finish(chip);
    }

    fn default_bring_up(misc1_readback: u8) -> Vec<SpiTransaction<u8>> {
        let writes: [&[u8]; 21] = [
            &[0x06],
            &[0x11],
            &[0x41, 0x00, 0xB6],
            &[0x42, 0x00, 0xD0],
            &[0x43, 0x00, 0xEE],
            &[0x44, 0x00, 0x00],
            &[0x45, 0x00, 0x60],
            &[0x46, 0x00, 0x60],
            &[0x47, 0x00, 0x60],
            &[0x48, 0x00, 0x60],
            &[0x49, 0x00, 0xE1],
            &[0x4A, 0x00, 0xE1],
            &[0x4B, 0x00, 0xE1],
            &[0x4C, 0x00, 0xE1],
            &[0x4D, 0x00, 0x01],
            &[0x4E, 0x00, 0x01],
            &[0x4F, 0x00, 0x00],
            &[0x50, 0x00, 0x00],
            &[0x51, 0x00, 0x00],
            &[0x55, 0x00, 0x20],
            &[0x57, 0x00, 0x00],
        ];
        let mut expectations: Vec<_> = writes.iter().flat_map(|bytes| write(bytes)).collect();
        expectations.extend(register_read(0x35, misc1_readback));
        expectations
    }

    #[test]
    fn test_configure_writes_default_register_image() {
        let mut expectations = default_bring_up(0x20);
        expectations.extend(write(&[0x10]));
        expectations.extend(write(&[0x08]));
        let delay = CheckedDelay::new(&[
            DelayTransaction::delay_ms(12),
            DelayTransaction::delay_ms(3),
            DelayTransaction::delay_ms(3),
        ]);
        let mut chip = Ads1299::new(SpiMock::new(&expectations), delay);

        chip.configure(&ChipSettings::default()).unwrap();

        let (mut spi, mut delay) = chip.release();
        spi.done();
        delay.done();
    }

    #[test]
    fn test_configure_reports_verify_mismatch() {
        let spi = SpiMock::new(&default_bring_up(0x00));
        let mut chip = Ads1299::new(spi, NoopDelay::new());

        let err = chip.configure(&ChipSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Verify {
                register: Register::MISC1,
                expected: 0x20,
                actual: 0x00
            }
        ));
        finish(chip);
    }

    #[test]
    fn test_out_of_range_settings_never_reach_the_bus() {
        let mut settings = ChipSettings::default();
        settings.lead_off_current = 5;
        let mut chip = Ads1299::new(SpiMock::new(&[]), NoopDelay::new());

        match chip.configure(&settings) {
            Err(DeviceError::InvalidSettings(message)) => assert!(message.contains("ILEAD_OFF")),
            other => panic!("Expected invalid settings, got {:?}", other),
        }
        finish(chip);
    }
}
