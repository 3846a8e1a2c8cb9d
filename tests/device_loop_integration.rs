// tests/device_loop_integration.rs
//! Firmware loop against a simulated ADS1299 register file

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};
use modular_bci::acquisition::{AcquisitionLoop, InterruptFlags, SerialLink};
use modular_bci::ads1299::{Ads1299, ChipSettings, DeviceError, Register};
use modular_bci::config::constants::protocol::SYNC_BYTES;
use modular_bci::decoder::SampleDecoder;
use modular_bci::session::StreamParser;
use std::sync::Arc;
use std::thread;

/// Keeps written registers and answers frame reads with a counting frame.
struct SimulatedChip {
    registers: [u8; 0x18],
    frames_read: u8,
    /// Value returned on register reads instead of the stored one
    corrupt_readback: Option<u8>,
    /// Chip `k` channel `c` reads back `8k + c + 1` instead of the frame count
    numbered_channels: bool,
    /// Bytes the host drove on DIN while clocking frames out
    frame_mosi: Vec<u8>,
}

impl SimulatedChip {
    fn new() -> Self {
        Self {
            registers: [0; 0x18],
            frames_read: 0,
            corrupt_readback: None,
            numbered_channels: false,
            frame_mosi: Vec::new(),
        }
    }

    fn fill_frame(&mut self, buf: &mut [u8]) {
        self.frames_read = self.frames_read.wrapping_add(1);
        buf.fill(0);
        for (chip, bytes) in buf.chunks_mut(27).enumerate() {
            bytes[..3].copy_from_slice(&SYNC_BYTES);
            for channel in 0..8 {
                bytes[3 + channel * 3 + 2] = if self.numbered_channels {
                    (chip * 8 + channel + 1) as u8
                } else {
                    self.frames_read
                };
            }
        }
    }
}

impl ErrorType for SimulatedChip {
    type Error = ErrorKind;
}

impl SpiDevice for SimulatedChip {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        let mut pending_read = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) if bytes.len() == 3 && bytes[0] & 0xE0 == 0x40 => {
                    self.registers[usize::from(bytes[0] & 0x1F)] = bytes[2];
                }
                Operation::Write(bytes) if bytes.len() == 2 && bytes[0] & 0xE0 == 0x20 => {
                    pending_read = Some(usize::from(bytes[0] & 0x1F));
                }
                Operation::Write(_) => {}
                Operation::TransferInPlace(buf) => match pending_read.take() {
                    Some(address) => {
                        buf[0] = self.corrupt_readback.unwrap_or(self.registers[address]);
                    }
                    None => {
                        self.frame_mosi.extend_from_slice(buf);
                        self.fill_frame(buf);
                    }
                },
                _ => return Err(ErrorKind::Other),
            }
        }
        Ok(())
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Default)]
struct HostLink(Vec<u8>);

impl SerialLink for HostLink {
    type Error = ();

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ()> {
        self.0.extend_from_slice(bytes);
        Ok(())
    }
}

fn build_with(
    chip: SimulatedChip,
    chip_count: usize,
) -> (Arc<InterruptFlags>, AcquisitionLoop<SimulatedChip, NoDelay, HostLink>) {
    let flags = Arc::new(InterruptFlags::new());
    let acquisition = AcquisitionLoop::new(
        Ads1299::new(chip, NoDelay),
        HostLink::default(),
        flags.clone(),
        chip_count,
    )
    .unwrap();
    (flags, acquisition)
}

fn build(chip_count: usize) -> (Arc<InterruptFlags>, AcquisitionLoop<SimulatedChip, NoDelay, HostLink>) {
    build_with(SimulatedChip::new(), chip_count)
}

#[test]
fn test_bring_up_programs_register_file() {
    let (_flags, mut acquisition) = build(1);
    acquisition.bring_up(&ChipSettings::default()).unwrap();

    let (chip, _link) = acquisition.release();
    let (spi, _delay) = chip.release();
    assert_eq!(spi.registers[Register::CONFIG1.address() as usize], 0xB6);
    assert_eq!(spi.registers[Register::CONFIG3.address() as usize], 0xEE);
    assert_eq!(spi.registers[Register::MISC1.address() as usize], 0x20);
    assert_eq!(spi.registers[0x05], 0x60);
    assert_eq!(spi.registers[0x0C], 0xE1);
}

#[test]
fn test_bring_up_reports_readback_mismatch() {
    let mut chip = SimulatedChip::new();
    chip.corrupt_readback = Some(0x00);
    let (_flags, mut acquisition) = build_with(chip, 1);

    let err = acquisition.bring_up(&ChipSettings::default()).unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Verify {
            expected: 0x20,
            actual: 0x00,
            ..
        }
    ));
}

#[test]
fn test_invalid_chip_count_rejected() {
    let flags = Arc::new(InterruptFlags::new());
    let result = AcquisitionLoop::new(Ads1299::new(SimulatedChip::new(), NoDelay), HostLink::default(), flags, 0);
    assert!(result.is_err());
}

#[test]
fn test_forwarded_stream_parses_on_host() {
    let (flags, mut acquisition) = build(1);
    acquisition.bring_up(&ChipSettings::default()).unwrap();

    flags.push_command_byte(b'b');
    acquisition.service().unwrap();
    for _ in 0..3 {
        flags.signal_data_ready();
        acquisition.service().unwrap();
    }
    flags.push_command_byte(b's');
    acquisition.service().unwrap();
    flags.signal_data_ready();
    acquisition.service().unwrap();

    assert_eq!(acquisition.stats().frames_transferred, 4);
    assert_eq!(acquisition.stats().frames_forwarded, 3);

    let (_chip, link) = acquisition.release();
    let mut parser = StreamParser::new(8, SampleDecoder::default());
    assert_eq!(parser.feed_all(&link.0), 3);
    let codes: Vec<i32> = parser.drain_blocks().map(|b| b.raw[0]).collect();
    assert_eq!(codes, vec![1, 2, 3]);
}

#[test]
fn test_daisy_frame_parses_as_one_32_channel_block() {
    let mut chip = SimulatedChip::new();
    chip.numbered_channels = true;
    let (flags, mut acquisition) = build_with(chip, 4);
    flags.push_command_byte(b'b');
    acquisition.service().unwrap();
    for _ in 0..2 {
        flags.signal_data_ready();
        acquisition.service().unwrap();
    }

    let frame = acquisition.frame();
    assert_eq!(frame.len(), 4 * 27);
    assert!((0..4).all(|chip| frame.has_sync(chip)));

    let (_chip, link) = acquisition.release();
    assert_eq!(link.0.len(), 2 * (3 + 32 * 3));

    let mut parser = StreamParser::new(32, SampleDecoder::default());
    assert_eq!(parser.feed_all(&link.0), 2);
    assert_eq!(parser.stats().bytes_discarded, 0);

    let expected: Vec<i32> = (1..=32).collect();
    for block in parser.drain_blocks() {
        assert_eq!(block.raw, expected);
    }
}

#[test]
fn test_frame_reads_drive_zeros_on_din() {
    let (flags, mut acquisition) = build(2);
    acquisition.bring_up(&ChipSettings::default()).unwrap();
    for _ in 0..3 {
        flags.signal_data_ready();
        acquisition.service().unwrap();
    }

    let (chip, _link) = acquisition.release();
    let (spi, _delay) = chip.release();
    assert_eq!(spi.frames_read, 3);
    assert_eq!(spi.frame_mosi.len(), 3 * 54);
    assert!(spi.frame_mosi.iter().all(|&b| b == 0x00));
}

#[test]
fn test_interrupt_context_on_another_thread() {
    let (flags, mut acquisition) = build(1);
    flags.push_command_byte(b'b');
    acquisition.service().unwrap();

    let isr = {
        let flags = flags.clone();
        thread::spawn(move || flags.signal_data_ready())
    };
    isr.join().unwrap();

    let serviced = acquisition.service().unwrap();
    assert!(serviced.frame_transferred);
    assert!(!flags.data_ready());
    assert_eq!(acquisition.stats().frames_forwarded, 1);
}
