// src/acquisition/device_loop.rs
//! Cooperative firmware main loop: data-ready transfers plus the forwarding toggle

use crate::acquisition::flags::InterruptFlags;
use crate::acquisition::frame::RawFrame;
use crate::ads1299::{Ads1299, ChipSettings, DeviceError};
use crate::config::constants::protocol::{FORWARD_DISABLE, FORWARD_ENABLE};
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

/// Outbound byte sink towards the host (UART, USB CDC, ...)
pub trait SerialLink {
    type Error: Debug;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Counters kept by the loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub frames_transferred: u64,
    pub frames_forwarded: u64,
    pub commands_applied: u64,
    pub commands_ignored: u64,
}

/// What one `service` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Serviced {
    pub frame_transferred: bool,
    pub command: Option<u8>,
}

pub struct AcquisitionLoop<SPI, D, L> {
    chip: Ads1299<SPI, D>,
    link: L,
    flags: Arc<InterruptFlags>,
    frame: RawFrame,
    forwarding: bool,
    stats: AcquisitionStats,
}

impl<SPI, D, L> AcquisitionLoop<SPI, D, L>
where
    SPI: SpiDevice,
    D: DelayNs,
    L: SerialLink,
{
    pub fn new(
        chip: Ads1299<SPI, D>,
        link: L,
        flags: Arc<InterruptFlags>,
        chip_count: usize,
    ) -> Result<Self, String> {
        Ok(Self {
            chip,
            link,
            flags,
            frame: RawFrame::new(chip_count)?,
            forwarding: false,
            stats: AcquisitionStats::default(),
        })
    }

    /// Program the chip and start continuous conversion.
    pub fn bring_up(&mut self, settings: &ChipSettings) -> Result<(), DeviceError<SPI::Error, L::Error>> {
        self.chip.configure(settings).map_err(DeviceError::with_link)?;
        info!(frame_len = self.frame.len(), "acquisition ready");
        Ok(())
    }

    /// One pass of the main loop. Never waits for an edge; does nothing when no flag is set.
    pub fn service(&mut self) -> Result<Serviced, DeviceError<SPI::Error, L::Error>> {
        let mut serviced = Serviced::default();

        if self.flags.data_ready() {
            self.chip
                .read_data(self.frame.as_mut_bytes())
                .map_err(DeviceError::with_link)?;
            self.stats.frames_transferred += 1;

            if self.forwarding {
                for segment in self.frame.forwarded_segments() {
                    self.link.write_all(segment).map_err(DeviceError::Link)?;
                }
                self.stats.frames_forwarded += 1;
            }

            self.flags.clear_data_ready();
            serviced.frame_transferred = true;
        }

        if let Some(byte) = self.flags.take_command_byte() {
            self.apply_command(byte);
            serviced.command = Some(byte);
        }

        Ok(serviced)
    }

    fn apply_command(&mut self, byte: u8) {
        match byte {
            FORWARD_ENABLE => {
                self.forwarding = true;
                self.stats.commands_applied += 1;
                debug!("forwarding enabled");
            }
            FORWARD_DISABLE => {
                self.forwarding = false;
                self.stats.commands_applied += 1;
                debug!("forwarding disabled");
            }
            _ => self.stats.commands_ignored += 1,
        }
    }

    pub fn is_forwarding(&self) -> bool {
        self.forwarding
    }

    /// The last transferred frame
    pub fn frame(&self) -> &RawFrame {
        &self.frame
    }

    pub fn stats(&self) -> &AcquisitionStats {
        &self.stats
    }

    pub fn command_overruns(&self) -> u32 {
        self.flags.command_overruns()
    }

    pub fn release(self) -> (Ads1299<SPI, D>, L) {
        (self.chip, self.link)
    }
}
