// src/hal/serial_driver.rs
//! Serial port transport and device discovery

use crate::config::constants::serial::*;
use crate::error::{BciError, BciResult};
use crate::hal::traits::Transport;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Probe candidate ports when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    #[serde(default = "defaults::baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "defaults::data_bits")]
    pub data_bits: u8,
    #[serde(default = "defaults::stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "defaults::parity")]
    pub parity: Parity,
    #[serde(default = "defaults::flow_control")]
    pub flow_control: FlowControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

mod defaults {
    use super::*;

    pub fn baud_rate() -> u32 { DEFAULT_BAUD_RATE }
    pub fn data_bits() -> u8 { DEFAULT_DATA_BITS }
    pub fn stop_bits() -> u8 { DEFAULT_STOP_BITS }
    pub fn parity() -> Parity { Parity::None }
    pub fn flow_control() -> FlowControl { FlowControl::None }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: None,
            baud_rate: defaults::baud_rate(),
            data_bits: defaults::data_bits(),
            stop_bits: defaults::stop_bits(),
            parity: defaults::parity(),
            flow_control: defaults::flow_control(),
        }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if matches!(&self.port_name, Some(name) if name.trim().is_empty()) {
            errors.push("Port name cannot be empty".to_string());
        }
        if self.baud_rate == 0 || self.baud_rate > MAX_BAUD_RATE {
            errors.push(format!("Invalid baud rate: {}", self.baud_rate));
        }
        if !(5..=8).contains(&self.data_bits) {
            errors.push(format!("Invalid data bits: {}", self.data_bits));
        }
        if !(1..=2).contains(&self.stop_bits) {
            errors.push(format!("Invalid stop bits: {}", self.stop_bits));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn builder(&self, port: &str) -> serialport::SerialPortBuilder {
        let data_bits = match self.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        };
        let stop_bits = match self.stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        };
        let parity = match self.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        };
        let flow_control = match self.flow_control {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        };

        serialport::new(port, self.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
    }
}

/// `serialport`-backed [`Transport`]
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    timeout: Duration,
}

impl SerialTransport {
    /// Open `port` with the configured line settings.
    pub fn open(config: &SerialConfig, port: &str) -> BciResult<Self> {
        let timeout = Duration::from_millis(crate::config::constants::session::DEFAULT_POLL_TIMEOUT_MS);
        let handle = config
            .builder(port)
            .timeout(timeout)
            .open()
            .map_err(|e| BciError::DeviceOpen {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        info!(port, baud = config.baud_rate, "serial port opened");
        Ok(Self {
            port: handle,
            name: port.to_string(),
            timeout,
        })
    }

    /// Open the configured port, or the first candidate that opens.
    pub fn discover(config: &SerialConfig) -> BciResult<Self> {
        if let Some(port) = &config.port_name {
            return Self::open(config, port);
        }

        for candidate in candidate_ports() {
            match Self::open(config, &candidate) {
                Ok(transport) => return Ok(transport),
                Err(e) => trace!("skipping {}: {}", candidate, e),
            }
        }
        Err(BciError::NoDeviceFound)
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if timeout != self.timeout {
            self.port.set_timeout(timeout).map_err(io::Error::from)?;
            self.timeout = timeout;
        }

        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(bytes.len())
    }
}

/// Ports the system enumerates, then the conventional device names.
pub fn candidate_ports() -> Vec<String> {
    let mut candidates: Vec<String> = match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            debug!("port enumeration failed: {}", e);
            Vec::new()
        }
    };

    for name in conventional_port_names() {
        if !candidates.contains(&name) {
            candidates.push(name);
        }
    }
    candidates
}

#[cfg(windows)]
fn conventional_port_names() -> Vec<String> {
    (1..=MAX_SERIAL_TTY).map(|n| format!("COM{}", n)).collect()
}

#[cfg(not(windows))]
fn conventional_port_names() -> Vec<String> {
    let usb = (0..MAX_USB_TTY).map(|n| format!("/dev/ttyUSB{}", n));
    let uart = (0..MAX_SERIAL_TTY).map(|n| format!("/dev/ttyS{}", n));
    usb.chain(uart).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SerialConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.baud_rate, 115_200);
        assert!(config.port_name.is_none());
    }

    #[test]
    fn test_invalid_line_settings() {
        let config = SerialConfig {
            port_name: Some(" ".to_string()),
            baud_rate: 0,
            data_bits: 9,
            stop_bits: 3,
            ..SerialConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().len(), 4);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_conventional_names_prefer_usb() {
        let names = conventional_port_names();
        assert_eq!(names[0], "/dev/ttyUSB0");
        assert!(names.contains(&"/dev/ttyS0".to_string()));
        let usb_last = names.iter().rposition(|n| n.starts_with("/dev/ttyUSB"));
        let uart_first = names.iter().position(|n| n.starts_with("/dev/ttyS"));
        assert!(usb_last < uart_first);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let err = SerialTransport::open(&SerialConfig::default(), "/definitely/not/a/port");
        assert!(matches!(err, Err(BciError::DeviceOpen { .. })));
    }
}
