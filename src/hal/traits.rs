// src/hal/traits.rs
//! Byte transport between the host and the board

use std::io;
use std::time::Duration;

/// Half-duplex byte pipe the session owns exclusively.
pub trait Transport: Send {
    /// Port or device name, for logs
    fn name(&self) -> &str;

    /// Read whatever is available, waiting at most `timeout`. `Ok(0)` means nothing arrived.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Write the bytes, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        (**self).write(bytes)
    }
}
