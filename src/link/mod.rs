//! # Serial link to the meter
//!
//! A [`SerialLink`] opens a fresh byte source for every poll cycle; dropping
//! the returned port closes it. Opening per cycle means an unplugged adapter
//! simply fails to open until it comes back.
//!
//! - [`SerialPortLink`] talks to a real tty at the fixed TIC wire format.
//! - [`FileLink`] replays a captured byte stream from a regular file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::time::Duration;

#[cfg(feature = "serial")]
use log::debug;

use crate::error::{Result, TicError};
use crate::tic::reader::ByteSource;

/// Baud rate of the standard TIC mode.
pub const BAUD_RATE: u32 = 9600;

/// Wait for one byte before the read is reported as timed out.
pub const READ_TIMEOUT: Duration = Duration::from_secs(8);

/// Opens byte sources on a device. Implementations must be shareable with
/// the blocking thread that performs the read.
pub trait SerialLink: Send + Sync + 'static {
    type Port: ByteSource + Send + 'static;

    fn open(&self, device: &str) -> Result<Self::Port>;
}

/// Masks every byte to 7 bits, as the line carries 7-bit characters.
pub struct SevenBit<R> {
    inner: R,
}

impl<R: Read> SevenBit<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> Read for SevenBit<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        for b in &mut buf[..n] {
            *b &= 0x7F;
        }
        Ok(n)
    }
}

/// Real serial device: 9600 baud, 7 data bits, even parity, one stop bit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortLink;

#[cfg(feature = "serial")]
impl SerialLink for SerialPortLink {
    type Port = SevenBit<Box<dyn serialport::SerialPort>>;

    fn open(&self, device: &str) -> Result<Self::Port> {
        let port = serialport::new(device, BAUD_RATE)
            .data_bits(serialport::DataBits::Seven)
            .parity(serialport::Parity::Even)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TicError::LinkUnavailable {
                device: device.to_string(),
                reason: e.to_string(),
            })?;
        // Whatever was buffered belongs to an older frame.
        if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
            debug!("could not flush input of {}: {}", device, e);
        }
        Ok(SevenBit::new(port))
    }
}

#[cfg(not(feature = "serial"))]
impl SerialLink for SerialPortLink {
    type Port = std::io::Empty;

    fn open(&self, device: &str) -> Result<Self::Port> {
        Err(TicError::LinkUnavailable {
            device: device.to_string(),
            reason: "serial support not compiled in".to_string(),
        })
    }
}

/// Reads a captured stream from a file. End of file fails the read.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLink;

impl SerialLink for FileLink {
    type Port = BufReader<File>;

    fn open(&self, device: &str) -> Result<Self::Port> {
        File::open(device)
            .map(BufReader::new)
            .map_err(|e| TicError::LinkUnavailable {
                device: device.to_string(),
                reason: e.to_string(),
            })
    }
}
