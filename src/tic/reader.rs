//! Frame reconstruction from an unreliable byte stream.
//!
//! [`FrameReader`] is a small state machine driven one byte at a time. It
//! tolerates noise between frames, drops frames that break the line
//! structure, and never writes past its bounded buffer.

use log::{debug, trace, warn};

use super::{BoundedBuf, CR, EOT, ETX, FRAME_LENGTH_MAX, LF, STX};
use crate::error::{Result, TicError};
use crate::logutil::escape_bytes;

/// Protocol violations tolerated while waiting for one good frame.
pub const ERROR_LIMIT: u32 = 10;

/// Source of single bytes with a bounded wait per byte.
pub trait ByteSource {
    fn read_byte(&mut self) -> Result<u8>;
}

/// Any reader is a byte source. A zero-length read means the stream ended;
/// interrupted reads are retried.
impl<R: std::io::Read + ?Sized> ByteSource for R {
    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(0) => {
                    return Err(TicError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "unable to read from source",
                    )))
                }
                Ok(_) => return Ok(byte[0]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                    ) =>
                {
                    return Err(TicError::IoTimeout)
                }
                Err(e) => return Err(TicError::Io(e)),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    FrameBegin,
    MsgBegin,
    MsgEnd,
    FrameEnd,
}

/// A complete frame payload, start and end markers excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
    errors: u32,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Protocol violations seen (and recovered from) while reading this frame.
    pub fn errors(&self) -> u32 {
        self.errors
    }
}

#[derive(Debug)]
pub struct FrameReader {
    buf: BoundedBuf,
    state: State,
    errors: u32,
    noise: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    pub fn new() -> Self {
        Self::with_limit(FRAME_LENGTH_MAX)
    }

    /// Reader whose frame buffer holds at most `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BoundedBuf::with_limit(limit),
            state: State::Init,
            errors: 0,
            noise: 0,
        }
    }

    /// Bytes accumulated so far; after a failed read this is what was
    /// collected for the abandoned frame.
    pub fn partial(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    /// Reads bytes until one complete frame has been seen.
    ///
    /// Gives up with [`TicError::FramingError`] after [`ERROR_LIMIT`]
    /// protocol violations or once twice the frame limit has been discarded
    /// as noise, and with [`TicError::FrameOverflow`] as soon as a frame
    /// would not fit. Source errors are returned as-is.
    pub fn read_frame<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<Frame> {
        self.buf.clear();
        self.state = State::Init;
        self.errors = 0;
        self.noise = 0;
        let noise_limit = self.buf.limit() * 2;

        loop {
            let byte = source.read_byte()?;
            self.feed(byte)?;

            if self.state == State::FrameEnd {
                trace!("frame complete: {}", escape_bytes(self.buf.as_bytes()));
                return Ok(Frame {
                    bytes: self.buf.as_bytes().to_vec(),
                    errors: self.errors,
                });
            }
            if self.errors >= ERROR_LIMIT || self.noise >= noise_limit {
                warn!(
                    "giving up on frame: {} errors, {} noise bytes",
                    self.errors, self.noise
                );
                return Err(TicError::FramingError {
                    errors: self.errors,
                    noise_bytes: self.noise,
                });
            }
        }
    }

    fn feed(&mut self, byte: u8) -> Result<()> {
        match byte {
            STX => {
                if self.state != State::Init {
                    self.violation(byte, "STX inside a frame, restarting");
                }
                self.state = State::FrameBegin;
                self.buf.clear();
            }
            LF => match self.state {
                State::Init => {}
                State::FrameBegin | State::MsgEnd => {
                    self.state = State::MsgBegin;
                    self.append(byte)?;
                }
                _ => {
                    self.append(byte)?;
                    self.violation(byte, "unexpected LF, dropping frame");
                }
            },
            CR => match self.state {
                State::Init => {}
                State::MsgBegin => {
                    self.state = State::MsgEnd;
                    self.append(byte)?;
                }
                _ => self.violation(byte, "unexpected CR, dropping frame"),
            },
            ETX => match self.state {
                State::Init => {}
                State::MsgEnd => self.state = State::FrameEnd,
                _ => self.violation(byte, "unexpected ETX, dropping frame"),
            },
            EOT => {
                debug!("frame interrupted by EOT");
                self.state = State::Init;
            }
            _ => match self.state {
                State::Init | State::FrameEnd => {}
                State::MsgBegin => self.append(byte)?,
                State::FrameBegin => {
                    self.append(byte)?;
                    self.violation(byte, "STX not followed by LF, dropping frame");
                }
                State::MsgEnd => {
                    self.append(byte)?;
                    self.violation(byte, "CR not followed by LF or ETX, dropping frame");
                }
            },
        }

        if self.state == State::Init {
            self.noise += 1;
        }
        Ok(())
    }

    fn append(&mut self, byte: u8) -> Result<()> {
        self.buf.push(byte).map_err(|e| TicError::FrameOverflow {
            limit: e.capacity,
        })
    }

    fn violation(&mut self, byte: u8, what: &str) {
        debug!("{} (byte 0x{:02x})", what, byte);
        self.errors += 1;
        self.state = State::Init;
    }
}
