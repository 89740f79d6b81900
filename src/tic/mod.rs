//! # TIC protocol decoding
//!
//! The Linky meter in standard mode streams frames over a 9600 baud 7E1 link:
//!
//! ```text
//! STX  LF label TAB [datetime TAB] value TAB checksum CR  ...  ETX
//! 0x02 0x0A                                          0x0D      0x03
//! ```
//!
//! An `EOT` (0x04) interrupts a frame at any point.
//!
//! - [`reader`] rebuilds one frame from a byte stream.
//! - [`checksum`] validates one message line.
//! - [`decoder`] turns a frame into [`DataPoint`]s.

pub mod bounded;
pub mod checksum;
pub mod decoder;
pub mod reader;

pub use bounded::{BoundedBuf, BoundedString};
pub use checksum::{checksum, is_valid};
pub use decoder::{decode, Decoded};
pub use reader::{Frame, FrameReader};

use serde::Serialize;

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const EOT: u8 = 0x04;
pub const LF: u8 = 0x0A;
pub const CR: u8 = 0x0D;
pub const TAB: u8 = b'\t';

pub const MESSAGE_COUNT_MAX: usize = 71;
pub const LABEL_LEN_MAX: usize = 8;
pub const DATETIME_LEN_MAX: usize = 13;
pub const VALUE_LEN_MAX: usize = 98;

// 395: all labels, 312: 24 datetimes, 639: all values, then one LF + CR per
// line, two tabs for the 47 plain lines, three for the 24 dated ones and one
// checksum byte per line.
pub const FRAME_LENGTH_MAX: usize = 2
    + 395
    + 312
    + 639
    + MESSAGE_COUNT_MAX * 2
    + 47 * 2
    + 24 * 3
    + MESSAGE_COUNT_MAX;

pub type Label = BoundedString<LABEL_LEN_MAX>;
pub type Datetime = BoundedString<DATETIME_LEN_MAX>;
pub type Value = BoundedString<VALUE_LEN_MAX>;

/// One decoded message line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataPoint {
    pub label: Label,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<Datetime>,
    pub value: Value,
}

impl DataPoint {
    /// The datetime field, if present and non-empty.
    pub fn datetime(&self) -> Option<&str> {
        self.datetime
            .as_deref()
            .filter(|d| !d.is_empty())
    }
}
