//! Splits a rebuilt frame into [`DataPoint`]s.
//!
//! The field layout is purely syntactic: two tabs before the checksum give
//! `label TAB value`, a third one gives `label TAB datetime TAB value`.

use std::str;

use log::warn;

use super::{checksum, DataPoint, Datetime, Label, Value, CR, MESSAGE_COUNT_MAX, TAB};
use crate::error::{Result, TicError};
use crate::logutil::escape_bytes;

/// Rejected lines that make a whole frame untrusted.
pub const REJECT_LIMIT: u32 = 3;

/// Result of decoding one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Data points in frame order.
    pub points: Vec<DataPoint>,
    /// Lines dropped without failing the frame.
    pub rejected: u32,
}

impl Decoded {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Decodes every CR-terminated line of `frame`.
///
/// Lines failing the checksum, lacking their tabs, carrying an empty label or
/// oversized fields are dropped; the [`REJECT_LIMIT`]th drop fails the frame
/// with [`TicError::MalformedFrame`]. Valid lines past [`MESSAGE_COUNT_MAX`]
/// are ignored without counting against the frame.
pub fn decode(frame: &[u8]) -> Result<Decoded> {
    let mut decoded = Decoded::default();
    let mut rest = frame;

    while let Some(end) = rest.iter().position(|&b| b == CR) {
        let line = &rest[..end];
        rest = &rest[end + 1..];

        let point = if !checksum::is_valid(line) {
            warn!("bad checksum: {}", escape_bytes(line));
            None
        } else if decoded.points.len() >= MESSAGE_COUNT_MAX {
            warn!(
                "more than {} messages in frame, ignoring: {}",
                MESSAGE_COUNT_MAX,
                escape_bytes(line)
            );
            continue;
        } else {
            let point = parse_line(&line[1..]);
            if point.is_none() {
                warn!("unparsable line: {}", escape_bytes(line));
            }
            point
        };

        match point {
            Some(point) => decoded.points.push(point),
            None => {
                decoded.rejected += 1;
                if decoded.rejected >= REJECT_LIMIT {
                    return Err(TicError::MalformedFrame {
                        rejected: decoded.rejected,
                    });
                }
            }
        }
    }

    Ok(decoded)
}

/// `body` runs from the label through the checksum byte.
fn parse_line(body: &[u8]) -> Option<DataPoint> {
    let mut fields = body.splitn(3, |&b| b == TAB);
    let label = fields.next().filter(|l| !l.is_empty())?;
    let second = fields.next()?;
    let rest = fields.next()?;

    let (datetime, value) = match rest.iter().position(|&b| b == TAB) {
        Some(tab) => (Some(second), &rest[..tab]),
        None => (None, second),
    };

    Some(DataPoint {
        label: Label::try_from(str::from_utf8(label).ok()?).ok()?,
        datetime: match datetime {
            Some(d) => Some(Datetime::try_from(str::from_utf8(d).ok()?).ok()?),
            None => None,
        },
        value: Value::try_from(str::from_utf8(value).ok()?).ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tic::LF;

    fn line(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![LF];
        out.extend_from_slice(payload);
        out.push(checksum::checksum(payload));
        out.push(CR);
        out
    }

    fn bad_line(payload: &[u8]) -> Vec<u8> {
        let mut out = line(payload);
        let cs = out.len() - 2;
        out[cs] = if out[cs] == b'!' { b'"' } else { b'!' };
        out
    }

    #[test]
    fn two_tabs_give_label_and_value() {
        let frame = line(b"ADCO\t041234567890\t");
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.points[0].label, "ADCO");
        assert_eq!(decoded.points[0].value, "041234567890");
        assert!(decoded.points[0].datetime.is_none());
    }

    #[test]
    fn three_tabs_give_datetime_in_the_middle() {
        let frame = line(b"SMAXSN\tH081225070000\t05678\t");
        let decoded = decode(&frame).unwrap();
        let point = &decoded.points[0];
        assert_eq!(point.label, "SMAXSN");
        assert_eq!(point.datetime(), Some("H081225070000"));
        assert_eq!(point.value, "05678");
    }

    #[test]
    fn empty_value_is_kept() {
        let frame = line(b"PJOURF+1\t\t");
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.points[0].value, "");
    }

    #[test]
    fn two_bad_lines_are_dropped_and_counted() {
        let mut frame = line(b"A\t1\t");
        frame.extend(bad_line(b"B\t2\t"));
        frame.extend(line(b"C\t3\t"));
        frame.extend(bad_line(b"D\t4\t"));
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.rejected, 2);
        let labels: Vec<&str> = decoded.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["A", "C"]);
    }

    #[test]
    fn third_bad_line_fails_the_frame() {
        let mut frame = Vec::new();
        for payload in [&b"A\t1\t"[..], b"B\t2\t", b"C\t3\t"] {
            frame.extend(bad_line(payload));
        }
        frame.extend(line(b"D\t4\t"));
        assert!(matches!(
            decode(&frame),
            Err(TicError::MalformedFrame { rejected: 3 })
        ));
    }

    #[test]
    fn oversized_label_is_rejected_not_truncated() {
        let frame = line(b"TOOLONGLABEL\t1\t");
        let decoded = decode(&frame).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.rejected, 1);
    }

    #[test]
    fn line_with_a_single_tab_is_rejected() {
        let frame = line(b"ADCO\t");
        let decoded = decode(&frame).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.rejected, 1);
    }

    #[test]
    fn lines_past_the_message_limit_are_ignored_not_rejected() {
        let mut frame = Vec::new();
        for i in 0..MESSAGE_COUNT_MAX + 3 {
            frame.extend(line(format!("L{}\t1\t", i).as_bytes()));
        }
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.len(), MESSAGE_COUNT_MAX);
        assert_eq!(decoded.rejected, 0);
        assert_eq!(decoded.points[MESSAGE_COUNT_MAX - 1].label, "L70");
    }

    #[test]
    fn empty_label_is_rejected() {
        let frame = line(b"\t\t");
        let decoded = decode(&frame).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.rejected, 1);
    }

    #[test]
    fn bytes_after_the_last_cr_are_ignored() {
        let mut frame = line(b"A\t1\t");
        frame.extend_from_slice(b"\nB\t2");
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.rejected, 0);
    }
}
