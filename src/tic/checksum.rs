//! Per-line checksum of the standard TIC mode.
//!
//! A line is everything from its leading `LF` through its checksum byte
//! (the `CR` excluded). The checksum covers the bytes strictly between the
//! two: `(sum & 0x3F) + 0x20`.

use super::LF;

/// Checksum byte for the given covered bytes.
pub fn checksum(covered: &[u8]) -> u8 {
    let sum = covered
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)));
    ((sum & 0x3F) as u8) + 0x20
}

/// Validates one message line (leading `LF` through checksum byte).
pub fn is_valid(line: &[u8]) -> bool {
    match line {
        [LF, covered @ .., expected] => checksum(covered) == *expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![LF];
        out.extend_from_slice(payload);
        out.push(checksum(payload));
        out
    }

    #[test]
    fn accepts_correct_trailing_byte() {
        assert!(is_valid(&line(b"ADCO\t041234567890\t")));
        assert!(is_valid(&line(b"SINSTS\t031225142500\t01234\t")));
    }

    #[test]
    fn checksum_stays_printable() {
        for b in 0u8..=0x7F {
            let cs = checksum(&[b, b, b]);
            assert!((0x20..=0x5F).contains(&cs));
        }
    }

    #[test]
    fn flipping_any_payload_byte_fails() {
        let good = line(b"OPTARIF\tBASE\t");
        for i in 1..good.len() - 1 {
            let mut bad = good.clone();
            bad[i] ^= 0x01;
            assert!(!is_valid(&bad), "flip at {} still validated", i);
        }
    }

    #[test]
    fn rejects_lines_without_room_for_a_checksum() {
        assert!(!is_valid(b""));
        assert!(!is_valid(&[LF]));
        assert!(!is_valid(b"ADCO\t1\t"));
    }
}
