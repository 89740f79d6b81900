//! Logging utilities for rendering raw frame bytes on a single log line.
//! Escapes control characters that otherwise break log readability.

use std::fmt::Write;

/// Escape raw protocol bytes for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control or non-ASCII bytes => `\\xNN`
///   Truncates very long buffers with an ellipsis to cap log noise.
pub fn escape_bytes(bytes: &[u8]) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(bytes.len().min(MAX_PREVIEW) + 8);
    for (count, &b) in bytes.iter().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7E => out.push(b as char),
            _ => {
                let _ = write!(&mut out, "\\x{:02X}", b);
            }
        }
    }
    out
}
