//! Fixed-capacity byte and string buffers.
//!
//! Every write is checked: a write that does not fit is refused with a
//! [`CapacityError`] and leaves the buffer exactly as it was.

use std::fmt;
use std::ops::Deref;

use serde::{Serialize, Serializer};

use crate::error::CapacityError;

/// Growable byte buffer with a hard limit fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedBuf {
    bytes: Vec<u8>,
    limit: usize,
}

impl BoundedBuf {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, byte: u8) -> Result<(), CapacityError> {
        if self.bytes.len() >= self.limit {
            return Err(CapacityError {
                capacity: self.limit,
                attempted: self.bytes.len() + 1,
            });
        }
        self.bytes.push(byte);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl Deref for BoundedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

/// UTF-8 string holding at most `N` bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundedString<const N: usize> {
    inner: String,
}

impl<const N: usize> BoundedString<N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self {
            inner: String::new(),
        }
    }

    pub fn push_str(&mut self, s: &str) -> Result<(), CapacityError> {
        let needed = self.inner.len() + s.len();
        if needed > N {
            return Err(CapacityError {
                capacity: N,
                attempted: needed,
            });
        }
        self.inner.push_str(s);
        Ok(())
    }

    /// Replaces the whole content; on error the old content is kept.
    pub fn set(&mut self, s: &str) -> Result<(), CapacityError> {
        if s.len() > N {
            return Err(CapacityError {
                capacity: N,
                attempted: s.len(),
            });
        }
        self.inner.clear();
        self.inner.push_str(s);
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl<const N: usize> TryFrom<&str> for BoundedString<N> {
    type Error = CapacityError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let mut out = Self::new();
        out.push_str(s)?;
        Ok(out)
    }
}

impl<const N: usize> Deref for BoundedString<N> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.inner
    }
}

impl<const N: usize> AsRef<str> for BoundedString<N> {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl<const N: usize> PartialEq<str> for BoundedString<N> {
    fn eq(&self, other: &str) -> bool {
        self.inner == other
    }
}

impl<const N: usize> PartialEq<&str> for BoundedString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.inner == *other
    }
}

impl<const N: usize> fmt::Debug for BoundedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl<const N: usize> fmt::Display for BoundedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl<const N: usize> Serialize for BoundedString<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buf_refuses_byte_past_limit() {
        let mut buf = BoundedBuf::with_limit(2);
        buf.push(b'a').unwrap();
        buf.push(b'b').unwrap();
        let err = buf.push(b'c').unwrap_err();
        assert_eq!(err.capacity, 2);
        assert_eq!(err.attempted, 3);
        assert_eq!(buf.as_bytes(), b"ab");
    }

    #[test]
    fn string_push_is_all_or_nothing() {
        let mut s = BoundedString::<4>::try_from("ab").unwrap();
        assert!(s.push_str("cde").is_err());
        assert_eq!(s, "ab");
        s.push_str("cd").unwrap();
        assert_eq!(s.as_str(), "abcd");
    }

    #[test]
    fn set_keeps_old_content_on_overflow() {
        let mut s = BoundedString::<3>::try_from("abc").unwrap();
        assert!(s.set("wxyz").is_err());
        assert_eq!(s, "abc");
        s.set("x").unwrap();
        assert_eq!(s, "x");
    }
}
