use thiserror::Error;

/// Errors raised while acquiring the link, rebuilding frames, decoding them
/// or updating the telemetry table.
///
/// None of these cross a poll cycle: the supervisor folds every one of them
/// into a [`ConnectivityStatus`](crate::supervisor::ConnectivityStatus).
#[derive(Debug, Error)]
pub enum TicError {
    /// The serial link could not be opened.
    #[error("link unavailable on {device}: {reason}")]
    LinkUnavailable { device: String, reason: String },

    /// The link's bounded read wait expired before a byte arrived.
    #[error("timed out waiting for a byte from the link")]
    IoTimeout,

    /// Any other read failure, including end of stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Too many protocol violations, or too much noise before a frame start.
    #[error("framing error: {errors} protocol errors, {noise_bytes} noise bytes")]
    FramingError { errors: u32, noise_bytes: usize },

    /// Appending one more byte would have exceeded the frame buffer.
    #[error("frame exceeds {limit} bytes")]
    FrameOverflow { limit: usize },

    /// Too many lines of one frame failed validation.
    #[error("malformed frame: {rejected} lines rejected")]
    MalformedFrame { rejected: u32 },

    /// The telemetry table is full.
    #[error("telemetry table full ({capacity} entries)")]
    CapacityExceeded { capacity: usize },
}

/// A write into a bounded buffer that would have exceeded its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capacity {capacity} exceeded (needed {attempted})")]
pub struct CapacityError {
    pub capacity: usize,
    pub attempted: usize,
}

pub type Result<T> = std::result::Result<T, TicError>;
