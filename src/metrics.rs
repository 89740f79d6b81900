//! Process-wide poll counters.
//! Cheap atomics bumped by the supervisor; read with [`snapshot`].
use std::sync::atomic::{AtomicU64, Ordering};

static CYCLES: AtomicU64 = AtomicU64::new(0);
static FRAMES_DECODED: AtomicU64 = AtomicU64::new(0);
static FRAMES_REJECTED: AtomicU64 = AtomicU64::new(0);
static LINK_FAILURES: AtomicU64 = AtomicU64::new(0);
static NOISE_ERRORS: AtomicU64 = AtomicU64::new(0);
static LINES_DISCARDED: AtomicU64 = AtomicU64::new(0);

pub fn inc_cycles() {
    CYCLES.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_frames_decoded() {
    FRAMES_DECODED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_frames_rejected() {
    FRAMES_REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_link_failures() {
    LINK_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn add_noise_errors(n: u32) {
    NOISE_ERRORS.fetch_add(u64::from(n), Ordering::Relaxed);
}

pub fn add_lines_discarded(n: u32) {
    LINES_DISCARDED.fetch_add(u64::from(n), Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub cycles: u64,
    pub frames_decoded: u64,
    /// Frames lost to framing, overflow, I/O or checksum failures.
    pub frames_rejected: u64,
    pub link_failures: u64,
    /// Protocol violations seen by the reader, whether or not a frame
    /// followed.
    pub noise_errors: u64,
    /// Lines dropped by the decoder, including those of rejected frames.
    pub lines_discarded: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        cycles: CYCLES.load(Ordering::Relaxed),
        frames_decoded: FRAMES_DECODED.load(Ordering::Relaxed),
        frames_rejected: FRAMES_REJECTED.load(Ordering::Relaxed),
        link_failures: LINK_FAILURES.load(Ordering::Relaxed),
        noise_errors: NOISE_ERRORS.load(Ordering::Relaxed),
        lines_discarded: LINES_DISCARDED.load(Ordering::Relaxed),
    }
}
