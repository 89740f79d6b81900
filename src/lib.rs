//! # Teleinfo - live telemetry from Linky electricity meters
//!
//! Teleinfo decodes the TIC ("télé-information client") stream a Linky meter
//! emits in standard mode and keeps the latest value of every field in a
//! table that other code can query at any time without touching the serial
//! link.
//!
//! ## Features
//!
//! - **Robust framing**: a byte-level state machine that survives noise,
//!   interrupted frames and unplugged adapters, with a hard bound on buffer
//!   size and on time spent waiting.
//! - **Checked decoding**: per-line checksums, bounded fields, and a frame is
//!   dropped as a whole once three of its lines are bad.
//! - **Change-aware table**: every entry carries the time its content last
//!   changed, not the time it was last polled.
//! - **Connectivity status**: a synthetic `status` entry reports `online`,
//!   `offline`, `disconnected` or `error` after every cycle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use teleinfo::config::Config;
//! use teleinfo::link::SerialPortLink;
//! use teleinfo::store::TelemetryStore;
//! use teleinfo::supervisor::{PollSettings, PollSupervisor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = TelemetryStore::new();
//!     let mut supervisor =
//!         PollSupervisor::new(SerialPortLink, PollSettings::from_config(&config), store.clone());
//!
//!     let status = supervisor.poll_once().await;
//!     println!("{}: {:?}", status, store.list_names());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`tic`] - frame reader, checksum and decoder for the wire protocol
//! - [`store`] - the shared name → entry table
//! - [`supervisor`] - the poll loop and connectivity status
//! - [`link`] - serial and file byte sources
//! - [`config`] - TOML configuration
//! - [`metrics`] - process-wide poll counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  SerialLink     │ ← opened and closed once per cycle
//! └─────────────────┘
//!          │ bytes
//! ┌─────────────────┐
//! │  FrameReader    │ → decode() → DataPoints
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ PollSupervisor  │ ← status + values, one lock per cycle
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ TelemetryStore  │ ← list_names() / get() from any thread
//! └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod logutil;
pub mod metrics;
pub mod store;
pub mod supervisor;
pub mod tic;

pub use error::{CapacityError, TicError};
pub use store::{TelemetryEntry, TelemetryStore};
pub use supervisor::{ConnectivityStatus, PollSupervisor};
pub use tic::reader::ByteSource;
pub use tic::DataPoint;
