//! # Poll supervisor
//!
//! One background task that, every interval:
//!
//! 1. opens the link (failure: `disconnected`),
//! 2. reads one frame on a blocking thread and closes the link
//!    (failure: `offline`),
//! 3. decodes the frame (too many bad lines: `error`, otherwise `online`),
//! 4. publishes `status` and every decoded value to the [`TelemetryStore`].
//!
//! Nothing carries over from one cycle to the next except the previous
//! status, which is only used to log transitions.
//!
//! ```rust,no_run
//! use teleinfo::config::Config;
//! use teleinfo::link::SerialPortLink;
//! use teleinfo::store::TelemetryStore;
//! use teleinfo::supervisor::{PollSettings, PollSupervisor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let store = TelemetryStore::new();
//!     let supervisor = PollSupervisor::new(
//!         SerialPortLink,
//!         PollSettings::from_config(&config),
//!         store.clone(),
//!     );
//!     let handle = supervisor.spawn();
//!     // ... serve `store.list_names()` / `store.get(..)` to readers ...
//!     handle.shutdown().await;
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::Config;
use crate::error::TicError;
use crate::link::SerialLink;
use crate::logutil::escape_bytes;
use crate::metrics;
use crate::store::{TelemetryStore, DATETIME_SUFFIX, STATUS_NAME};
use crate::tic::{decode, DataPoint, Frame, FrameReader};

/// Connectivity as seen by the last poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    /// A frame was read and decoded.
    Online,
    /// The link opened but no usable frame came out of it.
    Offline,
    /// The link could not be opened.
    Disconnected,
    /// A frame arrived but too many of its lines were corrupt.
    Error,
}

impl ConnectivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectivityStatus::Online => "online",
            ConnectivityStatus::Offline => "offline",
            ConnectivityStatus::Disconnected => "disconnected",
            ConnectivityStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control messages accepted by a running poll loop.
#[derive(Debug)]
pub enum ControlMessage {
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub device: String,
    pub interval: Duration,
    pub with_datetime: bool,
    pub dump_dir: Option<PathBuf>,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            device: config.serial.device.clone(),
            interval: config.poll.interval(),
            with_datetime: config.poll.with_datetime,
            dump_dir: config.logging.dump_dir.as_ref().map(PathBuf::from),
        }
    }
}

/// What one acquire/read/release step produced.
#[derive(Debug)]
pub enum ReadOutcome {
    Unavailable(TicError),
    Failed { error: TicError, partial: Vec<u8> },
    Frame(Frame),
}

/// Opens the link, reads one frame and closes the link again.
///
/// Blocks for as long as the link's own read timeout allows.
pub fn read_cycle<L: SerialLink + ?Sized>(link: &L, device: &str) -> ReadOutcome {
    let mut port = match link.open(device) {
        Ok(port) => port,
        Err(e) => return ReadOutcome::Unavailable(e),
    };
    let mut reader = FrameReader::new();
    let result = reader.read_frame(&mut port);
    drop(port);
    match result {
        Ok(frame) => ReadOutcome::Frame(frame),
        Err(error) => ReadOutcome::Failed {
            error,
            partial: reader.partial().to_vec(),
        },
    }
}

pub struct PollSupervisor<L: SerialLink> {
    link: Arc<L>,
    settings: PollSettings,
    store: TelemetryStore,
    previous: ConnectivityStatus,
}

impl<L: SerialLink> PollSupervisor<L> {
    pub fn new(link: L, settings: PollSettings, store: TelemetryStore) -> Self {
        Self {
            link: Arc::new(link),
            settings,
            store,
            previous: ConnectivityStatus::Disconnected,
        }
    }

    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    /// Status published by the latest cycle (`disconnected` before the first).
    pub fn status(&self) -> ConnectivityStatus {
        self.previous
    }

    /// Runs one full cycle and returns the status it published.
    pub async fn poll_once(&mut self) -> ConnectivityStatus {
        metrics::inc_cycles();

        let link = Arc::clone(&self.link);
        let device = self.settings.device.clone();
        let outcome = match tokio::task::spawn_blocking(move || read_cycle(&*link, &device)).await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("read task failed: {}", e);
                ReadOutcome::Failed {
                    error: TicError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        e.to_string(),
                    )),
                    partial: Vec::new(),
                }
            }
        };

        let (status, points) = match outcome {
            ReadOutcome::Unavailable(e) => {
                debug!("{}", e);
                metrics::inc_link_failures();
                (ConnectivityStatus::Disconnected, Vec::new())
            }
            ReadOutcome::Failed { error, partial } => {
                metrics::inc_frames_rejected();
                match error {
                    TicError::FrameOverflow { .. } => error!("{}", error),
                    TicError::FramingError { errors, .. } => {
                        metrics::add_noise_errors(errors);
                        warn!("{}", error);
                        self.dump(&partial).await;
                    }
                    _ => debug!("read failed: {}", error),
                }
                (ConnectivityStatus::Offline, Vec::new())
            }
            ReadOutcome::Frame(frame) => {
                metrics::add_noise_errors(frame.errors());
                match decode(frame.as_bytes()) {
                    Ok(decoded) => {
                        metrics::inc_frames_decoded();
                        metrics::add_lines_discarded(decoded.rejected);
                        (ConnectivityStatus::Online, decoded.points)
                    }
                    Err(e) => {
                        metrics::inc_frames_rejected();
                        if let TicError::MalformedFrame { rejected } = e {
                            metrics::add_lines_discarded(rejected);
                        }
                        warn!("{}", e);
                        self.dump(frame.as_bytes()).await;
                        (ConnectivityStatus::Error, Vec::new())
                    }
                }
            }
        };

        self.publish(status, &points);
        status
    }

    fn publish(&mut self, status: ConnectivityStatus, points: &[DataPoint]) {
        if status != self.previous {
            info!(
                "status changed: was \"{}\", now \"{}\"",
                self.previous, status
            );
            self.previous = status;
        }

        let twins: Vec<Option<String>> = points
            .iter()
            .map(|p| match p.datetime() {
                Some(_) if self.settings.with_datetime => {
                    Some(format!("{}{}", p.label, DATETIME_SUFFIX))
                }
                _ => None,
            })
            .collect();

        let mut batch: Vec<(&str, &str)> = Vec::with_capacity(points.len() * 2 + 1);
        batch.push((STATUS_NAME, status.as_str()));
        for (point, twin) in points.iter().zip(&twins) {
            batch.push((point.label.as_str(), point.value.as_str()));
            if let (Some(name), Some(datetime)) = (twin, point.datetime()) {
                batch.push((name.as_str(), datetime));
            }
        }

        let touched = self.store.apply(batch, Utc::now());
        debug!("{} data points, {} entries changed", points.len(), touched);
    }

    async fn dump(&self, bytes: &[u8]) {
        let Some(dir) = self.settings.dump_dir.as_deref() else {
            debug!("rejected frame: {}", escape_bytes(bytes));
            return;
        };
        let path = dump_path(dir);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => info!("dumped {} bytes to {}", bytes.len(), path.display()),
            Err(e) => warn!("unable to write dump {}: {}", path.display(), e),
        }
    }

    /// Polls until a [`ControlMessage::Shutdown`] arrives or the control
    /// channel closes. The channel is checked after every read and while
    /// sleeping; an in-flight read always runs to its own timeout.
    pub async fn run(mut self, mut control_rx: mpsc::UnboundedReceiver<ControlMessage>) {
        info!(
            "Starting poll loop on {} every {}s",
            self.settings.device,
            self.settings.interval.as_secs()
        );

        loop {
            self.poll_once().await;

            match control_rx.try_recv() {
                Ok(ControlMessage::Shutdown) => {
                    info!("Poll loop received shutdown signal");
                    break;
                }
                Err(TryRecvError::Disconnected) => {
                    warn!("Control channel closed, stopping poll loop");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            tokio::select! {
                _ = sleep(self.settings.interval) => {}
                msg = control_rx.recv() => match msg {
                    Some(ControlMessage::Shutdown) => {
                        info!("Poll loop received shutdown signal");
                        break;
                    }
                    None => {
                        warn!("Control channel closed, stopping poll loop");
                        break;
                    }
                }
            }
        }

        info!("Poll loop stopped");
    }

    /// Starts [`run`](Self::run) on its own task.
    pub fn spawn(self) -> SupervisorHandle {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let store = self.store.clone();
        let task = tokio::spawn(self.run(control_rx));
        SupervisorHandle {
            control_tx,
            store,
            task,
        }
    }
}

fn dump_path(dir: &Path) -> PathBuf {
    dir.join(format!("teleinfo-dump-{}", Utc::now().timestamp()))
}

/// Owner side of a spawned poll loop.
pub struct SupervisorHandle {
    control_tx: mpsc::UnboundedSender<ControlMessage>,
    store: TelemetryStore,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    /// Asks the loop to stop and waits for it.
    pub async fn shutdown(self) {
        let _ = self.control_tx.send(ControlMessage::Shutdown);
        if let Err(e) = self.task.await {
            error!("poll loop ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_has_its_display_text() {
        let texts: Vec<String> = [
            ConnectivityStatus::Online,
            ConnectivityStatus::Offline,
            ConnectivityStatus::Disconnected,
            ConnectivityStatus::Error,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(texts, ["online", "offline", "disconnected", "error"]);
    }

    #[test]
    fn settings_follow_the_config() {
        let mut config = Config::default();
        config.poll.interval_secs = 30;
        config.poll.with_datetime = false;
        config.logging.dump_dir = Some("/tmp".to_string());
        let settings = PollSettings::from_config(&config);
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert!(!settings.with_datetime);
        assert_eq!(settings.dump_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn dumps_are_named_after_the_time() {
        let path = dump_path(Path::new("/tmp"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("teleinfo-dump-"));
        assert!(name["teleinfo-dump-".len()..].parse::<i64>().is_ok());
    }
}
