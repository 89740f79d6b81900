//! Binary entrypoint for the teleinfo CLI.
//!
//! Commands:
//! - `start [--device <path>] [--interval <s>] [--no-datetime] [--no-probe]` - poll the meter until Ctrl-C
//! - `read [--device <path>] [--replay]` - run one cycle and print the decoded data points as JSON
//! - `init` - write a starter `config.toml`
//!
//! See the library crate docs for module‑level details: `teleinfo::`.
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use teleinfo::config::Config;
use teleinfo::link::{FileLink, SerialLink, SerialPortLink};
use teleinfo::metrics;
use teleinfo::store::TelemetryStore;
use teleinfo::supervisor::{read_cycle, PollSettings, PollSupervisor, ReadOutcome};
use teleinfo::tic::decode;

#[derive(Parser)]
#[command(name = "teleinfo")]
#[command(about = "Live telemetry from a Linky meter's TIC serial output")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the meter and keep the telemetry table up to date
    Start {
        /// Serial device (e.g., /dev/ttyUSB0)
        #[arg(short, long)]
        device: Option<String>,

        /// Seconds between two polls
        #[arg(short, long)]
        interval: Option<u64>,

        /// Do not publish `<label>.datetime` entries
        #[arg(long)]
        no_datetime: bool,

        /// Start even if the device cannot be opened right now
        #[arg(long)]
        no_probe: bool,
    },
    /// Read and decode a single frame, print it as JSON
    Read {
        /// Serial device, or capture file with --replay
        #[arg(short, long)]
        device: Option<String>,

        /// Treat the device as a captured byte stream
        #[arg(long)]
        replay: bool,
    },
    /// Write a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing file is fine: every setting has a default.
    let config = match cli.command {
        Commands::Init => Config::default(),
        _ => match Config::load(&cli.config).await {
            Ok(config) => config,
            Err(e) if std::path::Path::new(&cli.config).exists() => return Err(e),
            Err(_) => Config::default(),
        },
    };
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Start {
            device,
            interval,
            no_datetime,
            no_probe,
        } => {
            let mut config = config;
            if let Some(device) = device {
                config.serial.device = device;
            }
            if let Some(interval) = interval {
                config.poll.interval_secs = interval;
            }
            if no_datetime {
                config.poll.with_datetime = false;
            }
            config.validate()?;

            info!("Starting teleinfo v{}", env!("CARGO_PKG_VERSION"));
            if !no_probe {
                // Be sure the port is reachable before settling into the loop.
                match SerialPortLink.open(&config.serial.device) {
                    Ok(port) => drop(port),
                    Err(e) => bail!("Unable to reach {}: {}", config.serial.device, e),
                }
            }

            let store = TelemetryStore::new();
            let supervisor =
                PollSupervisor::new(SerialPortLink, PollSettings::from_config(&config), store);
            let handle = supervisor.spawn();

            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for shutdown signal: {}", e);
            }
            info!("Received shutdown signal");
            handle.shutdown().await;

            let stats = metrics::snapshot();
            info!(
                "{} cycles, {} frames decoded, {} rejected, {} link failures, {} noise errors, {} lines discarded",
                stats.cycles,
                stats.frames_decoded,
                stats.frames_rejected,
                stats.link_failures,
                stats.noise_errors,
                stats.lines_discarded
            );
        }
        Commands::Read { device, replay } => {
            let device = device.unwrap_or(config.serial.device);
            let outcome = tokio::task::spawn_blocking(move || {
                if replay {
                    read_cycle(&FileLink, &device)
                } else {
                    read_cycle(&SerialPortLink, &device)
                }
            })
            .await?;

            let frame = match outcome {
                ReadOutcome::Frame(frame) => frame,
                ReadOutcome::Unavailable(e) => bail!("{}", e),
                ReadOutcome::Failed { error, .. } => bail!("{}", error),
            };
            if frame.errors() > 0 {
                warn!("{} framing errors before a good frame", frame.errors());
            }
            let decoded = decode(frame.as_bytes())?;
            if decoded.rejected > 0 {
                warn!("{} lines discarded", decoded.rejected);
            }
            println!("{}", serde_json::to_string_pretty(&decoded.points)?);
        }
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
    }

    Ok(())
}

fn init_logging(config: &Config, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .logging
            .level
            .parse()
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config.logging.file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground runs also echo to the console; redirected runs only log to the file
        let is_tty = atty::is(atty::Stream::Stdout);

        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());

            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }

            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
