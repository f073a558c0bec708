//! SerialVis - Main Entry Point
//!
//! Connects to a serial device, logs the decoded telemetry and periodically
//! reports the collected samples, the way a plotting front end would poll them.

use anyhow::Context;
use clap::Parser;
use serialvis_rs::{
    backend::{MockPattern, MockTransport, SerialBackend, SerialPortTransport},
    config::AppConfig,
    Command, Event,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "serialvis", version, about = "Serial telemetry ingestion for live plotting")]
struct Cli {
    /// Serial device to read from (overrides the config file)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate (overrides the config file)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read from a simulated device instead of real hardware
    #[arg(long)]
    mock: bool,

    /// Stop after this many seconds (runs until killed otherwise)
    #[arg(long)]
    duration: Option<u64>,

    /// Write the collected samples to this JSON file on exit
    #[arg(long)]
    export: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// How often to poll the sample buffer, in milliseconds
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.config.as_deref());
    if let Some(port) = &cli.port {
        config.port.name = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.port.baud_rate = baud;
    }

    let _log_guard = init_logging(&config)?;

    if cli.list_ports {
        let ports = SerialPortTransport::list_ports();
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(());
    }

    tracing::info!("Starting SerialVis on {}", config.port);

    let simulator_running = Arc::new(AtomicBool::new(true));
    let mut simulator_threads = Vec::new();
    let mut backend = if cli.mock {
        let (transport, device) = MockTransport::new();
        // Start unplugged to show the waiting/connect sequence
        device.unplug();
        simulator_threads.push(device.plug_after(Duration::from_secs(3), simulator_running.clone()));
        simulator_threads.push(device.simulate(
            MockPattern::default(),
            Duration::from_millis(100),
            25,
            simulator_running.clone(),
        ));
        SerialBackend::new(config, transport)
    } else {
        SerialBackend::new(config, SerialPortTransport::new())
    };

    // Display mode belongs to the consumer, not the ingestion core
    let toggled = Arc::new(AtomicBool::new(false));
    let mode = toggled.clone();
    backend.set_observer(Arc::new(move |event: &Event| match event {
        Event::Command(Command::Toggle) => {
            let now = !mode.fetch_xor(true, Ordering::SeqCst);
            tracing::info!("Display mode toggled ({})", if now { "alternate" } else { "normal" });
        }
        Event::Sample(sample) => tracing::debug!("Point {}", sample),
        Event::Malformed(_) => {}
    }));

    backend.connect().context("Failed to start serial backend")?;

    let poll = Duration::from_millis(cli.poll_ms.max(1));
    let deadline = cli.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let store = backend.sample_store();
    let mut seen = 0;

    while deadline.map_or(true, |d| Instant::now() < d) {
        std::thread::sleep(poll);

        let fresh = store.snapshot_since(seen);
        if !fresh.is_empty() {
            seen += fresh.len();
            tracing::info!(
                "{} samples ({} new, last {}) [{}]",
                seen,
                fresh.len(),
                fresh[fresh.len() - 1],
                backend.state()
            );
        }
    }

    tracing::info!("Shutting down...");
    simulator_running.store(false, Ordering::SeqCst);
    backend.disconnect();
    for handle in simulator_threads {
        if handle.join().is_err() {
            tracing::error!("Simulator thread panicked");
        }
    }

    let stats = backend.stats();
    tracing::info!(
        "Received {} lines: {} samples, {} commands, {} malformed ({} reconnects)",
        stats.lines_read,
        stats.samples,
        stats.commands,
        stats.malformed,
        stats.reconnects
    );

    if let Some(path) = &cli.export {
        let samples = backend.samples();
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {:?}", path))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &samples)
            .with_context(|| format!("Failed to write samples to {:?}", path))?;
        tracing::info!("Exported {} samples to {:?}", samples.len(), path);
    }

    Ok(())
}

/// Install the tracing subscriber; the returned guard flushes the log file on drop
fn init_logging(
    config: &AppConfig,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let default_filter = config
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| "info,serialvis_rs=debug".to_string());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_layer, guard) = match &config.logging.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .context("Log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                ),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}
