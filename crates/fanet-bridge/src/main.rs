//! FANET weather ground station daemon.
//!
//! Polls remote weather stations and rebroadcasts their readings into a
//! FANET mesh through a serially attached radio module.

mod config;
mod dispatcher;
mod pidfile;
mod station;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fanet_models::{FanetAddress, FanetPayload};
use fanet_radio::{FanetRadio, RadioHandle, RadioState};

use crate::config::BridgeConfig;
use crate::dispatcher::Dispatcher;
use crate::pidfile::PidFile;
use crate::station::StationHandle;

const PID_FILE: &str = "/run/fanet-bridge.pid";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// FANET weather ground station daemon.
#[derive(Parser, Debug)]
#[command(name = "fanet-bridge", version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run as a background service (plain log output without colours;
    /// process management is left to the service manager)
    #[arg(short, long)]
    daemon: bool,

    /// Send the quit command to a running instance
    #[arg(short, long)]
    quit: bool,

    /// Maximum log level [0..5] (0=critical, 5=debug)
    #[arg(short, long, value_name = "LEVEL")]
    loglevel: Option<u8>,

    /// Send a message to a device once the radio is ready,
    /// format: "<manufacturerId>:<deviceId> <message>", e.g. "11:1234 helloworld"
    #[arg(short, long, value_name = "MESSAGE")]
    message: Option<String>,

    /// Inject a FANET rx frame, e.g. "FNF 11,5C0B,1,0,A,6,5006FC0A0400" (debugging)
    #[arg(short, long, value_name = "FRAME")]
    inject: Option<String>,
}

fn init_logging(args: &Args) {
    let default_level = match args.loglevel {
        Some(0) | Some(1) => "error",
        Some(2) => "warn",
        Some(3) | Some(4) | None => "info",
        Some(_) => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!args.daemon)
        .init();
    if let Some(level) = args.loglevel {
        if level > 5 {
            warn!(level, "unknown loglevel (valid value range: 0..5)");
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    if args.quit {
        return pidfile::signal_running(Path::new(PID_FILE));
    }

    let config_path = args
        .config
        .as_deref()
        .context("no configuration file given (use --config)")?;
    let config = BridgeConfig::load(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    info!(
        config = %config_path.display(),
        version = env!("CARGO_PKG_VERSION"),
        "FANET ground station daemon started"
    );

    let _pidfile = match PidFile::create(PID_FILE) {
        Ok(pidfile) => Some(pidfile),
        Err(e) => {
            warn!(path = PID_FILE, error = %e, "failed to write pid file");
            None
        }
    };

    let (radio, handle, packets) = FanetRadio::serial(config.radio.clone());
    tokio::spawn(radio.run());

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build http client")?;
    let stations: Vec<StationHandle> = config
        .stations
        .iter()
        .map(|station| station::spawn(Arc::new(station.clone()), http.clone()))
        .collect();

    if let Some(spec) = args.message {
        tokio::spawn(send_user_message(handle.clone(), spec));
    }
    if let Some(frame) = args.inject {
        tokio::spawn(inject_frame(handle.clone(), frame));
    }

    let dispatcher = Dispatcher::new(config.fanet, stations, handle.clone(), packets);

    tokio::select! {
        result = dispatcher.run() => result?,
        result = shutdown_signal() => {
            result.context("failed to install signal handler")?;
            info!("shutting down");
            handle.shutdown();
        }
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

/// Block until the radio reaches the ready state; `false` when the driver
/// went away instead.
async fn wait_ready(handle: &RadioHandle) -> bool {
    let mut states = handle.state_receiver();
    loop {
        if *states.borrow_and_update() == RadioState::Ready {
            return true;
        }
        if states.changed().await.is_err() {
            return false;
        }
    }
}

/// Handle `--message "<mfr>:<dev> <text>"`: transmit one text message as
/// soon as the radio is up.
async fn send_user_message(handle: RadioHandle, spec: String) {
    let Some((addr, text)) = spec.split_once(' ') else {
        warn!(spec, "malformed message (expected \"<mfr>:<dev> <text>\")");
        return;
    };
    let address: FanetAddress = match addr.parse() {
        Ok(address) => address,
        Err(e) => {
            warn!(error = %e, "malformed message destination");
            return;
        }
    };
    if !wait_ready(&handle).await {
        return;
    }
    if handle.send(address, FanetPayload::message_payload(text)) {
        info!("{} <- message: {}", address.to_hex(':'), text);
    }
}

/// Handle `--inject`: feed a raw frame into the driver once it is up.
async fn inject_frame(handle: RadioHandle, frame: String) {
    if wait_ready(&handle).await {
        handle.inject(&frame);
    }
}
