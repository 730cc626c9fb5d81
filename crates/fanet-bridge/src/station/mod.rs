//! Weather-station adapters.
//!
//! Each configured station runs as its own task: it polls the remote
//! service on its interval, normalises the readings into a
//! [`WeatherSnapshot`] (fixed-point ×10 units, shared with the payload
//! codec) and publishes it over a `watch` channel. The dispatcher holds a
//! [`StationHandle`] per station and treats the latest snapshot as a
//! pollable value; it never awaits a fetch.

mod holfuy_api;
mod holfuy_widget;
mod windbird;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::{StationConfig, StationType};

pub use holfuy_api::HolfuyApi;
pub use holfuy_widget::HolfuyWidget;
pub use windbird::Windbird;

/// Sentinel for "no temperature reading", in °C × 10.
pub const TEMPERATURE_INVALID: i32 = -2740;

/// Hard cap on response bodies; the feeds are tiny and anything larger is
/// not worth parsing.
const REPLY_SIZE_MAX: usize = 5 * 1024;

// ---------------------------------------------------------------------------
// WeatherData flags
// ---------------------------------------------------------------------------

/// Which readings a station's feed provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeatherData(u8);

impl WeatherData {
    /// No data.
    pub const NONE: Self = Self(0x00);
    /// Average wind speed.
    pub const WIND_SPEED: Self = Self(0x01);
    /// Wind gusts.
    pub const WIND_GUST: Self = Self(0x02);
    /// Wind direction.
    pub const WIND_DIRECTION: Self = Self(0x04);
    /// Air temperature.
    pub const TEMPERATURE: Self = Self(0x08);
    /// Relative humidity.
    pub const HUMIDITY: Self = Self(0x10);

    /// `true` when every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for WeatherData {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Snapshot & observation
// ---------------------------------------------------------------------------

/// The latest readings from a station, as published to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// Measurement timestamp from the feed; `None` until the first
    /// successful poll.
    pub last_update: Option<DateTime<Utc>>,
    /// Wind direction in degrees.
    pub wind_direction: i32,
    /// Average wind speed in km/h × 10.
    pub wind_speed: i32,
    /// Wind gusts in km/h × 10.
    pub wind_gusts: i32,
    /// Temperature in °C × 10, or [`TEMPERATURE_INVALID`].
    pub temperature: i32,
    /// Station display name (configured, or discovered from the feed).
    pub name: String,
    /// Which of the fields above the feed actually provides.
    pub available: WeatherData,
}

impl WeatherSnapshot {
    fn initial(config: &StationConfig) -> Self {
        Self {
            last_update: None,
            wind_direction: 0,
            wind_speed: 0,
            wind_gusts: 0,
            temperature: TEMPERATURE_INVALID,
            name: config.name.clone(),
            available: WeatherData::NONE,
        }
    }
}

/// One normalised reading fetched from a remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Measurement timestamp.
    pub timestamp: DateTime<Utc>,
    /// Wind direction in degrees.
    pub wind_direction: i32,
    /// Average wind speed in km/h × 10.
    pub wind_speed: i32,
    /// Wind gusts in km/h × 10.
    pub wind_gusts: i32,
    /// Temperature in °C × 10, or [`TEMPERATURE_INVALID`].
    pub temperature: i32,
    /// Station name reported by the feed, if any.
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// The per-service fetch implementations.
#[derive(Debug)]
pub enum Provider {
    /// Holfuy JSON API.
    HolfuyApi(HolfuyApi),
    /// Holfuy widget scrape.
    HolfuyWidget(HolfuyWidget),
    /// Windbird / Pioupiou JSON API.
    Windbird(Windbird),
}

impl Provider {
    /// Build the provider matching the station's configured type.
    pub fn from_config(config: &StationConfig) -> Self {
        match config.station_type {
            StationType::HolfuyApi => Self::HolfuyApi(HolfuyApi::new(
                config.id,
                config.api_key.clone().unwrap_or_default(),
            )),
            StationType::HolfuyWidget => Self::HolfuyWidget(HolfuyWidget::new(config.id)),
            StationType::Windbird => {
                // OpenWindMap API community licence requires this notice:
                info!(
                    "Wind data (c) contributors of the OpenWindMap wind network \
                     <https://openwindmap.org>"
                );
                Self::Windbird(Windbird::new(config.id))
            }
        }
    }

    /// The readings this service provides.
    pub fn available_data(&self) -> WeatherData {
        match self {
            Self::HolfuyApi(_) | Self::HolfuyWidget(_) => {
                WeatherData::WIND_DIRECTION
                    | WeatherData::WIND_SPEED
                    | WeatherData::WIND_GUST
                    | WeatherData::TEMPERATURE
            }
            Self::Windbird(_) => {
                WeatherData::WIND_DIRECTION | WeatherData::WIND_SPEED | WeatherData::WIND_GUST
            }
        }
    }

    /// Fetch and normalise the current readings.
    pub async fn fetch(&self, http: &reqwest::Client) -> anyhow::Result<Observation> {
        match self {
            Self::HolfuyApi(api) => api.fetch(http).await,
            Self::HolfuyWidget(widget) => widget.fetch(http).await,
            Self::Windbird(windbird) => windbird.fetch(http).await,
        }
    }
}

/// Fetch a response body, refusing oversized replies.
async fn bounded_body(response: reqwest::Response) -> anyhow::Result<Vec<u8>> {
    let body = response.bytes().await?;
    if body.len() > REPLY_SIZE_MAX {
        anyhow::bail!("response too large ({} bytes)", body.len());
    }
    Ok(body.to_vec())
}

// ---------------------------------------------------------------------------
// StationHandle & task
// ---------------------------------------------------------------------------

/// The dispatcher's view of one running station task.
#[derive(Debug, Clone)]
pub struct StationHandle {
    /// The station's immutable configuration.
    pub config: Arc<StationConfig>,
    snapshot: watch::Receiver<WeatherSnapshot>,
    interval: watch::Sender<u64>,
    refresh: mpsc::UnboundedSender<()>,
}

impl StationHandle {
    pub(crate) fn from_parts(
        config: Arc<StationConfig>,
        snapshot: watch::Receiver<WeatherSnapshot>,
        interval: watch::Sender<u64>,
        refresh: mpsc::UnboundedSender<()>,
    ) -> Self {
        Self {
            config,
            snapshot,
            interval,
            refresh,
        }
    }

    /// The latest published readings.
    pub fn snapshot(&self) -> WeatherSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Change the poll interval; 0 pauses polling.
    pub fn set_poll_interval(&self, seconds: u64) {
        let _ = self.interval.send(seconds);
    }

    /// The current poll interval in seconds (0 = paused).
    pub fn poll_interval(&self) -> u64 {
        *self.interval.borrow()
    }

    /// Trigger an immediate refresh, regardless of the interval.
    pub fn refresh(&self) {
        let _ = self.refresh.send(());
    }
}

/// Spawn the polling task for one configured station.
///
/// The task starts paused (interval 0); the dispatcher arms it once the
/// radio is ready.
pub fn spawn(config: Arc<StationConfig>, http: reqwest::Client) -> StationHandle {
    let provider = Provider::from_config(&config);
    let (snapshot_tx, snapshot_rx) = watch::channel(WeatherSnapshot::initial(&config));
    let (interval_tx, interval_rx) = watch::channel(0u64);
    let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();

    let task = StationTask {
        config: Arc::clone(&config),
        provider,
        http,
        snapshot: snapshot_tx,
        interval: interval_rx,
        refresh: refresh_rx,
    };
    tokio::spawn(task.run());

    StationHandle::from_parts(config, snapshot_rx, interval_tx, refresh_tx)
}

struct StationTask {
    config: Arc<StationConfig>,
    provider: Provider,
    http: reqwest::Client,
    snapshot: watch::Sender<WeatherSnapshot>,
    interval: watch::Receiver<u64>,
    refresh: mpsc::UnboundedReceiver<()>,
}

impl StationTask {
    async fn run(mut self) {
        loop {
            let seconds = *self.interval.borrow_and_update();
            enum Wake {
                Poll,
                IntervalChanged,
                Closed,
            }
            let wake = tokio::select! {
                () = poll_tick(seconds) => Wake::Poll,
                request = self.refresh.recv() => match request {
                    Some(()) => Wake::Poll,
                    None => Wake::Closed,
                },
                changed = self.interval.changed() => match changed {
                    Ok(()) => Wake::IntervalChanged,
                    Err(_) => Wake::Closed,
                },
            };
            match wake {
                Wake::Poll => self.update().await,
                Wake::IntervalChanged => {}
                Wake::Closed => return,
            }
        }
    }

    async fn update(&mut self) {
        let observation = match self.provider.fetch(&self.http).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!(
                    station = self.config.id,
                    error = %e,
                    "station update failed"
                );
                return;
            }
        };

        let previous = self.snapshot.borrow().clone();
        let name = match observation.name {
            Some(ref feed_name) if previous.name.is_empty() && !feed_name.is_empty() => {
                info!(station = self.config.id, name = %feed_name, "station name updated");
                feed_name.clone()
            }
            _ => previous.name,
        };

        let snapshot = WeatherSnapshot {
            last_update: Some(observation.timestamp),
            wind_direction: observation.wind_direction,
            wind_speed: observation.wind_speed,
            wind_gusts: observation.wind_gusts,
            temperature: observation.temperature,
            name,
            available: self.provider.available_data(),
        };
        info!(
            station = self.config.id,
            wind = snapshot.wind_speed as f64 / 10.0,
            gusts = snapshot.wind_gusts as f64 / 10.0,
            direction = snapshot.wind_direction,
            temperature = snapshot.temperature as f64 / 10.0,
            last_update = %observation.timestamp,
            "new data"
        );
        self.snapshot.send_replace(snapshot);
    }
}

/// Resolves after the poll interval, or never while polling is paused.
async fn poll_tick(seconds: u64) {
    if seconds == 0 {
        std::future::pending().await
    } else {
        tokio::time::sleep(std::time::Duration::from_secs(seconds)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
