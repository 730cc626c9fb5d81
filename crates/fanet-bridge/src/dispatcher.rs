//! The broadcast dispatcher.
//!
//! Couples the weather stations to the radio: on a 1 Hz tick it decides
//! whether to broadcast station names and weather data, tracks when a
//! mesh neighbour was last heard, and suspends all broadcasting (and
//! station polling) when nobody is listening. It also owns the recovery
//! policy for the radio's failure states.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use fanet_models::{FanetAddress, FanetPayload, PayloadType, ServiceHeader};
use fanet_radio::{RadioHandle, RadioState, ReceivedPacket};

use crate::config::FanetConfig;
use crate::station::{StationHandle, WeatherData};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Schedules weather and name broadcasts and supervises the radio.
pub struct Dispatcher {
    config: FanetConfig,
    stations: Vec<StationHandle>,
    radio: RadioHandle,
    radio_states: watch::Receiver<RadioState>,
    packets: mpsc::UnboundedReceiver<ReceivedPacket>,
    last_node_seen: Option<Instant>,
    last_weather: Option<Instant>,
    last_names: Option<Instant>,
    ticking: bool,
}

impl Dispatcher {
    /// Wire the dispatcher up to its stations and radio.
    pub fn new(
        config: FanetConfig,
        stations: Vec<StationHandle>,
        radio: RadioHandle,
        packets: mpsc::UnboundedReceiver<ReceivedPacket>,
    ) -> Self {
        let radio_states = radio.state_receiver();
        Self {
            config,
            stations,
            radio,
            radio_states,
            packets,
            last_node_seen: None,
            last_weather: None,
            last_names: None,
            ticking: false,
        }
    }

    /// Run until shutdown. Returns an error (and thereby a non-zero
    /// process exit) when the radio faults unrecoverably.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.radio.init();
        loop {
            enum Wake {
                Tick,
                RadioState,
                Packet(ReceivedPacket),
                Closed,
            }
            let wake = tokio::select! {
                () = tick_timer(self.ticking) => Wake::Tick,
                changed = self.radio_states.changed() => match changed {
                    Ok(()) => Wake::RadioState,
                    Err(_) => Wake::Closed,
                },
                packet = self.packets.recv() => match packet {
                    Some(packet) => Wake::Packet(packet),
                    None => Wake::Closed,
                },
            };
            match wake {
                Wake::Tick => self.on_tick(),
                Wake::RadioState => {
                    let state = *self.radio_states.borrow_and_update();
                    self.on_radio_state(state)?;
                }
                Wake::Packet(packet) => self.on_packet(&packet),
                Wake::Closed => {
                    debug!("radio channels closed, dispatcher stopping");
                    return Ok(());
                }
            }
        }
    }

    fn on_tick(&mut self) {
        if self.config.inactivity_timeout > 0 {
            let timeout = Duration::from_secs(self.config.inactivity_timeout);
            let quiet = self.last_node_seen.map_or(true, |seen| seen.elapsed() > timeout);
            if quiet {
                info!(
                    minutes = self.config.inactivity_timeout / 60,
                    "no FANET nodes seen recently, disabling weather data broadcasting"
                );
                self.disable_updates();
                return;
            }
        }

        if self.config.tx_interval_names > 0 {
            let due = self.last_names.map_or(true, |last| {
                last.elapsed() > Duration::from_secs(self.config.tx_interval_names)
            });
            if due {
                self.send_station_names();
            }
        }
        if self.config.tx_interval_weather > 0 {
            let due = self.last_weather.map_or(true, |last| {
                last.elapsed() > Duration::from_secs(self.config.tx_interval_weather)
            });
            if due {
                self.send_weather_data();
            }
        }
    }

    /// Broadcast one service payload per station with fresh data. Stock
    /// firmware cannot change the sender address, which limits the
    /// broadcast to the first eligible station.
    fn send_weather_data(&mut self) {
        self.last_weather = Some(Instant::now());
        let now = Utc::now();
        let max_age = chrono::Duration::seconds(self.config.weather_max_age as i64);
        for station in &self.stations {
            let snapshot = station.snapshot();
            let fresh = snapshot
                .last_update
                .is_some_and(|updated| now.signed_duration_since(updated) < max_age);
            if !fresh {
                debug!(
                    station = station.config.id,
                    name = %snapshot.name,
                    last_update = ?snapshot.last_update,
                    "not sending weather data: station data is outdated"
                );
                continue;
            }

            let mut header = ServiceHeader::WIND;
            if snapshot.available.contains(WeatherData::TEMPERATURE) {
                header = header | ServiceHeader::TEMPERATURE;
            }
            let payload = FanetPayload::service_payload(
                header,
                station.config.position,
                snapshot.temperature,
                snapshot.wind_direction,
                snapshot.wind_speed,
                snapshot.wind_gusts,
                0,
                0,
            );
            self.radio.send(FanetAddress::BROADCAST, payload);

            if !self.radio.supports_address_change() {
                return; // remaining stations would impersonate this one
            }
        }
    }

    /// Broadcast one name payload per station; same single-station limit
    /// as the weather broadcast.
    fn send_station_names(&mut self) {
        self.last_names = Some(Instant::now());
        for station in &self.stations {
            let name = station.snapshot().name;
            if name.is_empty() {
                continue;
            }
            self.radio
                .send(FanetAddress::BROADCAST, FanetPayload::name_payload(&name));
            if !self.radio.supports_address_change() {
                return;
            }
        }
    }

    fn enable_updates(&mut self) {
        debug!("enabling weather updates");
        for station in &self.stations {
            station.set_poll_interval(station.config.poll_interval);
            station.refresh();
        }
        self.ticking = true;
    }

    fn disable_updates(&mut self) {
        debug!("disabling weather updates");
        for station in &self.stations {
            station.set_poll_interval(0);
        }
        self.ticking = false;
    }

    fn on_radio_state(&mut self, state: RadioState) -> anyhow::Result<()> {
        match state {
            RadioState::Ready => {
                if !self.radio.supports_address_change() && self.stations.len() > 1 {
                    warn!(
                        "multiple weather stations configured but the radio firmware does not \
                         support address changes; broadcasting data from the first station only"
                    );
                }
                self.enable_updates();
            }
            state if state.is_recoverable() => {
                error!(%state, "FANET radio has gone into error state");
                self.disable_updates();
                info!("trying to re-initialize radio");
                self.radio.init();
            }
            state if state.is_fatal() => {
                error!(%state, "unrecoverable radio error");
                anyhow::bail!("unrecoverable radio error: {state}");
            }
            _ => {}
        }
        Ok(())
    }

    fn on_packet(&mut self, packet: &ReceivedPacket) {
        match packet.payload.payload_type() {
            PayloadType::Tracking | PayloadType::GroundTracking => {
                self.last_node_seen = Some(Instant::now());
                if !self.ticking {
                    info!(
                        node = %packet.address,
                        "FANET node seen, enabling weather data broadcasting"
                    );
                    self.enable_updates();
                }
            }
            _ => {}
        }
    }
}

/// Resolves once per second while broadcasting is enabled; never while
/// suspended.
async fn tick_timer(ticking: bool) {
    if ticking {
        tokio::time::sleep(TICK_INTERVAL).await
    } else {
        std::future::pending().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
