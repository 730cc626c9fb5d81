//! Holfuy live-data JSON API adapter.

use anyhow::{bail, Context};
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

use super::{bounded_body, Observation, TEMPERATURE_INVALID};

// newest station data; avg=1 would select the 15 min average instead
const URL_TEMPLATE: &str =
    "http://api.holfuy.com/live/?s={id}&pw={key}&m=JSON&tu=C&su=km/h&avg=0&utc";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const EXPECTED_WIND_UNIT: &str = "km/h";

#[derive(Debug, Deserialize)]
struct HolfuyLive {
    #[serde(rename = "stationName")]
    station_name: Option<String>,
    #[serde(rename = "dateTime")]
    date_time: String,
    temperature: Option<f64>,
    wind: HolfuyWind,
}

#[derive(Debug, Deserialize)]
struct HolfuyWind {
    speed: Option<f64>,
    gust: Option<f64>,
    direction: Option<i32>,
    unit: Option<String>,
}

/// A station on the authenticated Holfuy live API.
#[derive(Debug)]
pub struct HolfuyApi {
    id: u32,
    api_key: String,
}

impl HolfuyApi {
    /// New adapter for the given station ID and API key.
    pub fn new(id: u32, api_key: String) -> Self {
        Self { id, api_key }
    }

    /// Fetch the latest readings.
    pub async fn fetch(&self, http: &reqwest::Client) -> anyhow::Result<Observation> {
        let url = URL_TEMPLATE
            .replace("{id}", &self.id.to_string())
            .replace("{key}", &self.api_key);
        let response = http.get(&url).send().await?;
        let body = bounded_body(response).await?;
        debug!(station = self.id, body = %String::from_utf8_lossy(&body), "holfuy reply");

        let live: HolfuyLive =
            serde_json::from_slice(&body).context("failed to parse holfuy json")?;

        let unit = live.wind.unit.as_deref().unwrap_or("");
        if unit != EXPECTED_WIND_UNIT {
            bail!("wrong unit for wind (expected '{EXPECTED_WIND_UNIT}', got '{unit}')");
        }

        let timestamp = NaiveDateTime::parse_from_str(&live.date_time, DATETIME_FORMAT)
            .with_context(|| format!("bad dateTime \"{}\"", live.date_time))?
            .and_utc();

        Ok(Observation {
            timestamp,
            wind_direction: live.wind.direction.unwrap_or(0),
            wind_speed: live.wind.speed.map_or(0, |v| (v * 10.0).round() as i32),
            wind_gusts: live.wind.gust.map_or(0, |v| (v * 10.0).round() as i32),
            temperature: live
                .temperature
                .map_or(TEMPERATURE_INVALID, |v| (v * 10.0).round() as i32),
            name: live.station_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SAMPLE: &str = r#"{
        "stationID": 101,
        "stationName": "Gurnigel",
        "dateTime": "2024-06-01 14:25:00",
        "temperature": 18.5,
        "wind": {"speed": 25.0, "gust": 40.2, "direction": 90, "unit": "km/h"}
    }"#;

    #[test]
    fn parses_live_reply() {
        let live: HolfuyLive = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(live.station_name.as_deref(), Some("Gurnigel"));
        assert_eq!(live.wind.direction, Some(90));
        assert_eq!(live.wind.unit.as_deref(), Some("km/h"));

        let timestamp = NaiveDateTime::parse_from_str(&live.date_time, DATETIME_FORMAT)
            .unwrap()
            .and_utc();
        assert_eq!(
            (timestamp.year(), timestamp.month(), timestamp.day()),
            (2024, 6, 1)
        );
        assert_eq!((timestamp.hour(), timestamp.minute()), (14, 25));

        assert_eq!((live.wind.speed.unwrap() * 10.0).round() as i32, 250);
        assert_eq!((live.wind.gust.unwrap() * 10.0).round() as i32, 402);
        assert_eq!((live.temperature.unwrap() * 10.0).round() as i32, 185);
    }

    #[test]
    fn missing_optional_fields_are_tolerated() {
        let live: HolfuyLive = serde_json::from_str(
            r#"{"dateTime": "2024-06-01 14:25:00", "wind": {"unit": "km/h"}}"#,
        )
        .unwrap();
        assert!(live.temperature.is_none());
        assert!(live.wind.speed.is_none());
    }

    #[test]
    fn url_contains_id_and_key() {
        let url = URL_TEMPLATE
            .replace("{id}", "101")
            .replace("{key}", "SECRET");
        assert_eq!(
            url,
            "http://api.holfuy.com/live/?s=101&pw=SECRET&m=JSON&tu=C&su=km/h&avg=0&utc"
        );
    }
}
