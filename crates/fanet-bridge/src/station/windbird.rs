//! Windbird (Pioupiou) live JSON API adapter.
//!
//! No API key and no temperature sensor; wind data only.

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{bounded_body, Observation, TEMPERATURE_INVALID};

const URL_TEMPLATE: &str = "http://api.pioupiou.fr/v1/live/{id}";

#[derive(Debug, Deserialize)]
struct WindbirdReply {
    data: WindbirdData,
}

#[derive(Debug, Deserialize)]
struct WindbirdData {
    id: i64,
    meta: WindbirdMeta,
    measurements: WindbirdMeasurements,
}

#[derive(Debug, Deserialize)]
struct WindbirdMeta {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WindbirdMeasurements {
    date: String,
    wind_heading: Option<f64>,
    wind_speed_avg: Option<f64>,
    wind_speed_max: Option<f64>,
}

/// A station on the Windbird / Pioupiou live API.
#[derive(Debug)]
pub struct Windbird {
    id: u32,
}

impl Windbird {
    /// New adapter for the given station ID.
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    /// Fetch the latest readings.
    pub async fn fetch(&self, http: &reqwest::Client) -> anyhow::Result<Observation> {
        let url = URL_TEMPLATE.replace("{id}", &self.id.to_string());
        let response = http.get(&url).send().await?;
        let body = bounded_body(response).await?;
        debug!(station = self.id, body = %String::from_utf8_lossy(&body), "windbird reply");

        let reply: WindbirdReply =
            serde_json::from_slice(&body).context("failed to parse windbird json")?;
        if reply.data.id != i64::from(self.id) {
            bail!("received data for wrong station id {}", reply.data.id);
        }

        let timestamp = DateTime::parse_from_rfc3339(&reply.data.measurements.date)
            .with_context(|| format!("bad date \"{}\"", reply.data.measurements.date))?
            .with_timezone(&Utc);

        let m = &reply.data.measurements;
        Ok(Observation {
            timestamp,
            wind_direction: m.wind_heading.map_or(0, |v| v.round() as i32),
            wind_speed: m.wind_speed_avg.map_or(0, |v| (v * 10.0).round() as i32),
            wind_gusts: m.wind_speed_max.map_or(0, |v| (v * 10.0).round() as i32),
            temperature: TEMPERATURE_INVALID,
            name: reply.data.meta.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "doc": "http://developers.pioupiou.fr/api/live/",
        "data": {
            "id": 1333,
            "meta": {"name": "Col du Glandon"},
            "location": {"latitude": 45.2, "longitude": 5.8},
            "measurements": {
                "date": "2024-06-01T14:25:00.000Z",
                "wind_heading": 247.5,
                "wind_speed_avg": 12.5,
                "wind_speed_max": 20.25
            }
        }
    }"#;

    #[test]
    fn parses_live_reply() {
        let reply: WindbirdReply = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(reply.data.id, 1333);
        assert_eq!(reply.data.meta.name.as_deref(), Some("Col du Glandon"));
        let m = &reply.data.measurements;
        assert_eq!(m.wind_heading.unwrap().round() as i32, 248);
        assert_eq!((m.wind_speed_avg.unwrap() * 10.0).round() as i32, 125);
        assert_eq!((m.wind_speed_max.unwrap() * 10.0).round() as i32, 203);
        assert!(DateTime::parse_from_rfc3339(&m.date).is_ok());
    }

    #[test]
    fn null_measurements_are_tolerated() {
        let reply: WindbirdReply = serde_json::from_str(
            r#"{"data": {"id": 1, "meta": {"name": null},
                "measurements": {"date": "2024-06-01T14:25:00.000Z",
                "wind_heading": null, "wind_speed_avg": null, "wind_speed_max": null}}}"#,
        )
        .unwrap();
        assert!(reply.data.measurements.wind_speed_avg.is_none());
        assert!(reply.data.meta.name.is_none());
    }
}
