//! Holfuy widget scrape adapter.
//!
//! The public widget page embeds the current readings in a JavaScript
//! callback:
//!
//! ```text
//! newWind(173,3,6.2,4,'02:09');
//! ```
//!
//! format: `<dir>,<wind>,<temperature>,<gusts>,'HH:mm'`; speeds in whole
//! km/h, temperature in °C. No API key needed, but also no date: the
//! clock time is combined with today's local date.

use anyhow::{anyhow, bail, Context};
use chrono::{Local, NaiveTime, TimeZone, Utc};
use tracing::debug;

use super::{bounded_body, Observation};

const URL_TEMPLATE: &str =
    "https://widget.holfuy.com/?station={id}&su=km/h&t=C&lang=en&mode=rose&size=160";
const DATA_START: &str = "newWind(";
const DATA_STOP: &str = ");";

/// A station scraped from the public Holfuy widget.
#[derive(Debug)]
pub struct HolfuyWidget {
    id: u32,
}

impl HolfuyWidget {
    /// New adapter for the given station ID.
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    /// Fetch the widget page and extract the readings.
    pub async fn fetch(&self, http: &reqwest::Client) -> anyhow::Result<Observation> {
        let url = URL_TEMPLATE.replace("{id}", &self.id.to_string());
        let response = http.get(&url).send().await?;
        let body = bounded_body(response).await?;
        let html = String::from_utf8_lossy(&body);
        parse_new_wind(&html)
    }
}

fn parse_new_wind(html: &str) -> anyhow::Result<Observation> {
    let start = html
        .find(DATA_START)
        .ok_or_else(|| anyhow!("reply contains no weather data"))?;
    let rest = &html[start + DATA_START.len()..];
    let stop = rest
        .find(DATA_STOP)
        .ok_or_else(|| anyhow!("unterminated weather data"))?;
    let raw = &rest[..stop];
    debug!(data = raw, "widget data");

    let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
    if fields.len() < 5 {
        bail!("too few fields in weather data: \"{raw}\"");
    }

    let wind_direction: i32 = fields[0].parse().context("bad wind direction")?;
    let wind_speed: i32 = fields[1].parse::<i32>().context("bad wind speed")? * 10;
    let temperature =
        (fields[2].parse::<f64>().context("bad temperature")? * 10.0).round() as i32;
    let wind_gusts: i32 = fields[3].parse::<i32>().context("bad gust speed")? * 10;

    let clock = fields[4].trim_matches('\'');
    let time = NaiveTime::parse_from_str(clock, "%H:%M")
        .with_context(|| format!("bad time \"{clock}\""))?;
    // the widget only reports a clock time; assume today, local timezone
    let timestamp = Local
        .from_local_datetime(&Local::now().date_naive().and_time(time))
        .single()
        .ok_or_else(|| anyhow!("ambiguous local time \"{clock}\""))?
        .with_timezone(&Utc);

    Ok(Observation {
        timestamp,
        wind_direction,
        wind_speed,
        wind_gusts,
        temperature,
        name: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_widget_callback() {
        let html = "<html><script>x();newWind(173,3,6.2,4,'02:09');y();</script></html>";
        let obs = parse_new_wind(html).unwrap();
        assert_eq!(obs.wind_direction, 173);
        assert_eq!(obs.wind_speed, 30);
        assert_eq!(obs.temperature, 62);
        assert_eq!(obs.wind_gusts, 40);
        assert!(obs.name.is_none());
    }

    #[test]
    fn rejects_pages_without_data() {
        assert!(parse_new_wind("<html>maintenance</html>").is_err());
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(parse_new_wind("newWind(1,2,3);").is_err());
        assert!(parse_new_wind("newWind(abc,3,6.2,4,'02:09');").is_err());
        assert!(parse_new_wind("newWind(173,3,6.2,4,'2 past 9');").is_err());
    }

    #[test]
    fn negative_temperatures_parse() {
        let obs = parse_new_wind("newWind(10,12,-3.5,18,'23:59');").unwrap();
        assert_eq!(obs.temperature, -35);
        assert_eq!(obs.wind_speed, 120);
        assert_eq!(obs.wind_gusts, 180);
    }
}
