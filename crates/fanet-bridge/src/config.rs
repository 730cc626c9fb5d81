//! XML configuration loading.
//!
//! The daemon reads one strict XML file at startup:
//!
//! ```xml
//! <fags version="1.1">
//!   <radio uart="/dev/ttyUSB0" pinboot="!rts" pinreset="dtr" txpower="14" freq="868"/>
//!   <fanet txinterval_weather="40" txinterval_names="300"
//!          inactivity_timeout="3600" weather_maxage="900"/>
//!   <stations>
//!     <holfuyapi id="101" name="Gurnigel" apikey="..." lat="46.731" lon="7.448" alt="1590" ival="60"/>
//!     <windbird id="1333" name="" lat="45.2" lon="5.8" alt="310" ival="120"/>
//!   </stations>
//! </fags>
//! ```
//!
//! Unknown elements, missing attributes, out-of-range values and
//! incompatible versions are hard errors; a daemon with a half-parsed
//! config must not start.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::info;

use fanet_models::{Frequency, Position};
use fanet_radio::{PinConfig, RadioConfig, RadioError};

/// Config format major version this build understands.
pub const CONFIG_VERSION_MAJOR: u32 = 1;
/// Minimum config format minor version this build requires.
pub const CONFIG_VERSION_MINOR: u32 = 1;

const TXPOWER_MIN: i32 = 2;
const TXPOWER_MAX: i32 = 20;

/// Errors from loading or validating the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the rejected file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The XML was malformed.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute's syntax was malformed.
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    /// An element this format does not define.
    #[error("unknown element <{0}>")]
    UnknownElement(String),

    /// Free text where none is allowed.
    #[error("unexpected text in <{0}>")]
    UnexpectedText(String),

    /// A required attribute was absent.
    #[error("attribute '{attribute}' is missing on <{element}>")]
    MissingAttribute {
        /// The element the attribute belongs to.
        element: &'static str,
        /// The missing attribute.
        attribute: &'static str,
    },

    /// An attribute value failed to parse or validate.
    #[error("invalid value \"{value}\" for '{attribute}' on <{element}>")]
    InvalidAttribute {
        /// The element the attribute belongs to.
        element: &'static str,
        /// The offending attribute.
        attribute: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The file's format version is incompatible with this build.
    #[error(
        "config version mismatch: expected {CONFIG_VERSION_MAJOR}.{CONFIG_VERSION_MINOR} \
         or a compatible minor, got {got}"
    )]
    VersionMismatch {
        /// The version string from the file.
        got: String,
    },

    /// A mandatory element never appeared.
    #[error("missing <{0}> element")]
    MissingElement(&'static str),

    /// A pin specification failed to parse.
    #[error(transparent)]
    Pin(#[from] RadioError),

    /// Premature end of the document.
    #[error("unexpected end of file")]
    UnexpectedEof,
}

/// Which remote service a station is polled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum StationType {
    /// Holfuy JSON API (requires an API key).
    HolfuyApi,
    /// Holfuy public widget scrape.
    HolfuyWidget,
    /// Windbird / Pioupiou JSON API.
    Windbird,
}

/// One weather station to poll and rebroadcast.
#[derive(Debug, Clone)]
pub struct StationConfig {
    /// Which remote service serves this station.
    pub station_type: StationType,
    /// The station's ID at the remote service.
    pub id: u32,
    /// Display name; empty means "take the name from the feed".
    pub name: String,
    /// API key (Holfuy API only).
    pub api_key: Option<String>,
    /// The station's position, broadcast with its weather data.
    pub position: Position,
    /// Poll interval in seconds.
    pub poll_interval: u64,
}

/// Broadcast scheduling parameters, all in seconds.
#[derive(Debug, Clone, Copy)]
pub struct FanetConfig {
    /// Interval between weather broadcasts.
    pub tx_interval_weather: u64,
    /// Interval between station-name broadcasts.
    pub tx_interval_names: u64,
    /// Suspend broadcasting after this long without hearing a neighbour
    /// (0 disables the suspend logic).
    pub inactivity_timeout: u64,
    /// Do not rebroadcast station data older than this.
    pub weather_max_age: u64,
}

/// The fully parsed configuration file.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Radio module setup.
    pub radio: RadioConfig,
    /// Broadcast scheduling.
    pub fanet: FanetConfig,
    /// Stations to poll.
    pub stations: Vec<StationConfig>,
}

impl BridgeConfig {
    /// Read and parse the configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse a configuration document.
    pub fn parse(xml: &str) -> Result<Self, ConfigError> {
        let mut reader = Reader::from_reader(xml.as_bytes());
        loop {
            match reader.read_event()? {
                Event::Start(tag) if tag.name().as_ref() == b"fags" => {
                    check_version(&attributes(&tag)?)?;
                    return parse_fags(&mut reader);
                }
                Event::Start(tag) | Event::Empty(tag) => {
                    return Err(ConfigError::UnknownElement(name_of(&tag)));
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
                Event::Text(_) => return Err(ConfigError::UnexpectedText("document".into())),
                Event::Eof => return Err(ConfigError::MissingElement("fags")),
                _ => return Err(ConfigError::UnexpectedText("document".into())),
            }
        }
    }
}

fn name_of(tag: &BytesStart) -> String {
    String::from_utf8_lossy(tag.name().as_ref()).to_string()
}

fn attributes(tag: &BytesStart) -> Result<HashMap<String, String>, ConfigError> {
    let mut map = HashMap::new();
    for attr in tag.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(quick_xml::Error::from)?
            .to_string();
        map.insert(key, value);
    }
    Ok(map)
}

fn required<'a>(
    attrs: &'a HashMap<String, String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, ConfigError> {
    attrs
        .get(attribute)
        .map(String::as_str)
        .ok_or(ConfigError::MissingAttribute { element, attribute })
}

fn parse_attr<T>(
    attrs: &HashMap<String, String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Debug,
{
    let value = required(attrs, element, attribute)?;
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAttribute {
            element,
            attribute,
            value: value.to_string(),
        })
}

fn check_version(attrs: &HashMap<String, String>) -> Result<(), ConfigError> {
    let raw = required(attrs, "fags", "version")?;
    let mismatch = || ConfigError::VersionMismatch {
        got: raw.to_string(),
    };
    let (major, minor) = raw.split_once('.').ok_or_else(mismatch)?;
    let major: u32 = major.trim().parse().map_err(|_| mismatch())?;
    let minor: u32 = minor.trim().parse().map_err(|_| mismatch())?;
    if major != CONFIG_VERSION_MAJOR || minor < CONFIG_VERSION_MINOR {
        return Err(mismatch());
    }
    Ok(())
}

/// Consume the end tag of an element that must not have children.
fn consume_end(reader: &mut Reader<&[u8]>, element: &'static str) -> Result<(), ConfigError> {
    loop {
        match reader.read_event()? {
            Event::End(tag) if tag.name().as_ref() == element.as_bytes() => return Ok(()),
            Event::Comment(_) => {}
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
            Event::Text(_) => return Err(ConfigError::UnexpectedText(element.to_string())),
            Event::Start(tag) | Event::Empty(tag) => {
                return Err(ConfigError::UnknownElement(name_of(&tag)))
            }
            Event::Eof => return Err(ConfigError::UnexpectedEof),
            _ => return Err(ConfigError::UnexpectedText(element.to_string())),
        }
    }
}

fn parse_fags(reader: &mut Reader<&[u8]>) -> Result<BridgeConfig, ConfigError> {
    let mut radio = None;
    let mut fanet = None;
    let mut stations = None;
    loop {
        let (tag, has_children) = match reader.read_event()? {
            Event::Start(tag) => (tag, true),
            Event::Empty(tag) => (tag, false),
            Event::End(tag) if tag.name().as_ref() == b"fags" => {
                return Ok(BridgeConfig {
                    radio: radio.ok_or(ConfigError::MissingElement("radio"))?,
                    fanet: fanet.ok_or(ConfigError::MissingElement("fanet"))?,
                    stations: stations.ok_or(ConfigError::MissingElement("stations"))?,
                });
            }
            Event::Comment(_) => continue,
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => continue,
            Event::Eof => return Err(ConfigError::UnexpectedEof),
            _ => return Err(ConfigError::UnexpectedText("fags".into())),
        };
        match tag.name().as_ref() {
            b"radio" => {
                radio = Some(parse_radio(&tag)?);
                if has_children {
                    consume_end(reader, "radio")?;
                }
            }
            b"fanet" => {
                fanet = Some(parse_fanet(&tag)?);
                if has_children {
                    consume_end(reader, "fanet")?;
                }
            }
            b"stations" => {
                stations = Some(if has_children {
                    parse_stations(reader)?
                } else {
                    Vec::new()
                });
            }
            _ => return Err(ConfigError::UnknownElement(name_of(&tag))),
        }
    }
}

fn parse_radio(tag: &BytesStart) -> Result<RadioConfig, ConfigError> {
    const ELEMENT: &str = "radio";
    let attrs = attributes(tag)?;
    let uart = required(&attrs, ELEMENT, "uart")?.to_string();
    if uart.is_empty() {
        return Err(ConfigError::InvalidAttribute {
            element: ELEMENT,
            attribute: "uart",
            value: uart,
        });
    }
    let pin_boot = PinConfig::parse(required(&attrs, ELEMENT, "pinboot")?)?;
    let pin_reset = PinConfig::parse(required(&attrs, ELEMENT, "pinreset")?)?;
    let tx_power: i32 = parse_attr(&attrs, ELEMENT, "txpower")?;
    if !(TXPOWER_MIN..=TXPOWER_MAX).contains(&tx_power) {
        return Err(ConfigError::InvalidAttribute {
            element: ELEMENT,
            attribute: "txpower",
            value: tx_power.to_string(),
        });
    }
    let freq_raw: u32 = parse_attr(&attrs, ELEMENT, "freq")?;
    let frequency =
        Frequency::try_from(freq_raw).map_err(|_| ConfigError::InvalidAttribute {
            element: ELEMENT,
            attribute: "freq",
            value: freq_raw.to_string(),
        })?;
    info!(
        uart,
        tx_power,
        frequency = %frequency,
        "radio configuration loaded"
    );
    Ok(RadioConfig {
        uart,
        tx_power,
        frequency,
        pin_boot,
        pin_reset,
    })
}

fn parse_fanet(tag: &BytesStart) -> Result<FanetConfig, ConfigError> {
    const ELEMENT: &str = "fanet";
    let attrs = attributes(tag)?;
    let config = FanetConfig {
        tx_interval_weather: parse_attr(&attrs, ELEMENT, "txinterval_weather")?,
        tx_interval_names: parse_attr(&attrs, ELEMENT, "txinterval_names")?,
        inactivity_timeout: parse_attr(&attrs, ELEMENT, "inactivity_timeout")?,
        weather_max_age: parse_attr(&attrs, ELEMENT, "weather_maxage")?,
    };
    info!(
        tx_interval_weather = config.tx_interval_weather,
        tx_interval_names = config.tx_interval_names,
        inactivity_timeout = config.inactivity_timeout,
        weather_max_age = config.weather_max_age,
        "fanet configuration loaded"
    );
    Ok(config)
}

fn parse_stations(reader: &mut Reader<&[u8]>) -> Result<Vec<StationConfig>, ConfigError> {
    let mut stations = Vec::new();
    loop {
        let (tag, has_children) = match reader.read_event()? {
            Event::Start(tag) => (tag, true),
            Event::Empty(tag) => (tag, false),
            Event::End(tag) if tag.name().as_ref() == b"stations" => return Ok(stations),
            Event::Comment(_) => continue,
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => continue,
            Event::Eof => return Err(ConfigError::UnexpectedEof),
            _ => return Err(ConfigError::UnexpectedText("stations".into())),
        };
        let (station_type, element): (StationType, &'static str) = match tag.name().as_ref() {
            b"holfuyapi" => (StationType::HolfuyApi, "holfuyapi"),
            b"holfuywidget" => (StationType::HolfuyWidget, "holfuywidget"),
            b"windbird" => (StationType::Windbird, "windbird"),
            _ => return Err(ConfigError::UnknownElement(name_of(&tag))),
        };
        stations.push(parse_station(&tag, station_type, element)?);
        if has_children {
            consume_end(reader, element)?;
        }
    }
}

fn parse_station(
    tag: &BytesStart,
    station_type: StationType,
    element: &'static str,
) -> Result<StationConfig, ConfigError> {
    let attrs = attributes(tag)?;
    let id: u32 = parse_attr(&attrs, element, "id")?;
    let name = required(&attrs, element, "name")?.to_string();
    let api_key = match station_type {
        StationType::HolfuyApi => Some(required(&attrs, element, "apikey")?.to_string()),
        _ => None,
    };
    let latitude: f64 = parse_attr(&attrs, element, "lat")?;
    let longitude: f64 = parse_attr(&attrs, element, "lon")?;
    let altitude: f64 = parse_attr(&attrs, element, "alt")?;
    let position = Position::new(latitude, longitude).with_altitude(altitude);
    if !position.is_valid() {
        return Err(ConfigError::InvalidAttribute {
            element,
            attribute: "lat",
            value: format!("{latitude},{longitude}"),
        });
    }
    let poll_interval: u64 = parse_attr(&attrs, element, "ival")?;
    info!(
        station_type = %station_type,
        id,
        name,
        api_key = if api_key.is_some() { "<hidden>" } else { "<none>" },
        position = %position,
        poll_interval,
        "station configuration loaded"
    );
    Ok(StationConfig {
        station_type,
        id,
        name,
        api_key,
        position,
        poll_interval,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fanet_radio::RadioPin;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<fags version="1.1">
  <radio uart="/dev/ttyUSB0" pinboot="!rts" pinreset="dtr" txpower="14" freq="868"/>
  <fanet txinterval_weather="40" txinterval_names="300" inactivity_timeout="3600" weather_maxage="900"/>
  <stations>
    <holfuyapi id="101" name="Gurnigel" apikey="SECRET" lat="46.731" lon="7.448" alt="1590" ival="60"/>
    <holfuywidget id="202" name="" lat="46.2" lon="6.9" alt="1100" ival="90"/>
    <windbird id="1333" name="Col du Glandon" lat="45.2" lon="5.8" alt="310" ival="120"/>
  </stations>
</fags>
"#;

    #[test]
    fn parses_full_sample() {
        let config = BridgeConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.radio.uart, "/dev/ttyUSB0");
        assert_eq!(config.radio.tx_power, 14);
        assert_eq!(config.radio.frequency, Frequency::Mhz868);
        assert_eq!(config.radio.pin_boot.pin, RadioPin::Rts);
        assert!(config.radio.pin_boot.active_low);
        assert_eq!(config.radio.pin_reset.pin, RadioPin::Dtr);

        assert_eq!(config.fanet.tx_interval_weather, 40);
        assert_eq!(config.fanet.tx_interval_names, 300);
        assert_eq!(config.fanet.inactivity_timeout, 3600);
        assert_eq!(config.fanet.weather_max_age, 900);

        assert_eq!(config.stations.len(), 3);
        let holfuy = &config.stations[0];
        assert_eq!(holfuy.station_type, StationType::HolfuyApi);
        assert_eq!(holfuy.id, 101);
        assert_eq!(holfuy.api_key.as_deref(), Some("SECRET"));
        assert!((holfuy.position.latitude - 46.731).abs() < 1e-9);
        assert!((holfuy.position.altitude - 1590.0).abs() < 1e-9);
        assert_eq!(holfuy.poll_interval, 60);

        assert_eq!(config.stations[1].station_type, StationType::HolfuyWidget);
        assert!(config.stations[1].name.is_empty());
        assert_eq!(config.stations[2].station_type, StationType::Windbird);
        assert_eq!(config.stations[2].api_key, None);
    }

    #[test]
    fn newer_minor_versions_are_accepted() {
        let xml = SAMPLE.replace("version=\"1.1\"", "version=\"1.7\"");
        assert!(BridgeConfig::parse(&xml).is_ok());
    }

    #[test]
    fn version_mismatch_is_rejected() {
        for bad in ["2.0", "0.9", "1.0", "1", "one.two"] {
            let xml = SAMPLE.replace("version=\"1.1\"", &format!("version=\"{bad}\""));
            assert!(
                matches!(
                    BridgeConfig::parse(&xml),
                    Err(ConfigError::VersionMismatch { .. })
                ),
                "version {bad} should be rejected"
            );
        }
    }

    #[test]
    fn missing_attribute_is_rejected() {
        let xml = SAMPLE.replace(" txpower=\"14\"", "");
        assert!(matches!(
            BridgeConfig::parse(&xml),
            Err(ConfigError::MissingAttribute {
                element: "radio",
                attribute: "txpower",
            })
        ));
    }

    #[test]
    fn out_of_range_txpower_is_rejected() {
        let xml = SAMPLE.replace("txpower=\"14\"", "txpower=\"25\"");
        assert!(matches!(
            BridgeConfig::parse(&xml),
            Err(ConfigError::InvalidAttribute { attribute: "txpower", .. })
        ));
    }

    #[test]
    fn unsupported_frequency_is_rejected() {
        let xml = SAMPLE.replace("freq=\"868\"", "freq=\"433\"");
        assert!(matches!(
            BridgeConfig::parse(&xml),
            Err(ConfigError::InvalidAttribute { attribute: "freq", .. })
        ));
    }

    #[test]
    fn holfuyapi_requires_api_key() {
        let xml = SAMPLE.replace(" apikey=\"SECRET\"", "");
        assert!(matches!(
            BridgeConfig::parse(&xml),
            Err(ConfigError::MissingAttribute { attribute: "apikey", .. })
        ));
    }

    #[test]
    fn unknown_station_elements_are_rejected() {
        let xml = SAMPLE.replace("<stations>", "<stations>\n<darkskies id=\"1\"/>");
        assert!(matches!(
            BridgeConfig::parse(&xml),
            Err(ConfigError::UnknownElement(name)) if name == "darkskies"
        ));
    }

    #[test]
    fn missing_sections_are_rejected() {
        let xml = "<fags version=\"1.1\"><stations/></fags>";
        assert!(matches!(
            BridgeConfig::parse(xml),
            Err(ConfigError::MissingElement(_))
        ));
    }

    #[test]
    fn invalid_position_is_rejected() {
        let xml = SAMPLE.replace("lat=\"46.731\"", "lat=\"146.731\"");
        assert!(matches!(
            BridgeConfig::parse(&xml),
            Err(ConfigError::InvalidAttribute { .. })
        ));
    }
}
