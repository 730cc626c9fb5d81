//! Typed FANET payloads and their binary codec.
//!
//! A [`FanetPayload`] carries the payload bytes exactly as they travel over
//! the air, tagged with a [`PayloadType`]. Constructors validate inbound
//! data against the per-type minimum lengths; all derived values (position,
//! altitude, wind, …) decode on demand from the raw bytes.
//!
//! Fixed-point conventions, shared with the weather adapters:
//! temperatures are °C × 10, speeds are km/h × 10, climb is m/s × 10.
//! Multi-byte integers are little-endian; signed fields are
//! two's-complement.

use std::fmt;

use tracing::warn;

/// Latitude degrees → 24-bit integer scale factor.
const LAT_SCALE: f64 = 93206.0;
/// Longitude degrees → 24-bit integer scale factor.
const LON_SCALE: f64 = 46603.0;

const GROUNDTRACKING_SIZE: usize = 7;
const TRACKING_SIZE_MIN: usize = 11; // + 2 optional bytes for turn rate / QNE offset
const THERMAL_SIZE_MIN: usize = 11;
const HWINFO_OLD_SIZE_MIN: usize = 3;

// ---------------------------------------------------------------------------
// PayloadType
// ---------------------------------------------------------------------------

/// FANET payload type tag, as carried in transmit commands and receive
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[repr(u8)]
pub enum PayloadType {
    /// Acknowledgement (empty payload).
    Ack = 0x00,
    /// Airborne position/motion broadcast.
    Tracking = 0x01,
    /// Device name broadcast (Latin-1 text).
    Name = 0x02,
    /// Free-text message (1-byte header + Latin-1 text).
    Message = 0x03,
    /// Weather/service broadcast (header-driven variable layout).
    Service = 0x04,
    /// Landmark broadcast (not implemented here).
    Landmarks = 0x05,
    /// Remote configuration (not implemented here).
    RemoteConfig = 0x06,
    /// Ground position broadcast.
    GroundTracking = 0x07,
    /// Deprecated hardware-info broadcast.
    #[strum(serialize = "HwInfo(deprecated)")]
    HwInfoOld = 0x08,
    /// Thermal report.
    Thermal = 0x09,
    /// Hardware-info broadcast.
    HwInfo = 0x0A,
    /// Unknown or failed-to-decode payload.
    Invalid = 0xFF,
}

impl PayloadType {
    /// Map a wire value onto a payload type; unknown values become
    /// [`Invalid`](Self::Invalid).
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::Ack,
            0x01 => Self::Tracking,
            0x02 => Self::Name,
            0x03 => Self::Message,
            0x04 => Self::Service,
            0x05 => Self::Landmarks,
            0x06 => Self::RemoteConfig,
            0x07 => Self::GroundTracking,
            0x08 => Self::HwInfoOld,
            0x09 => Self::Thermal,
            0x0A => Self::HwInfo,
            _ => Self::Invalid,
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceHeader
// ---------------------------------------------------------------------------

/// The service payload's header bitmask (byte 0).
///
/// Combine flags with `|`:
///
/// ```
/// use fanet_models::ServiceHeader;
///
/// let header = ServiceHeader::WIND | ServiceHeader::TEMPERATURE;
/// assert_eq!(header.bits(), 0x60);
/// assert!(header.contains(ServiceHeader::WIND));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceHeader(u8);

impl ServiceHeader {
    /// Extended header present (+1 byte directly after byte 0).
    pub const EXTENDED_HEADER: Self = Self(0x01);
    /// State of charge (+1 byte).
    pub const STATE_OF_CHARGE: Self = Self(0x02);
    /// Advertises remote-configuration support (no payload).
    pub const REMOTE_CONFIG: Self = Self(0x04);
    /// Barometric pressure (+2 bytes).
    pub const PRESSURE: Self = Self(0x08);
    /// Relative humidity (+1 byte).
    pub const HUMIDITY: Self = Self(0x10);
    /// Wind direction/speed/gusts (+3 bytes).
    pub const WIND: Self = Self(0x20);
    /// Temperature (+1 byte).
    pub const TEMPERATURE: Self = Self(0x40);
    /// Internet gateway flag (no payload).
    pub const INTERNET_GATEWAY: Self = Self(0x80);

    /// Construct from the raw header byte.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw header byte.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// `true` when every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` when any flag that appends measurement data is set; those
    /// payloads must carry the 6-byte position block.
    pub fn has_position_data(self) -> bool {
        self.0
            & !(Self::EXTENDED_HEADER.0 | Self::INTERNET_GATEWAY.0 | Self::REMOTE_CONFIG.0)
            != 0
    }

    /// Byte length dictated by this header, including the header byte
    /// itself.
    pub fn expected_len(self) -> usize {
        let mut len = 1;
        if self.has_position_data() {
            len += 6;
        }
        if self.contains(Self::EXTENDED_HEADER) {
            len += 1;
        }
        if self.contains(Self::TEMPERATURE) {
            len += 1;
        }
        if self.contains(Self::WIND) {
            len += 3;
        }
        if self.contains(Self::HUMIDITY) {
            len += 1;
        }
        if self.contains(Self::PRESSURE) {
            len += 2;
        }
        if self.contains(Self::STATE_OF_CHARGE) {
            len += 1;
        }
        len
    }

    /// Offset of the first measurement byte: header + optional extended
    /// header + position.
    fn data_offset(self) -> usize {
        if self.contains(Self::EXTENDED_HEADER) {
            8
        } else {
            7
        }
    }
}

impl std::ops::BitOr for ServiceHeader {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ServiceHeader {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A WGS-84 position in decimal degrees, with altitude in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Altitude in metres above sea level.
    pub altitude: f64,
}

impl Position {
    /// Create a position at sea level.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: 0.0,
        }
    }

    /// Set the altitude, builder style.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    /// `true` when latitude and longitude are within their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

// ---------------------------------------------------------------------------
// AircraftType / GroundTrackingType
// ---------------------------------------------------------------------------

/// Aircraft class carried in tracking payloads (bits 12–14 of the type
/// word).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AircraftType {
    /// Unclassified.
    #[strum(serialize = "other")]
    Other,
    /// Paraglider.
    Paraglider,
    /// Hangglider.
    Hangglider,
    /// Balloon.
    Balloon,
    /// Glider.
    Glider,
    /// Powered aircraft.
    PoweredAircraft,
    /// Helicopter.
    Helicopter,
    /// Unmanned aerial vehicle.
    #[strum(serialize = "uav")]
    Uav,
}

impl AircraftType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            1 => Self::Paraglider,
            2 => Self::Hangglider,
            3 => Self::Balloon,
            4 => Self::Glider,
            5 => Self::PoweredAircraft,
            6 => Self::Helicopter,
            7 => Self::Uav,
            _ => Self::Other,
        }
    }
}

/// Ground-node status carried in ground-tracking payloads (bits 4–7 of
/// byte 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum GroundTrackingType {
    /// Unclassified.
    Other,
    /// Walking.
    Walking,
    /// Vehicle.
    Vehicle,
    /// Bike.
    Bike,
    /// Boot.
    Boot,
    /// Needs a ride.
    #[strum(serialize = "Need a ride")]
    NeedARide,
    /// Landed well.
    #[strum(serialize = "Landed well")]
    LandedWell,
    /// Needs technical support.
    #[strum(serialize = "Need technical support")]
    NeedTechSupport,
    /// Needs medical help.
    #[strum(serialize = "Need medical help")]
    NeedMedicalHelp,
    /// Distress call.
    #[strum(serialize = "Distress call")]
    DistressCall,
    /// Automatically raised distress call.
    #[strum(serialize = "Distress call (automatically)")]
    DistressCallAuto,
}

impl GroundTrackingType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            0x01 => Self::Walking,
            0x02 => Self::Vehicle,
            0x03 => Self::Bike,
            0x04 => Self::Boot,
            0x08 => Self::NeedARide,
            0x09 => Self::LandedWell,
            0x0C => Self::NeedTechSupport,
            0x0D => Self::NeedMedicalHelp,
            0x0E => Self::DistressCall,
            0x0F => Self::DistressCallAuto,
            _ => Self::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// FirmwareBuild
// ---------------------------------------------------------------------------

/// Decoded firmware build date from hardware-info payloads.
///
/// Wire form is a little-endian `u16`: bit 15 experimental flag,
/// bits 9–14 year offset from 2019, bits 5–8 month, bits 0–4 day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareBuild {
    /// Build year (2019-based offset on the wire).
    pub year: u16,
    /// Build month (1–12).
    pub month: u8,
    /// Build day of month.
    pub day: u8,
    /// Experimental-build flag.
    pub experimental: bool,
}

impl FirmwareBuild {
    /// Decode from the wire representation.
    pub fn from_u16(value: u16) -> Self {
        Self {
            year: ((value & 0x7E00) >> 9) + 2019,
            month: ((value & 0x01E0) >> 5) as u8,
            day: (value & 0x001F) as u8,
            experimental: value & 0x8000 != 0,
        }
    }
}

impl fmt::Display for FirmwareBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.year, self.month, self.day)?;
        if self.experimental {
            f.write_str(" (experimental)")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FanetPayload
// ---------------------------------------------------------------------------

/// A typed FANET payload: the wire bytes plus their type tag.
///
/// A payload is *valid* iff its type is not [`PayloadType::Invalid`]; the
/// inbound constructor [`from_received_data`](Self::from_received_data)
/// downgrades undersized or unsupported payloads to invalid ones while
/// keeping the bytes for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanetPayload {
    payload_type: PayloadType,
    data: Vec<u8>,
}

impl Default for FanetPayload {
    /// An empty invalid payload.
    fn default() -> Self {
        Self::new(PayloadType::Invalid, Vec::new())
    }
}

impl FanetPayload {
    fn new(payload_type: PayloadType, data: Vec<u8>) -> Self {
        Self { payload_type, data }
    }

    /// Validate received payload bytes against the per-type length rules.
    ///
    /// Undersized payloads, hardware-info pull requests and unsupported
    /// types come back as [`PayloadType::Invalid`].
    pub fn from_received_data(payload_type: PayloadType, data: Vec<u8>) -> Self {
        match payload_type {
            PayloadType::GroundTracking => {
                if data.len() != GROUNDTRACKING_SIZE {
                    warn!(
                        expected = GROUNDTRACKING_SIZE,
                        got = data.len(),
                        "failed to parse ground tracking payload: invalid size"
                    );
                    return Self::new(PayloadType::Invalid, data);
                }
                Self::new(payload_type, data)
            }
            PayloadType::Tracking => {
                if data.len() < TRACKING_SIZE_MIN {
                    warn!(
                        expected = TRACKING_SIZE_MIN,
                        got = data.len(),
                        "failed to parse tracking payload: size too small"
                    );
                    return Self::new(PayloadType::Invalid, data);
                }
                Self::new(payload_type, data)
            }
            PayloadType::Thermal => {
                if data.len() < THERMAL_SIZE_MIN {
                    warn!(
                        expected = THERMAL_SIZE_MIN,
                        got = data.len(),
                        "failed to parse thermal payload: size too small"
                    );
                    return Self::new(PayloadType::Invalid, data);
                }
                Self::new(payload_type, data)
            }
            PayloadType::Ack | PayloadType::Name | PayloadType::Message => {
                Self::new(payload_type, data)
            }
            PayloadType::HwInfoOld => {
                if data.len() < HWINFO_OLD_SIZE_MIN {
                    return Self::new(PayloadType::Invalid, data);
                }
                Self::new(payload_type, data)
            }
            PayloadType::HwInfo => {
                let header = data.first().copied().unwrap_or(0);
                if header & 0x80 != 0 {
                    warn!("received pull request for hw info: not implemented");
                    return Self::new(PayloadType::Invalid, data);
                }
                let mut expected = 1; // header only
                if header & 0x40 != 0 {
                    expected += 3; // device subtype + firmware build
                }
                if header & 0x20 != 0 {
                    expected += 3; // 24-bit ICAO address
                }
                if header & 0x10 != 0 {
                    expected += 2; // uptime in minutes
                }
                if header & 0x08 != 0 {
                    expected += 4; // RSSI + address
                }
                if header & 0x01 != 0 {
                    expected += 1; // extended header
                }
                if data.len() < expected {
                    warn!(
                        expected,
                        got = data.len(),
                        "failed to parse hw info payload: size too small"
                    );
                    return Self::new(PayloadType::Invalid, data);
                }
                Self::new(payload_type, data)
            }
            PayloadType::Service => {
                let header = ServiceHeader::from_bits(data.first().copied().unwrap_or(0));
                let expected = if data.is_empty() { 1 } else { header.expected_len() };
                if data.len() < expected {
                    warn!(
                        expected,
                        got = data.len(),
                        "failed to parse service payload: size too small"
                    );
                    return Self::new(PayloadType::Invalid, data);
                }
                Self::new(payload_type, data)
            }
            other => {
                warn!(payload_type = %other, "failed to parse payload: type not implemented");
                Self::new(PayloadType::Invalid, data)
            }
        }
    }

    /// An acknowledgement payload (no data).
    pub fn ack() -> Self {
        Self::new(PayloadType::Ack, Vec::new())
    }

    /// A name broadcast carrying the given text as Latin-1.
    pub fn name_payload(name: &str) -> Self {
        Self::new(PayloadType::Name, latin1_bytes(name))
    }

    /// A normal free-text message (header byte `0x00` + Latin-1 text).
    pub fn message_payload(text: &str) -> Self {
        let mut data = vec![0x00];
        data.extend_from_slice(&latin1_bytes(text));
        Self::new(PayloadType::Message, data)
    }

    /// Encode a service (weather) payload.
    ///
    /// All measurement arguments are fixed-point ×10: `temperature` in
    /// °C × 10, `wind_speed`/`wind_gusts` in km/h × 10, `humidity` in
    /// %rh × 10, `pressure` in hPa × 10; `wind_dir` is in degrees.
    /// Only the fields selected by `header` are written; out-of-range
    /// values are clamped to the nearest encodable step.
    pub fn service_payload(
        header: ServiceHeader,
        position: Position,
        temperature: i32,
        wind_dir: i32,
        wind_speed: i32,
        wind_gusts: i32,
        humidity: i32,
        pressure: i32,
    ) -> Self {
        let mut data = Vec::with_capacity(header.expected_len());
        data.push(header.bits());
        if header.contains(ServiceHeader::EXTENDED_HEADER) {
            data.push(0x00);
        }
        if header.has_position_data() {
            encode_coordinates(&mut data, &position);
        }
        if header.contains(ServiceHeader::TEMPERATURE) {
            // 0.5 degree steps, two's-complement
            let t = ((temperature as f64) / 5.0).round() as i32;
            data.push(t.clamp(i8::MIN as i32, i8::MAX as i32) as i8 as u8);
        }
        if header.contains(ServiceHeader::WIND) {
            data.push(encode_direction(wind_dir));
            data.push(encode_speed(wind_speed));
            data.push(encode_speed(wind_gusts));
        }
        if header.contains(ServiceHeader::HUMIDITY) {
            // 0.4 %rh steps
            let h = ((humidity as f64) / 4.0).round() as i32;
            data.push(h.clamp(0, u8::MAX as i32) as u8);
        }
        if header.contains(ServiceHeader::PRESSURE) {
            // 10 Pa steps offset by 430 hPa
            let p = (pressure - 4300).clamp(0, u16::MAX as i32) as u16;
            data.extend_from_slice(&p.to_le_bytes());
        }
        if header.contains(ServiceHeader::STATE_OF_CHARGE) {
            data.push(0x00);
        }
        Self::new(PayloadType::Service, data)
    }

    /// The payload's type tag.
    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    /// The raw payload bytes as transmitted.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` when the payload carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `true` unless the type tag is [`PayloadType::Invalid`].
    pub fn is_valid(&self) -> bool {
        self.payload_type != PayloadType::Invalid
    }

    // ------------------------------------------------------------------
    // Decoded accessors
    // ------------------------------------------------------------------

    /// Broadcast name (Name payloads only).
    pub fn name(&self) -> Option<String> {
        (self.payload_type == PayloadType::Name).then(|| latin1_string(&self.data))
    }

    /// Message text, excluding the one-byte header (Message payloads only).
    pub fn message(&self) -> Option<String> {
        (self.payload_type == PayloadType::Message)
            .then(|| latin1_string(self.data.get(1..).unwrap_or_default()))
    }

    fn service_header(&self) -> ServiceHeader {
        if self.payload_type == PayloadType::Service {
            ServiceHeader::from_bits(self.data.first().copied().unwrap_or(0))
        } else {
            ServiceHeader::default()
        }
    }

    /// Decoded position for tracking, ground-tracking, thermal and service
    /// payloads that carry one.
    pub fn position(&self) -> Option<Position> {
        let offset = match self.payload_type {
            PayloadType::Service => {
                let header = self.service_header();
                header.data_offset() - 6
            }
            PayloadType::Tracking | PayloadType::GroundTracking | PayloadType::Thermal => 0,
            _ => return None,
        };
        let bytes = self.data.get(offset..offset + 6)?;
        let lat = decode_coordinate(&bytes[0..3]) / LAT_SCALE;
        let lon = decode_coordinate(&bytes[3..6]) / LON_SCALE;
        Some(Position::new(lat, lon))
    }

    /// Aircraft class (tracking payloads only).
    pub fn aircraft_type(&self) -> Option<AircraftType> {
        if self.payload_type != PayloadType::Tracking {
            return None;
        }
        Some(AircraftType::from_bits(self.data.get(7)? >> 4))
    }

    /// Ground-node status (ground-tracking payloads only).
    pub fn ground_tracking_type(&self) -> Option<GroundTrackingType> {
        if self.payload_type != PayloadType::GroundTracking {
            return None;
        }
        Some(GroundTrackingType::from_bits((self.data.get(6)? & 0xF0) >> 4))
    }

    /// Online-tracking flag for tracking and ground-tracking payloads.
    pub fn online_tracking(&self) -> bool {
        match self.payload_type {
            PayloadType::Tracking => self.data.get(7).is_some_and(|b| b & 0x80 != 0),
            PayloadType::GroundTracking => self.data.get(6).is_some_and(|b| b & 0x01 != 0),
            _ => false,
        }
    }

    /// Temperature in °C × 10 (service payloads with the temperature flag).
    pub fn temperature(&self) -> Option<i32> {
        let header = self.service_header();
        if !header.contains(ServiceHeader::TEMPERATURE) {
            return None;
        }
        let byte = *self.data.get(header.data_offset())?;
        Some(i32::from(byte as i8) * 5)
    }

    /// Wind direction in degrees (service payloads with the wind flag).
    pub fn wind_direction(&self) -> Option<i32> {
        Some(decode_direction(*self.data.get(self.wind_offset()?)?))
    }

    /// Wind speed in km/h × 10 (service payloads with the wind flag).
    pub fn wind_speed(&self) -> Option<i32> {
        Some(decode_speed(*self.data.get(self.wind_offset()? + 1)?))
    }

    /// Wind gusts in km/h × 10 (service payloads with the wind flag).
    pub fn wind_gusts(&self) -> Option<i32> {
        Some(decode_speed(*self.data.get(self.wind_offset()? + 2)?))
    }

    fn wind_offset(&self) -> Option<usize> {
        let header = self.service_header();
        if !header.contains(ServiceHeader::WIND) {
            return None;
        }
        let mut offset = header.data_offset();
        if header.contains(ServiceHeader::TEMPERATURE) {
            offset += 1;
        }
        Some(offset)
    }

    /// Relative humidity in %rh × 10 (service payloads with the humidity
    /// flag).
    pub fn humidity(&self) -> Option<i32> {
        let header = self.service_header();
        if !header.contains(ServiceHeader::HUMIDITY) {
            return None;
        }
        let mut offset = header.data_offset();
        if header.contains(ServiceHeader::TEMPERATURE) {
            offset += 1;
        }
        if header.contains(ServiceHeader::WIND) {
            offset += 3;
        }
        Some(i32::from(*self.data.get(offset)?) * 4)
    }

    /// Barometric pressure in hPa × 10 (service payloads with the pressure
    /// flag).
    pub fn pressure(&self) -> Option<i32> {
        let header = self.service_header();
        if !header.contains(ServiceHeader::PRESSURE) {
            return None;
        }
        let mut offset = header.data_offset();
        if header.contains(ServiceHeader::TEMPERATURE) {
            offset += 1;
        }
        if header.contains(ServiceHeader::WIND) {
            offset += 3;
        }
        if header.contains(ServiceHeader::HUMIDITY) {
            offset += 1;
        }
        let raw = u16::from_le_bytes([*self.data.get(offset)?, *self.data.get(offset + 1)?]);
        Some(i32::from(raw) + 4300)
    }

    /// Altitude in metres (tracking and thermal payloads).
    pub fn altitude(&self) -> Option<i32> {
        match self.payload_type {
            PayloadType::Tracking | PayloadType::Thermal => {
                let lo = *self.data.get(6)?;
                let hi = *self.data.get(7)?;
                let scale = if hi & 0x08 != 0 { 4 } else { 1 };
                let alt = u16::from(lo) | (u16::from(hi & 0x07) << 8);
                Some(scale * i32::from(alt))
            }
            _ => None,
        }
    }

    /// Heading (tracking) or average wind heading (thermal), in degrees.
    pub fn heading(&self) -> Option<i32> {
        match self.payload_type {
            PayloadType::Tracking | PayloadType::Thermal => {
                Some(decode_direction(*self.data.get(10)?))
            }
            _ => None,
        }
    }

    /// Speed over ground (tracking) or average wind speed at the thermal
    /// (thermal), in km/h × 10.
    pub fn speed(&self) -> Option<i32> {
        let byte = match self.payload_type {
            PayloadType::Tracking => *self.data.get(8)?,
            PayloadType::Thermal => *self.data.get(9)?,
            _ => return None,
        };
        Some(decode_speed(byte))
    }

    /// Climb rate (tracking) or average thermal climb (thermal), in
    /// m/s × 10.
    pub fn climb(&self) -> Option<i32> {
        let byte = match self.payload_type {
            PayloadType::Tracking => *self.data.get(9)?,
            PayloadType::Thermal => *self.data.get(8)?,
            _ => return None,
        };
        let negative = byte & 0x40 != 0;
        let scale = if byte & 0x80 != 0 { 5 } else { 1 };
        let climb = (if negative { byte | 0x80 } else { byte & 0x7F }) as i8;
        Some(i32::from(climb) * scale)
    }

    /// Thermal confidence in percent (thermal payloads). Computed as
    /// `100 * q / 7` in integer arithmetic; values truncate.
    pub fn quality(&self) -> Option<i32> {
        if self.payload_type != PayloadType::Thermal {
            return None;
        }
        let q = i32::from((self.data.get(7)? & 0x70) >> 4);
        Some(100 * q / 7)
    }

    /// Uptime in minutes (hardware-info payloads that carry it).
    pub fn uptime_minutes(&self) -> Option<i32> {
        match self.payload_type {
            PayloadType::HwInfo => {
                let header = *self.data.first()?;
                if header & 0x10 == 0 {
                    return None;
                }
                let mut index = if header & 0x01 != 0 { 2 } else { 1 };
                if header & 0x40 != 0 {
                    index += 3; // device subtype + firmware build
                }
                let raw =
                    u16::from_le_bytes([*self.data.get(index)?, *self.data.get(index + 1)?]);
                Some(i32::from(raw))
            }
            PayloadType::HwInfoOld => {
                // bytes 3-4 (bits 15-4) optionally hold uptime in 30 s steps
                let lo = *self.data.get(3)?;
                let hi = *self.data.get(4)?;
                let raw = (i32::from(hi & 0xF0) << 4) | i32::from(lo);
                Some(raw >> 2)
            }
            _ => None,
        }
    }

    /// Firmware build date (hardware-info payloads that carry it).
    pub fn firmware_build(&self) -> Option<FirmwareBuild> {
        let index = match self.payload_type {
            PayloadType::HwInfo => {
                let header = *self.data.first()?;
                if header & 0x40 == 0 {
                    return None;
                }
                if header & 0x01 != 0 {
                    3
                } else {
                    2
                }
            }
            PayloadType::HwInfoOld => 1,
            _ => return None,
        };
        let raw = u16::from_le_bytes([*self.data.get(index)?, *self.data.get(index + 1)?]);
        Some(FirmwareBuild::from_u16(raw))
    }

    /// Human-readable device model for hardware-info payloads, resolved
    /// against the manufacturer half of the sender's address.
    pub fn device_name(&self, manufacturer: u8) -> Option<&'static str> {
        let device = match self.payload_type {
            PayloadType::HwInfo => {
                let header = *self.data.first()?;
                if header & 0x40 != 0 {
                    *self.data.get(if header & 0x01 != 0 { 2 } else { 1 })?
                } else {
                    0
                }
            }
            PayloadType::HwInfoOld => *self.data.first()?,
            _ => return None,
        };
        Some(device_from_id(manufacturer, device))
    }
}

/// Device model lookup for hardware-info payloads, per the FANET
/// protocol's manufacturer/device assignments.
pub fn device_from_id(manufacturer: u8, device: u8) -> &'static str {
    match manufacturer {
        0x00 => "reserved/invalid",
        0x01 => {
            if device == 0x01 {
                "Skytraxx Wind station"
            } else {
                "Skytraxx unknown"
            }
        }
        0x03 => "BitBroker.eu",
        0x04 => "AirWhere",
        0x05 => "Windline",
        0x06 => {
            if device == 0x01 {
                "Burnair base station WiFi"
            } else {
                "Burnair unknown"
            }
        }
        0x07 => "SoftRF",
        0x08 => "GXAircom",
        0x09 => "Airtribune",
        0x0A => "FLARM",
        0x0B => "FlyBeeper",
        0x0C => "Leaf Vario",
        0x10 => "alfapilot",
        0x11 => match device {
            0x01 => "Skytraxx 3.0",
            0x02 => "Skytraxx 2.1",
            0x03 => "Skytraxx Beacon",
            0x04 => "Skytraxx 4.0",
            0x05 => "Skytraxx 5",
            0x06 => "Skytraxx 5mini",
            0x10 => "Naviter Oudie 5",
            0x11 => "Naviter Blade",
            0x12 => "Naviter Oudie N",
            0x20 => "Skybean Strato",
            _ => "FANET+ unknown",
        },
        0x20 => "XC Tracer",
        0xCB => "Cloudbuddy",
        0xDD..=0xDF | 0xF0 => "reserved/compat.",
        0xE0 => "OGN Tracker",
        0xE4 => "4aviation",
        0xFA => "Various/GetroniX",
        0xFB => {
            if device == 0x01 {
                "Skytraxx WiFi base station"
            } else {
                "Espressif base station"
            }
        }
        0xFC | 0xFD => "Unregistered device",
        _ => "unknown",
    }
}

// ---------------------------------------------------------------------------
// Field codecs
// ---------------------------------------------------------------------------

/// Append a 6-byte position block: two 24-bit little-endian
/// two's-complement integers (latitude × 93206, longitude × 46603).
fn encode_coordinates(data: &mut Vec<u8>, position: &Position) {
    let lat = if position.is_valid() {
        (position.latitude * LAT_SCALE).round() as i32
    } else {
        0
    };
    let lon = if position.is_valid() {
        (position.longitude * LON_SCALE).round() as i32
    } else {
        0
    };
    data.extend_from_slice(&lat.to_le_bytes()[..3]);
    data.extend_from_slice(&lon.to_le_bytes()[..3]);
}

/// Decode a 24-bit little-endian two's-complement coordinate.
fn decode_coordinate(bytes: &[u8]) -> f64 {
    let raw =
        u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16);
    let value = if raw & 0x80_0000 != 0 {
        raw as i32 - 0x100_0000
    } else {
        raw as i32
    };
    f64::from(value)
}

/// Direction byte: 360° mapped onto 256 steps.
fn encode_direction(degrees: i32) -> u8 {
    ((f64::from(degrees) * 256.0 / 360.0).round() as i32).rem_euclid(256) as u8
}

fn decode_direction(byte: u8) -> i32 {
    (f64::from(byte) * 360.0 / 256.0).round() as i32
}

/// Speed byte: bits 0–6 in 0.5 km/h steps, bit 7 switches to 2.5 km/h
/// steps for values past 63.5 km/h. Input is km/h × 10.
fn encode_speed(kmh10: i32) -> u8 {
    let fine = ((f64::from(kmh10)) / 5.0).round() as i32;
    if (0..=0x7F).contains(&fine) {
        fine as u8
    } else {
        let coarse = ((f64::from(kmh10)) / 25.0).round() as i32;
        0x80 | coarse.clamp(0, 0x7F) as u8
    }
}

/// Inverse of [`encode_speed`]; returns km/h × 10.
fn decode_speed(byte: u8) -> i32 {
    let scale = if byte & 0x80 != 0 { 25 } else { 5 };
    i32::from(byte & 0x7F) * scale
}

fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
        .collect()
}

fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn from_hex(hex: &str) -> Vec<u8> {
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn tracking_decode_worked_example() {
        // Paraglider over the Fribourg pre-alps, 1024 m, stationary.
        let payload =
            FanetPayload::from_received_data(PayloadType::Tracking, from_hex("727542ACF004009900000028"));
        assert!(payload.is_valid());
        let pos = payload.position().unwrap();
        assert!((pos.latitude - 46.7292).abs() < 0.0001, "lat {}", pos.latitude);
        assert!((pos.longitude - 6.9471).abs() < 0.0001, "lon {}", pos.longitude);
        assert_eq!(payload.altitude(), Some(1024));
        assert!(payload.online_tracking());
        assert_eq!(payload.aircraft_type(), Some(AircraftType::Paraglider));
        assert_eq!(payload.heading(), Some(56));
        assert_eq!(payload.speed(), Some(0));
        assert_eq!(payload.climb(), Some(0));
    }

    #[test]
    fn tracking_too_short_is_invalid() {
        let payload = FanetPayload::from_received_data(PayloadType::Tracking, vec![0; 10]);
        assert!(!payload.is_valid());
        assert_eq!(payload.payload_type(), PayloadType::Invalid);
    }

    #[test]
    fn tracking_optional_tail_is_preserved() {
        let mut data = from_hex("727542ACF004009900000028");
        data.extend_from_slice(&[0x12, 0x34]); // turn rate / QNE offset
        let payload = FanetPayload::from_received_data(PayloadType::Tracking, data.clone());
        assert!(payload.is_valid());
        assert_eq!(payload.data(), data.as_slice());
    }

    #[test]
    fn tracking_speed_and_climb_scales() {
        let mut data = from_hex("727542ACF004009900000028");
        data[8] = 0x88; // scaled: 8 * 2.5 km/h
        data[9] = 0x45; // negative climb: (0x45 | 0x80) as i8 = -59
        let payload = FanetPayload::from_received_data(PayloadType::Tracking, data);
        assert_eq!(payload.speed(), Some(8 * 25));
        assert_eq!(payload.climb(), Some(-59));
    }

    #[test]
    fn ground_tracking_requires_exact_size() {
        assert!(!FanetPayload::from_received_data(PayloadType::GroundTracking, vec![0; 6]).is_valid());
        assert!(!FanetPayload::from_received_data(PayloadType::GroundTracking, vec![0; 8]).is_valid());
        assert!(FanetPayload::from_received_data(PayloadType::GroundTracking, vec![0; 7]).is_valid());
    }

    #[test]
    fn ground_tracking_type_and_online_flag() {
        let mut data = from_hex("727542ACF004");
        data.push(0x31); // bits 4-7 = 3 (Bike), bit 0 = online
        let payload = FanetPayload::from_received_data(PayloadType::GroundTracking, data);
        assert_eq!(payload.ground_tracking_type(), Some(GroundTrackingType::Bike));
        assert!(payload.online_tracking());
    }

    #[test]
    fn thermal_quality_uses_integer_truncation() {
        // byte 7 bits 4-6 carry the confidence value
        let mut data = vec![0u8; 11];
        data[7] = 0x30; // q = 3
        let payload = FanetPayload::from_received_data(PayloadType::Thermal, data.clone());
        assert_eq!(payload.quality(), Some(100 * 3 / 7)); // 42, not 43
        data[7] = 0x70; // q = 7
        let payload = FanetPayload::from_received_data(PayloadType::Thermal, data);
        assert_eq!(payload.quality(), Some(100));
    }

    #[test]
    fn thermal_too_short_is_invalid() {
        assert!(!FanetPayload::from_received_data(PayloadType::Thermal, vec![0; 10]).is_valid());
    }

    #[test]
    fn thermal_wind_accessors() {
        let mut data = vec![0u8; 11];
        data[8] = 0x0A; // avg climb +1.0 m/s
        data[9] = 0x32; // avg wind 25 km/h
        data[10] = 0x40; // wind heading 90 deg
        let payload = FanetPayload::from_received_data(PayloadType::Thermal, data);
        assert_eq!(payload.climb(), Some(10));
        assert_eq!(payload.speed(), Some(250));
        assert_eq!(payload.heading(), Some(90));
    }

    #[test]
    fn service_encode_worked_example() {
        // Wind + temperature, 18.5 degC, 25 km/h from 90 deg gusting 40
        let payload = FanetPayload::service_payload(
            ServiceHeader::WIND | ServiceHeader::TEMPERATURE,
            Position::new(46.5, 7.0),
            185,
            90,
            250,
            400,
            0,
            0,
        );
        assert_eq!(payload.len(), 11);
        assert_eq!(payload.data()[0], 0x60);
        assert_eq!(&payload.data()[1..7], &from_hex("FF21424DFA04")[..]);
        assert_eq!(payload.data()[7], 0x25);
        assert_eq!(&payload.data()[8..11], &[0x40, 0x32, 0x50]);

        let decoded = FanetPayload::from_received_data(PayloadType::Service, payload.data().to_vec());
        assert_eq!(decoded.temperature(), Some(185));
        assert_eq!(decoded.wind_direction(), Some(90));
        assert_eq!(decoded.wind_speed(), Some(250));
        assert_eq!(decoded.wind_gusts(), Some(400));
        let pos = decoded.position().unwrap();
        assert!((pos.latitude - 46.5).abs() < 0.0001);
        assert!((pos.longitude - 7.0).abs() < 0.0001);
    }

    #[test]
    fn service_length_matches_header() {
        let pos = Position::new(46.0, 7.0);
        let cases = [
            (ServiceHeader::WIND, 1 + 6 + 3),
            (ServiceHeader::TEMPERATURE, 1 + 6 + 1),
            (ServiceHeader::WIND | ServiceHeader::TEMPERATURE, 1 + 6 + 4),
            (
                ServiceHeader::WIND | ServiceHeader::HUMIDITY | ServiceHeader::PRESSURE,
                1 + 6 + 3 + 1 + 2,
            ),
            (ServiceHeader::INTERNET_GATEWAY, 1),
            (
                ServiceHeader::EXTENDED_HEADER | ServiceHeader::WIND,
                1 + 1 + 6 + 3,
            ),
        ];
        for (header, expected) in cases {
            let payload =
                FanetPayload::service_payload(header, pos, 0, 0, 0, 0, 0, 0);
            assert_eq!(payload.len(), expected, "header {:#04x}", header.bits());
            assert_eq!(payload.len(), header.expected_len(), "header {:#04x}", header.bits());
        }
    }

    #[test]
    fn service_wind_scale_switch() {
        // 100 km/h does not fit the 0.5 km/h field; encoder switches to the
        // coarse scale and the decode is exact
        let payload = FanetPayload::service_payload(
            ServiceHeader::WIND,
            Position::new(46.0, 7.0),
            0,
            0,
            1000,
            1800,
            0,
            0,
        );
        assert_eq!(payload.data()[8], 0x80 | 40);
        assert_eq!(payload.data()[9], 0x80 | 72);
        let decoded = FanetPayload::from_received_data(PayloadType::Service, payload.data().to_vec());
        assert_eq!(decoded.wind_speed(), Some(1000));
        assert_eq!(decoded.wind_gusts(), Some(1800));
    }

    #[test]
    fn service_temperature_clamps() {
        let payload = FanetPayload::service_payload(
            ServiceHeader::TEMPERATURE,
            Position::new(46.0, 7.0),
            2000, // 200 degC, far past the field maximum
            0,
            0,
            0,
            0,
            0,
        );
        assert_eq!(payload.data()[7], 0x7F);
        let decoded = FanetPayload::from_received_data(PayloadType::Service, payload.data().to_vec());
        assert_eq!(decoded.temperature(), Some(635));
    }

    #[test]
    fn service_humidity_and_pressure_round_trip() {
        let payload = FanetPayload::service_payload(
            ServiceHeader::WIND | ServiceHeader::HUMIDITY | ServiceHeader::PRESSURE,
            Position::new(46.0, 7.0),
            0,
            180,
            120,
            160,
            655, // 65.5 %rh
            10132, // 1013.2 hPa
        );
        let decoded = FanetPayload::from_received_data(PayloadType::Service, payload.data().to_vec());
        assert_eq!(decoded.humidity(), Some(656)); // nearest 0.4 %rh step
        assert_eq!(decoded.pressure(), Some(10132));
    }

    #[test]
    fn service_extended_header_shifts_offsets() {
        let payload = FanetPayload::service_payload(
            ServiceHeader::EXTENDED_HEADER | ServiceHeader::WIND | ServiceHeader::TEMPERATURE,
            Position::new(46.5, 7.0),
            185,
            90,
            250,
            400,
            0,
            0,
        );
        let decoded = FanetPayload::from_received_data(PayloadType::Service, payload.data().to_vec());
        assert!(decoded.is_valid());
        assert_eq!(decoded.temperature(), Some(185));
        assert_eq!(decoded.wind_direction(), Some(90));
        assert_eq!(decoded.wind_speed(), Some(250));
    }

    #[test]
    fn service_undersized_is_invalid() {
        // header promises wind data but the bytes are missing
        let payload = FanetPayload::from_received_data(PayloadType::Service, vec![0x20, 0, 0]);
        assert!(!payload.is_valid());
        // header-only broadcast is fine
        let payload = FanetPayload::from_received_data(PayloadType::Service, vec![0x80]);
        assert!(payload.is_valid());
    }

    #[test]
    fn name_and_message_round_trip() {
        let name = FanetPayload::name_payload("Gurnigel Wind");
        assert_eq!(name.name().as_deref(), Some("Gurnigel Wind"));
        assert!(name.message().is_none());

        let msg = FanetPayload::message_payload("hello");
        assert_eq!(msg.data()[0], 0x00);
        assert_eq!(msg.message().as_deref(), Some("hello"));
    }

    #[test]
    fn latin1_replaces_unmappable_chars() {
        let payload = FanetPayload::name_payload("Grüsch \u{2603}");
        assert_eq!(payload.name().as_deref(), Some("Grüsch ?"));
    }

    #[test]
    fn ack_payload_round_trips() {
        let payload = FanetPayload::ack();
        assert!(payload.is_valid());
        assert!(payload.is_empty());
        let decoded =
            FanetPayload::from_received_data(payload.payload_type(), payload.data().to_vec());
        assert_eq!(decoded, payload);
    }

    #[test]
    fn hw_info_old_decodes_firmware_and_uptime() {
        // device 0x01, build 2022-1-13, uptime field 0x0F0 raw
        let payload = FanetPayload::from_received_data(
            PayloadType::HwInfoOld,
            vec![0x01, 0x2D, 0x06, 0xF0, 0x00],
        );
        assert!(payload.is_valid());
        let build = payload.firmware_build().unwrap();
        assert_eq!((build.year, build.month, build.day), (2022, 1, 13));
        assert!(!build.experimental);
        assert_eq!(build.to_string(), "2022-1-13");
        assert_eq!(payload.uptime_minutes(), Some(0xF0 >> 2));
        assert_eq!(payload.device_name(0x11), Some("Skytraxx 3.0"));
    }

    #[test]
    fn hw_info_old_without_uptime() {
        let payload =
            FanetPayload::from_received_data(PayloadType::HwInfoOld, vec![0x01, 0x2D, 0x06]);
        assert!(payload.is_valid());
        assert_eq!(payload.uptime_minutes(), None);
        assert!(!FanetPayload::from_received_data(PayloadType::HwInfoOld, vec![0x01]).is_valid());
    }

    #[test]
    fn hw_info_header_driven_layout() {
        // subtype + firmware build + uptime
        let payload = FanetPayload::from_received_data(
            PayloadType::HwInfo,
            vec![0x50, 0x01, 0x2D, 0x86, 0x3C, 0x00],
        );
        assert!(payload.is_valid());
        let build = payload.firmware_build().unwrap();
        assert_eq!((build.year, build.month, build.day), (2022, 1, 13));
        assert!(build.experimental);
        assert_eq!(payload.uptime_minutes(), Some(60));
        assert_eq!(payload.device_name(0x11), Some("Skytraxx 3.0"));
    }

    #[test]
    fn hw_info_pull_request_rejected() {
        assert!(!FanetPayload::from_received_data(PayloadType::HwInfo, vec![0x80]).is_valid());
    }

    #[test]
    fn hw_info_undersized_rejected() {
        // header promises subtype + firmware but only one byte follows
        assert!(!FanetPayload::from_received_data(PayloadType::HwInfo, vec![0x40, 0x01]).is_valid());
    }

    #[test]
    fn unsupported_types_are_invalid() {
        for t in [PayloadType::Landmarks, PayloadType::RemoteConfig] {
            assert!(!FanetPayload::from_received_data(t, vec![1, 2, 3]).is_valid());
        }
    }

    #[test]
    fn payload_type_from_u8() {
        assert_eq!(PayloadType::from_u8(0x04), PayloadType::Service);
        assert_eq!(PayloadType::from_u8(0x0A), PayloadType::HwInfo);
        assert_eq!(PayloadType::from_u8(0x42), PayloadType::Invalid);
    }

    #[test]
    fn payload_type_display() {
        assert_eq!(PayloadType::Service.to_string(), "Service");
        assert_eq!(PayloadType::HwInfoOld.to_string(), "HwInfo(deprecated)");
    }

    #[test]
    fn negative_coordinates_round_trip() {
        let payload = FanetPayload::service_payload(
            ServiceHeader::WIND,
            Position::new(-43.53, 172.63),
            0,
            0,
            0,
            0,
            0,
            0,
        );
        let decoded = FanetPayload::from_received_data(PayloadType::Service, payload.data().to_vec());
        let pos = decoded.position().unwrap();
        assert!((pos.latitude + 43.53).abs() < 0.0001);
        assert!((pos.longitude - 172.63).abs() < 0.0001);
    }
}
