//! The radio module's ASCII message set.
//!
//! Every frame exchanged with the module is one of a small set of typed
//! messages: commands we send (`DGV`, `DGL`, `DGP`, `FNT`), replies it
//! sends back (`DGV`, `DGR`, `FNR`), and unsolicited receive events
//! (`FNF`). [`FanetMessage`] is the sum of all of them, with per-variant
//! encode/decode and a shared classification into command / reply / event.

use std::fmt;

use tracing::warn;

use crate::address::FanetAddress;
use crate::error::ModelError;
use crate::payload::{FanetPayload, PayloadType};

/// Every frame body starts with a three-byte tag.
pub(crate) const TAG_LEN: usize = 3;

const CMD_VERSION: &str = "DGV";
const CMD_REGION: &str = "DGL";
const CMD_ENABLE: &str = "DGP";
const CMD_TRANSMIT: &str = "FNT";
const TAG_VERSION_REPLY: &[u8] = b"DGV";
const TAG_REGION_REPLY: &[u8] = b"DGR";
const TAG_FANET_REPLY: &[u8] = b"FNR";
const TAG_RECEIVE_EVENT: &[u8] = b"FNF";

const VERSION_PREFIX: &str = "build-";

const TXPOWER_MIN: i32 = 2; // dBm
const TXPOWER_MAX: i32 = 20;

// ---------------------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------------------

/// FANET radio band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// 868 MHz (EU).
    Mhz868,
    /// 915 MHz (US/AU).
    Mhz915,
}

impl Frequency {
    /// The band in MHz.
    pub fn mhz(self) -> u32 {
        match self {
            Self::Mhz868 => 868,
            Self::Mhz915 => 915,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mhz())
    }
}

impl TryFrom<u32> for Frequency {
    type Error = ModelError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            868 => Ok(Self::Mhz868),
            915 => Ok(Self::Mhz915),
            other => Err(ModelError::InvalidFrequency { value: other }),
        }
    }
}

// ---------------------------------------------------------------------------
// GenericReply
// ---------------------------------------------------------------------------

/// Classification of a module reply's first field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// `OK` — command accepted.
    Ok,
    /// `MSG` — informational message with code and text.
    Msg,
    /// `ERR` — command failed.
    Error,
    /// `ACK` — transmission acknowledged by the destination.
    Ack,
    /// `NACK` — transmission not acknowledged.
    Nack,
    /// Anything else; the reply is invalid.
    Other,
}

/// A comma-separated module reply: kind, optional numeric code, optional
/// human-readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericReply {
    kind: ReplyKind,
    code: Option<i32>,
    text: Option<String>,
    raw: String,
}

impl GenericReply {
    /// Parse a reply body (the bytes after the three-byte tag).
    pub fn parse(body: &[u8]) -> Self {
        let raw = String::from_utf8_lossy(body).trim().to_string();
        let fields: Vec<&str> = raw.split(',').filter(|f| !f.is_empty()).collect();
        let kind = match fields.first().map(|f| f.trim()) {
            Some("OK") => ReplyKind::Ok,
            Some("MSG") => ReplyKind::Msg,
            Some("ERR") => ReplyKind::Error,
            Some("ACK") => ReplyKind::Ack,
            Some("NACK") => ReplyKind::Nack,
            other => {
                warn!(field = ?other, "failed to parse reply: unknown kind");
                ReplyKind::Other
            }
        };
        let (code, text) = if fields.len() > 2 {
            (
                fields[1].trim().parse().ok(),
                Some(fields[2].trim().to_string()),
            )
        } else {
            (None, None)
        };
        Self {
            kind,
            code,
            text,
            raw,
        }
    }

    /// The reply classification.
    pub fn kind(&self) -> ReplyKind {
        self.kind
    }

    /// The numeric code, when the reply carried one.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// The human-readable text, when the reply carried one.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The reply body as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `true` unless the kind was unrecognised.
    pub fn is_valid(&self) -> bool {
        self.kind != ReplyKind::Other
    }
}

// ---------------------------------------------------------------------------
// TransmitReply
// ---------------------------------------------------------------------------

/// An `FNR` reply; `ACK`/`NACK` variants additionally carry the peer
/// address the acknowledgement refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitReply {
    reply: GenericReply,
    address: Option<FanetAddress>,
}

impl TransmitReply {
    /// Parse an `FNR` reply body.
    pub fn parse(body: &[u8]) -> Self {
        let reply = GenericReply::parse(body);
        let address = match reply.kind() {
            ReplyKind::Ack | ReplyKind::Nack => {
                let raw = reply.raw();
                raw.split_once(',')
                    .map(|(_, rest)| FanetAddress::parse(rest.as_bytes()))
            }
            _ => None,
        };
        Self { reply, address }
    }

    /// The underlying generic reply.
    pub fn reply(&self) -> &GenericReply {
        &self.reply
    }

    /// The acknowledged peer address (`ACK`/`NACK` only).
    pub fn address(&self) -> Option<FanetAddress> {
        self.address
    }

    /// `ACK`/`NACK` replies additionally require a parsable address.
    pub fn is_valid(&self) -> bool {
        match self.reply.kind() {
            ReplyKind::Ack | ReplyKind::Nack => {
                self.address.is_some_and(|a| a.is_valid()) && self.reply.is_valid()
            }
            _ => self.reply.is_valid(),
        }
    }
}

// ---------------------------------------------------------------------------
// VersionReply
// ---------------------------------------------------------------------------

/// A `DGV` reply carrying the firmware build identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReply {
    raw: String,
}

impl VersionReply {
    /// Parse a `DGV` reply body.
    pub fn parse(body: &[u8]) -> Self {
        Self {
            raw: String::from_utf8_lossy(body).trim().to_string(),
        }
    }

    /// The build identifier with the `build-` prefix removed, when present.
    pub fn version(&self) -> Option<&str> {
        self.raw.strip_prefix(VERSION_PREFIX)
    }

    /// `true` when the body carries a `build-` identifier.
    pub fn is_valid(&self) -> bool {
        self.raw.starts_with(VERSION_PREFIX)
    }
}

// ---------------------------------------------------------------------------
// ReceiveEvent
// ---------------------------------------------------------------------------

/// An `FNF` event: a packet received over the air.
///
/// Body form: `mfr,dev,broadcast,signature,type,length,payload` with the
/// address halves, type and payload in hex.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveEvent {
    address: FanetAddress,
    payload: FanetPayload,
    broadcast: bool,
    signature: String,
}

impl ReceiveEvent {
    /// Parse an `FNF` event body. Malformed events come back with an
    /// invalid address or payload; check [`is_valid`](Self::is_valid).
    pub fn parse(body: &[u8]) -> Self {
        let mut event = Self {
            address: FanetAddress::INVALID,
            payload: FanetPayload::default(),
            broadcast: false,
            signature: String::new(),
        };

        let text = String::from_utf8_lossy(body);
        let fields: Vec<&str> = text
            .trim()
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        if fields.len() < 7 {
            warn!(body = %text.trim(), "failed to parse receive event: too short");
            return event;
        }

        event.address = FanetAddress::parse(format!("{},{}", fields[0], fields[1]).as_bytes());
        event.broadcast = fields[2] == "1";
        event.signature = fields[3].to_string();

        let Ok(type_raw) = u8::from_str_radix(fields[4], 16) else {
            warn!(field = fields[4], "failed to parse receive event payload type");
            return event;
        };
        // fields[5] is the payload length; the hex blob in fields[6] is
        // authoritative
        let Some(data) = decode_hex(fields[6]) else {
            warn!(field = fields[6], "failed to parse receive event payload hex");
            return event;
        };
        event.payload = FanetPayload::from_received_data(PayloadType::from_u8(type_raw), data);
        event
    }

    /// The sender's address.
    pub fn address(&self) -> FanetAddress {
        self.address
    }

    /// The decoded payload.
    pub fn payload(&self) -> &FanetPayload {
        &self.payload
    }

    /// Whether the packet was addressed to everyone.
    pub fn broadcast(&self) -> bool {
        self.broadcast
    }

    /// The signature field as received (opaque).
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Valid iff the address parsed and the payload passed its type's
    /// length checks.
    pub fn is_valid(&self) -> bool {
        self.address.is_valid() && self.payload.is_valid()
    }

    /// One-line human summary of the received packet, per payload type.
    pub fn describe(&self) -> Option<String> {
        if !self.is_valid() {
            return None;
        }
        let addr = self.address.to_hex(':');
        let p = &self.payload;
        match p.payload_type() {
            PayloadType::Name => Some(format!("{addr} -> name: {}", p.name()?)),
            PayloadType::Message => Some(format!("{addr} -> message: {}", p.message()?)),
            PayloadType::Tracking => Some(format!(
                "{addr} -> pos: {}, altitude: {}m, speed: {}km/h, climb: {}m/s, heading: {}deg., aircraft: {}",
                p.position()?,
                p.altitude()?,
                f64::from(p.speed()?) / 10.0,
                f64::from(p.climb()?) / 10.0,
                p.heading()?,
                p.aircraft_type()?,
            )),
            PayloadType::Thermal => Some(format!(
                "{addr} -> thermal @ pos: {}, quality: {}%, altitude: {}m, avg. climb: {}m/s, avg. wind speed: {}km/h, avg. wind heading: {}deg.",
                p.position()?,
                p.quality()?,
                p.altitude()?,
                f64::from(p.climb()?) / 10.0,
                f64::from(p.speed()?) / 10.0,
                p.heading()?,
            )),
            PayloadType::GroundTracking => Some(format!(
                "{addr} -> pos: {}, type: {}",
                p.position()?,
                p.ground_tracking_type()?,
            )),
            PayloadType::HwInfo | PayloadType::HwInfoOld => Some(format!(
                "{addr} -> device: {}, firmware: {}, uptime: {}min.",
                p.device_name(self.address.manufacturer())?,
                p.firmware_build().map(|b| b.to_string()).unwrap_or_default(),
                p.uptime_minutes().unwrap_or(-1),
            )),
            PayloadType::Service => Some(format!(
                "{addr} -> pos: {}, temperature: {} C, direction: {} deg., speed: {} km/h, gusts: {} km/h",
                p.position()?,
                p.temperature().unwrap_or(-2740) / 10,
                p.wind_direction().unwrap_or(-1),
                p.wind_speed().unwrap_or(-1) / 10,
                p.wind_gusts().unwrap_or(-1) / 10,
            )),
            _ => None,
        }
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A `DGL` command selecting the band and transmit power.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionCommand {
    tx_power: i32,
    frequency: Frequency,
}

impl RegionCommand {
    /// Create a region command; the power is clamped into the module's
    /// 2–20 dBm range with a warning.
    pub fn new(tx_power: i32, frequency: Frequency) -> Self {
        let clamped = tx_power.clamp(TXPOWER_MIN, TXPOWER_MAX);
        if clamped != tx_power {
            warn!(
                requested = tx_power,
                used = clamped,
                "tx power out of range, clamping"
            );
        }
        Self {
            tx_power: clamped,
            frequency,
        }
    }

    /// Transmit power in dBm (always within 2–20).
    pub fn tx_power(&self) -> i32 {
        self.tx_power
    }

    /// The selected band.
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    fn serialize(&self) -> String {
        format!("{CMD_REGION} {},{}", self.frequency, self.tx_power)
    }
}

/// An `FNT` command: transmit a payload to an address.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmitCommand {
    address: FanetAddress,
    payload: FanetPayload,
}

impl TransmitCommand {
    /// Create a transmit command.
    pub fn new(address: FanetAddress, payload: FanetPayload) -> Self {
        Self { address, payload }
    }

    /// The destination address.
    pub fn address(&self) -> FanetAddress {
        self.address
    }

    /// The payload to send.
    pub fn payload(&self) -> &FanetPayload {
        &self.payload
    }

    /// Wire form:
    /// `FNT type,mfr,dev,forward,req_ack,length,payload` — forwarding and
    /// acknowledgement are requested for unicast destinations only.
    fn serialize(&self) -> Option<String> {
        if !self.payload.is_valid() {
            return None;
        }
        let unicast = if self.address.is_broadcast() { "0" } else { "1" };
        let hex: String = self
            .payload
            .data()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        Some(format!(
            "{CMD_TRANSMIT} {:x},{},{},{},{:x},{}",
            self.payload.payload_type() as u8,
            self.address.to_hex(','),
            unicast,
            unicast,
            self.payload.len(),
            hex,
        ))
    }
}

// ---------------------------------------------------------------------------
// FanetMessage
// ---------------------------------------------------------------------------

/// The sum of everything that travels over the module's serial link.
#[derive(Debug, Clone, PartialEq)]
pub enum FanetMessage {
    /// `DGV` — query the firmware version.
    VersionCommand,
    /// `DGL` — configure band and transmit power.
    RegionCommand(RegionCommand),
    /// `DGP` — enable/disable the receive path.
    EnableCommand(bool),
    /// `FNT` — transmit a payload.
    TransmitCommand(TransmitCommand),
    /// `DGV` reply with the firmware build.
    VersionReply(VersionReply),
    /// `DGR` reply to a region command.
    RegionReply(GenericReply),
    /// `FNR` reply to a transmit command (or an unsolicited module
    /// message).
    TransmitReply(TransmitReply),
    /// `FNF` — a packet received over the air.
    ReceiveEvent(ReceiveEvent),
}

impl FanetMessage {
    /// Decode a frame body (the bytes between `#` and `\n`) into a typed
    /// message. Unknown tags are logged and dropped.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() <= TAG_LEN {
            return None;
        }
        let buf = data.trim_ascii();
        if buf.starts_with(TAG_RECEIVE_EVENT) {
            return Some(Self::ReceiveEvent(ReceiveEvent::parse(&buf[TAG_LEN..])));
        }
        if buf.starts_with(TAG_FANET_REPLY) {
            return Some(Self::TransmitReply(TransmitReply::parse(&buf[TAG_LEN..])));
        }
        if buf.starts_with(TAG_VERSION_REPLY) {
            return Some(Self::VersionReply(VersionReply::parse(&buf[TAG_LEN..])));
        }
        if buf.starts_with(TAG_REGION_REPLY) {
            return Some(Self::RegionReply(GenericReply::parse(&buf[TAG_LEN..])));
        }
        warn!(
            frame = %String::from_utf8_lossy(buf),
            "ignoring message with unknown tag"
        );
        None
    }

    /// `true` for messages we send to the module.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Self::VersionCommand
                | Self::RegionCommand(_)
                | Self::EnableCommand(_)
                | Self::TransmitCommand(_)
        )
    }

    /// `true` for solicited module replies.
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            Self::VersionReply(_) | Self::RegionReply(_) | Self::TransmitReply(_)
        )
    }

    /// `true` for unsolicited events.
    pub fn is_event(&self) -> bool {
        matches!(self, Self::ReceiveEvent(_))
    }

    /// Per-variant validity.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::VersionCommand | Self::RegionCommand(_) | Self::EnableCommand(_) => true,
            Self::TransmitCommand(cmd) => cmd.payload().is_valid(),
            Self::VersionReply(reply) => reply.is_valid(),
            Self::RegionReply(reply) => reply.is_valid(),
            Self::TransmitReply(reply) => reply.is_valid(),
            Self::ReceiveEvent(event) => event.is_valid(),
        }
    }

    /// Encode a command into its frame body (without delimiters).
    /// Replies and events are inbound-only and return `None`.
    pub fn serialize(&self) -> Option<String> {
        match self {
            Self::VersionCommand => Some(CMD_VERSION.to_string()),
            Self::RegionCommand(cmd) => Some(cmd.serialize()),
            Self::EnableCommand(enable) => {
                Some(format!("{CMD_ENABLE} {}", if *enable { '1' } else { '0' }))
            }
            Self::TransmitCommand(cmd) => cmd.serialize(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Position, ServiceHeader};

    #[test]
    fn version_reply_strips_prefix() {
        let reply = VersionReply::parse(b" build-202201131742\r");
        assert!(reply.is_valid());
        assert_eq!(reply.version(), Some("202201131742"));
    }

    #[test]
    fn version_reply_rejects_other_bodies() {
        assert!(!VersionReply::parse(b"").is_valid());
        assert!(!VersionReply::parse(b"v1.2.3").is_valid());
    }

    #[test]
    fn generic_reply_ok() {
        let reply = GenericReply::parse(b" OK");
        assert_eq!(reply.kind(), ReplyKind::Ok);
        assert_eq!(reply.code(), None);
        assert!(reply.is_valid());
    }

    #[test]
    fn generic_reply_msg_with_code_and_text() {
        let reply = GenericReply::parse(b" MSG,1,initialized");
        assert_eq!(reply.kind(), ReplyKind::Msg);
        assert_eq!(reply.code(), Some(1));
        assert_eq!(reply.text(), Some("initialized"));
    }

    #[test]
    fn generic_reply_error() {
        let reply = GenericReply::parse(b" ERR,4,tx busy");
        assert_eq!(reply.kind(), ReplyKind::Error);
        assert_eq!(reply.code(), Some(4));
        assert_eq!(reply.text(), Some("tx busy"));
    }

    #[test]
    fn generic_reply_unknown_kind_is_invalid() {
        let reply = GenericReply::parse(b" WAT,1,2");
        assert_eq!(reply.kind(), ReplyKind::Other);
        assert!(!reply.is_valid());
    }

    #[test]
    fn transmit_reply_ack_carries_address() {
        let reply = TransmitReply::parse(b" ACK,11,45AA");
        assert_eq!(reply.reply().kind(), ReplyKind::Ack);
        assert_eq!(reply.address(), Some(FanetAddress::new(0x11, 0x45AA)));
        assert!(reply.is_valid());
    }

    #[test]
    fn transmit_reply_nack_without_address_is_invalid() {
        let reply = TransmitReply::parse(b" NACK");
        assert_eq!(reply.reply().kind(), ReplyKind::Nack);
        assert!(!reply.is_valid());
    }

    #[test]
    fn transmit_reply_plain_ok() {
        let reply = TransmitReply::parse(b" OK");
        assert!(reply.is_valid());
        assert_eq!(reply.address(), None);
    }

    #[test]
    fn receive_event_hw_info() {
        let event = ReceiveEvent::parse(b" 11,5C0B,1,0,A,6,5006FC0A0400");
        assert!(event.is_valid());
        assert_eq!(event.address(), FanetAddress::new(0x11, 0x5C0B));
        assert!(event.broadcast());
        assert_eq!(event.payload().payload_type(), PayloadType::HwInfo);
        let line = event.describe().unwrap();
        assert!(line.starts_with("11:5c0b -> device: Skytraxx 5mini"), "{line}");
    }

    #[test]
    fn receive_event_tracking() {
        let event = ReceiveEvent::parse(b" 11,45AA,0,0,1,B,727542ACF004009900000028");
        assert!(event.is_valid());
        assert!(!event.broadcast());
        assert_eq!(event.payload().payload_type(), PayloadType::Tracking);
        assert_eq!(event.payload().altitude(), Some(1024));
        let line = event.describe().unwrap();
        assert!(line.contains("altitude: 1024m"), "{line}");
        assert!(line.contains("aircraft: Paraglider"), "{line}");
    }

    #[test]
    fn receive_event_too_short_is_invalid() {
        assert!(!ReceiveEvent::parse(b" 11,45AA,1,0").is_valid());
    }

    #[test]
    fn receive_event_bad_hex_is_invalid() {
        assert!(!ReceiveEvent::parse(b" 11,45AA,1,0,1,B,zz7542").is_valid());
        assert!(!ReceiveEvent::parse(b" 11,45AA,1,0,zz,B,727542ACF004009900000028").is_valid());
    }

    #[test]
    fn receive_event_unknown_payload_type_is_invalid() {
        let event = ReceiveEvent::parse(b" 11,45AA,1,0,42,1,00");
        assert!(!event.is_valid());
        assert_eq!(event.payload().payload_type(), PayloadType::Invalid);
    }

    #[test]
    fn region_command_serializes_frequency_then_power() {
        let msg = FanetMessage::RegionCommand(RegionCommand::new(14, Frequency::Mhz868));
        assert_eq!(msg.serialize().as_deref(), Some("DGL 868,14"));
        let msg = FanetMessage::RegionCommand(RegionCommand::new(10, Frequency::Mhz915));
        assert_eq!(msg.serialize().as_deref(), Some("DGL 915,10"));
    }

    #[test]
    fn region_command_clamps_tx_power() {
        assert_eq!(RegionCommand::new(0, Frequency::Mhz868).tx_power(), 2);
        assert_eq!(RegionCommand::new(30, Frequency::Mhz868).tx_power(), 20);
        assert_eq!(RegionCommand::new(14, Frequency::Mhz868).tx_power(), 14);
    }

    #[test]
    fn version_and_enable_commands_serialize() {
        assert_eq!(FanetMessage::VersionCommand.serialize().as_deref(), Some("DGV"));
        assert_eq!(
            FanetMessage::EnableCommand(true).serialize().as_deref(),
            Some("DGP 1")
        );
        assert_eq!(
            FanetMessage::EnableCommand(false).serialize().as_deref(),
            Some("DGP 0")
        );
    }

    #[test]
    fn transmit_command_broadcast_wire_form() {
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
        let cmd = TransmitCommand::new(FanetAddress::BROADCAST, payload);
        let wire = FanetMessage::TransmitCommand(cmd).serialize().unwrap();
        assert_eq!(
            wire,
            "FNT 4,00,0000,0,0,b,60ff21424dfa0425403250"
        );
    }

    #[test]
    fn transmit_command_unicast_requests_forward_and_ack() {
        let cmd = TransmitCommand::new(
            FanetAddress::new(0x11, 0x1234),
            FanetPayload::message_payload("hi"),
        );
        let wire = FanetMessage::TransmitCommand(cmd).serialize().unwrap();
        assert_eq!(wire, "FNT 3,11,1234,1,1,3,006869");
    }

    #[test]
    fn transmit_command_invalid_payload_does_not_serialize() {
        let cmd = TransmitCommand::new(FanetAddress::BROADCAST, FanetPayload::default());
        assert!(FanetMessage::TransmitCommand(cmd).serialize().is_none());
    }

    #[test]
    fn frame_dispatch_by_tag() {
        assert!(matches!(
            FanetMessage::parse(b"DGV build-202201131742"),
            Some(FanetMessage::VersionReply(_))
        ));
        assert!(matches!(
            FanetMessage::parse(b"DGR OK"),
            Some(FanetMessage::RegionReply(_))
        ));
        assert!(matches!(
            FanetMessage::parse(b"FNR MSG,1,initialized"),
            Some(FanetMessage::TransmitReply(_))
        ));
        assert!(matches!(
            FanetMessage::parse(b"FNF 11,45AA,1,0,2,4,74657374"),
            Some(FanetMessage::ReceiveEvent(_))
        ));
    }

    #[test]
    fn frame_dispatch_drops_unknown_tags() {
        assert!(FanetMessage::parse(b"XYZ hello").is_none());
        assert!(FanetMessage::parse(b"DG").is_none());
        assert!(FanetMessage::parse(b"").is_none());
    }

    #[test]
    fn message_classification() {
        assert!(FanetMessage::VersionCommand.is_command());
        assert!(!FanetMessage::VersionCommand.is_reply());
        let reply = FanetMessage::parse(b"FNR OK").unwrap();
        assert!(reply.is_reply());
        assert!(!reply.is_command());
        let event = FanetMessage::parse(b"FNF 11,45AA,1,0,2,4,74657374").unwrap();
        assert!(event.is_event());
        assert!(event.is_valid());
    }

    #[test]
    fn initialized_notice_parses_as_msg_code_1() {
        let Some(FanetMessage::TransmitReply(reply)) =
            FanetMessage::parse(b"FNR MSG,1,initialized")
        else {
            panic!("expected transmit reply");
        };
        assert_eq!(reply.reply().kind(), ReplyKind::Msg);
        assert_eq!(reply.reply().code(), Some(1));
    }
}
