//! FANET mesh addressing.
//!
//! A node is identified by a 24-bit address: an 8-bit manufacturer ID and a
//! 16-bit device ID. The module's wire protocol carries addresses as
//! comma- or colon-separated hex (`"11,45AA"`); internally they also pack
//! into a `u32` with the manufacturer in bits 16–23.

use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

const MANUFACTURER_ID_INVALID: u8 = 0xFF;
const DEVICE_ID_INVALID: u16 = 0xFFFF;

/// A FANET node address (manufacturer ID + device ID).
///
/// The default value is the broadcast address `(0, 0)`. The sentinel
/// `(0xFF, 0xFFFF)` marks an unparsable/invalid address; check
/// [`is_valid`](Self::is_valid) after [`parse`](Self::parse).
///
/// # Examples
///
/// ```
/// use fanet_models::FanetAddress;
///
/// let addr = FanetAddress::parse(b"11:45AA");
/// assert_eq!(addr, FanetAddress::new(0x11, 0x45AA));
/// assert_eq!(addr.to_u32(), 0x0011_45AA);
/// assert_eq!(addr.to_hex(':'), "11:45aa");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FanetAddress {
    manufacturer: u8,
    device: u16,
}

impl FanetAddress {
    /// The broadcast address `(0, 0)`.
    pub const BROADCAST: Self = Self {
        manufacturer: 0,
        device: 0,
    };

    /// The invalid sentinel `(0xFF, 0xFFFF)`.
    pub const INVALID: Self = Self {
        manufacturer: MANUFACTURER_ID_INVALID,
        device: DEVICE_ID_INVALID,
    };

    /// Create an address from its two halves.
    pub fn new(manufacturer: u8, device: u16) -> Self {
        Self {
            manufacturer,
            device,
        }
    }

    /// Parse the wire form: 1–2 hex digits, a `,` or `:` separator, then up
    /// to 4 hex digits (e.g. `"11,45AA"`, `"B:32E"`).
    ///
    /// Returns [`INVALID`](Self::INVALID) when the input does not parse;
    /// the failure is logged at warn level.
    pub fn parse(data: &[u8]) -> Self {
        match Self::try_parse(data) {
            Some(addr) => addr,
            None => {
                tracing::warn!(
                    data = %String::from_utf8_lossy(data),
                    "failed to parse address"
                );
                Self::INVALID
            }
        }
    }

    fn try_parse(data: &[u8]) -> Option<Self> {
        let sep = data.iter().position(|&b| b == b',' || b == b':')?;
        if sep == 0 || sep > 2 || sep + 1 >= data.len() {
            return None;
        }
        let manufacturer = std::str::from_utf8(&data[..sep]).ok()?;
        let device = std::str::from_utf8(&data[sep + 1..]).ok()?.trim();
        if device.is_empty() || device.len() > 4 {
            return None;
        }
        Some(Self {
            manufacturer: u8::from_str_radix(manufacturer, 16).ok()?,
            device: u16::from_str_radix(device, 16).ok()?,
        })
    }

    /// Unpack from the 32-bit form (manufacturer in bits 16–23, device in
    /// bits 0–15).
    pub fn from_u32(addr: u32) -> Self {
        Self {
            manufacturer: ((addr >> 16) & 0xFF) as u8,
            device: (addr & 0xFFFF) as u16,
        }
    }

    /// Pack into the 32-bit form.
    pub fn to_u32(self) -> u32 {
        (u32::from(self.manufacturer) << 16) | u32::from(self.device)
    }

    /// The manufacturer half of the address.
    pub fn manufacturer(self) -> u8 {
        self.manufacturer
    }

    /// The device half of the address.
    pub fn device(self) -> u16 {
        self.device
    }

    /// `true` unless this is the `(0xFF, 0xFFFF)` sentinel.
    pub fn is_valid(self) -> bool {
        self.manufacturer != MANUFACTURER_ID_INVALID && self.device != DEVICE_ID_INVALID
    }

    /// `true` for the broadcast address `(0, 0)`.
    pub fn is_broadcast(self) -> bool {
        self.manufacturer == 0 && self.device == 0
    }

    /// Canonical textual form: zero-padded lowercase hex with the given
    /// separator, e.g. `to_hex(':')` → `"11:45aa"`.
    pub fn to_hex(self, separator: char) -> String {
        format!("{:02x}{}{:04x}", self.manufacturer, separator, self.device)
    }

    /// Registered manufacturer name for this address, per the FANET
    /// protocol's ID assignments.
    pub fn manufacturer_name(self) -> &'static str {
        match self.manufacturer {
            0x00 | 0xFF => "reserved/broadcast",
            0x01 => "Skytraxx",
            0x03 => "BitBroker.eu",
            0x04 => "AirWhere",
            0x05 => "Windline",
            0x06 => "Burnair.ch",
            0x07 => "SoftRF",
            0x08 => "GXAircom",
            0x09 => "Airtribune",
            0x0A => "FLARM",
            0x0B => "FlyBeeper",
            0x10 => "alfapilot",
            0x11 => "FANET+",
            0x20 => "XC Tracer",
            0xCB => "Cloudbuddy",
            0xDD..=0xDF | 0xF0 => "reserved (compat.)",
            0xE0 => "OGN Tracker",
            0xE4 => "4aviation",
            0xFA => "Various",
            0xFB => "Espressif based stations",
            0xFC | 0xFD => "Unregistered devices",
            0xFE => "reserved/multicast",
            _ => "Invalid/Unknown",
        }
    }
}

impl Default for FanetAddress {
    fn default() -> Self {
        Self::BROADCAST
    }
}

impl fmt::Display for FanetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex(':'))
    }
}

impl FromStr for FanetAddress {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::try_parse(s.as_bytes()) {
            Some(addr) => Ok(addr),
            None => Err(ModelError::InvalidAddress {
                value: s.to_string(),
                reason: "expected 1-2 hex digits, ',' or ':', then up to 4 hex digits".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_colon_separated() {
        let addr = FanetAddress::parse(b"11:45AA");
        assert_eq!(addr.manufacturer(), 0x11);
        assert_eq!(addr.device(), 0x45AA);
        assert_eq!(addr.to_u32(), 0x0011_45AA);
        assert_eq!(addr.to_hex(':'), "11:45aa");
    }

    #[test]
    fn parse_short_form() {
        let addr = FanetAddress::parse(b"B,32E");
        assert_eq!(addr, FanetAddress::new(0x0B, 0x032E));
        assert_eq!(addr.to_hex(','), "0b,032e");
    }

    #[test]
    fn parse_failure_yields_invalid_sentinel() {
        assert!(!FanetAddress::parse(b"").is_valid());
        assert!(!FanetAddress::parse(b"1145AA").is_valid());
        assert!(!FanetAddress::parse(b"123,45AA").is_valid());
        assert!(!FanetAddress::parse(b"11,").is_valid());
        assert!(!FanetAddress::parse(b"11,45AAB0").is_valid());
        assert!(!FanetAddress::parse(b"zz,45AA").is_valid());
    }

    #[test]
    fn format_parse_round_trip() {
        for addr in [
            FanetAddress::new(0x11, 0x45AA),
            FanetAddress::new(0x01, 0x0001),
            FanetAddress::new(0xFE, 0x0000),
            FanetAddress::BROADCAST,
        ] {
            assert_eq!(FanetAddress::parse(addr.to_hex(',').as_bytes()), addr);
            assert_eq!(FanetAddress::parse(addr.to_hex(':').as_bytes()), addr);
        }
    }

    #[test]
    fn u32_round_trip() {
        for addr in [
            FanetAddress::new(0x11, 0x45AA),
            FanetAddress::new(0xFB, 0x0001),
            FanetAddress::BROADCAST,
            FanetAddress::INVALID,
        ] {
            assert_eq!(FanetAddress::from_u32(addr.to_u32()), addr);
        }
    }

    #[test]
    fn broadcast_is_default() {
        assert_eq!(FanetAddress::default(), FanetAddress::BROADCAST);
        assert!(FanetAddress::default().is_broadcast());
        assert!(FanetAddress::default().is_valid());
        assert!(!FanetAddress::INVALID.is_broadcast());
    }

    #[test]
    fn from_str_rejects_garbage() {
        assert!("11:45AA".parse::<FanetAddress>().is_ok());
        assert!("helloworld".parse::<FanetAddress>().is_err());
    }

    #[test]
    fn manufacturer_names() {
        assert_eq!(FanetAddress::new(0x11, 1).manufacturer_name(), "FANET+");
        assert_eq!(FanetAddress::new(0x07, 1).manufacturer_name(), "SoftRF");
        assert_eq!(
            FanetAddress::new(0x42, 1).manufacturer_name(),
            "Invalid/Unknown"
        );
    }
}
