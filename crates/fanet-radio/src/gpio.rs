//! Boot and reset pin control for the radio module.
//!
//! On a Raspberry Pi the module's BOOT0 and reset lines hang off J8 header
//! pins; on anything with a USB-serial adapter they are usually wired to
//! the RTS/DTR modem-control lines instead. Config strings accept both:
//! `rts`, `dtr`, or `rpij8pinNN` (physical J8 pin number), with an
//! optional `!` prefix marking the line as active-low.

use tracing::debug;

use crate::driver::Transport;
use crate::error::RadioError;

const RPI_PIN_PREFIX: &str = "rpij8pin";

/// Which physical line drives a radio control pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioPin {
    /// UART request-to-send modem-control line.
    Rts,
    /// UART data-terminal-ready modem-control line.
    Dtr,
    /// Raspberry Pi J8 header pin, by physical pin number.
    RpiHeader(u8),
}

impl RadioPin {
    /// BCM GPIO number for a J8 header pin, for pins that are plain GPIOs.
    fn bcm(self) -> Option<u8> {
        let RadioPin::RpiHeader(pin) = self else {
            return None;
        };
        Some(match pin {
            3 => 2,
            5 => 3,
            7 => 4,
            8 => 14,
            10 => 15,
            11 => 17,
            12 => 18,
            13 => 27,
            15 => 22,
            16 => 23,
            18 => 24,
            19 => 10,
            21 => 9,
            22 => 25,
            23 => 11,
            24 => 8,
            26 => 7,
            29 => 5,
            31 => 6,
            32 => 12,
            33 => 13,
            35 => 19,
            36 => 16,
            37 => 26,
            38 => 20,
            40 => 21,
            _ => return None,
        })
    }
}

/// A control pin plus its polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    /// The line to drive.
    pub pin: RadioPin,
    /// `true` when the line is wired active-low.
    pub active_low: bool,
}

impl PinConfig {
    /// Parse the config syntax: optional `!` prefix, then `rts`, `dtr` or
    /// `rpij8pinNN`.
    pub fn parse(spec: &str) -> Result<Self, RadioError> {
        let trimmed = spec.trim().to_ascii_lowercase();
        let (active_low, name) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed.as_str()),
        };
        let pin = match name {
            "rts" => RadioPin::Rts,
            "dtr" => RadioPin::Dtr,
            _ => {
                let number = name
                    .strip_prefix(RPI_PIN_PREFIX)
                    .and_then(|n| n.parse::<u8>().ok())
                    .ok_or_else(|| RadioError::InvalidPin {
                        value: spec.to_string(),
                    })?;
                let pin = RadioPin::RpiHeader(number);
                if pin.bcm().is_none() {
                    return Err(RadioError::InvalidPin {
                        value: spec.to_string(),
                    });
                }
                pin
            }
        };
        Ok(Self { pin, active_low })
    }
}

enum PinDriver {
    Header(rppal::gpio::OutputPin),
    Rts,
    Dtr,
}

/// An opened control pin, ready to be driven.
///
/// Header pins are claimed from the GPIO controller when opened; RTS/DTR
/// are routed through the serial transport on each set.
pub(crate) struct ControlPin {
    driver: PinDriver,
    active_low: bool,
}

impl ControlPin {
    /// Claim the line described by `config`.
    pub(crate) fn open(config: &PinConfig) -> Result<Self, RadioError> {
        let driver = match config.pin {
            RadioPin::Rts => PinDriver::Rts,
            RadioPin::Dtr => PinDriver::Dtr,
            RadioPin::RpiHeader(_) => {
                let bcm = config.pin.bcm().expect("validated at parse time");
                let pin = rppal::gpio::Gpio::new()
                    .and_then(|gpio| gpio.get(bcm))
                    .map_err(|e| RadioError::Gpio(e.to_string()))?
                    .into_output();
                PinDriver::Header(pin)
            }
        };
        Ok(Self {
            driver,
            active_low: config.active_low,
        })
    }

    /// Drive the pin to the given logical value, honouring polarity.
    pub(crate) fn set<T: Transport>(
        &mut self,
        transport: &mut T,
        value: bool,
    ) -> Result<(), RadioError> {
        let level = value ^ self.active_low;
        debug!(?level, "setting control pin");
        match &mut self.driver {
            PinDriver::Header(pin) => {
                if level {
                    pin.set_high();
                } else {
                    pin.set_low();
                }
                Ok(())
            }
            PinDriver::Rts => transport.set_rts(level).map_err(RadioError::Io),
            PinDriver::Dtr => transport.set_dtr(level).map_err(RadioError::Io),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modem_control_lines() {
        let pin = PinConfig::parse("rts").unwrap();
        assert_eq!(pin.pin, RadioPin::Rts);
        assert!(!pin.active_low);

        let pin = PinConfig::parse("!dtr").unwrap();
        assert_eq!(pin.pin, RadioPin::Dtr);
        assert!(pin.active_low);
    }

    #[test]
    fn parse_header_pins() {
        let pin = PinConfig::parse("rpij8pin11").unwrap();
        assert_eq!(pin.pin, RadioPin::RpiHeader(11));
        let pin = PinConfig::parse("!RPIJ8PIN40").unwrap();
        assert_eq!(pin.pin, RadioPin::RpiHeader(40));
        assert!(pin.active_low);
    }

    #[test]
    fn parse_rejects_unknown_pins() {
        assert!(PinConfig::parse("gpio17").is_err());
        assert!(PinConfig::parse("rpij8pin").is_err());
        // J8 pin 1 is 3V3, not a GPIO
        assert!(PinConfig::parse("rpij8pin1").is_err());
        assert!(PinConfig::parse("").is_err());
    }

    #[test]
    fn header_pins_map_to_bcm_numbers() {
        assert_eq!(RadioPin::RpiHeader(11).bcm(), Some(17));
        assert_eq!(RadioPin::RpiHeader(40).bcm(), Some(21));
        assert_eq!(RadioPin::Rts.bcm(), None);
    }
}
