#![deny(missing_docs)]

//! # FANET Radio
//!
//! Async driver for the FANET radio module: opens the UART, walks the
//! module through reset / firmware check / region setup / receive enable,
//! then relays transmit commands and received packets. The driver runs as
//! a single task; the rest of the process talks to it through a
//! [`RadioHandle`] and a packet channel.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`driver`] | The state machine (`FanetRadio`), handle and config types |
//! | [`gpio`] | Boot/reset pin control (RPi header pins or UART RTS/DTR) |

pub mod driver;
pub mod error;
pub mod gpio;

pub use driver::{
    open_serial, FanetRadio, RadioCommand, RadioConfig, RadioHandle, RadioState, ReceivedPacket,
    Transport, EXPECTED_FIRMWARE,
};
pub use error::RadioError;
pub use gpio::{PinConfig, RadioPin};
