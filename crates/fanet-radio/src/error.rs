//! Error types for the radio driver.

use crate::driver::RadioState;

/// Faults raised while opening or driving the radio module.
///
/// Each error maps onto the [`RadioState`] the driver reports to its
/// observers via [`state`](Self::state); the dispatcher decides which of
/// those are recoverable.
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    /// The configured UART device does not exist.
    #[error("serial device not found: {path}")]
    DeviceNotFound {
        /// The configured device path.
        path: String,
    },

    /// The UART device exists but could not be opened.
    #[error("failed to open serial device {path}: {source}")]
    DeviceOpenFailed {
        /// The configured device path.
        path: String,
        /// The underlying serial error.
        source: tokio_serial::Error,
    },

    /// The module never announced itself after reset.
    #[error("timeout waiting for radio initialization")]
    InitTimeout,

    /// A command went unanswered in the steady state.
    #[error("communication with radio timed out")]
    ComTimeout,

    /// The module runs a firmware build this driver is not validated
    /// against.
    #[error("wrong radio firmware version \"{got}\" (expected \"{expected}\")")]
    WrongFirmware {
        /// The version string the module reported.
        got: String,
        /// The build this driver requires.
        expected: &'static str,
    },

    /// Reading from or writing to the UART failed.
    #[error("radio I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A pin specification string could not be parsed.
    #[error("invalid pin specification \"{value}\" (expected rts, dtr or rpij8pinNN)")]
    InvalidPin {
        /// The rejected specification.
        value: String,
    },

    /// GPIO controller access failed.
    #[error("gpio error: {0}")]
    Gpio(String),
}

impl RadioError {
    /// The radio state this fault puts the driver into.
    pub fn state(&self) -> RadioState {
        match self {
            Self::DeviceNotFound { .. } => RadioState::DevNotFound,
            Self::DeviceOpenFailed { .. } => RadioState::DevOpenFail,
            Self::InitTimeout => RadioState::InitTimeout,
            Self::ComTimeout => RadioState::ComTimeout,
            Self::WrongFirmware { .. } => RadioState::WrongFirmware,
            Self::Io(_) | Self::InvalidPin { .. } | Self::Gpio(_) => RadioState::Error,
        }
    }
}
