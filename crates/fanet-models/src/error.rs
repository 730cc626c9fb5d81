//! Error types for the `fanet-models` crate.
//!
//! Wire decoding is deliberately forgiving: malformed inbound frames and
//! payloads degrade to invalid values that callers drop after logging.
//! [`ModelError`] covers the *validated* construction paths (`FromStr` on
//! addresses, frequency selection) where the input comes from an operator
//! rather than the radio.

/// Errors produced when constructing model types from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// An address string did not match `MM,DDDD` / `MM:DDDD` hex form.
    #[error("invalid FANET address \"{value}\": {reason}")]
    InvalidAddress {
        /// The value that failed to parse.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// A frequency was not one of the supported FANET bands.
    #[error("unsupported frequency {value} MHz (expected 868 or 915)")]
    InvalidFrequency {
        /// The rejected frequency in MHz.
        value: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_address() {
        let err = ModelError::InvalidAddress {
            value: "xyz".into(),
            reason: "missing separator".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid FANET address \"xyz\": missing separator"
        );
    }

    #[test]
    fn error_display_frequency() {
        let err = ModelError::InvalidFrequency { value: 433 };
        assert_eq!(
            err.to_string(),
            "unsupported frequency 433 MHz (expected 868 or 915)"
        );
    }
}
