#![deny(missing_docs)]

//! # FANET Models
//!
//! Core data types for the FANET weather bridge: mesh addresses, the binary
//! payload codec, the module's ASCII message set, and the `#`…`\n` frame
//! parser. This crate is pure data: it performs no I/O and owns no
//! timers; the serial driver lives in `fanet-radio`.
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`address`] | 24-bit mesh addressing (`FanetAddress`, manufacturer table) |
//! | [`payload`] | Typed binary payloads (`FanetPayload`, fixed-point codecs) |
//! | [`message`] | Commands, replies and receive events (`FanetMessage`) |
//! | [`frame`] | Byte-stream framing and message dispatch (`FrameParser`) |

pub mod address;
pub mod error;
pub mod frame;
pub mod message;
pub mod payload;

pub use address::FanetAddress;
pub use error::ModelError;
pub use frame::FrameParser;
pub use message::{
    FanetMessage, Frequency, GenericReply, ReceiveEvent, RegionCommand, ReplyKind,
    TransmitCommand, TransmitReply, VersionReply,
};
pub use payload::{
    AircraftType, FanetPayload, GroundTrackingType, PayloadType, Position, ServiceHeader,
};
