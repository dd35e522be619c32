#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::empty_docs,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

mod decoder;
mod error;
pub mod facilitator;
mod frames;
mod protocol;
mod role;

pub use decoder::{DecoderConfig, WebSocketDecoder};
pub use error::DecodeError;
pub use frames::{Frame, Opcode};
pub use protocol::Message;
pub use role::Role;

/// Default ceiling on the payload length a single frame may declare.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 1024 * 1024;
/// Default ceiling on the total payload of a reassembled message.
pub const DEFAULT_MAX_MESSAGE_SIZE: u64 = 64 * 1024 * 1024;
