use thiserror::Error;

use crate::frames::Opcode;

/// Fatal decoding errors. Once a read returns one of these the decoder is
/// unusable and the connection should be torn down.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame's MASK bit disagrees with the role the decoder was built for.
    #[error("mask bit mismatch: expected masked={expected}, got masked={got}")]
    MaskMismatch { expected: bool, got: bool },

    /// Declared payload length exceeds the configured ceiling.
    #[error("frame payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge { len: u64, max: u64 },

    /// A continuation frame arrived with no message in progress.
    #[error("continuation frame with no message in progress")]
    MissingMessageStart,

    /// A new data message started before the previous one finished.
    #[error("unexpected {opcode:?} frame inside a fragmented message")]
    UnexpectedMessageStart { opcode: Opcode },

    #[error("fragmented {opcode:?} control frame")]
    FragmentedControl { opcode: Opcode },

    /// A completed text message is not valid UTF-8.
    #[error("invalid UTF-8 in text message after {valid_up_to} bytes")]
    InvalidUtf8 { valid_up_to: usize },

    #[error("reserved header bits set: {bits:#05b}")]
    ReservedBits { bits: u8 },

    #[error("reserved opcode {opcode:#x}")]
    ReservedOpcode { opcode: u8 },

    #[error("{opcode:?} control frame payload of {len} bytes exceeds 125")]
    ControlTooLarge { opcode: Opcode, len: u64 },

    /// Reassembled message would exceed the configured message ceiling.
    #[error("message of {len} bytes exceeds maximum of {max}")]
    MessageTooLarge { len: u64, max: u64 },

    /// The decoder already failed and must not be used again.
    #[error("decoder already failed")]
    Failed,
}
