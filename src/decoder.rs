use std::mem;

use crate::{
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_PAYLOAD_SIZE,
    error::DecodeError,
    frames::{Frame, FrameDecoder, Opcode},
    protocol::{Message, PartialMessage},
    role::Role,
};

type Result<T> = std::result::Result<T, DecodeError>;

/// Settings fixed for the lifetime of a [`WebSocketDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Whether incoming frames must carry the MASK bit.
    pub expect_masked: bool,
    /// Largest payload a single frame may declare.
    pub max_payload_size: u64,
    /// Largest payload a reassembled message may reach.
    pub max_message_size: u64,
    /// Reject RSV bits, reserved opcodes and control payloads over 125 bytes.
    pub strict: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            expect_masked: false,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            strict: false,
        }
    }
}

impl DecoderConfig {
    #[must_use]
    pub fn for_role(role: Role) -> Self { Self::default().expect_masked(role.expects_masked()) }

    #[must_use]
    pub fn expect_masked(mut self, expect_masked: bool) -> Self {
        self.expect_masked = expect_masked;
        self
    }

    #[must_use]
    pub fn max_payload_size(mut self, max: u64) -> Self {
        self.max_payload_size = max;
        self
    }

    #[must_use]
    pub fn max_message_size(mut self, max: u64) -> Self {
        self.max_message_size = max;
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[derive(Debug, Default)]
enum Reassembly {
    #[default]
    Idle,
    Accumulating(PartialMessage),
}

/// Turns a stream of inbound bytes into frames and messages.
///
/// One decoder belongs to one connection. Every read returns `Ok(None)` when
/// the buffered bytes do not yet hold a complete result; call it again after
/// the next [`feed`](Self::feed). Any `Err` is fatal: the decoder refuses all
/// further reads with [`DecodeError::Failed`].
pub struct WebSocketDecoder {
    frames: FrameDecoder,
    reassembly: Reassembly,
    max_message: u64,
    failed: bool,
}

impl WebSocketDecoder {
    #[must_use]
    pub fn new(expect_masked: bool, max_payload_size: u64) -> Self {
        Self::with_config(
            DecoderConfig::default()
                .expect_masked(expect_masked)
                .max_payload_size(max_payload_size),
        )
    }

    #[must_use]
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            frames: FrameDecoder::new(&config),
            reassembly: Reassembly::Idle,
            max_message: config.max_message_size,
            failed: false,
        }
    }

    /// Appends raw transport bytes. Empty input is a no-op.
    pub fn feed(&mut self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.frames.push_bytes(bytes);
        }
    }

    /// Decodes the next single frame, bypassing message reassembly.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        self.guard(|d| d.frames.next_frame())
    }

    /// Decodes the next complete message.
    ///
    /// Control frames are returned as soon as they arrive, even in the middle
    /// of a fragmented data message, which keeps accumulating across calls.
    pub fn read_message(&mut self) -> Result<Option<Message>> { self.guard(Self::next_message) }

    /// True while a fragmented data message is waiting for its final frame.
    #[must_use]
    pub fn in_message(&self) -> bool { matches!(self.reassembly, Reassembly::Accumulating(_)) }

    #[must_use]
    pub fn is_failed(&self) -> bool { self.failed }

    /// Bytes fed but not yet consumed by the frame parser.
    #[must_use]
    pub fn buffered(&self) -> usize { self.frames.buffered() }

    fn guard<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.failed {
            return Err(DecodeError::Failed);
        }
        let res = f(self);
        if let Err(e) = &res {
            tracing::warn!(error = %e, "decoder failed");
            self.failed = true;
        }
        res
    }

    fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            let Some(frame) = self.frames.next_frame()? else {
                return Ok(None);
            };

            if frame.opcode.is_control() {
                if !frame.fin {
                    return Err(DecodeError::FragmentedControl {
                        opcode: frame.opcode,
                    });
                }
                tracing::debug!(
                    opcode = ?frame.opcode,
                    len = frame.payload.len(),
                    in_message = self.in_message(),
                    "control message"
                );
                return Message::from_payload(frame.opcode, frame.payload).map(Some);
            }

            let mut partial = match (mem::take(&mut self.reassembly), frame.opcode) {
                (Reassembly::Idle, Opcode::Cont) => return Err(DecodeError::MissingMessageStart),
                (Reassembly::Idle, opcode) => PartialMessage::new(opcode),
                (Reassembly::Accumulating(partial), Opcode::Cont) => partial,
                (Reassembly::Accumulating(_), opcode) => {
                    return Err(DecodeError::UnexpectedMessageStart { opcode });
                }
            };

            let len = (partial.len() + frame.payload.len()) as u64;
            if len > self.max_message {
                return Err(DecodeError::MessageTooLarge {
                    len,
                    max: self.max_message,
                });
            }
            partial.push_bytes(&frame.payload);
            tracing::trace!(
                current_len = partial.len(),
                added = frame.payload.len(),
                "message fragment appended"
            );

            if !frame.fin {
                self.reassembly = Reassembly::Accumulating(partial);
                continue;
            }

            let opcode = partial.opcode();
            let msg = partial.into_message()?;
            tracing::debug!(?opcode, total_len = msg.len(), "message assembly complete");
            return Ok(Some(msg));
        }
    }
}
