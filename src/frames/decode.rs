use bytes::{Buf, Bytes, BytesMut};

use super::Opcode;
use crate::{DecoderConfig, error::DecodeError};

// helper type since every parse step can fail with a DecodeError
type Result<T> = std::result::Result<T, DecodeError>;

/// A single decoded wire frame with its payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Bytes,
}

/// Incremental frame parser over an append-only input buffer.
///
/// Header fields are taken off the buffer as soon as they are complete and
/// kept in `ctx`, so a frame split across many `push_bytes` calls resumes
/// exactly where it stopped instead of re-parsing from the first byte.
pub(crate) struct FrameDecoder {
    buf: BytesMut,
    state: DecodeState,
    ctx: DecodeContext,
    expect_masked: bool,
    max_payload: u64,
    strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Header,
    ExtendedLen,
    Mask,
    Payload,
}

#[derive(Debug, Default)]
struct DecodeContext {
    is_fin: bool,
    opcode: u8,
    len7: u8,
    payload_len: usize,
    mask_key: Option<[u8; 4]>,
}

impl FrameDecoder {
    pub(crate) fn new(config: &DecoderConfig) -> Self {
        Self {
            buf: BytesMut::new(),
            state: DecodeState::Header,
            ctx: DecodeContext::default(),
            expect_masked: config.expect_masked,
            max_payload: config.max_payload_size,
            strict: config.strict,
        }
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }

    /// Bytes received but not yet consumed by a completed header field.
    pub(crate) fn buffered(&self) -> usize { self.buf.len() }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        tracing::trace!(
            state = ?self.state,
            buf_len = self.buf.len(),
            "decoder"
        );
        loop {
            let next_state = match self.state {
                DecodeState::Header => {
                    if self.buf.len() < 2 {
                        return Ok(None);
                    }
                    let b0 = self.buf.get_u8();
                    let b1 = self.buf.get_u8();
                    self.parse_header(b0, b1)?
                }
                DecodeState::ExtendedLen => match self.parse_extended_len()? {
                    Some(state) => state,
                    None => return Ok(None),
                },
                DecodeState::Mask => {
                    if self.buf.len() < 4 {
                        return Ok(None);
                    }
                    let mut key = [0; 4];
                    self.buf.copy_to_slice(&mut key);
                    self.ctx.mask_key = Some(key);
                    DecodeState::Payload
                }
                DecodeState::Payload => {
                    let Some(payload) = self.parse_payload() else {
                        return Ok(None);
                    };
                    self.state = DecodeState::Header;

                    let frame = Frame {
                        fin: self.ctx.is_fin,
                        opcode: Opcode::from(self.ctx.opcode),
                        payload,
                    };
                    tracing::trace!(
                        opcode = ?frame.opcode,
                        fin = frame.fin,
                        payload_len = frame.payload.len(),
                        masked = self.ctx.mask_key.is_some(),
                        "frame decoded"
                    );
                    return Ok(Some(frame));
                }
            };
            tracing::trace!(
                from = ?self.state,
                to = ?next_state,
                "state transition"
            );
            self.state = next_state;
        }
    }

    fn parse_header(&mut self, b0: u8, b1: u8) -> Result<DecodeState> {
        // 0   | 1 2 3 | 4 5 6 7
        // Fin | Rsv   | Opcode
        let rsv = (b0 >> 4) & 0b111;
        let opcode = b0 & 0b1111;
        if self.strict {
            if rsv != 0 {
                tracing::warn!(rsv, "reserved bits set");
                return Err(DecodeError::ReservedBits { bits: rsv });
            }
            if Opcode::from(opcode).is_reserved() {
                tracing::warn!(opcode, "reserved opcode");
                return Err(DecodeError::ReservedOpcode { opcode });
            }
        }

        // 0    | 1 2 3 4 5 6 7
        // Mask | Payload len
        let masked = b1 & 0b1000_0000 != 0;
        if masked != self.expect_masked {
            tracing::warn!(masked, expected = self.expect_masked, "frame mask violates policy");
            return Err(DecodeError::MaskMismatch {
                expected: self.expect_masked,
                got: masked,
            });
        }

        self.ctx = DecodeContext {
            is_fin: b0 & 0b1000_0000 != 0,
            opcode,
            len7: b1 & 0b0111_1111,
            payload_len: 0,
            mask_key: None,
        };

        if self.ctx.len7 >= 126 {
            Ok(DecodeState::ExtendedLen)
        } else {
            self.set_payload_len(u64::from(self.ctx.len7))
        }
    }

    fn parse_extended_len(&mut self) -> Result<Option<DecodeState>> {
        let len = if self.ctx.len7 == 126 {
            // 126 => 2 bytes extended (u16)
            if self.buf.len() < 2 {
                return Ok(None);
            }
            u64::from(self.buf.get_u16())
        } else {
            // 127 => 8 bytes extended (u64)
            if self.buf.len() < 8 {
                return Ok(None);
            }
            self.buf.get_u64()
        };
        self.set_payload_len(len).map(Some)
    }

    // Size guard, runs before any payload byte is awaited
    fn set_payload_len(&mut self, len: u64) -> Result<DecodeState> {
        let opcode = Opcode::from(self.ctx.opcode);
        if self.strict && opcode.is_control() && len > 125 {
            tracing::warn!(?opcode, len, "control frame too large");
            return Err(DecodeError::ControlTooLarge { opcode, len });
        }

        let too_large = DecodeError::PayloadTooLarge {
            len,
            max: self.max_payload,
        };
        if len > self.max_payload {
            tracing::warn!(len, max = self.max_payload, "payload larger than maximum size");
            return Err(too_large);
        }
        self.ctx.payload_len = usize::try_from(len).map_err(|_| too_large)?;

        Ok(if self.expect_masked {
            DecodeState::Mask
        } else {
            DecodeState::Payload
        })
    }

    fn parse_payload(&mut self) -> Option<Bytes> {
        let len = self.ctx.payload_len;
        if self.buf.len() < len {
            self.buf.reserve(len - self.buf.len());
            return None;
        }

        let mut payload = self.buf.split_to(len);
        if let Some(key) = self.ctx.mask_key {
            crate::protocol::mask(&mut payload, key);
        }
        Some(payload.freeze())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use proptest::{collection::vec, prelude::*};

    use super::*;

    pub(crate) const TEST_MASK: [u8; 4] = [0xAA, 0xBB, 0xCC, 0xDD];

    // Build a raw WebSocket frame from opcode and payload
    pub(crate) fn build_frame_bytes(opcode: u8, payload: &[u8], fin: bool, mask: bool) -> Vec<u8> {
        #![allow(clippy::cast_possible_truncation)]

        let mut bytes = Vec::new();
        bytes.push(if fin { 0x80 } else { 0 } | (opcode & 0x0F));

        let mask_bit = if mask { 0x80 } else { 0 };
        if payload.len() <= 125 {
            bytes.push(mask_bit | payload.len() as u8);
        } else if let Ok(len) = u16::try_from(payload.len()) {
            bytes.push(mask_bit | 126);
            bytes.extend_from_slice(&len.to_be_bytes());
        } else {
            bytes.push(mask_bit | 127);
            bytes.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        }

        if mask {
            bytes.extend_from_slice(&TEST_MASK);
            for (i, byte) in payload.iter().enumerate() {
                bytes.push(byte ^ TEST_MASK[i % 4]);
            }
        } else {
            bytes.extend_from_slice(payload);
        }

        bytes
    }

    fn decoder(expect_masked: bool) -> FrameDecoder {
        FrameDecoder::new(&DecoderConfig::default().expect_masked(expect_masked))
    }

    #[test]
    fn unmasked_text() {
        let mut fd = decoder(false);
        fd.push_bytes(b"\x81\x05Hello");
        let frame = fd.next_frame().unwrap().unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, "Hello");
        assert_eq!(fd.next_frame(), Ok(None));
        assert_eq!(fd.buffered(), 0);
    }

    #[test]
    fn masked_text() {
        let mut fd = decoder(true);
        fd.push_bytes(b"\x81\x85\x37\xfa\x21\x3d\x7f\x9f\x4d\x51\x58");
        let frame = fd.next_frame().unwrap().unwrap();
        assert_eq!(frame.payload, "Hello");
    }

    #[test]
    fn mask_mismatch_both_ways() {
        let mut fd = decoder(true);
        fd.push_bytes(b"\x81\x05Hello");
        assert_eq!(
            fd.next_frame(),
            Err(DecodeError::MaskMismatch {
                expected: true,
                got: false
            })
        );

        let mut fd = decoder(false);
        fd.push_bytes(b"\x81\x85\x37\xfa\x21\x3d\x7f\x9f\x4d\x51\x58");
        assert_eq!(
            fd.next_frame(),
            Err(DecodeError::MaskMismatch {
                expected: false,
                got: true
            })
        );
    }

    #[test]
    fn extended_16_bit_length() {
        let mut fd = decoder(false);
        fd.push_bytes(b"\x82\x7e\x01\x00");
        fd.push_bytes(&[0; 256]);
        let frame = fd.next_frame().unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Bin);
        assert_eq!(frame.payload.len(), 256);
    }

    #[test]
    fn extended_64_bit_length() {
        let mut fd = decoder(false);
        fd.push_bytes(b"\x82\x7f\x00\x00\x00\x00\x00\x01\x00\x00");
        fd.push_bytes(&vec![0; 65536]);
        let frame = fd.next_frame().unwrap().unwrap();
        assert_eq!(frame.payload.len(), 65536);
    }

    #[test]
    fn oversized_rejected_from_header_alone() {
        let mut fd = decoder(false);
        fd.push_bytes(b"\x82\x7f\x00\x00\x00\x01\x00\x00\x00\x00");
        assert_eq!(
            fd.next_frame(),
            Err(DecodeError::PayloadTooLarge {
                len: 1 << 32,
                max: crate::DEFAULT_MAX_PAYLOAD_SIZE,
            })
        );
    }

    #[test]
    fn custom_ceiling() {
        let mut fd = FrameDecoder::new(&DecoderConfig::default().max_payload_size(4));
        fd.push_bytes(b"\x82\x04abcd\x82\x05");
        assert_eq!(fd.next_frame().unwrap().unwrap().payload, "abcd");
        assert_eq!(
            fd.next_frame(),
            Err(DecodeError::PayloadTooLarge { len: 5, max: 4 })
        );
    }

    #[test]
    fn byte_at_a_time() {
        let bytes = build_frame_bytes(0x2, &[7; 300], true, true);
        let mut fd = decoder(true);
        let (last, head) = bytes.split_last().unwrap();
        for b in head {
            fd.push_bytes(&[*b]);
            assert_eq!(fd.next_frame(), Ok(None));
        }
        fd.push_bytes(&[*last]);
        let frame = fd.next_frame().unwrap().unwrap();
        assert_eq!(frame.payload, vec![7; 300]);
    }

    #[test]
    fn trailing_bytes_kept_for_next_frame() {
        let mut fd = decoder(false);
        fd.push_bytes(b"\x81\x02hi\x82");
        assert_eq!(fd.next_frame().unwrap().unwrap().payload, "hi");
        assert_eq!(fd.next_frame(), Ok(None));
        fd.push_bytes(b"\x01!");
        assert_eq!(fd.next_frame().unwrap().unwrap().payload, "!");
    }

    #[test]
    fn permissive_by_default() {
        let mut fd = decoder(false);
        // RSV1 set, reserved opcode 3
        fd.push_bytes(b"\xc3\x00");
        let frame = fd.next_frame().unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Reserved(3));
    }

    #[test]
    fn strict_rejects_reserved() {
        let strict = DecoderConfig::default().strict(true);

        let mut fd = FrameDecoder::new(&strict);
        fd.push_bytes(b"\xc1\x00");
        assert_eq!(fd.next_frame(), Err(DecodeError::ReservedBits { bits: 0b100 }));

        let mut fd = FrameDecoder::new(&strict);
        fd.push_bytes(b"\x8b\x00");
        assert_eq!(fd.next_frame(), Err(DecodeError::ReservedOpcode { opcode: 0xB }));

        let mut fd = FrameDecoder::new(&strict);
        fd.push_bytes(b"\x89\x7e\x00\x7e");
        assert_eq!(
            fd.next_frame(),
            Err(DecodeError::ControlTooLarge {
                opcode: Opcode::Ping,
                len: 126
            })
        );
    }

    fn opcode_strategy() -> impl Strategy<Value = u8> {
        prop_oneof![Just(0x0), Just(0x1), Just(0x2), Just(0x8), Just(0x9), Just(0xA)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn decoder_handles_random_frames(
            opcode in opcode_strategy(),
            fin in any::<bool>(),
            masked in any::<bool>(),
            payload in vec(any::<u8>(), 0..1024),
        ) {
            let frame_bytes = build_frame_bytes(opcode, &payload, fin, masked);
            let mut fd = decoder(masked);
            fd.push_bytes(&frame_bytes);

            let frame = fd.next_frame().unwrap().unwrap();
            prop_assert_eq!(frame.payload, payload);
            prop_assert_eq!(frame.opcode, Opcode::from(opcode));
            prop_assert_eq!(frame.fin, fin);
            prop_assert_eq!(fd.buffered(), 0);
        }

        #[test]
        fn split_point_does_not_matter(
            payload in vec(any::<u8>(), 0..400),
            split in any::<prop::sample::Index>(),
        ) {
            let bytes = build_frame_bytes(0x2, &payload, true, true);
            let at = split.index(bytes.len());
            let mut fd = decoder(true);
            fd.push_bytes(&bytes[..at]);
            prop_assert_eq!(fd.next_frame(), Ok(None));
            fd.push_bytes(&bytes[at..]);
            prop_assert_eq!(fd.next_frame().unwrap().unwrap().payload, payload);
        }

        #[test]
        fn fuzz_decoder(buf in vec(any::<u8>(), 0..2048)) {
            let mut fd = decoder(false);
            fd.push_bytes(&buf);
            while let Ok(Some(_)) = fd.next_frame() {}
        }
    }
}
