use bytes::{Bytes, BytesMut};

use super::decode_text;
use crate::{error::DecodeError, frames::Opcode};

/// Assembled messages received from an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Valid UTF-8 message.
    Text(String),
    /// Binary message bytes.
    Binary(Bytes),
    /// Close frame payload, status code and reason left undecoded.
    Close(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    /// A message carrying one of the reserved opcodes.
    Reserved(Opcode, Bytes),
}

impl Message {
    /// Builds a message from a complete payload, validating UTF-8 for text.
    pub(crate) fn from_payload(opcode: Opcode, payload: Bytes) -> Result<Self, DecodeError> {
        Ok(match opcode {
            Opcode::Text => Self::Text(decode_text(payload.into())?),
            Opcode::Bin => Self::Binary(payload),
            Opcode::Close => Self::Close(payload),
            Opcode::Ping => Self::Ping(payload),
            Opcode::Pong => Self::Pong(payload),
            Opcode::Cont | Opcode::Reserved(_) => Self::Reserved(opcode, payload),
        })
    }

    /// Opcode of the first frame of the message.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Text(_) => Opcode::Text,
            Self::Binary(_) => Opcode::Bin,
            Self::Close(_) => Opcode::Close,
            Self::Ping(_) => Opcode::Ping,
            Self::Pong(_) => Opcode::Pong,
            Self::Reserved(op, _) => *op,
        }
    }

    /// If the type is `Message::Text`, returns a reference to the internal `String`, otherwise
    /// `None`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a reference to the data as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) | Self::Close(b) | Self::Ping(b) | Self::Pong(b) => b,
            Self::Reserved(_, b) => b,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.as_bytes().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// A data message whose final fragment has not arrived yet.
#[derive(Debug)]
pub(crate) struct PartialMessage {
    opcode: Opcode,
    buf: BytesMut,
}

impl PartialMessage {
    pub(crate) fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            buf: BytesMut::new(),
        }
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }

    pub(crate) fn len(&self) -> usize { self.buf.len() }

    pub(crate) fn opcode(&self) -> Opcode { self.opcode }

    pub(crate) fn into_message(self) -> Result<Message, DecodeError> {
        Message::from_payload(self.opcode, self.buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_concatenates_in_order() {
        let mut partial = PartialMessage::new(Opcode::Text);
        partial.push_bytes(b"Hel");
        partial.push_bytes(b"");
        partial.push_bytes(b"lo");
        assert_eq!(partial.len(), 5);
        assert_eq!(
            partial.into_message().unwrap(),
            Message::Text("Hello".into())
        );
    }

    #[test]
    fn binary_is_not_validated() {
        let msg = Message::from_payload(Opcode::Bin, Bytes::from_static(b"\xc0\x41")).unwrap();
        assert_eq!(msg.opcode(), Opcode::Bin);
        assert_eq!(msg.as_bytes(), b"\xc0\x41");
        assert!(msg.as_str().is_none());
    }

    #[test]
    fn empty_text() {
        let msg = Message::from_payload(Opcode::Text, Bytes::new()).unwrap();
        assert!(msg.is_empty());
        assert_eq!(msg.as_str(), Some(""));
    }
}
