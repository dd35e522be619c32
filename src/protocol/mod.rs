mod mask;
mod message;
mod utf8;

pub(crate) use mask::mask;
pub use message::Message;
pub(crate) use message::PartialMessage;
pub(crate) use utf8::decode_text;
