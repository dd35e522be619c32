mod decode;
mod opcode;

pub use decode::Frame;
pub(crate) use decode::FrameDecoder;
#[cfg(test)]
pub(crate) use decode::tests::build_frame_bytes;
pub use opcode::Opcode;
