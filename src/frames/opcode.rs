/// Frame opcode, the low nibble of the first header byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    Cont,
    Text,
    Bin,
    Close,
    Ping,
    Pong,
    /// Opcodes 3-7 and 11-15, reserved for future extensions.
    Reserved(u8),
}

impl Opcode {
    /// Control opcodes occupy the upper half of the opcode space.
    #[must_use]
    pub fn is_control(self) -> bool { u8::from(self) & 0x8 != 0 }

    #[must_use]
    pub fn is_reserved(self) -> bool { matches!(self, Self::Reserved(_)) }
}

impl From<u8> for Opcode {
    fn from(b: u8) -> Self {
        match b & 0x0F {
            0x0 => Self::Cont,
            0x1 => Self::Text,
            0x2 => Self::Bin,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Reserved(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        match op {
            Opcode::Cont => 0x0,
            Opcode::Text => 0x1,
            Opcode::Bin => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Reserved(b) => b & 0x0F,
        }
    }
}
