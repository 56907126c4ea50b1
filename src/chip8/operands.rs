use crate::u4;

/// Fields of a raw opcode, extracted by fixed masks.
///
/// The naming follows the usual CHIP-8 notation: `inst X Y N`, `NN` is the low byte and
/// `NNN` the low twelve bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operands {
    pub opcode: u16,
    pub inst: u8,
    pub x: u4,
    pub y: u4,
    pub n: u4,
    pub nn: u8,
    pub nnn: u16,
}

impl Operands {
    /// Split a big-endian instruction word into its operand fields. Every word decodes.
    pub fn decode(opcode: u16) -> Self {
        Self {
            opcode,
            inst: ((opcode & 0xF000) >> 12) as u8,
            x: u4::new(((opcode & 0x0F00) >> 8) as u8),
            y: u4::new(((opcode & 0x00F0) >> 4) as u8),
            n: u4::new((opcode & 0x000F) as u8),
            nn: (opcode & 0x00FF) as u8,
            nnn: opcode & 0x0FFF,
        }
    }

    pub fn from_bytes(high: u8, low: u8) -> Self {
        Self::decode(u16::from_be_bytes([high, low]))
    }
}
