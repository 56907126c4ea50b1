use std::fmt;

use super::Operands;
use crate::u4;

/// CHIP-8 instruction opcodes.
///
/// The fields (x, y, n, nn, nnn) correspond to the operands encoded in the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// 1nnn - Jump to location nnn.
    Jump { nnn: u16 },
    /// Bnnn - Jump to location nnn + V0.
    JumpWithOffset { nnn: u16 },

    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u16 },
    /// 00EE - Return from a subroutine.
    Return,

    /// 3xnn - Skip next instruction if Vx == nn.
    SkipRegEqualImm { x: u4, nn: u8 },
    /// 4xnn - Skip next instruction if Vx != nn.
    SkipRegNotEqualImm { x: u4, nn: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipRegEqualReg { x: u4, y: u4 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// 6xnn - Set Vx = nn.
    SetRegImm { x: u4, nn: u8 },
    /// 7xnn - Set Vx = Vx + nn.
    AddRegImm { x: u4, nn: u8 },
    /// Annn - Set I = nnn.
    SetIndexImm { nnn: u16 },
    /// Fx1E - Set I = I + Vx.
    AddIndexReg { x: u4 },

    /// 8xyN - ALU operations
    ALU { x: u4, y: u4, op: OpcodeALU },
    /// Cxnn - Set Vx = random byte AND nn.
    Random { x: u4, nn: u8 },

    /// 00E0 - Clear the display.
    ClearDisplay,
    /// Dxyn - Display sprite.
    Draw { x: u4, y: u4, n: u4 },

    /// Ex9E - Skip next instruction if key with the value of Vx is pressed.
    SkipIfPressed { x: u4 },
    /// ExA1 - Skip next instruction if key with the value of Vx is not pressed.
    SkipIfNotPressed { x: u4 },
    /// Fx0A - Wait for a key press, store the value of the key in Vx.
    WaitForKey { x: u4 },

    /// Fx07 - Set Vx = delay timer value.
    ReadDelayTimer { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },

    /// Fx29 - Set I = location of sprite for digit Vx.
    FontChar { x: u4 },
    /// Fx33 - Store BCD representation of Vx in memory locations I, I+1, and I+2.
    BCD { x: u4 },

    /// Fx55 - Store registers V0 through Vx in memory starting at location I.
    StoreRegs { x: u4 },
    /// Fx65 - Read registers V0 through Vx from memory starting at location I.
    LoadRegs { x: u4 },

    /// No instruction is encoded by this word.
    Unknown(u16),
}

/// 8xyN - ALU operation variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeALU {
    /// 8xy0 - Set Vx = Vy.
    Set,
    /// 8xy1 - Set Vx = Vx OR Vy.
    Or,
    /// 8xy2 - Set Vx = Vx AND Vy.
    And,
    /// 8xy3 - Set Vx = Vx XOR Vy.
    Xor,
    /// 8xy4 - Set Vx = Vx + Vy, set VF = carry.
    Add,
    /// 8xy5 - Set Vx = Vx - Vy, set VF = NOT borrow.
    Sub,
    /// 8xy6 - Set Vx = Vy SHR 1, set VF = shifted out bit.
    ShiftRight,
    /// 8xy7 - Set Vx = Vy - Vx, set VF = NOT borrow.
    SubReverse,
    /// 8xyE - Set Vx = Vy SHL 1, set VF = shifted out bit.
    ShiftLeft,
}

impl Opcode {
    /// Decode a 16-bit raw opcode into an Opcode enum variant
    pub fn decode(opcode: u16) -> Self {
        Self::dispatch(&Operands::decode(opcode))
    }

    /// Select the instruction for already split operand fields.
    ///
    /// Keyed on the top nibble first; the 0, 8, E and F groups are resolved by a second
    /// lookup on the low byte or low nibble.
    pub fn dispatch(ops: &Operands) -> Self {
        let Operands {
            opcode,
            inst,
            x,
            y,
            n,
            nn,
            nnn,
        } = *ops;

        match inst {
            0x0 => match nn {
                0xE0 => Opcode::ClearDisplay,
                0xEE => Opcode::Return,
                _ => Opcode::Unknown(opcode),
            },
            0x1 => Opcode::Jump { nnn },
            0x2 => Opcode::Call { nnn },
            0x3 => Opcode::SkipRegEqualImm { x, nn },
            0x4 => Opcode::SkipRegNotEqualImm { x, nn },
            0x5 if n.get() == 0 => Opcode::SkipRegEqualReg { x, y },
            0x6 => Opcode::SetRegImm { x, nn },
            0x7 => Opcode::AddRegImm { x, nn },
            0x8 => {
                let op = match n.get() {
                    0x0 => OpcodeALU::Set,
                    0x1 => OpcodeALU::Or,
                    0x2 => OpcodeALU::And,
                    0x3 => OpcodeALU::Xor,
                    0x4 => OpcodeALU::Add,
                    0x5 => OpcodeALU::Sub,
                    0x6 => OpcodeALU::ShiftRight,
                    0x7 => OpcodeALU::SubReverse,
                    0xE => OpcodeALU::ShiftLeft,
                    _ => return Opcode::Unknown(opcode),
                };
                Opcode::ALU { x, y, op }
            }
            0x9 if n.get() == 0 => Opcode::SkipRegNotEqualReg { x, y },
            0xA => Opcode::SetIndexImm { nnn },
            0xB => Opcode::JumpWithOffset { nnn },
            0xC => Opcode::Random { x, nn },
            0xD => Opcode::Draw { x, y, n },
            0xE => match nn {
                0x9E => Opcode::SkipIfPressed { x },
                0xA1 => Opcode::SkipIfNotPressed { x },
                _ => Opcode::Unknown(opcode),
            },
            0xF => match nn {
                0x07 => Opcode::ReadDelayTimer { x },
                0x0A => Opcode::WaitForKey { x },
                0x15 => Opcode::SetDelayTimer { x },
                0x18 => Opcode::SetSoundTimer { x },
                0x1E => Opcode::AddIndexReg { x },
                0x29 => Opcode::FontChar { x },
                0x33 => Opcode::BCD { x },
                0x55 => Opcode::StoreRegs { x },
                0x65 => Opcode::LoadRegs { x },
                _ => Opcode::Unknown(opcode),
            },
            _ => Opcode::Unknown(opcode),
        }
    }
}

impl fmt::Display for Opcode {
    /// Octo-style mnemonic, used by the debugger's disassembly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Opcode::Jump { nnn } => write!(f, "jump {nnn:#05X}"),
            Opcode::JumpWithOffset { nnn } => write!(f, "jump0 {nnn:#05X}"),
            Opcode::Call { nnn } => write!(f, "call {nnn:#05X}"),
            Opcode::Return => write!(f, "return"),
            Opcode::SkipRegEqualImm { x, nn } => write!(f, "skip if v{x} == {nn:#04X}"),
            Opcode::SkipRegNotEqualImm { x, nn } => write!(f, "skip if v{x} != {nn:#04X}"),
            Opcode::SkipRegEqualReg { x, y } => write!(f, "skip if v{x} == v{y}"),
            Opcode::SkipRegNotEqualReg { x, y } => write!(f, "skip if v{x} != v{y}"),
            Opcode::SetRegImm { x, nn } => write!(f, "v{x} := {nn:#04X}"),
            Opcode::AddRegImm { x, nn } => write!(f, "v{x} += {nn:#04X}"),
            Opcode::SetIndexImm { nnn } => write!(f, "i := {nnn:#05X}"),
            Opcode::AddIndexReg { x } => write!(f, "i += v{x}"),
            Opcode::ALU { x, y, op } => {
                let sym = match op {
                    OpcodeALU::Set => ":=",
                    OpcodeALU::Or => "|=",
                    OpcodeALU::And => "&=",
                    OpcodeALU::Xor => "^=",
                    OpcodeALU::Add => "+=",
                    OpcodeALU::Sub => "-=",
                    OpcodeALU::ShiftRight => ">>=",
                    OpcodeALU::SubReverse => "=-",
                    OpcodeALU::ShiftLeft => "<<=",
                };
                write!(f, "v{x} {sym} v{y}")
            }
            Opcode::Random { x, nn } => write!(f, "v{x} := random {nn:#04X}"),
            Opcode::ClearDisplay => write!(f, "clear"),
            Opcode::Draw { x, y, n } => write!(f, "sprite v{x} v{y} {}", n.get()),
            Opcode::SkipIfPressed { x } => write!(f, "skip if v{x} key"),
            Opcode::SkipIfNotPressed { x } => write!(f, "skip if v{x} -key"),
            Opcode::WaitForKey { x } => write!(f, "v{x} := key"),
            Opcode::ReadDelayTimer { x } => write!(f, "v{x} := delay"),
            Opcode::SetDelayTimer { x } => write!(f, "delay := v{x}"),
            Opcode::SetSoundTimer { x } => write!(f, "buzzer := v{x}"),
            Opcode::FontChar { x } => write!(f, "i := hex v{x}"),
            Opcode::BCD { x } => write!(f, "bcd v{x}"),
            Opcode::StoreRegs { x } => write!(f, "save v{x}"),
            Opcode::LoadRegs { x } => write!(f, "load v{x}"),
            Opcode::Unknown(raw) => write!(f, "unknown {raw:#06X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_group_dispatches_on_low_byte() {
        assert_eq!(Opcode::decode(0x00E0), Opcode::ClearDisplay);
        assert_eq!(Opcode::decode(0x00EE), Opcode::Return);
        assert_eq!(Opcode::decode(0x0123), Opcode::Unknown(0x0123));
    }

    #[test]
    fn alu_group_dispatches_on_low_nibble() {
        assert_eq!(
            Opcode::decode(0x8AB4),
            Opcode::ALU {
                x: u4::new(0xA),
                y: u4::new(0xB),
                op: OpcodeALU::Add
            }
        );
        assert_eq!(
            Opcode::decode(0x812E),
            Opcode::ALU {
                x: u4::new(0x1),
                y: u4::new(0x2),
                op: OpcodeALU::ShiftLeft
            }
        );
        assert_eq!(Opcode::decode(0x8008), Opcode::Unknown(0x8008));
    }

    #[test]
    fn register_compare_requires_zero_low_nibble() {
        assert_eq!(
            Opcode::decode(0x5120),
            Opcode::SkipRegEqualReg {
                x: u4::new(1),
                y: u4::new(2)
            }
        );
        assert_eq!(Opcode::decode(0x5121), Opcode::Unknown(0x5121));
        assert_eq!(Opcode::decode(0x912F), Opcode::Unknown(0x912F));
    }

    #[test]
    fn key_and_misc_groups_dispatch_on_low_byte() {
        let x = u4::new(0x3);
        assert_eq!(Opcode::decode(0xE39E), Opcode::SkipIfPressed { x });
        assert_eq!(Opcode::decode(0xE3A1), Opcode::SkipIfNotPressed { x });
        assert_eq!(Opcode::decode(0xE3A2), Opcode::Unknown(0xE3A2));

        assert_eq!(Opcode::decode(0xF307), Opcode::ReadDelayTimer { x });
        assert_eq!(Opcode::decode(0xF30A), Opcode::WaitForKey { x });
        assert_eq!(Opcode::decode(0xF315), Opcode::SetDelayTimer { x });
        assert_eq!(Opcode::decode(0xF318), Opcode::SetSoundTimer { x });
        assert_eq!(Opcode::decode(0xF31E), Opcode::AddIndexReg { x });
        assert_eq!(Opcode::decode(0xF329), Opcode::FontChar { x });
        assert_eq!(Opcode::decode(0xF333), Opcode::BCD { x });
        assert_eq!(Opcode::decode(0xF355), Opcode::StoreRegs { x });
        assert_eq!(Opcode::decode(0xF365), Opcode::LoadRegs { x });
        assert_eq!(Opcode::decode(0xF375), Opcode::Unknown(0xF375));
    }

    #[test]
    fn mnemonics() {
        assert_eq!(Opcode::decode(0x6A2F).to_string(), "vA := 0x2F");
        assert_eq!(Opcode::decode(0xD125).to_string(), "sprite v1 v2 5");
        assert_eq!(Opcode::decode(0x2ABC).to_string(), "call 0xABC");
    }
}
