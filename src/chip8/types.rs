/// Result type for CHIP-8 CPU cycle execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8Result {
    /// Continue executing instructions in the current frame.
    Continue,
    /// Wait for the next frame before continuing
    /// (e.g., after a draw instruction to limit the display update rate to the frame rate).
    WaitForNextFrame,
}

/// Error types that can occur during CHIP-8 emulation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomLoadError { size: usize, max_size: usize },

    #[error("Memory access out of bounds at address {address:#06X} (pc {pc:#05X})")]
    MemoryOutOfBounds { address: u16, pc: u16 },

    #[error("Stack overflow at {pc:#05X}: call stack is full")]
    StackOverflow { pc: u16 },

    #[error("Stack underflow at {pc:#05X}: attempted to return with empty call stack")]
    StackUnderflow { pc: u16 },

    #[error("Unknown opcode {opcode:#06X} at {pc:#05X}")]
    UnknownOpcode { opcode: u16, pc: u16 },
}

impl Chip8Error {
    /// Whether the host may choose to step past this error instead of halting.
    ///
    /// Load and memory faults leave the machine in no state worth resuming.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Chip8Error::StackOverflow { .. }
                | Chip8Error::StackUnderflow { .. }
                | Chip8Error::UnknownOpcode { .. }
        )
    }
}

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
