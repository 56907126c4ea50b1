use std::{ops::Range, sync::Arc};

use super::{
    Chip8Error, Chip8Result, FONT, FONT_END_ADDRESS, FONT_START_ADDRESS, Framebuffer, Keypad,
    Opcode, Operands, Quirks, Timers,
};
use crate::u4;

// The constants are specified by the CHIP-8 specification
pub(crate) const ROM_START_ADDRESS: usize = 0x200;
pub const MEMORY_SIZE: usize = 4096;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - ROM_START_ADDRESS;
pub const STACK_SIZE: usize = 48;

/// CHIP-8 virtual machine state
pub struct Chip8 {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) display: Framebuffer,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Return addresses, valid up to `sp`
    pub(crate) stack: [u16; STACK_SIZE],
    /// Number of entries on the call stack
    pub(crate) sp: usize,

    /// Delay and sound timers, shareable with a timer thread
    pub(crate) timers: Arc<Timers>,
    /// Keypad state, refreshed by the host
    pub(crate) keypad: Keypad,

    pub(crate) quirks: Quirks,
}

impl Chip8 {
    pub fn new() -> Self {
        Self::with_quirks(Quirks::default())
    }

    pub fn with_quirks(quirks: Quirks) -> Self {
        let mut memory = [0; MEMORY_SIZE];
        memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);

        Chip8 {
            memory,
            display: Framebuffer::new(),
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: [0; STACK_SIZE],
            sp: 0,
            timers: Arc::new(Timers::new()),
            keypad: Keypad::new(),
            quirks,
        }
    }

    /// Loads a ROM into memory at 0x200. ROMs larger than the program area are rejected
    /// before anything is copied.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::RomLoadError {
                size: rom.len(),
                max_size: MAX_ROM_SIZE,
            });
        }

        let rom_end = ROM_START_ADDRESS + rom.len();
        self.memory[ROM_START_ADDRESS..rom_end].copy_from_slice(rom);

        // Set program counter to start of ROM
        self.pc = ROM_START_ADDRESS as u16;

        log::debug!("Loaded {} byte ROM at {:#05X}", rom.len(), ROM_START_ADDRESS);
        Ok(())
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    pub fn cpu_cycle(&mut self) -> Result<Chip8Result, Chip8Error> {
        let operands = self.fetch()?;
        let opcode = Opcode::dispatch(&operands);
        log::trace!("{:#05X}: {:04X} {}", self.fetch_pc(), operands.opcode, opcode);
        self.execute(opcode)
    }

    /// Decrements the delay and sound timers. Should be called at 60Hz.
    pub fn timers_cycle(&self) {
        self.timers.tick();
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.timers.sound() > 0
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad.set(key, pressed);
    }

    /// Replaces the state of all 16 keys.
    pub fn set_keys(&mut self, keys: [bool; 16]) {
        self.keypad.refresh(keys);
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.display.get(x, y)
    }

    pub fn display(&self) -> &Framebuffer {
        &self.display
    }

    /// Lowers the draw-dirty flag, returning whether the frame needs presenting.
    pub fn take_draw_dirty(&mut self) -> bool {
        self.display.take_dirty()
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    /// Active part of the call stack, oldest return address first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp]
    }

    pub fn timers(&self) -> &Arc<Timers> {
        &self.timers
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    /// Memory window starting at `start`, truncated at the end of memory.
    pub fn memory(&self, start: u16, len: u16) -> &[u8] {
        let start = usize::from(start).min(MEMORY_SIZE);
        let end = (start + usize::from(len)).min(MEMORY_SIZE);
        &self.memory[start..end]
    }

    /// Fetches the word at the program counter and advances past it.
    fn fetch(&mut self) -> Result<Operands, Chip8Error> {
        let pc = self.pc;
        let word = Self::checked_range(pc, 2, pc)?;
        let (high, low) = (self.memory[word.start], self.memory[word.start + 1]);
        self.pc = pc.wrapping_add(2);

        Ok(Operands::from_bytes(high, low))
    }

    /// Address of the instruction currently executing.
    pub(crate) fn fetch_pc(&self) -> u16 {
        self.pc.wrapping_sub(2)
    }

    pub(crate) fn push(&mut self, addr: u16) -> Result<(), Chip8Error> {
        let pc = self.fetch_pc();
        let slot = self
            .stack
            .get_mut(self.sp)
            .ok_or(Chip8Error::StackOverflow { pc })?;
        *slot = addr;
        self.sp += 1;
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<u16, Chip8Error> {
        self.sp = self
            .sp
            .checked_sub(1)
            .ok_or(Chip8Error::StackUnderflow {
                pc: self.fetch_pc(),
            })?;
        Ok(self.stack[self.sp])
    }

    /// `len` bytes starting at `addr`, bounds-checked as a whole.
    pub(crate) fn mem_range(&self, addr: u16, len: usize) -> Result<&[u8], Chip8Error> {
        let range = Self::checked_range(addr, len, self.fetch_pc())?;
        Ok(&self.memory[range])
    }

    pub(crate) fn mem_range_mut(
        &mut self,
        addr: u16,
        len: usize,
    ) -> Result<&mut [u8], Chip8Error> {
        let pc = self.fetch_pc();
        let range = Self::checked_range(addr, len, pc)?;
        Ok(&mut self.memory[range])
    }

    /// Reports the first address past the end of memory on failure.
    fn checked_range(addr: u16, len: usize, pc: u16) -> Result<Range<usize>, Chip8Error> {
        let start = usize::from(addr);
        let end = start + len;
        if end > MEMORY_SIZE {
            return Err(Chip8Error::MemoryOutOfBounds {
                address: start.max(MEMORY_SIZE) as u16,
                pc,
            });
        }
        Ok(start..end)
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}
