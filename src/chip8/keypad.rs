use crate::u4;

/// Physical layout of the hex keypad, top row first.
///
/// Hosts map the 4x4 block `1234/QWER/ASDF/ZXCV` onto this grid position for position.
pub const KEYPAD_LAYOUT: [[u8; 4]; 4] = [
    [0x1, 0x2, 0x3, 0xC],
    [0x4, 0x5, 0x6, 0xD],
    [0x7, 0x8, 0x9, 0xE],
    [0xA, 0x0, 0xB, 0xF],
];

/// Input latch: one pressed/released flag per hex key.
///
/// Written by the host once per frame, read by instructions.
#[derive(Debug, Clone, Default)]
pub struct Keypad {
    keys: [bool; 16],
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: u4, pressed: bool) {
        self.keys[key] = pressed;
    }

    /// Replaces the whole latch at once.
    pub fn refresh(&mut self, keys: [bool; 16]) {
        self.keys = keys;
    }

    pub fn is_pressed(&self, key: u4) -> bool {
        self.keys[key]
    }

    /// Lowest-numbered key currently held down.
    pub fn first_pressed(&self) -> Option<u4> {
        self.keys
            .iter()
            .position(|&down| down)
            .map(|key| u4::new(key as u8))
    }
}
