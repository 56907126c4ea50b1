use super::{DISPLAY_X, DISPLAY_Y};

pub const DISPLAY_SIZE: usize = DISPLAY_X * DISPLAY_Y;

/// Monochrome 64x32 framebuffer, stored row-major.
///
/// `dirty` is raised by any mutation and lowered by the host once it has presented the frame.
pub struct Framebuffer {
    cells: [bool; DISPLAY_SIZE],
    dirty: bool,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self {
            cells: [false; DISPLAY_SIZE],
            dirty: false,
        }
    }

    /// Unlights every cell.
    pub fn clear(&mut self) {
        self.cells.fill(false);
        self.dirty = true;
    }

    /// Flips the cell at (x, y). Returns true if the cell was lit and is now unlit.
    ///
    /// Coordinates must already be clipped to the grid.
    pub fn toggle(&mut self, x: usize, y: usize) -> bool {
        let cell = &mut self.cells[x + y * DISPLAY_X];
        *cell ^= true;
        self.dirty = true;
        !*cell
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells[x + y * DISPLAY_X]
    }

    /// Iterates the framebuffer one row at a time.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.cells.chunks_exact(DISPLAY_X)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the dirty flag and lowers it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn lit_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}
