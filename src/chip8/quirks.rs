/// Compatibility switches for instructions whose behavior differs between interpreters.
///
/// The default is the original COSMAC VIP behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quirks {
    /// 8XY6/8XYE shift VX in place instead of shifting VY into VX.
    pub shift_uses_vx: bool,
    /// FX55/FX65 leave I pointing past the last register copied (I += X + 1).
    pub load_store_increments_i: bool,
}

impl Quirks {
    /// Every quirk enabled.
    pub const fn all() -> Self {
        Self {
            shift_uses_vx: true,
            load_store_increments_i: true,
        }
    }
}
