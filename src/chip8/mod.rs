mod display;
mod execute;
mod font;
mod keypad;
mod machine;
mod opcode;
mod operands;
mod quirks;
mod runner;
mod timers;
mod types;

pub use display::*;
pub use font::*;
pub use keypad::*;
pub use machine::*;
pub use opcode::*;
pub use operands::*;
pub use quirks::*;
pub use runner::*;
pub use timers::*;
pub use types::*;
