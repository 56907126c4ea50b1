use clap::{Parser, Subcommand};
use clap_num::maybe_hex;

use crate::chip8::{Chip8Error, Opcode};
use crate::u4;

/// Debugger prompt grammar. Parsed with `multicall` so the first word is the command.
#[derive(Parser)]
#[command(multicall = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Resume execution
    #[command(visible_alias = "r")]
    Run,

    /// Pause execution
    #[command(visible_alias = "p")]
    Pause,

    /// Execute a single instruction
    #[command(visible_alias = "s")]
    Step,

    #[command(visible_alias = "b")]
    Breakpoint {
        #[command(subcommand)]
        action: BreakpointAction,
    },

    /// Write a register (v0-vf), the index register (i) or the program counter (pc)
    Set {
        #[arg(value_parser = parse_set_target)]
        target: SetTarget,
        #[arg(value_parser = maybe_hex::<u16>)]
        value: u16,
    },

    /// Dump memory as hex
    #[command(visible_alias = "m")]
    Mem {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "64", value_parser = maybe_hex::<u16>)]
        len: u16,
    },

    /// Disassemble instructions
    #[command(visible_alias = "d")]
    Disasm {
        /// Defaults to the program counter
        #[arg(value_parser = maybe_hex::<u16>)]
        start: Option<u16>,
        #[arg(default_value = "16", value_parser = maybe_hex::<u16>)]
        count: u16,
    },

    #[command(visible_alias = "q")]
    Quit,
}

#[derive(Debug)]
pub enum CommandResult {
    Ok,
    BreakpointList { breakpoints: Vec<u16> },
    MemDump { data: Vec<u8>, offset: u16 },
    Disasm { instructions: Vec<(u16, Opcode)>, offset: u16 },
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Error while executing cpu instruction: {0}")]
    Chip8Error(#[from] Chip8Error),
    #[error("Value out of range")]
    ValueOutOfRange,
}

#[derive(Subcommand, Clone, Debug)]
pub enum BreakpointAction {
    #[command(visible_alias = "s")]
    Set {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "c")]
    Clear {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "l")]
    List,

    #[command(visible_alias = "ca")]
    ClearAll,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetTarget {
    V(u4),
    I,
    Pc,
}

fn parse_set_target(s: &str) -> Result<SetTarget, String> {
    let lower = s.to_lowercase();

    match lower.as_str() {
        "index" | "i" => Ok(SetTarget::I),
        "pc" => Ok(SetTarget::Pc),

        _ if lower.starts_with('v') => {
            let hex_str = &lower[1..];
            match u8::from_str_radix(hex_str, 16) {
                Ok(val) if val < 16 => Ok(SetTarget::V(u4::new(val))),
                _ => Err(format!("Invalid register: '{}'", s)),
            }
        }

        _ => Err(format!("Unknown set target: '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, clap::Error> {
        Cli::try_parse_from(line.split_whitespace()).map(|cli| cli.command)
    }

    #[test]
    fn parses_set_targets() {
        assert!(matches!(
            parse("set vA 0x12").unwrap(),
            Command::Set { target: SetTarget::V(reg), value: 0x12 } if reg == u4::new(0xA)
        ));
        assert!(matches!(
            parse("set pc 0x300").unwrap(),
            Command::Set { target: SetTarget::Pc, value: 0x300 }
        ));
        assert!(parse("set v10 1").is_err());
        assert!(parse("set sp 1").is_err());
    }

    #[test]
    fn parses_aliases_and_defaults() {
        assert!(matches!(parse("s").unwrap(), Command::Step));
        assert!(matches!(
            parse("b s 0x20a").unwrap(),
            Command::Breakpoint { action: BreakpointAction::Set { addr: 0x20A } }
        ));
        assert!(matches!(
            parse("m").unwrap(),
            Command::Mem { start: 0x200, len: 64 }
        ));
        assert!(matches!(
            parse("d").unwrap(),
            Command::Disasm { start: None, count: 16 }
        ));
    }
}
