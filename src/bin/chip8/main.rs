mod keymap;
mod tui;
mod window;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use chip8_vm::chip8::{
    Chip8, Chip8Runner, FaultPolicy, MAX_ROM_SIZE, Quirks, RunnerConfig,
};

/// RGB color used by the window frontend.
pub type Rgb = [u8; 3];

const DEFAULT_BG: Rgb = [0x00, 0x00, 0x00];
const DEFAULT_FG: Rgb = [0x00, 0xFF, 0x00];

/// CHIP-8 virtual machine.
///
/// Keys 1-4, Q-R, A-F, Z-V map to CHIP-8 keys.
/// Escape is used to exit the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    #[arg(long)]
    rom: PathBuf,

    /// Shift VX in place (8XY6/8XYE) and advance I after FX55/FX65
    #[arg(long)]
    quirks: bool,

    /// Instructions executed per second
    #[arg(long, default_value_t = 700, value_parser = clap::value_parser!(u32).range(1..))]
    freq: u32,

    /// Open the terminal debugger instead of a window
    #[arg(long)]
    debug: bool,

    /// Background and foreground colors as RRGGBB hex
    #[arg(long, num_args = 2, value_names = ["BG", "FG"], value_parser = parse_color)]
    colors: Option<Vec<Rgb>>,

    /// Log and step over unknown opcodes and stack faults instead of halting
    #[arg(long)]
    skip_unknown: bool,

    /// Decrement the timers from a dedicated thread
    #[arg(long)]
    timer_thread: bool,
}

fn parse_color(s: &str) -> Result<Rgb, String> {
    let hex = s.trim_start_matches('#');
    let value = match hex.len() {
        6 => u32::from_str_radix(hex, 16).ok(),
        _ => None,
    }
    .ok_or_else(|| format!("Invalid color '{s}', expected RRGGBB"))?;

    let [_, r, g, b] = value.to_be_bytes();
    Ok([r, g, b])
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stderr belongs to the terminal UI in debug mode
    let default_level = if args.debug {
        LevelFilter::Off
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let rom = std::fs::read(&args.rom)
        .with_context(|| format!("Failed to read ROM file {}", args.rom.display()))?;
    log::info!("ROM {} ({} of {} bytes)", args.rom.display(), rom.len(), MAX_ROM_SIZE);

    let quirks = if args.quirks {
        Quirks::all()
    } else {
        Quirks::default()
    };

    let mut chip8 = Chip8::with_quirks(quirks);
    chip8
        .load(&rom)
        .context("Failed to load ROM into CHIP-8 memory")?;

    let config = RunnerConfig {
        cpu_hz: args.freq as f32,
        fault_policy: if args.skip_unknown {
            FaultPolicy::Skip
        } else {
            FaultPolicy::Halt
        },
    };
    let mut runner = Chip8Runner::with_config(chip8, config);
    if args.timer_thread {
        runner
            .spawn_timer_thread()
            .context("Failed to start timer thread")?;
    }

    if args.debug {
        tui::run(runner)
    } else {
        let [bg, fg] = match args.colors.as_deref() {
            Some(&[bg, fg]) => [bg, fg],
            _ => [DEFAULT_BG, DEFAULT_FG],
        };
        window::run(runner, bg, fg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colors() {
        assert_eq!(parse_color("1a2B3c"), Ok([0x1A, 0x2B, 0x3C]));
        assert_eq!(parse_color("#FFFFFF"), Ok([0xFF; 3]));
        assert!(parse_color("FFF").is_err());
        assert!(parse_color("GGGGGG").is_err());
    }

    #[test]
    fn parses_full_command_line() {
        let args = Args::try_parse_from([
            "chip8", "--rom", "pong.ch8", "--quirks", "--freq", "500", "--colors", "000000",
            "FFFFFF",
        ])
        .unwrap();
        assert!(args.quirks);
        assert_eq!(args.freq, 500);
        assert_eq!(args.colors, Some(vec![[0; 3], [0xFF; 3]]));
        assert!(!args.debug);
    }

    #[test]
    fn rom_is_required() {
        assert!(Args::try_parse_from(["chip8"]).is_err());
        assert!(Args::try_parse_from(["chip8", "--rom", "x", "--freq", "0"]).is_err());
    }
}
