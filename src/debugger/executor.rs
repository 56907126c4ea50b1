use super::commands::{BreakpointAction, Command, CommandError, CommandResult, SetTarget};
use crate::chip8::{Chip8Error, Chip8Runner, Chip8RunnerResult, MEMORY_SIZE, Opcode};
use std::collections::HashSet;

/// Drives a [`Chip8Runner`] on behalf of the debugger UI.
pub struct Executor {
    is_running: bool,
    runner: Chip8Runner,
    breakpoints: HashSet<u16>,
}

impl Executor {
    pub fn new(runner: Chip8Runner) -> Self {
        Self {
            is_running: false,
            runner,
            breakpoints: HashSet::new(),
        }
    }

    /// Advances the machine by `dt` while in running mode. Errors and breakpoints pause it.
    pub fn poll(&mut self, dt: f32) -> Result<Chip8RunnerResult, Chip8Error> {
        if !self.is_running {
            return Ok(Chip8RunnerResult::Ok);
        }

        let result = self
            .runner
            .update_with_breakpoints(dt, Some(&self.breakpoints));

        if matches!(result, Err(_) | Ok(Chip8RunnerResult::HitBreakpoint)) {
            self.is_running = false;
        }

        result
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        match command {
            Command::Run => {
                self.execute_run();
                Ok(CommandResult::Ok)
            }
            Command::Pause => {
                self.execute_pause();
                Ok(CommandResult::Ok)
            }
            Command::Step => self.execute_step(),
            Command::Breakpoint { action } => self.handle_breakpoint(action),
            Command::Set { target, value } => self.handle_set(target, value),
            Command::Mem { start, len } => Ok(self.handle_mem(start, len)),
            Command::Disasm { start, count } => Ok(self.handle_disasm(start, count)),
            Command::Quit => Ok(CommandResult::Quit),
        }
    }

    pub fn execute_run(&mut self) {
        self.is_running = true;
    }

    pub fn execute_pause(&mut self) {
        self.is_running = false;
    }

    pub fn execute_step(&mut self) -> Result<CommandResult, CommandError> {
        self.runner.step()?;
        Ok(CommandResult::Ok)
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn runner(&self) -> &Chip8Runner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut Chip8Runner {
        &mut self.runner
    }

    fn handle_breakpoint(
        &mut self,
        action: BreakpointAction,
    ) -> Result<CommandResult, CommandError> {
        match action {
            BreakpointAction::Set { addr } => {
                if usize::from(addr) >= MEMORY_SIZE {
                    return Err(CommandError::ValueOutOfRange);
                }
                self.breakpoints.insert(addr);
            }
            BreakpointAction::Clear { addr } => {
                self.breakpoints.remove(&addr);
            }
            BreakpointAction::ClearAll => {
                self.breakpoints.clear();
            }
            BreakpointAction::List => {
                return Ok(CommandResult::BreakpointList {
                    breakpoints: {
                        let mut bps: Vec<u16> = self.breakpoints.iter().cloned().collect();
                        bps.sort();
                        bps
                    },
                });
            }
        };

        Ok(CommandResult::Ok)
    }

    fn handle_set(&mut self, target: SetTarget, value: u16) -> Result<CommandResult, CommandError> {
        let chip8 = self.runner.chip8_mut();

        match target {
            SetTarget::V(reg) => {
                chip8.v[reg] = u8::try_from(value).map_err(|_| CommandError::ValueOutOfRange)?;
            }
            SetTarget::I => {
                chip8.i = value;
            }
            SetTarget::Pc => {
                // Instructions are word aligned
                if usize::from(value) >= MEMORY_SIZE || value % 2 != 0 {
                    return Err(CommandError::ValueOutOfRange);
                }
                chip8.pc = value;
            }
        }

        Ok(CommandResult::Ok)
    }

    fn handle_mem(&self, start: u16, len: u16) -> CommandResult {
        CommandResult::MemDump {
            data: self.runner.chip8_ref().memory(start, len).to_vec(),
            offset: start,
        }
    }

    fn handle_disasm(&self, start: Option<u16>, count: u16) -> CommandResult {
        let chip8 = self.runner.chip8_ref();
        let offset = start.unwrap_or(chip8.pc());

        let instructions = chip8
            .memory(offset, count.saturating_mul(2))
            .chunks_exact(2)
            .map(|word| {
                let raw = u16::from_be_bytes([word[0], word[1]]);
                (raw, Opcode::decode(raw))
            })
            .collect();

        CommandResult::Disasm {
            instructions,
            offset,
        }
    }
}
