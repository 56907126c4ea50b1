use std::collections::HashSet;

use super::{Chip8, Chip8Error, Chip8Result, Framebuffer, TIMER_TIME_STEP, TimerThread};

pub const CPU_HZ: f32 = 700.0;

/// What the runner does when an instruction faults at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Stop and hand the error to the host.
    #[default]
    Halt,
    /// Log the fault and carry on with the next instruction.
    Skip,
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Instructions executed per second of emulated time.
    pub cpu_hz: f32,
    pub fault_policy: FaultPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cpu_hz: CPU_HZ,
            fault_policy: FaultPolicy::Halt,
        }
    }
}

/// High-level emulator runner that manages timing internally.
pub struct Chip8Runner {
    chip8: Chip8,
    config: RunnerConfig,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
    timer_thread: Option<TimerThread>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Chip8RunnerResult {
    HitBreakpoint,
    Ok,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8) -> Self {
        Self::with_config(chip8, RunnerConfig::default())
    }

    pub fn with_config(chip8: Chip8, config: RunnerConfig) -> Self {
        Self {
            chip8,
            config,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
            timer_thread: None,
        }
    }

    /// Hands the timers to a dedicated 60Hz thread instead of ticking them from `update`.
    pub fn spawn_timer_thread(&mut self) -> std::io::Result<()> {
        if self.timer_thread.is_none() {
            self.timer_thread = Some(TimerThread::spawn(self.chip8.timers().clone())?);
        }
        Ok(())
    }

    /// Stops and joins the timer thread, if one is running.
    pub fn shutdown(&mut self) {
        if let Some(mut thread) = self.timer_thread.take() {
            thread.stop();
        }
    }

    /// Update emulator by delta time, handles both CPU and timer cycles.
    ///
    /// Runs as many CPU cycles and timer updates as needed based on the elapsed time `dt`.
    /// Returns early if a frame has to be rendered before the next CPU cycle.
    pub fn update(&mut self, dt: f32) -> Result<Chip8RunnerResult, Chip8Error> {
        self.update_with_breakpoints(dt, None)
    }

    /// Like `update` but checks for breakpoints after each CPU cycle.
    pub fn update_with_breakpoints(
        &mut self,
        dt: f32,
        breakpoints: Option<&HashSet<u16>>,
    ) -> Result<Chip8RunnerResult, Chip8Error> {
        self.cpu_dt_accumulator += dt;

        if self.timer_thread.is_none() {
            self.timer_dt_accumulator += dt;
            while self.timer_dt_accumulator >= TIMER_TIME_STEP {
                self.timer_dt_accumulator -= TIMER_TIME_STEP;
                self.chip8.timers_cycle();
            }
        }

        let cpu_time_step = 1.0 / self.config.cpu_hz;
        while self.cpu_dt_accumulator >= cpu_time_step {
            self.cpu_dt_accumulator -= cpu_time_step;

            let cpu_result = self.step()?;

            if let Some(breakpoints) = &breakpoints
                && breakpoints.contains(&self.chip8.pc)
            {
                self.cpu_dt_accumulator = 0.0;
                return Ok(Chip8RunnerResult::HitBreakpoint);
            }

            match cpu_result {
                Chip8Result::WaitForNextFrame => {
                    // If we need to wait for the next frame we stop executing cycles.
                    // We clear the accumulator to avoid "catching up" in the next frame.
                    self.cpu_dt_accumulator = 0.0;
                    break;
                }
                Chip8Result::Continue => {}
            }
        }

        Ok(Chip8RunnerResult::Ok)
    }

    /// Executes exactly one instruction, applying the fault policy.
    pub fn step(&mut self) -> Result<Chip8Result, Chip8Error> {
        match self.chip8.cpu_cycle() {
            Err(e) if self.config.fault_policy == FaultPolicy::Skip && e.is_skippable() => {
                log::warn!("Skipping faulting instruction: {e}");
                Ok(Chip8Result::Continue)
            }
            result => result,
        }
    }

    /// Returns true if the sound timer is active, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }

    /// Latches the host's view of all 16 keys. Hosts call this once per tick.
    pub fn set_keys(&mut self, keys: [bool; 16]) {
        self.chip8.set_keys(keys)
    }

    pub fn display(&self) -> &Framebuffer {
        self.chip8.display()
    }

    /// True once per display change.
    pub fn take_draw_dirty(&mut self) -> bool {
        self.chip8.take_draw_dirty()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }
}

impl Drop for Chip8Runner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
