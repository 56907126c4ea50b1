use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Paragraph},
};

use chip8_vm::{
    chip8::{Chip8, Chip8Runner, Chip8RunnerResult, DISPLAY_X, DISPLAY_Y, KEYPAD_LAYOUT},
    debugger::{Cli, Command, CommandError, CommandResult, Executor},
    u4,
};

use crate::keymap;

/// Most terminals only report presses (and autorepeats), so a key stays held this long
/// after the last one.
const KEY_HOLD: Duration = Duration::from_millis(50);
const TICK: Duration = Duration::from_millis(16);
const LOG_LINES: usize = 500;

/// Two framebuffer rows per terminal row.
const SCREEN_ROWS: u16 = DISPLAY_Y as u16 / 2;

struct Debugger {
    executor: Executor,
    prompt: String,
    log: Vec<String>,
    repeat: Option<Command>,
    pressed_at: [Option<Instant>; 16],
    quit: bool,
}

impl Debugger {
    fn new(runner: Chip8Runner) -> Self {
        Self {
            executor: Executor::new(runner),
            prompt: String::new(),
            log: vec!["paused; type `run` to start, Esc to pause again".to_string()],
            repeat: None,
            pressed_at: [None; 16],
            quit: false,
        }
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        let mut last = Instant::now();

        while !self.quit {
            let now = Instant::now();
            self.tick(now, now.duration_since(last).as_secs_f32());
            last = now;

            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(TICK)?
                && let Event::Key(key) = event::read()?
            {
                self.on_key(key);
            }
        }

        Ok(())
    }

    fn chip8(&self) -> &Chip8 {
        self.executor.runner().chip8_ref()
    }

    /// Latches the keypad, then lets the machine run for `dt` if it is not paused.
    fn tick(&mut self, now: Instant, dt: f32) {
        let held = self
            .pressed_at
            .map(|at| at.is_some_and(|at| now.duration_since(at) <= KEY_HOLD));
        self.executor.runner_mut().set_keys(held);

        match self.executor.poll(dt) {
            Ok(Chip8RunnerResult::Ok) => {}
            Ok(Chip8RunnerResult::HitBreakpoint) => {
                let pc = self.chip8().pc();
                self.say(format!("breakpoint at {pc:03X}"));
            }
            Err(e) => self.say(format!("halted: {e}")),
        }
    }

    fn say(&mut self, text: impl AsRef<str>) {
        self.log.extend(text.as_ref().lines().map(str::to_owned));
        let excess = self.log.len().saturating_sub(LOG_LINES);
        self.log.drain(..excess);
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit = true;
        } else if self.executor.is_running() {
            self.on_game_key(key);
        } else if key.kind != KeyEventKind::Release {
            self.on_prompt_key(key);
        }
    }

    fn on_game_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.executor.execute_pause();
                self.say("paused");
            }
            KeyCode::Char(c) => {
                if let Some(hex) = keymap::hex_key(c) {
                    self.pressed_at[usize::from(hex)] =
                        (key.kind != KeyEventKind::Release).then(Instant::now);
                }
            }
            _ => {}
        }
    }

    fn on_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.quit = true,
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace => {
                self.prompt.pop();
            }
            KeyCode::Char(c) => self.prompt.push(c),
            _ => {}
        }
    }

    fn submit(&mut self) {
        let line = std::mem::take(&mut self.prompt);
        let line = line.trim();

        let command = if line.is_empty() {
            // An empty line repeats the last command, so Enter keeps stepping
            match self.repeat.clone() {
                Some(command) => command,
                None => return,
            }
        } else {
            self.say(format!("> {line}"));
            match Cli::try_parse_from(line.split_whitespace()) {
                Ok(cli) => cli.command,
                Err(e) => {
                    self.repeat = None;
                    self.say(e.to_string());
                    return;
                }
            }
        };

        self.repeat = Some(command.clone());
        let reply = self.executor.execute(command);
        self.report(reply);
    }

    fn report(&mut self, reply: Result<CommandResult, CommandError>) {
        match reply {
            Ok(CommandResult::Ok) => {}
            Ok(CommandResult::Quit) => self.quit = true,
            Ok(CommandResult::BreakpointList { breakpoints }) if breakpoints.is_empty() => {
                self.say("no breakpoints");
            }
            Ok(CommandResult::BreakpointList { breakpoints }) => {
                let list: Vec<String> = breakpoints.iter().map(|a| format!("{a:03X}")).collect();
                self.say(format!("breakpoints: {}", list.join(" ")));
            }
            Ok(CommandResult::MemDump { data, offset }) => {
                for (row, bytes) in data.chunks(16).enumerate() {
                    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
                    let addr = usize::from(offset) + row * 16;
                    self.say(format!("{addr:03X}  {}", hex.join(" ")));
                }
            }
            Ok(CommandResult::Disasm {
                instructions,
                offset,
            }) => {
                for (n, (raw, opcode)) in instructions.iter().enumerate() {
                    let addr = usize::from(offset) + n * 2;
                    self.say(format!("{addr:03X}  {raw:04X}  {opcode}"));
                }
            }
            Err(e) => self.say(format!("error: {e}")),
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let [top, log, prompt] = Layout::vertical([
            Constraint::Length(SCREEN_ROWS + 2),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .areas(frame.area());
        let [screen, machine] =
            Layout::horizontal([Constraint::Length(DISPLAY_X as u16 + 2), Constraint::Min(26)])
                .areas(top);

        frame.render_widget(self.screen(), screen);
        frame.render_widget(self.machine(), machine);
        frame.render_widget(self.log_tail(log.height.saturating_sub(2)), log);
        frame.render_widget(self.prompt_line(), prompt);
    }

    fn screen(&self) -> Paragraph<'static> {
        let rows: Vec<&[bool]> = self.chip8().display().rows().collect();
        let lines: Vec<Line> = rows
            .chunks_exact(2)
            .map(|pair| {
                let text: String = pair[0]
                    .iter()
                    .zip(pair[1])
                    .map(|(&top, &bottom)| match (top, bottom) {
                        (true, true) => '█',
                        (true, false) => '▀',
                        (false, true) => '▄',
                        (false, false) => ' ',
                    })
                    .collect();
                Line::from(text)
            })
            .collect();

        Paragraph::new(lines)
            .green()
            .block(Block::bordered().title(" Screen "))
    }

    fn machine(&self) -> Paragraph<'static> {
        let chip8 = self.chip8();
        let config = self.executor.runner().config();
        let quirks = chip8.quirks();
        let timers = chip8.timers();

        let (state, color) = if self.executor.is_running() {
            ("RUNNING", Color::Green)
        } else {
            ("PAUSED", Color::Yellow)
        };

        let mut lines = vec![
            Line::from(vec![
                Span::styled(state, Style::new().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(format!("  {:.0} Hz", config.cpu_hz)),
            ]),
            Line::from(format!(
                "shift v{}  save {}",
                if quirks.shift_uses_vx { 'x' } else { 'y' },
                if quirks.load_store_increments_i { "i+" } else { "i" },
            )),
            Line::from(format!("on fault: {:?}", config.fault_policy)),
            Line::default(),
            Line::from(format!("PC {:03X}   I {:03X}", chip8.pc(), chip8.index())),
            Line::from(format!("DT {:02X}    ST {:02X}", timers.delay(), timers.sound())),
        ];

        lines.extend(chip8.registers().chunks_exact(4).enumerate().map(|(row, regs)| {
            let cells: Vec<String> = regs
                .iter()
                .enumerate()
                .map(|(col, value)| format!("V{:X}={value:02X}", row * 4 + col))
                .collect();
            Line::from(cells.join(" "))
        }));
        lines.push(Line::default());

        let keypad = chip8.keypad();
        lines.extend(KEYPAD_LAYOUT.iter().map(|row| {
            let keys: Vec<Span> = row
                .iter()
                .flat_map(|&key| {
                    let style = if keypad.is_pressed(u4::new(key)) {
                        Style::new().add_modifier(Modifier::REVERSED)
                    } else {
                        Style::new()
                    };
                    [Span::styled(format!("{key:X}"), style), Span::raw(" ")]
                })
                .collect();
            Line::from(keys)
        }));

        // Innermost frames first
        let stack = chip8.stack();
        let frames: Vec<String> = stack.iter().rev().take(4).map(|a| format!("{a:03X}")).collect();
        lines.push(Line::from(format!("stack {:>2}: {}", stack.len(), frames.join(" "))));

        Paragraph::new(lines).block(Block::bordered().title(" Machine "))
    }

    fn log_tail(&self, rows: u16) -> Paragraph<'_> {
        let start = self.log.len().saturating_sub(usize::from(rows));
        let lines: Vec<Line> = self.log[start..]
            .iter()
            .map(|line| Line::from(line.as_str()))
            .collect();

        Paragraph::new(lines).block(Block::bordered().title(" Log "))
    }

    fn prompt_line(&self) -> Paragraph<'_> {
        let title = if self.executor.is_running() {
            " Esc to pause "
        } else {
            " Command "
        };

        Paragraph::new(Line::from(vec![Span::raw("> ").dim(), Span::raw(&self.prompt)]))
            .block(Block::bordered().title(title))
    }
}

/// Runs the terminal debugger until the user quits. The machine starts paused.
pub fn run(runner: Chip8Runner) -> anyhow::Result<()> {
    let mut debugger = Debugger::new(runner);

    let mut terminal = ratatui::init();
    let result = debugger.run(&mut terminal);
    ratatui::restore();

    debugger.executor.runner_mut().shutdown();
    result
}
