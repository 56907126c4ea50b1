use std::{sync::Arc, time::Instant};

use anyhow::Context;
use pixels::{Pixels, SurfaceTexture};
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source, source::SquareWave};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use chip8_vm::chip8::{Chip8Runner, DISPLAY_X, DISPLAY_Y, Framebuffer};

use crate::{Rgb, keymap};

/// Initial window size in screen pixels per CHIP-8 pixel.
const SCALE: u32 = 10;
const TONE_HZ: f32 = 440.0;

/// Square-wave tone, audible while the sound timer runs.
struct Beeper {
    _stream: OutputStream,
    sink: Sink,
}

impl Beeper {
    fn open() -> anyhow::Result<Self> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .context("Failed to open audio output stream")?;
        stream.log_on_drop(false);

        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        sink.append(SquareWave::new(TONE_HZ).amplify(0.25));

        Ok(Self {
            _stream: stream,
            sink,
        })
    }

    fn set_playing(&self, playing: bool) {
        match (playing, self.sink.is_paused()) {
            (true, true) => self.sink.play(),
            (false, false) => self.sink.pause(),
            _ => {}
        }
    }
}

struct Screen {
    window: Arc<Window>,
    pixels: Pixels<'static>,
}

impl Screen {
    fn open(event_loop: &ActiveEventLoop) -> anyhow::Result<Self> {
        let (width, height) = (DISPLAY_X as u32, DISPLAY_Y as u32);
        let attributes = Window::default_attributes()
            .with_title("chip8-vm")
            .with_inner_size(LogicalSize::new(width * SCALE, height * SCALE))
            .with_min_inner_size(LogicalSize::new(width, height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("Failed to create window")?,
        );

        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
        let pixels =
            Pixels::new(width, height, surface).context("Failed to create pixels surface")?;

        Ok(Self { window, pixels })
    }

    /// Copies the framebuffer into the RGBA frame, one row at a time.
    fn paint(&mut self, framebuffer: &Framebuffer, [bg, fg]: [Rgb; 2]) {
        let lines = self.pixels.frame_mut().chunks_exact_mut(DISPLAY_X * 4);
        for (line, row) in lines.zip(framebuffer.rows()) {
            for (pixel, &lit) in line.chunks_exact_mut(4).zip(row) {
                let [r, g, b] = if lit { fg } else { bg };
                pixel.copy_from_slice(&[r, g, b, 0xFF]);
            }
        }
    }
}

struct App {
    runner: Chip8Runner,
    colors: [Rgb; 2],
    beeper: Beeper,
    /// Created once the event loop resumes.
    screen: Option<Screen>,
    /// Keys currently down, latched into the machine once per frame.
    held: [bool; 16],
    last_frame: Instant,
    /// First error raised inside the event loop; returned from `run`.
    result: anyhow::Result<()>,
}

impl App {
    fn frame(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.runner.set_keys(self.held);
        self.runner.update(dt).context("CHIP-8 execution halted")?;
        self.beeper.set_playing(self.runner.should_beep());

        let Some(screen) = self.screen.as_mut() else {
            return Ok(());
        };
        if self.runner.take_draw_dirty() {
            screen.paint(self.runner.display(), self.colors);
        }
        screen.pixels.render().context("Failed to render frame")?;
        screen.window.request_redraw();
        Ok(())
    }

    fn on_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => match &event.logical_key {
                Key::Named(NamedKey::Escape) => event_loop.exit(),
                Key::Character(text) => {
                    if let Some(key) = text.chars().next().and_then(keymap::hex_key) {
                        self.held[usize::from(key)] = event.state == ElementState::Pressed;
                    }
                }
                _ => {}
            },
            WindowEvent::Resized(size) => {
                if let Some(screen) = self.screen.as_mut() {
                    screen
                        .pixels
                        .resize_surface(size.width, size.height)
                        .context("Failed to resize pixels surface")?;
                }
            }
            WindowEvent::RedrawRequested => self.frame()?,
            _ => {}
        }
        Ok(())
    }

    /// Keeps the first error and stops the event loop on it.
    fn settle(&mut self, event_loop: &ActiveEventLoop, result: anyhow::Result<()>) {
        if let Err(e) = result {
            self.result = Err(e);
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.screen.is_some() {
            return;
        }

        let opened = Screen::open(event_loop).map(|mut screen| {
            screen.paint(self.runner.display(), self.colors);
            screen.window.request_redraw();
            self.screen = Some(screen);
        });
        self.last_frame = Instant::now();
        self.settle(event_loop, opened);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let result = self.on_window_event(event_loop, event);
        self.settle(event_loop, result);
    }
}

/// Runs the machine in a window until it is closed or the machine faults.
pub fn run(runner: Chip8Runner, bg: Rgb, fg: Rgb) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        runner,
        colors: [bg, fg],
        beeper: Beeper::open()?,
        screen: None,
        held: [false; 16],
        last_frame: Instant::now(),
        result: Ok(()),
    };
    event_loop
        .run_app(&mut app)
        .context("Event loop terminated abnormally")?;

    app.runner.shutdown();
    app.result
}
