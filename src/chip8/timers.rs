use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

pub const TIMER_HZ: f32 = 60.0;
pub const TIMER_TIME_STEP: f32 = 1.0 / TIMER_HZ;

/// Delay and sound timers.
///
/// Each counter is updated with a single atomic read-modify-write so that a timer thread
/// and the CPU never observe a torn value.
#[derive(Debug, Default)]
pub struct Timers {
    delay: AtomicU8,
    sound: AtomicU8,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decrements both timers by one, stopping at zero.
    pub fn tick(&self) {
        decrement(&self.delay);
        decrement(&self.sound);
    }

    pub fn delay(&self) -> u8 {
        self.delay.load(Ordering::Acquire)
    }

    pub fn set_delay(&self, value: u8) {
        self.delay.store(value, Ordering::Release);
    }

    pub fn sound(&self) -> u8 {
        self.sound.load(Ordering::Acquire)
    }

    pub fn set_sound(&self, value: u8) {
        self.sound.store(value, Ordering::Release);
    }
}

fn decrement(counter: &AtomicU8) {
    // Err means the counter is already zero, nothing to do.
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
}

/// Background thread ticking a shared [`Timers`] at 60Hz.
///
/// The thread is joined by [`TimerThread::stop`] or when the handle is dropped.
pub struct TimerThread {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TimerThread {
    pub fn spawn(timers: Arc<Timers>) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let period = Duration::from_secs_f32(TIMER_TIME_STEP);

        let handle = thread::Builder::new().name("chip8-timers".into()).spawn({
            let running = running.clone();
            move || {
                while running.load(Ordering::Acquire) {
                    thread::sleep(period);
                    timers.tick();
                }
            }
        })?;

        log::debug!("Timer thread started");
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Timer thread panicked");
            }
            log::debug!("Timer thread stopped");
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop();
    }
}
