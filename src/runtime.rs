use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Unified event type consumed by the app loop
#[derive(Clone, Debug)]
pub enum WalkEvent {
    Key(KeyEvent),
    Resize,
    /// Refresh the six-minute walk clock
    TimerTick,
    /// Refresh the recovery stopwatch
    RecoveryTick,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait WalkEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<WalkEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<WalkEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                // release/repeat events only show up on some platforms
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => WalkEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => WalkEvent::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(evt).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl WalkEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<WalkEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms.max(1)))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<WalkEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<WalkEvent>) -> Self {
        Self { rx }
    }
}

impl WalkEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<WalkEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the app one event at a time, interleaving two independent tick cadences
pub struct Runner<E: WalkEventSource, T: Ticker, R: Ticker = T> {
    event_source: E,
    timer_ticker: T,
    recovery_ticker: R,
    next_timer_tick: Cell<Instant>,
    next_recovery_tick: Cell<Instant>,
}

impl<E: WalkEventSource, T: Ticker, R: Ticker> Runner<E, T, R> {
    pub fn new(event_source: E, timer_ticker: T, recovery_ticker: R) -> Self {
        let now = Instant::now();
        Self {
            next_timer_tick: Cell::new(now + timer_ticker.interval()),
            next_recovery_tick: Cell::new(now + recovery_ticker.interval()),
            event_source,
            timer_ticker,
            recovery_ticker,
        }
    }

    /// Blocks until the next event or the earlier of the two tick deadlines
    pub fn step(&self) -> WalkEvent {
        let deadline = self.next_timer_tick.get().min(self.next_recovery_tick.get());
        let timeout = deadline.saturating_duration_since(Instant::now());

        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.due_tick()
            }
        }
    }

    fn due_tick(&self) -> WalkEvent {
        let now = Instant::now();
        if self.next_timer_tick.get() <= self.next_recovery_tick.get() {
            self.next_timer_tick
                .set(reschedule(self.next_timer_tick.get(), self.timer_ticker.interval(), now));
            WalkEvent::TimerTick
        } else {
            self.next_recovery_tick.set(reschedule(
                self.next_recovery_tick.get(),
                self.recovery_ticker.interval(),
                now,
            ));
            WalkEvent::RecoveryTick
        }
    }
}

// Skip missed deadlines instead of bursting; ticks are display refreshes only.
fn reschedule(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let next = previous + interval;
    if next <= now {
        now + interval
    } else {
        next
    }
}
