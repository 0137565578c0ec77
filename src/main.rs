pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use walktest::{
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    logging,
    metric::MetricKey,
    report,
    runtime::{CrosstermEventSource, FixedTicker, Runner, WalkEvent},
    Notice, Phase, Preset, Protocol, Session,
};

const TOAST_MS: u64 = 2_600;

/// six-minute walk test companion
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Guides a six-minute walk test: baseline entry, a wall-clock anchored six minute timer with per-minute recording windows, and a recovery stopwatch."
)]
pub struct Cli {
    /// recording window and Borg precision preset
    #[clap(short = 'p', long, value_enum)]
    preset: Option<Preset>,

    /// walk clock refresh interval in milliseconds
    #[clap(long)]
    tick_rate_ms: Option<u64>,

    /// recovery stopwatch refresh interval in milliseconds
    #[clap(long)]
    recovery_tick_rate_ms: Option<u64>,

    /// directory exported records are written to
    #[clap(short = 'o', long)]
    export_dir: Option<PathBuf>,

    /// log filter written to the log file, e.g. "debug" (RUST_LOG takes precedence)
    #[clap(long)]
    log_level: Option<String>,

    /// store the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Command line flags override the stored config
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(preset) = self.preset {
            cfg.preset = preset;
        }
        if let Some(ms) = self.tick_rate_ms {
            cfg.tick_rate_ms = ms;
        }
        if let Some(ms) = self.recovery_tick_rate_ms {
            cfg.recovery_tick_rate_ms = ms;
        }
        if let Some(dir) = &self.export_dir {
            cfg.export_dir = Some(dir.clone());
        }
        if let Some(level) = &self.log_level {
            cfg.log_level = level.clone();
        }
        cfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Measurement,
    Completion,
    Records,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryField {
    Minutes,
    Seconds,
}

/// Text being typed into the recovery time fields
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub minutes: String,
    pub seconds: String,
    pub focus: RecoveryField,
}

impl Default for RecoveryEntry {
    fn default() -> Self {
        Self {
            minutes: String::new(),
            seconds: String::new(),
            focus: RecoveryField::Minutes,
        }
    }
}

impl RecoveryEntry {
    fn focused(&mut self) -> &mut String {
        match self.focus {
            RecoveryField::Minutes => &mut self.minutes,
            RecoveryField::Seconds => &mut self.seconds,
        }
    }
}

/// Modal dialogs drawn over the current screen
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Entry { key: MetricKey, input: String },
    ConfirmReset,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct App<C: Clock = SystemClock> {
    pub session: Session<C>,
    pub preset: Preset,
    pub state: AppState,
    pub previous_state: AppState,
    pub overlay: Option<Overlay>,
    pub recovery_entry: RecoveryEntry,
    pub toasts: Vec<Toast>,
    pub export_dir: PathBuf,
    pub should_quit: bool,
}

impl App {
    pub fn new(cfg: &Config) -> Self {
        Self::with_session(Session::new(Protocol::from_preset(cfg.preset)), cfg)
    }
}

impl<C: Clock> App<C> {
    pub fn with_session(session: Session<C>, cfg: &Config) -> Self {
        Self {
            session,
            preset: cfg.preset,
            state: AppState::Measurement,
            previous_state: AppState::Measurement,
            overlay: None,
            recovery_entry: RecoveryEntry::default(),
            toasts: Vec::new(),
            export_dir: cfg.export_dir.clone().unwrap_or_else(AppDirs::export_dir),
            should_quit: false,
        }
    }

    pub fn toast(&mut self, message: impl Into<String>) {
        self.toasts.push(Toast {
            message: message.into(),
            expires_at: Instant::now() + Duration::from_millis(TOAST_MS),
        });
    }

    pub fn expire_toasts(&mut self) {
        let now = Instant::now();
        self.toasts.retain(|t| t.expires_at > now);
    }

    pub fn on_timer_tick(&mut self) {
        let notices = self.session.tick();
        self.on_notices(notices);
        self.expire_toasts();
    }

    fn on_notices(&mut self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::MinuteElapsed(m) => {
                    self.toast(format!("{m} min elapsed. Update each value."))
                }
                Notice::TimerCompleted => {
                    self.toast("6 min elapsed. Enter the distance and press Enter to record.");
                    self.enter_completion_if_ready();
                }
            }
        }
    }

    fn enter_completion_if_ready(&mut self) {
        if self.session.completion_ready() && self.state == AppState::Measurement {
            self.overlay = None;
            self.state = AppState::Completion;
            info!("entering completion view");
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.overlay.take() {
            Some(Overlay::Entry { key: metric, input }) => self.on_entry_key(key, metric, input),
            Some(Overlay::ConfirmReset) => self.on_confirm_reset_key(key),
            None => match self.state {
                AppState::Measurement => self.on_measurement_key(key),
                AppState::Completion => self.on_completion_key(key),
                AppState::Records => self.on_records_key(key),
                AppState::Help => {
                    self.state = self.previous_state;
                    // the timer may have finished while help was open
                    self.enter_completion_if_ready();
                }
            },
        }
    }

    fn on_measurement_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(c @ '1'..='4') => {
                let metric = MetricKey::ALL[c as usize - '1' as usize];
                self.open_entry(metric);
            }
            KeyCode::Char(' ') => self.toggle_timer(),
            KeyCode::Enter => self.commit(),
            KeyCode::Char('r') => self.overlay = Some(Overlay::ConfirmReset),
            KeyCode::Char('?') | KeyCode::Char('h') => self.show_help(),
            _ => {}
        }
    }

    fn on_completion_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => {
                self.recovery_entry.focus = match self.recovery_entry.focus {
                    RecoveryField::Minutes => RecoveryField::Seconds,
                    RecoveryField::Seconds => RecoveryField::Minutes,
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                let field = self.recovery_entry.focused();
                if field.len() < 2 {
                    field.push(c);
                }
            }
            KeyCode::Backspace => {
                self.recovery_entry.focused().pop();
            }
            KeyCode::Enter => self.save_recovery_entry(),
            KeyCode::Char('s') => self.toggle_recovery_timer(),
            KeyCode::Char('t') => self.state = AppState::Records,
            KeyCode::Char('x') => self.export(),
            KeyCode::Char('r') => self.overlay = Some(Overlay::ConfirmReset),
            KeyCode::Char('?') | KeyCode::Char('h') => self.show_help(),
            _ => {}
        }
    }

    fn on_records_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('b') | KeyCode::Backspace | KeyCode::Esc => {
                self.state = AppState::Completion
            }
            KeyCode::Char('x') => self.export(),
            KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn on_entry_key(&mut self, key: KeyEvent, metric: MetricKey, mut input: String) {
        match key.code {
            KeyCode::Esc => return,
            KeyCode::Enter => match self.session.set_pending(metric, &input) {
                Ok(_) => {
                    let label = metric.label();
                    if self.session.has_started() {
                        self.toast(format!("{label} current value updated."));
                    } else {
                        self.toast(format!("{label} baseline set."));
                    }
                    return;
                }
                Err(err) => self.toast(format!("{}: {err}", metric.label())),
            },
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                if input.len() < 7 {
                    input.push(c);
                }
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Up => input = self.stepped_entry(metric, &input, 1.0),
            KeyCode::Down => input = self.stepped_entry(metric, &input, -1.0),
            _ => {}
        }
        self.overlay = Some(Overlay::Entry { key: metric, input });
    }

    fn on_confirm_reset_key(&mut self, key: KeyEvent) {
        if let KeyCode::Char('y') | KeyCode::Enter = key.code {
            self.session.request_reset();
            self.recovery_entry = RecoveryEntry::default();
            self.toasts.clear();
            self.state = AppState::Measurement;
            self.toast("Reset. Enter the baseline values again.");
        }
    }

    fn open_entry(&mut self, metric: MetricKey) {
        let input = self
            .session
            .entry_prefill(metric)
            .map(|v| v.to_string())
            .unwrap_or_default();
        self.overlay = Some(Overlay::Entry { key: metric, input });
    }

    /// Picker-style adjustment: one step up or down, clamped to the metric range
    fn stepped_entry(&self, metric: MetricKey, input: &str, direction: f64) -> String {
        let descriptor = self.session.protocol().metrics.get(metric);
        let current = input
            .trim()
            .parse::<f64>()
            .ok()
            .or(self.session.entry_prefill(metric))
            .unwrap_or(descriptor.min);
        let next = (current + direction * descriptor.step).clamp(descriptor.min, descriptor.max);
        descriptor
            .validate_value(next)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| input.to_string())
    }

    fn toggle_timer(&mut self) {
        match self.session.toggle_timer() {
            Ok(Phase::Running) if self.session.elapsed_ms() == 0 => self.toast("Test started."),
            Ok(Phase::Running) => self.toast("Resumed."),
            Ok(Phase::Paused) => self.toast("Paused."),
            Ok(_) => {}
            Err(err) => self.toast(err.to_string()),
        }
        let notices = self.session.take_notices();
        self.on_notices(notices);
    }

    fn commit(&mut self) {
        let result = self.session.commit();
        let notices = self.session.take_notices();
        self.on_notices(notices);
        match result {
            Ok(minute) => {
                self.toast(format!("Minute {minute} values recorded."));
                self.enter_completion_if_ready();
            }
            Err(err) => self.toast(err.to_string()),
        }
    }

    fn save_recovery_entry(&mut self) {
        let RecoveryEntry {
            minutes, seconds, ..
        } = self.recovery_entry.clone();
        match self.session.set_recovery_time_raw(&minutes, &seconds) {
            Ok(time) => {
                self.fill_recovery_entry();
                self.toast(format!("Recovery time saved: {time}"));
            }
            Err(err) => self.toast(format!("Recovery time: {err}")),
        }
    }

    fn toggle_recovery_timer(&mut self) {
        if self.session.recovery_running() {
            match self.session.stop_recovery_timer() {
                Ok(time) => {
                    self.fill_recovery_entry();
                    self.toast(format!("Recovery time recorded: {time}"));
                }
                Err(err) => self.toast(err.to_string()),
            }
        } else {
            match self.session.start_recovery_timer() {
                Ok(()) => self.toast("Recovery stopwatch started."),
                Err(err) => self.toast(err.to_string()),
            }
        }
    }

    fn fill_recovery_entry(&mut self) {
        if let Some(time) = self.session.recovery_time() {
            self.recovery_entry.minutes = time.minutes.to_string();
            self.recovery_entry.seconds = time.seconds.to_string();
        }
    }

    fn export(&mut self) {
        match report::export(&self.session, &self.export_dir) {
            Ok(path) => self.toast(format!("Exported to {}", path.display())),
            Err(err) => {
                warn!(%err, "export failed");
                self.toast(format!("Export failed: {err}"));
            }
        }
    }

    fn show_help(&mut self) {
        self.previous_state = self.state;
        self.state = AppState::Help;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let cfg = cli.apply(store.load());

    let _log_guard = logging::init(&AppDirs::log_dir(), &cfg.log_level)?;
    info!(preset = %cfg.preset, "walktest starting");

    if cli.save_config {
        store.save(&cfg)?;
        info!(path = %store.path().display(), "settings saved as defaults");
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&cfg);
    let result = start_tui(&mut terminal, &mut app, &cfg);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    info!("walktest exiting");
    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    cfg: &Config,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::from_millis(cfg.tick_rate_ms),
        FixedTicker::from_millis(cfg.recovery_tick_rate_ms),
    );

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            WalkEvent::TimerTick => app.on_timer_tick(),
            WalkEvent::RecoveryTick => app.session.tick_recovery(),
            WalkEvent::Resize => {}
            WalkEvent::Key(key) => app.on_key(key),
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
