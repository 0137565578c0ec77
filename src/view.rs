//! Display state derived from a [`Session`]. Nothing here mutates the session.

use crate::clock::Clock;
use crate::metric::{Metric, MetricKey};
use crate::recovery::RecoveryTime;
use crate::session::Session;
use crate::timer::Phase;
use crate::window::{required_metrics, BASELINE_MINUTE, FINAL_MINUTE, MINUTES};

/// `mm:ss`, used for both the walk clock and the recovery stopwatch
pub fn format_clock(elapsed_ms: u64) -> String {
    let minutes = elapsed_ms / 60_000;
    let seconds = (elapsed_ms % 60_000) / 1000;
    format!("{minutes:02}:{seconds:02}")
}

/// Value with unit; one-decimal metrics drop a trailing `.0`
pub fn format_value(value: f64, metric: &Metric) -> String {
    let number = if metric.decimals > 0 {
        let fixed = format!("{value:.1}");
        fixed.strip_suffix(".0").map(str::to_string).unwrap_or(fixed)
    } else {
        format!("{}", value.round())
    };
    format!("{number}{}", metric.unit)
}

pub fn format_recovery(time: Option<RecoveryTime>) -> String {
    match time {
        Some(t) => format!("{}:{:02}", t.minutes, t.seconds),
        None => "not entered".to_string(),
    }
}

pub fn minute_label(minute: u8) -> String {
    match minute {
        BASELINE_MINUTE => "Start".to_string(),
        m => format!("{m} min"),
    }
}

/// What the operator should be doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCue {
    BeforeStart,
    /// A recording window is open; `recorded` once it has been committed
    Minute { minute: u8, recorded: bool },
    Measuring,
    Finished,
}

impl std::fmt::Display for InputCue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputCue::BeforeStart => write!(f, "Before start"),
            InputCue::Minute {
                minute,
                recorded: false,
            } => write!(f, "Enter minute {minute} values"),
            InputCue::Minute {
                minute,
                recorded: true,
            } => write!(f, "Minute {minute} recorded"),
            InputCue::Measuring => write!(f, "Measuring"),
            InputCue::Finished => write!(f, "Finished"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteBadge {
    pub minute: u8,
    /// every required metric recorded
    pub completed: bool,
    /// this minute's window is open (baseline: ready to start)
    pub active: bool,
    /// something recorded but not complete
    pub partial: bool,
}

/// Caption of the single start/stop control
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TimerControl {
    #[strum(serialize = "Enter baseline")]
    EnterBaseline,
    #[strum(serialize = "Start")]
    Start,
    #[strum(serialize = "Stop")]
    Pause,
    #[strum(serialize = "Resume")]
    Resume,
    #[strum(serialize = "Done")]
    Done,
}

impl TimerControl {
    pub fn enabled(self) -> bool {
        !matches!(self, TimerControl::EnterBaseline | TimerControl::Done)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStatus {
    NotEntered,
    Baseline,
    Minute(u8),
    FinalDistance,
}

impl std::fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricStatus::NotEntered => write!(f, "not entered"),
            MetricStatus::Baseline => write!(f, "baseline set"),
            MetricStatus::Minute(m) => write!(f, "minute {m} recorded"),
            MetricStatus::FinalDistance => write!(f, "final distance recorded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricPanel {
    pub key: MetricKey,
    pub current: String,
    pub status: MetricStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub minute: u8,
    pub label: String,
    pub cells: Vec<String>,
}

/// Everything a screen needs, computed in one pass
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub clock: String,
    pub phase: Phase,
    pub cue: InputCue,
    pub control: TimerControl,
    pub commit_enabled: bool,
    pub reset_enabled: bool,
    pub panels: Vec<MetricPanel>,
    pub badges: Vec<MinuteBadge>,
    pub completion_ready: bool,
    pub recovery_clock: String,
    pub recovery_running: bool,
    pub recovery_time: Option<RecoveryTime>,
}

impl SessionView {
    pub fn new<C: Clock>(session: &Session<C>) -> Self {
        Self {
            clock: format_clock(session.elapsed_ms()),
            phase: session.phase(),
            cue: input_cue(session),
            control: timer_control(session),
            commit_enabled: session.has_started() && !session.completion_ready(),
            reset_enabled: session.has_started()
                || session.has_any_data()
                || session.elapsed_ms() > 0,
            panels: metric_panels(session),
            badges: minute_badges(session),
            completion_ready: session.completion_ready(),
            recovery_clock: format_clock(session.recovery_elapsed_ms()),
            recovery_running: session.recovery_running(),
            recovery_time: session.recovery_time(),
        }
    }
}

impl<C: Clock> From<&Session<C>> for SessionView {
    fn from(session: &Session<C>) -> Self {
        SessionView::new(session)
    }
}

pub fn input_cue<C: Clock>(session: &Session<C>) -> InputCue {
    if !session.has_started() {
        return InputCue::BeforeStart;
    }
    if session.completion_ready() {
        return InputCue::Finished;
    }
    if let Some(minute) = session.active_window_minute() {
        return InputCue::Minute {
            minute,
            recorded: session.is_minute_recorded(minute),
        };
    }
    if session.phase() == Phase::Completed {
        InputCue::Finished
    } else {
        InputCue::Measuring
    }
}

pub fn timer_control<C: Clock>(session: &Session<C>) -> TimerControl {
    match session.phase() {
        Phase::NotStarted if session.can_start() => TimerControl::Start,
        Phase::NotStarted => TimerControl::EnterBaseline,
        Phase::Running => TimerControl::Pause,
        Phase::Paused => TimerControl::Resume,
        Phase::Completed => TimerControl::Done,
    }
}

pub fn metric_status<C: Clock>(session: &Session<C>, key: MetricKey) -> MetricStatus {
    match session.latest_recorded_minute(key) {
        None => MetricStatus::NotEntered,
        Some(BASELINE_MINUTE) => MetricStatus::Baseline,
        Some(FINAL_MINUTE) if key == MetricKey::Distance => MetricStatus::FinalDistance,
        Some(m) => MetricStatus::Minute(m),
    }
}

pub fn metric_panels<C: Clock>(session: &Session<C>) -> Vec<MetricPanel> {
    session
        .protocol()
        .metrics
        .iter()
        .map(|metric| MetricPanel {
            key: metric.key,
            current: session
                .pending(metric.key)
                .map(|v| format_value(v, metric))
                .unwrap_or_else(|| "--".to_string()),
            status: metric_status(session, metric.key),
        })
        .collect()
}

pub fn minute_badges<C: Clock>(session: &Session<C>) -> Vec<MinuteBadge> {
    let open_minute = session.active_window_minute();
    MINUTES
        .map(|minute| {
            let completed = session.is_minute_complete(minute);
            let (active, partial) = if minute == BASELINE_MINUTE {
                (
                    !session.has_started() && completed,
                    !completed && session.has_any_value_at(minute),
                )
            } else {
                (
                    open_minute == Some(minute),
                    !completed && session.is_minute_recorded(minute),
                )
            };
            MinuteBadge {
                minute,
                completed,
                active,
                partial,
            }
        })
        .collect()
}

/// Minutes 0..=6 by metric in record-table order
pub fn record_rows<C: Clock>(session: &Session<C>) -> Vec<RecordRow> {
    let metrics = &session.protocol().metrics;
    MINUTES
        .map(|minute| RecordRow {
            minute,
            label: minute_label(minute),
            cells: MetricKey::ALL
                .iter()
                .map(|key| {
                    session
                        .recorded(*key, minute)
                        .map(|v| format_value(v, metrics.get(*key)))
                        .unwrap_or_else(|| "--".to_string())
                })
                .collect(),
        })
        .collect()
}

/// Metrics still needed to complete `minute`, for prompts
pub fn missing_for_minute<C: Clock>(session: &Session<C>, minute: u8) -> Vec<MetricKey> {
    required_metrics(minute)
        .iter()
        .copied()
        .filter(|key| session.recorded(*key, minute).is_none())
        .collect()
}
