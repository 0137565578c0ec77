use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;
use crate::metric::MetricKey;
use crate::protocol::Protocol;
use crate::recording::{MetricGrid, RecordingSession};
use crate::recovery::{RecoveryTime, RecoveryTimer};
use crate::timer::{Notice, Phase, TestTimer};
use crate::window::{BASELINE_MINUTE, FINAL_MINUTE};

/// Serializable copy of everything a display or export needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub elapsed_ms: u64,
    pub pending: Vec<(MetricKey, Option<f64>)>,
    pub grid: MetricGrid,
    pub recorded_minutes: BTreeSet<u8>,
    pub recovery_time: Option<RecoveryTime>,
    pub recovery_running: bool,
    pub recovery_elapsed_ms: u64,
    pub can_start: bool,
}

/// One walk test: timer, recorded values and recovery time, owned together.
///
/// Every command reads the clock itself; `tick` and `tick_recovery` only
/// refresh the readings between commands.
#[derive(Debug)]
pub struct Session<C: Clock = SystemClock> {
    protocol: Protocol,
    clock: C,
    timer: TestTimer,
    recording: RecordingSession,
    recovery: RecoveryTimer,
    recovery_time: Option<RecoveryTime>,
    notices: Vec<Notice>,
}

impl Session<SystemClock> {
    pub fn new(protocol: Protocol) -> Self {
        Self::with_clock(protocol, SystemClock::new())
    }
}

impl<C: Clock> Session<C> {
    pub fn with_clock(protocol: Protocol, clock: C) -> Self {
        Self {
            protocol,
            clock,
            timer: TestTimer::new(),
            recording: RecordingSession::new(),
            recovery: RecoveryTimer::new(),
            recovery_time: None,
            notices: Vec::new(),
        }
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    // ---- commands ----

    /// Validate an entry and make it the current value for `key`.
    /// Before the first start this also captures the baseline.
    pub fn set_pending(&mut self, key: MetricKey, raw: &str) -> Result<f64, SessionError> {
        let baseline_open = self.timer.is_pristine();
        let value =
            self.recording
                .set_pending(&self.protocol.metrics, key, raw, baseline_open)?;
        Ok(value)
    }

    /// Record the current values for the minute whose window is open now
    pub fn commit(&mut self) -> Result<u8, SessionError> {
        if !self.timer.has_started() {
            debug!("commit rejected: not started");
            return Err(SessionError::NotStarted);
        }
        self.advance();
        let minute = self
            .recording
            .commit(&self.protocol.windows, self.timer.elapsed_ms())?;
        if minute == FINAL_MINUTE && self.timer.is_completed() {
            info!("final minute recorded after completion");
        }
        Ok(minute)
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.timer.phase() == Phase::NotStarted {
            let missing = self.recording.missing_baseline(&self.protocol.metrics);
            if !missing.is_empty() {
                debug!(?missing, "start rejected: baseline incomplete");
                return Err(SessionError::MissingBaseline(missing));
            }
        }
        let now = self.clock.now_ms();
        self.timer.start(now)
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.advance();
        let now = self.clock.now_ms();
        self.timer.pause(now)
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        let now = self.clock.now_ms();
        self.timer.resume(now)
    }

    /// Single start/stop control: start, pause or resume depending on phase
    pub fn toggle_timer(&mut self) -> Result<Phase, SessionError> {
        match self.timer.phase() {
            Phase::NotStarted => self.start()?,
            Phase::Running => self.pause()?,
            Phase::Paused => self.resume()?,
            Phase::Completed => return Err(SessionError::AlreadyCompleted),
        }
        Ok(self.timer.phase())
    }

    /// Back to the initial state. Always allowed.
    pub fn request_reset(&mut self) {
        // clocks stop before anything is cleared
        self.timer = TestTimer::new();
        self.recovery = RecoveryTimer::new();
        self.recording = RecordingSession::new();
        self.recovery_time = None;
        self.notices.clear();
        info!("session reset");
    }

    pub fn set_recovery_time(
        &mut self,
        minutes: u32,
        seconds: u32,
    ) -> Result<RecoveryTime, SessionError> {
        let time = RecoveryTime::new(minutes, seconds)?;
        self.save_recovery_time(time);
        Ok(time)
    }

    /// Same as `set_recovery_time`, from the raw entry fields
    pub fn set_recovery_time_raw(
        &mut self,
        minutes: &str,
        seconds: &str,
    ) -> Result<RecoveryTime, SessionError> {
        let time = RecoveryTime::parse(minutes, seconds)?;
        self.save_recovery_time(time);
        Ok(time)
    }

    pub fn start_recovery_timer(&mut self) -> Result<(), SessionError> {
        let now = self.clock.now_ms();
        self.recovery.start(now)
    }

    pub fn stop_recovery_timer(&mut self) -> Result<RecoveryTime, SessionError> {
        let now = self.clock.now_ms();
        let time = self.recovery.stop(now)?;
        self.save_recovery_time(time);
        Ok(time)
    }

    /// Walk-timer refresh; returns the notices raised by this tick
    pub fn tick(&mut self) -> Vec<Notice> {
        let now = self.clock.now_ms();
        self.timer.tick(now)
    }

    pub fn tick_recovery(&mut self) {
        let now = self.clock.now_ms();
        self.recovery.tick(now);
    }

    /// Notices raised while a command advanced the clock
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn advance(&mut self) {
        let now = self.clock.now_ms();
        let notices = self.timer.tick(now);
        self.notices.extend(notices);
    }

    fn save_recovery_time(&mut self, time: RecoveryTime) {
        info!(%time, "recovery time saved");
        self.recovery_time = Some(time);
    }

    // ---- queries ----

    pub fn phase(&self) -> Phase {
        self.timer.phase()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.timer.elapsed_ms()
    }

    pub fn has_started(&self) -> bool {
        self.timer.has_started()
    }

    pub fn pending(&self, key: MetricKey) -> Option<f64> {
        self.recording.pending(key)
    }

    pub fn recorded(&self, key: MetricKey, minute: u8) -> Option<f64> {
        self.recording.recorded(key, minute)
    }

    pub fn grid(&self) -> &MetricGrid {
        self.recording.grid()
    }

    pub fn recorded_minutes(&self) -> &BTreeSet<u8> {
        self.recording.recorded_minutes()
    }

    pub fn is_minute_recorded(&self, minute: u8) -> bool {
        self.recording.is_minute_recorded(minute)
    }

    pub fn is_minute_complete(&self, minute: u8) -> bool {
        self.recording.is_minute_complete(minute)
    }

    pub fn has_any_value_at(&self, minute: u8) -> bool {
        self.recording.has_any_value_at(minute)
    }

    pub fn has_any_data(&self) -> bool {
        self.recording.has_any_data()
    }

    pub fn latest_recorded_minute(&self, key: MetricKey) -> Option<u8> {
        self.recording.latest_recorded_minute(key)
    }

    pub fn recovery_time(&self) -> Option<RecoveryTime> {
        self.recovery_time
    }

    pub fn recovery_running(&self) -> bool {
        self.recovery.is_running()
    }

    pub fn recovery_elapsed_ms(&self) -> u64 {
        self.recovery.elapsed_ms()
    }

    pub fn can_start(&self) -> bool {
        self.recording.can_start(&self.protocol.metrics)
    }

    /// Minute whose recording window holds the current elapsed time
    pub fn active_window_minute(&self) -> Option<u8> {
        if !self.timer.has_started() {
            return None;
        }
        self.protocol.windows.minute_at(self.timer.elapsed_ms())
    }

    /// Timer done and final minute recorded: the post-test flow may begin
    pub fn completion_ready(&self) -> bool {
        self.timer.is_completed() && self.recording.is_minute_recorded(FINAL_MINUTE)
    }

    /// Value an entry dialog should open with
    pub fn entry_prefill(&self, key: MetricKey) -> Option<f64> {
        self.recording
            .pending(key)
            .or_else(|| self.recording.recorded(key, BASELINE_MINUTE))
            .or(self.protocol.metrics.get(key).default_entry)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            elapsed_ms: self.elapsed_ms(),
            pending: MetricKey::ALL
                .iter()
                .map(|key| (*key, self.pending(*key)))
                .collect(),
            grid: self.grid().clone(),
            recorded_minutes: self.recorded_minutes().clone(),
            recovery_time: self.recovery_time,
            recovery_running: self.recovery_running(),
            recovery_elapsed_ms: self.recovery_elapsed_ms(),
            can_start: self.can_start(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ValidationError;
    use assert_matches::assert_matches;

    fn session(protocol: Protocol) -> (Session<ManualClock>, ManualClock) {
        let clock = ManualClock::starting_at(1_000_000);
        (Session::with_clock(protocol, clock.clone()), clock)
    }

    fn enter_baseline<C: Clock>(s: &mut Session<C>) {
        s.set_pending(MetricKey::Spo2, "98").unwrap();
        s.set_pending(MetricKey::Pulse, "72").unwrap();
        s.set_pending(MetricKey::Distance, "0").unwrap();
        s.set_pending(MetricKey::Borg, "0").unwrap();
    }

    #[test]
    fn test_start_requires_full_baseline() {
        let (mut s, _) = session(Protocol::standard());
        s.set_pending(MetricKey::Spo2, "98").unwrap();
        s.set_pending(MetricKey::Pulse, "72").unwrap();
        assert!(!s.can_start());
        assert_eq!(
            s.start(),
            Err(SessionError::MissingBaseline(vec![
                MetricKey::Distance,
                MetricKey::Borg
            ]))
        );
        assert_eq!(s.phase(), Phase::NotStarted);
    }

    #[test]
    fn test_baseline_only_captured_before_start() {
        let (mut s, clock) = session(Protocol::standard());
        enter_baseline(&mut s);
        s.start().unwrap();
        clock.advance(5_000);
        s.set_pending(MetricKey::Spo2, "94").unwrap();
        assert_eq!(s.pending(MetricKey::Spo2), Some(94.0));
        assert_eq!(s.recorded(MetricKey::Spo2, 0), Some(98.0));
    }

    #[test]
    fn test_commit_before_start() {
        let (mut s, _) = session(Protocol::wide());
        enter_baseline(&mut s);
        assert_eq!(s.commit(), Err(SessionError::NotStarted));
    }

    #[test]
    fn test_commit_uses_wall_clock_not_last_tick() {
        let (mut s, clock) = session(Protocol::wide());
        enter_baseline(&mut s);
        s.start().unwrap();
        clock.advance(70_000);
        // no tick since start: commit still sees 70s
        assert_eq!(s.commit(), Ok(1));
        assert_eq!(s.take_notices(), vec![Notice::MinuteElapsed(1)]);
        assert!(s.take_notices().is_empty());
    }

    #[test]
    fn test_toggle_walks_through_phases() {
        let (mut s, clock) = session(Protocol::standard());
        assert_matches!(s.toggle_timer(), Err(SessionError::MissingBaseline(_)));
        enter_baseline(&mut s);
        assert_eq!(s.toggle_timer(), Ok(Phase::Running));
        clock.advance(1_000);
        assert_eq!(s.toggle_timer(), Ok(Phase::Paused));
        assert_eq!(s.toggle_timer(), Ok(Phase::Running));
        clock.advance(400_000);
        assert_eq!(s.toggle_timer(), Err(SessionError::AlreadyCompleted));
    }

    #[test]
    fn test_pause_after_six_minutes_completes_instead() {
        let (mut s, clock) = session(Protocol::standard());
        enter_baseline(&mut s);
        s.start().unwrap();
        clock.advance(361_000);
        assert_eq!(s.pause(), Err(SessionError::AlreadyCompleted));
        assert_eq!(s.phase(), Phase::Completed);
        assert_eq!(s.elapsed_ms(), 360_000);
        assert!(s.take_notices().contains(&Notice::TimerCompleted));
    }

    #[test]
    fn test_completion_ready_needs_final_minute() {
        let (mut s, clock) = session(Protocol::standard());
        enter_baseline(&mut s);
        s.start().unwrap();
        clock.advance(360_500);
        s.tick();
        assert_eq!(s.phase(), Phase::Completed);
        assert!(!s.completion_ready());

        // baseline entries are still the current values
        s.set_pending(MetricKey::Distance, "412.5").unwrap();
        assert_eq!(s.commit(), Ok(6));
        assert!(s.completion_ready());
        assert_eq!(s.recorded(MetricKey::Distance, 6), Some(412.5));
        assert_eq!(s.recorded(MetricKey::Distance, 0), Some(0.0));
    }

    #[test]
    fn test_commit_while_paused_uses_frozen_elapsed() {
        let (mut s, clock) = session(Protocol::standard());
        enter_baseline(&mut s);
        s.start().unwrap();
        clock.advance(55_000);
        s.pause().unwrap();
        clock.advance(30_000);
        assert_eq!(s.commit(), Ok(1));
        assert_eq!(s.active_window_minute(), Some(1));
    }

    #[test]
    fn test_entry_prefill_order() {
        let (mut s, _) = session(Protocol::standard());
        assert_eq!(s.entry_prefill(MetricKey::Spo2), Some(95.0));
        assert_eq!(s.entry_prefill(MetricKey::Borg), Some(2.0));
        assert_eq!(s.entry_prefill(MetricKey::Pulse), None);
        s.set_pending(MetricKey::Spo2, "91").unwrap();
        assert_eq!(s.entry_prefill(MetricKey::Spo2), Some(91.0));
    }

    #[test]
    fn test_failed_entry_reports_validation_error() {
        let (mut s, _) = session(Protocol::standard());
        assert_eq!(
            s.set_pending(MetricKey::Pulse, "fast"),
            Err(SessionError::Validation(ValidationError::NotANumber))
        );
        assert!(!s.has_any_data());
    }

    #[test]
    fn test_recovery_last_save_wins() {
        let (mut s, clock) = session(Protocol::standard());
        s.set_recovery_time(2, 10).unwrap();
        s.start_recovery_timer().unwrap();
        clock.advance(95_000);
        s.tick_recovery();
        assert_eq!(s.recovery_elapsed_ms(), 95_000);
        // typed value untouched while the stopwatch runs
        assert_eq!(s.recovery_time(), Some(RecoveryTime::new(2, 10).unwrap()));
        let time = s.stop_recovery_timer().unwrap();
        assert_eq!((time.minutes, time.seconds), (1, 35));
        assert_eq!(s.recovery_time(), Some(time));

        s.set_recovery_time_raw("4", "").unwrap();
        assert_eq!(s.recovery_time(), Some(RecoveryTime::new(4, 0).unwrap()));
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut s, clock) = session(Protocol::wide());
        enter_baseline(&mut s);
        s.start().unwrap();
        clock.advance(70_000);
        s.commit().unwrap();
        s.start_recovery_timer().unwrap();
        s.set_recovery_time(1, 1).unwrap();

        s.request_reset();
        assert_eq!(s.phase(), Phase::NotStarted);
        assert_eq!(s.elapsed_ms(), 0);
        assert!(!s.can_start());
        assert!(!s.has_any_data());
        assert!(s.recorded_minutes().is_empty());
        assert_eq!(s.pending(MetricKey::Spo2), None);
        assert!(!s.recovery_running());
        assert_eq!(s.recovery_elapsed_ms(), 0);
        assert_eq!(s.recovery_time(), None);

        // ticks after reset observe nothing
        clock.advance(60_000);
        assert!(s.tick().is_empty());
        assert_eq!(s.elapsed_ms(), 0);
    }

    #[test]
    fn test_stop_idle_recovery_timer_is_rejected() {
        let (mut s, clock) = session(Protocol::standard());
        assert_eq!(s.stop_recovery_timer(), Err(SessionError::NotRunning));
        assert_eq!(s.recovery_time(), None);

        s.start_recovery_timer().unwrap();
        clock.advance(3_000);
        s.stop_recovery_timer().unwrap();
        // stopping twice does not overwrite the saved time
        clock.advance(3_000);
        assert_eq!(s.stop_recovery_timer(), Err(SessionError::NotRunning));
        assert_eq!(s.recovery_time().map(|t| t.seconds), Some(3));
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let (mut s, _) = session(Protocol::standard());
        enter_baseline(&mut s);
        let snap = s.snapshot();
        assert!(snap.can_start);
        assert_eq!(snap.phase, Phase::NotStarted);
        assert_eq!(snap.pending[0], (MetricKey::Spo2, Some(98.0)));
        assert_eq!(snap.grid.get(MetricKey::Borg, 0), Some(0.0));
    }
}
