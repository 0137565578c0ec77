use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SessionError, ValidationError};

pub const MAX_RECOVERY_MINUTES: u32 = 30;

/// Time the patient needed to return to baseline after the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryTime {
    pub minutes: u32,
    pub seconds: u32,
}

impl RecoveryTime {
    pub fn new(minutes: u32, seconds: u32) -> Result<Self, ValidationError> {
        if minutes > MAX_RECOVERY_MINUTES {
            return Err(ValidationError::OutOfRange {
                min: 0.0,
                max: MAX_RECOVERY_MINUTES as f64,
            });
        }
        if seconds > 59 {
            return Err(ValidationError::OutOfRange {
                min: 0.0,
                max: 59.0,
            });
        }
        Ok(Self { minutes, seconds })
    }

    /// Parse the two entry fields. A blank field counts as zero, but not both.
    pub fn parse(minutes: &str, seconds: &str) -> Result<Self, ValidationError> {
        let (minutes, seconds) = (minutes.trim(), seconds.trim());
        if minutes.is_empty() && seconds.is_empty() {
            return Err(ValidationError::Empty);
        }
        Self::new(parse_field(minutes)?, parse_field(seconds)?)
    }

    pub fn from_elapsed_ms(elapsed_ms: u64) -> Self {
        let total_secs = elapsed_ms / 1000;
        Self {
            minutes: (total_secs / 60) as u32,
            seconds: (total_secs % 60) as u32,
        }
    }
}

impl std::fmt::Display for RecoveryTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m {:02}s", self.minutes, self.seconds)
    }
}

fn parse_field(raw: &str) -> Result<u32, ValidationError> {
    if raw.is_empty() {
        return Ok(0);
    }
    match raw.parse::<i64>() {
        Ok(v) if v < 0 => Err(ValidationError::OutOfRange {
            min: 0.0,
            max: MAX_RECOVERY_MINUTES as f64,
        }),
        Ok(v) => u32::try_from(v).map_err(|_| ValidationError::NotANumber),
        Err(_) => Err(ValidationError::NotANumber),
    }
}

/// Post-walk stopwatch. Stopping it overwrites any typed recovery time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryTimer {
    running: bool,
    elapsed_ms: u64,
    start_epoch: Option<u64>,
}

impl RecoveryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Continues from the last reading if stopped earlier
    pub fn start(&mut self, now: u64) -> Result<(), SessionError> {
        if self.running {
            return Err(SessionError::AlreadyRunning);
        }
        self.start_epoch = Some(now.saturating_sub(self.elapsed_ms));
        self.running = true;
        info!(elapsed_ms = self.elapsed_ms, "recovery stopwatch started");
        Ok(())
    }

    pub fn stop(&mut self, now: u64) -> Result<RecoveryTime, SessionError> {
        if !self.running {
            return Err(SessionError::NotRunning);
        }
        self.tick(now);
        self.running = false;
        self.start_epoch = None;
        let time = RecoveryTime::from_elapsed_ms(self.elapsed_ms);
        info!(%time, "recovery stopwatch stopped");
        Ok(time)
    }

    pub fn tick(&mut self, now: u64) {
        if let (true, Some(epoch)) = (self.running, self.start_epoch) {
            self.elapsed_ms = self.elapsed_ms.max(now.saturating_sub(epoch));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_recovery_time_bounds() {
        assert!(RecoveryTime::new(30, 59).is_ok());
        assert!(RecoveryTime::new(0, 0).is_ok());
        assert_matches!(
            RecoveryTime::new(5, 75),
            Err(ValidationError::OutOfRange { max, .. }) if max == 59.0
        );
        assert_matches!(
            RecoveryTime::new(31, 0),
            Err(ValidationError::OutOfRange { max, .. }) if max == 30.0
        );
    }

    #[test]
    fn test_parse_fields() {
        assert_eq!(RecoveryTime::parse("", ""), Err(ValidationError::Empty));
        assert_eq!(RecoveryTime::parse(" ", "  "), Err(ValidationError::Empty));
        assert_eq!(
            RecoveryTime::parse("2", ""),
            Ok(RecoveryTime {
                minutes: 2,
                seconds: 0
            })
        );
        assert_eq!(
            RecoveryTime::parse("", "45"),
            Ok(RecoveryTime {
                minutes: 0,
                seconds: 45
            })
        );
        assert_eq!(RecoveryTime::parse("x", "1"), Err(ValidationError::NotANumber));
        assert_matches!(
            RecoveryTime::parse("-1", "0"),
            Err(ValidationError::OutOfRange { .. })
        );
    }

    #[test]
    fn test_from_elapsed_truncates_to_seconds() {
        let t = RecoveryTime::from_elapsed_ms(95_999);
        assert_eq!((t.minutes, t.seconds), (1, 35));
        assert_eq!(t.to_string(), "1m 35s");
    }

    #[test]
    fn test_stopwatch_start_stop() {
        let mut sw = RecoveryTimer::new();
        sw.start(1_000).unwrap();
        assert!(sw.is_running());
        assert_eq!(sw.start(2_000), Err(SessionError::AlreadyRunning));
        sw.tick(50_000);
        assert_eq!(sw.elapsed_ms(), 49_000);
        let time = sw.stop(96_000).unwrap();
        assert_eq!(
            time,
            RecoveryTime {
                minutes: 1,
                seconds: 35
            }
        );
        assert!(!sw.is_running());
    }

    #[test]
    fn test_stop_when_idle_fails() {
        let mut sw = RecoveryTimer::new();
        assert_eq!(sw.stop(10), Err(SessionError::NotRunning));
    }

    #[test]
    fn test_restart_continues_from_last_reading() {
        let mut sw = RecoveryTimer::new();
        sw.start(0).unwrap();
        sw.stop(10_000).unwrap();
        sw.start(100_000).unwrap();
        let time = sw.stop(105_000).unwrap();
        assert_eq!((time.minutes, time.seconds), (0, 15));
    }
}
