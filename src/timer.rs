use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SessionError;

pub const MINUTE_MS: u64 = 60_000;
pub const TEST_DURATION_MS: u64 = 6 * MINUTE_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Phase {
    #[strum(serialize = "not started")]
    NotStarted,
    #[strum(serialize = "running")]
    Running,
    #[strum(serialize = "paused")]
    Paused,
    #[strum(serialize = "completed")]
    Completed,
}

/// Things the operator should be told about, produced while the clock advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// A whole minute (1..=5) has passed; time to update the values
    MinuteElapsed(u8),
    /// Six minutes are up; the clock is stopped
    TimerCompleted,
}

/// Six-minute walk clock, anchored to wall time while running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTimer {
    phase: Phase,
    elapsed_ms: u64,
    start_epoch: Option<u64>,
    last_prompt_minute: u8,
}

impl Default for TestTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTimer {
    pub fn new() -> Self {
        Self {
            phase: Phase::NotStarted,
            elapsed_ms: 0,
            start_epoch: None,
            last_prompt_minute: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// True until the very first start: the only time baselines are written
    pub fn is_pristine(&self) -> bool {
        self.phase == Phase::NotStarted && self.elapsed_ms == 0
    }

    pub fn has_started(&self) -> bool {
        self.phase != Phase::NotStarted
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn start(&mut self, now: u64) -> Result<(), SessionError> {
        match self.phase {
            Phase::NotStarted => {
                self.start_epoch = Some(now.saturating_sub(self.elapsed_ms));
                self.phase = Phase::Running;
                self.last_prompt_minute = 0;
                info!(now, "walk timer started");
                Ok(())
            }
            Phase::Running => Err(SessionError::AlreadyRunning),
            Phase::Completed => Err(SessionError::AlreadyCompleted),
            Phase::Paused => Err(SessionError::InvalidTransition {
                from: self.phase,
                action: "start",
            }),
        }
    }

    pub fn pause(&mut self, now: u64) -> Result<(), SessionError> {
        match self.phase {
            Phase::Running => {
                self.elapsed_ms = self.running_elapsed(now);
                self.start_epoch = None;
                self.phase = Phase::Paused;
                info!(elapsed_ms = self.elapsed_ms, "walk timer paused");
                Ok(())
            }
            Phase::Completed => Err(SessionError::AlreadyCompleted),
            from => Err(SessionError::InvalidTransition {
                from,
                action: "pause",
            }),
        }
    }

    pub fn resume(&mut self, now: u64) -> Result<(), SessionError> {
        match self.phase {
            Phase::Paused => {
                self.start_epoch = Some(now.saturating_sub(self.elapsed_ms));
                self.phase = Phase::Running;
                info!(elapsed_ms = self.elapsed_ms, "walk timer resumed");
                Ok(())
            }
            Phase::Running => Err(SessionError::AlreadyRunning),
            Phase::Completed => Err(SessionError::AlreadyCompleted),
            Phase::NotStarted => Err(SessionError::InvalidTransition {
                from: self.phase,
                action: "resume",
            }),
        }
    }

    /// Advance to `now`. Order within one call: elapsed update, minute
    /// notices, completion check.
    pub fn tick(&mut self, now: u64) -> Vec<Notice> {
        let mut notices = Vec::new();
        if self.phase != Phase::Running {
            return notices;
        }

        let elapsed = self.running_elapsed(now);
        // elapsed never moves backwards while running
        self.elapsed_ms = self.elapsed_ms.max(elapsed);

        let whole_minutes = (self.elapsed_ms / MINUTE_MS).min(6) as u8;
        while self.last_prompt_minute < whole_minutes {
            self.last_prompt_minute += 1;
            if self.last_prompt_minute < 6 {
                debug!(minute = self.last_prompt_minute, "minute boundary crossed");
                notices.push(Notice::MinuteElapsed(self.last_prompt_minute));
            }
        }

        if self.elapsed_ms >= TEST_DURATION_MS {
            self.complete();
            notices.push(Notice::TimerCompleted);
        }

        notices
    }

    fn complete(&mut self) {
        self.phase = Phase::Completed;
        self.elapsed_ms = TEST_DURATION_MS;
        self.start_epoch = None;
        info!("six minutes elapsed, walk timer completed");
    }

    fn running_elapsed(&self, now: u64) -> u64 {
        match self.start_epoch {
            Some(epoch) => now.saturating_sub(epoch),
            None => self.elapsed_ms,
        }
    }
}
