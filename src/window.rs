use serde::Serialize;

use crate::error::ConfigError;
use crate::metric::MetricKey;

pub const BASELINE_MINUTE: u8 = 0;
pub const FINAL_MINUTE: u8 = 6;
/// Minute indexes of the record grid, baseline included
pub const MINUTES: std::ops::RangeInclusive<u8> = BASELINE_MINUTE..=FINAL_MINUTE;

const FULL_SET: [MetricKey; 4] = [
    MetricKey::Spo2,
    MetricKey::Pulse,
    MetricKey::Borg,
    MetricKey::Distance,
];
const WALKING_SET: [MetricKey; 3] = [MetricKey::Spo2, MetricKey::Pulse, MetricKey::Borg];

/// Metrics that must be present for `minute` to count as complete.
/// Distance is only taken at the baseline and at the end of the walk.
pub fn required_metrics(minute: u8) -> &'static [MetricKey] {
    match minute {
        BASELINE_MINUTE | FINAL_MINUTE => &FULL_SET,
        1..=5 => &WALKING_SET,
        _ => &[],
    }
}

/// Acceptance interval, in whole elapsed seconds, for committing one minute's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MinuteWindow {
    pub start: u64,
    pub end: u64,
}

impl MinuteWindow {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, elapsed_secs: u64) -> bool {
        elapsed_secs >= self.start && elapsed_secs <= self.end
    }
}

/// Windows for minutes 1..=6. They need not tile the six minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinuteWindowTable {
    windows: [MinuteWindow; 6],
}

impl MinuteWindowTable {
    pub fn new(windows: [MinuteWindow; 6]) -> Result<Self, ConfigError> {
        for (i, w) in windows.iter().enumerate() {
            if w.start > w.end {
                return Err(ConfigError::InvalidWindow {
                    minute: i as u8 + 1,
                    start: w.start,
                    end: w.end,
                });
            }
        }
        Ok(Self { windows })
    }

    /// Builds `[60m - before, 60m + after]` for every minute m, floored at 0s
    pub fn around_minute_marks(before: u64, after: u64) -> Self {
        let windows = std::array::from_fn(|i| {
            let mark = (i as u64 + 1) * 60;
            MinuteWindow::new(mark.saturating_sub(before), mark.saturating_add(after))
        });
        Self { windows }
    }

    pub fn window(&self, minute: u8) -> Option<&MinuteWindow> {
        match minute {
            1..=FINAL_MINUTE => self.windows.get(minute as usize - 1),
            _ => None,
        }
    }

    /// Minute whose window holds `elapsed_ms`; the lowest minute wins on overlap
    pub fn minute_at(&self, elapsed_ms: u64) -> Option<u8> {
        let secs = elapsed_ms / 1000;
        self.windows
            .iter()
            .position(|w| w.contains(secs))
            .map(|i| i as u8 + 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &MinuteWindow)> {
        self.windows
            .iter()
            .enumerate()
            .map(|(i, w)| (i as u8 + 1, w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_required_metrics_by_minute() {
        assert_eq!(required_metrics(0).len(), 4);
        assert_eq!(required_metrics(6).len(), 4);
        for m in 1..=5 {
            assert!(!required_metrics(m).contains(&MetricKey::Distance));
            assert_eq!(required_metrics(m).len(), 3);
        }
        assert!(required_metrics(7).is_empty());
    }

    #[test]
    fn test_around_minute_marks() {
        let table = MinuteWindowTable::around_minute_marks(5, 25);
        assert_eq!(table.window(1), Some(&MinuteWindow::new(55, 85)));
        assert_eq!(table.window(6), Some(&MinuteWindow::new(355, 385)));
        assert_eq!(table.window(0), None);
        assert_eq!(table.window(7), None);
    }

    #[test]
    fn test_around_minute_marks_floors_at_zero() {
        let table = MinuteWindowTable::around_minute_marks(70, 0);
        assert_eq!(table.window(1), Some(&MinuteWindow::new(0, 60)));
        assert_eq!(table.window(2), Some(&MinuteWindow::new(50, 120)));
        assert_eq!(table.minute_at(0), Some(1));
    }

    #[test]
    fn test_minute_at_floors_to_seconds() {
        let table = MinuteWindowTable::around_minute_marks(10, 0);
        assert_eq!(table.minute_at(49_999), None);
        assert_eq!(table.minute_at(50_000), Some(1));
        assert_eq!(table.minute_at(60_999), Some(1));
        assert_eq!(table.minute_at(61_000), None);
        assert_eq!(table.minute_at(360_000), Some(6));
    }

    #[test]
    fn test_minute_at_gap_between_windows() {
        let table = MinuteWindowTable::around_minute_marks(5, 25);
        assert_eq!(table.minute_at(70_000), Some(1));
        assert_eq!(table.minute_at(90_000), None);
        assert_eq!(table.minute_at(115_000), Some(2));
    }

    #[test]
    fn test_overlapping_windows_pick_lowest_minute() {
        let table = MinuteWindowTable::new([
            MinuteWindow::new(50, 130),
            MinuteWindow::new(110, 120),
            MinuteWindow::new(170, 180),
            MinuteWindow::new(230, 240),
            MinuteWindow::new(290, 300),
            MinuteWindow::new(350, 360),
        ])
        .unwrap();
        assert_eq!(table.minute_at(115_000), Some(1));
    }

    #[test]
    fn test_rejects_inverted_window() {
        let mut windows = [MinuteWindow::new(0, 0); 6];
        windows[2] = MinuteWindow::new(200, 100);
        assert_matches!(
            MinuteWindowTable::new(windows),
            Err(ConfigError::InvalidWindow { minute: 3, .. })
        );
    }
}
