use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SessionError, ValidationError};
use crate::metric::{MetricKey, MetricRegistry};
use crate::window::{required_metrics, MinuteWindowTable, BASELINE_MINUTE, FINAL_MINUTE};

const GRID_MINUTES: usize = FINAL_MINUTE as usize + 1;

/// metric × minute (0..=6) table of committed values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricGrid {
    cells: [[Option<f64>; GRID_MINUTES]; 4],
}

impl MetricGrid {
    pub fn get(&self, key: MetricKey, minute: u8) -> Option<f64> {
        self.cells[key.index()]
            .get(minute as usize)
            .copied()
            .flatten()
    }

    fn set(&mut self, key: MetricKey, minute: u8, value: f64) {
        self.cells[key.index()][minute as usize] = Some(value);
    }

    pub fn row(&self, key: MetricKey) -> &[Option<f64>; GRID_MINUTES] {
        &self.cells[key.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_none)
    }
}

/// Baseline and per-minute values plus the operator's not-yet-committed entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSession {
    recorded: MetricGrid,
    pending: [Option<f64>; 4],
    recorded_minutes: BTreeSet<u8>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid(&self) -> &MetricGrid {
        &self.recorded
    }

    pub fn recorded(&self, key: MetricKey, minute: u8) -> Option<f64> {
        self.recorded.get(key, minute)
    }

    pub fn pending(&self, key: MetricKey) -> Option<f64> {
        self.pending[key.index()]
    }

    pub fn recorded_minutes(&self) -> &BTreeSet<u8> {
        &self.recorded_minutes
    }

    pub fn is_minute_recorded(&self, minute: u8) -> bool {
        self.recorded_minutes.contains(&minute)
    }

    /// Every baseline-required metric has a minute 0 value
    pub fn can_start(&self, registry: &MetricRegistry) -> bool {
        self.missing_baseline(registry).is_empty()
    }

    pub fn missing_baseline(&self, registry: &MetricRegistry) -> Vec<MetricKey> {
        registry
            .baseline_keys()
            .filter(|key| self.recorded(*key, BASELINE_MINUTE).is_none())
            .collect()
    }

    /// Validate and store a pending value. While `baseline_open`, metrics
    /// that need a baseline are also written straight into minute 0.
    pub fn set_pending(
        &mut self,
        registry: &MetricRegistry,
        key: MetricKey,
        raw: &str,
        baseline_open: bool,
    ) -> Result<f64, ValidationError> {
        let metric = registry.get(key);
        let value = metric.validate(raw)?;
        self.pending[key.index()] = Some(value);
        if baseline_open && metric.requires_baseline {
            self.recorded.set(key, BASELINE_MINUTE, value);
            info!(metric = %key, value, "baseline captured");
        } else {
            debug!(metric = %key, value, "pending value updated");
        }
        Ok(value)
    }

    /// Copy pending values into the minute whose window holds `elapsed_ms`
    pub fn commit(
        &mut self,
        windows: &MinuteWindowTable,
        elapsed_ms: u64,
    ) -> Result<u8, SessionError> {
        let minute = windows
            .minute_at(elapsed_ms)
            .ok_or(SessionError::OutOfWindow {
                elapsed_secs: elapsed_ms / 1000,
            })?;

        let required = required_metrics(minute);
        let missing: Vec<MetricKey> = required
            .iter()
            .copied()
            .filter(|key| self.pending(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(SessionError::MissingMetrics(missing));
        }

        for key in required {
            if let Some(value) = self.pending(*key) {
                self.recorded.set(*key, minute, value);
            }
        }
        self.recorded_minutes.insert(minute);
        info!(minute, "minute values recorded");
        Ok(minute)
    }

    /// Highest minute holding a value for `key`
    pub fn latest_recorded_minute(&self, key: MetricKey) -> Option<u8> {
        self.recorded
            .row(key)
            .iter()
            .rposition(Option::is_some)
            .map(|i| i as u8)
    }

    pub fn is_minute_complete(&self, minute: u8) -> bool {
        let required = required_metrics(minute);
        !required.is_empty()
            && required
                .iter()
                .all(|key| self.recorded(*key, minute).is_some())
    }

    pub fn has_any_data(&self) -> bool {
        !self.recorded.is_empty()
    }

    pub fn has_any_value_at(&self, minute: u8) -> bool {
        MetricKey::ALL
            .iter()
            .any(|key| self.recorded(*key, minute).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;
    use assert_matches::assert_matches;

    fn fill_pending(rec: &mut RecordingSession, reg: &MetricRegistry, open: bool) {
        rec.set_pending(reg, MetricKey::Spo2, "96", open).unwrap();
        rec.set_pending(reg, MetricKey::Pulse, "110", open).unwrap();
        rec.set_pending(reg, MetricKey::Borg, "2", open).unwrap();
    }

    #[test]
    fn test_set_pending_captures_baseline_when_open() {
        let p = Protocol::standard();
        let mut rec = RecordingSession::new();
        rec.set_pending(&p.metrics, MetricKey::Spo2, "97", true).unwrap();
        assert_eq!(rec.pending(MetricKey::Spo2), Some(97.0));
        assert_eq!(rec.recorded(MetricKey::Spo2, 0), Some(97.0));
    }

    #[test]
    fn test_set_pending_after_start_only_touches_pending() {
        let p = Protocol::standard();
        let mut rec = RecordingSession::new();
        rec.set_pending(&p.metrics, MetricKey::Pulse, "88", false)
            .unwrap();
        assert_eq!(rec.pending(MetricKey::Pulse), Some(88.0));
        assert_eq!(rec.recorded(MetricKey::Pulse, 0), None);
    }

    #[test]
    fn test_rejected_entry_changes_nothing() {
        let p = Protocol::standard();
        let mut rec = RecordingSession::new();
        rec.set_pending(&p.metrics, MetricKey::Spo2, "95", true).unwrap();
        assert_matches!(
            rec.set_pending(&p.metrics, MetricKey::Spo2, "101", true),
            Err(ValidationError::OutOfRange { .. })
        );
        assert_eq!(rec.pending(MetricKey::Spo2), Some(95.0));
        assert_eq!(rec.recorded(MetricKey::Spo2, 0), Some(95.0));
    }

    #[test]
    fn test_can_start_needs_every_baseline() {
        let p = Protocol::standard();
        let mut rec = RecordingSession::new();
        rec.set_pending(&p.metrics, MetricKey::Spo2, "98", true).unwrap();
        rec.set_pending(&p.metrics, MetricKey::Pulse, "72", true).unwrap();
        assert!(!rec.can_start(&p.metrics));
        assert_eq!(
            rec.missing_baseline(&p.metrics),
            vec![MetricKey::Distance, MetricKey::Borg]
        );
        rec.set_pending(&p.metrics, MetricKey::Distance, "0", true)
            .unwrap();
        rec.set_pending(&p.metrics, MetricKey::Borg, "1", true).unwrap();
        assert!(rec.can_start(&p.metrics));
        assert!(rec.is_minute_complete(0));
    }

    #[test]
    fn test_commit_writes_required_metrics_only() {
        let p = Protocol::wide();
        let mut rec = RecordingSession::new();
        fill_pending(&mut rec, &p.metrics, false);
        rec.set_pending(&p.metrics, MetricKey::Distance, "80", false)
            .unwrap();

        assert_eq!(rec.commit(&p.windows, 70_000), Ok(1));
        assert_eq!(rec.recorded(MetricKey::Spo2, 1), Some(96.0));
        assert_eq!(rec.recorded(MetricKey::Pulse, 1), Some(110.0));
        assert_eq!(rec.recorded(MetricKey::Borg, 1), Some(2.0));
        assert_eq!(rec.recorded(MetricKey::Distance, 1), None);
        assert!(rec.is_minute_recorded(1));
        assert!(rec.is_minute_complete(1));
    }

    #[test]
    fn test_commit_outside_window() {
        let p = Protocol::wide();
        let mut rec = RecordingSession::new();
        fill_pending(&mut rec, &p.metrics, false);
        assert_eq!(
            rec.commit(&p.windows, 90_000),
            Err(SessionError::OutOfWindow { elapsed_secs: 90 })
        );
        assert!(rec.recorded_minutes().is_empty());
    }

    #[test]
    fn test_commit_reports_missing_metrics() {
        let p = Protocol::standard();
        let mut rec = RecordingSession::new();
        fill_pending(&mut rec, &p.metrics, false);
        // minute 6 also needs distance
        assert_eq!(
            rec.commit(&p.windows, 355_000),
            Err(SessionError::MissingMetrics(vec![MetricKey::Distance]))
        );
        assert_eq!(rec.recorded(MetricKey::Spo2, 6), None);
    }

    #[test]
    fn test_commit_is_idempotent_within_window() {
        let p = Protocol::wide();
        let mut rec = RecordingSession::new();
        fill_pending(&mut rec, &p.metrics, false);
        rec.commit(&p.windows, 60_000).unwrap();
        let first = rec.clone();
        rec.commit(&p.windows, 80_000).unwrap();
        assert_eq!(rec, first);
    }

    #[test]
    fn test_recommit_overwrites_same_minute() {
        let p = Protocol::wide();
        let mut rec = RecordingSession::new();
        fill_pending(&mut rec, &p.metrics, false);
        rec.commit(&p.windows, 60_000).unwrap();
        rec.set_pending(&p.metrics, MetricKey::Spo2, "93", false).unwrap();
        rec.commit(&p.windows, 65_000).unwrap();
        assert_eq!(rec.recorded(MetricKey::Spo2, 1), Some(93.0));
    }

    #[test]
    fn test_latest_recorded_minute() {
        let p = Protocol::wide();
        let mut rec = RecordingSession::new();
        assert_eq!(rec.latest_recorded_minute(MetricKey::Spo2), None);
        rec.set_pending(&p.metrics, MetricKey::Spo2, "99", true).unwrap();
        assert_eq!(rec.latest_recorded_minute(MetricKey::Spo2), Some(0));
        fill_pending(&mut rec, &p.metrics, false);
        rec.commit(&p.windows, 120_000).unwrap();
        assert_eq!(rec.latest_recorded_minute(MetricKey::Spo2), Some(2));
        assert_eq!(rec.latest_recorded_minute(MetricKey::Distance), None);
    }

    #[test]
    fn test_has_any_data() {
        let p = Protocol::standard();
        let mut rec = RecordingSession::new();
        assert!(!rec.has_any_data());
        assert!(!rec.has_any_value_at(0));
        rec.set_pending(&p.metrics, MetricKey::Borg, "3", true).unwrap();
        assert!(rec.has_any_data());
        assert!(rec.has_any_value_at(0));
        assert!(!rec.is_minute_complete(0));
    }
}
