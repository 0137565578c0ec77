use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::clock::Clock;
use crate::error::ReportError;
use crate::metric::MetricKey;
use crate::session::Session;
use crate::view::minute_label;

/// Write the record table: one row per minute (0..=6), then a recovery row.
/// Values are plain numbers; empty cells stay empty.
pub fn write_csv<C: Clock, W: Write>(session: &Session<C>, writer: W) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["minute".to_string()];
    header.extend(MetricKey::ALL.iter().map(|k| k.to_string()));
    wtr.write_record(&header)?;

    for minute in crate::window::MINUTES {
        let mut record = vec![minute_label(minute)];
        record.extend(MetricKey::ALL.iter().map(|key| {
            session
                .recorded(*key, minute)
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        wtr.write_record(&record)?;
    }

    let recovery = session
        .recovery_time()
        .map(|t| format!("{}:{:02}", t.minutes, t.seconds))
        .unwrap_or_default();
    wtr.write_record(["recovery", recovery.as_str(), "", "", ""])?;

    wtr.flush()?;
    Ok(())
}

pub fn write_json<C: Clock, W: Write>(session: &Session<C>, writer: W) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(writer, &session.snapshot())?;
    Ok(())
}

/// Write `walktest-<timestamp>.csv` and `.json` into `dir`, returning the csv path
pub fn export<C: Clock>(session: &Session<C>, dir: &Path) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(dir)?;
    let stem = format!("walktest-{}", Local::now().format("%Y%m%d-%H%M%S"));

    let csv_path = dir.join(format!("{stem}.csv"));
    write_csv(session, fs::File::create(&csv_path)?)?;

    let json_path = dir.join(format!("{stem}.json"));
    write_json(session, fs::File::create(&json_path)?)?;

    info!(path = %csv_path.display(), "record exported");
    Ok(csv_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::protocol::Protocol;
    use tempfile::tempdir;

    fn finished_session() -> Session<ManualClock> {
        let clock = ManualClock::new();
        let mut s = Session::with_clock(Protocol::standard(), clock.clone());
        s.set_pending(MetricKey::Spo2, "98").unwrap();
        s.set_pending(MetricKey::Pulse, "70").unwrap();
        s.set_pending(MetricKey::Distance, "0").unwrap();
        s.set_pending(MetricKey::Borg, "1").unwrap();
        s.start().unwrap();
        clock.advance(55_000);
        s.set_pending(MetricKey::Pulse, "104").unwrap();
        s.commit().unwrap();
        s.set_recovery_time(2, 5).unwrap();
        s
    }

    #[test]
    fn test_csv_layout() {
        let s = finished_session();
        let mut out = Vec::new();
        write_csv(&s, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "minute,spo2,pulse,distance,borg");
        assert_eq!(lines[1], "Start,98,70,0,1");
        assert_eq!(lines[2], "1 min,98,104,,1");
        assert_eq!(lines[3], "2 min,,,,");
        assert_eq!(lines[8], "recovery,2:05,,,");
    }

    #[test]
    fn test_json_snapshot() {
        let s = finished_session();
        let mut out = Vec::new();
        write_json(&s, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["phase"], "Running");
        assert_eq!(value["recorded_minutes"], serde_json::json!([1]));
        assert_eq!(value["recovery_time"]["minutes"], 2);
    }

    #[test]
    fn test_export_writes_both_files() {
        let dir = tempdir().unwrap();
        let s = finished_session();
        let csv_path = export(&s, dir.path()).unwrap();
        assert!(csv_path.exists());
        assert!(csv_path.with_extension("json").exists());
    }
}
