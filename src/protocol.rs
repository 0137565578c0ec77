use serde::{Deserialize, Serialize};

use crate::metric::{Metric, MetricKey, MetricRegistry};
use crate::window::MinuteWindowTable;

/// Named protocol variant selectable from the command line or config file
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Preset {
    /// 10 second windows closing on each minute mark, integer Borg
    #[default]
    Standard,
    /// 30 second windows opening just before each minute mark, Borg in half steps
    Wide,
}

/// Everything a session needs to know about how values are accepted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Protocol {
    pub metrics: MetricRegistry,
    pub windows: MinuteWindowTable,
}

impl Protocol {
    pub fn new(metrics: MetricRegistry, windows: MinuteWindowTable) -> Self {
        Self { metrics, windows }
    }

    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Standard => Self::standard(),
            Preset::Wide => Self::wide(),
        }
    }

    pub fn standard() -> Self {
        Self::new(
            registry(borg(0, 1.0)),
            MinuteWindowTable::around_minute_marks(10, 0),
        )
    }

    pub fn wide() -> Self {
        Self::new(
            registry(borg(1, 0.5)),
            MinuteWindowTable::around_minute_marks(5, 25),
        )
    }
}

impl From<Preset> for Protocol {
    fn from(preset: Preset) -> Self {
        Protocol::from_preset(preset)
    }
}

// The descriptors below are fixed and known valid.
fn fixed(key: MetricKey, min: f64, max: f64, decimals: u8, step: f64) -> Metric {
    match Metric::new(key, min, max, decimals, step) {
        Ok(metric) => metric,
        Err(err) => unreachable!("built-in metric descriptor rejected: {err}"),
    }
}

fn borg(decimals: u8, step: f64) -> Metric {
    fixed(MetricKey::Borg, 0.0, 10.0, decimals, step).with_default_entry(2.0)
}

fn registry(borg: Metric) -> MetricRegistry {
    let metrics = [
        fixed(MetricKey::Spo2, 70.0, 100.0, 0, 1.0)
            .with_unit("%")
            .with_default_entry(95.0),
        fixed(MetricKey::Pulse, 50.0, 200.0, 0, 1.0).with_unit("bpm"),
        fixed(MetricKey::Distance, 0.0, 2000.0, 1, 0.5).with_unit("m"),
        borg,
    ];
    match MetricRegistry::new(metrics) {
        Ok(registry) => registry,
        Err(err) => unreachable!("built-in metric registry rejected: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::MinuteWindow;

    #[test]
    fn test_standard_preset() {
        let p = Protocol::standard();
        assert_eq!(p.metrics.get(MetricKey::Borg).decimals, 0);
        assert_eq!(p.windows.window(1), Some(&MinuteWindow::new(50, 60)));
        assert_eq!(p.windows.window(6), Some(&MinuteWindow::new(350, 360)));
        assert!(p.metrics.iter().all(|m| m.requires_baseline));
    }

    #[test]
    fn test_wide_preset() {
        let p = Protocol::wide();
        assert_eq!(p.metrics.get(MetricKey::Borg).decimals, 1);
        assert_eq!(p.metrics.get(MetricKey::Borg).step, 0.5);
        assert_eq!(p.windows.window(1), Some(&MinuteWindow::new(55, 85)));
        assert_eq!(p.windows.window(2), Some(&MinuteWindow::new(115, 145)));
    }

    #[test]
    fn test_presets_share_other_metrics() {
        let standard = Protocol::standard();
        let wide = Protocol::wide();
        for key in [MetricKey::Spo2, MetricKey::Pulse, MetricKey::Distance] {
            assert_eq!(standard.metrics.get(key), wide.metrics.get(key));
        }
    }

    #[test]
    fn test_preset_display_and_conversion() {
        assert_eq!(Preset::Wide.to_string(), "wide");
        assert_eq!(Protocol::from(Preset::default()), Protocol::standard());
    }
}
