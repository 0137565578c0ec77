use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};

/// The four values recorded during a walk test
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetricKey {
    Spo2,
    Pulse,
    Distance,
    Borg,
}

impl MetricKey {
    /// Record-table order
    pub const ALL: [MetricKey; 4] = [
        MetricKey::Spo2,
        MetricKey::Pulse,
        MetricKey::Distance,
        MetricKey::Borg,
    ];

    pub fn index(self) -> usize {
        match self {
            MetricKey::Spo2 => 0,
            MetricKey::Pulse => 1,
            MetricKey::Distance => 2,
            MetricKey::Borg => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricKey::Spo2 => "SpO₂",
            MetricKey::Pulse => "Pulse",
            MetricKey::Distance => "Distance",
            MetricKey::Borg => "Borg",
        }
    }
}

/// Immutable descriptor of one metric's accepted range and precision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub key: MetricKey,
    pub min: f64,
    pub max: f64,
    pub decimals: u8,
    pub step: f64,
    pub requires_baseline: bool,
    pub unit: String,
    /// Value offered in an empty entry dialog
    pub default_entry: Option<f64>,
}

impl Metric {
    pub fn new(
        key: MetricKey,
        min: f64,
        max: f64,
        decimals: u8,
        step: f64,
    ) -> Result<Self, ConfigError> {
        if !(min < max) {
            return Err(ConfigError::InvalidBounds { key, min, max });
        }
        if decimals > 1 {
            return Err(ConfigError::InvalidDecimals { key, decimals });
        }
        Ok(Self {
            key,
            min,
            max,
            decimals,
            step,
            requires_baseline: true,
            unit: String::new(),
            default_entry: None,
        })
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn with_default_entry(mut self, value: f64) -> Self {
        self.default_entry = Some(value);
        self
    }

    pub fn without_baseline(mut self) -> Self {
        self.requires_baseline = false;
        self
    }

    pub fn label(&self) -> &'static str {
        self.key.label()
    }

    /// Parse raw operator input, range-check it, then round to the metric's precision
    pub fn validate(&self, raw: &str) -> Result<f64, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }
        let value = trimmed
            .parse::<f64>()
            .map_err(|_| ValidationError::NotANumber)?;
        let normalized = self.validate_value(value)?;
        // typed text rounds on its decimal digits, not on the binary float
        Ok(round_decimal_text(trimmed, self.decimals).unwrap_or(normalized))
    }

    pub fn validate_value(&self, value: f64) -> Result<f64, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NotANumber);
        }
        // range is checked on the raw value, before rounding
        if value < self.min || value > self.max {
            return Err(ValidationError::OutOfRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(self.normalize(value))
    }

    pub fn normalize(&self, value: f64) -> f64 {
        match self.decimals {
            0 => value.round(),
            _ => (value * 10.0).round() / 10.0,
        }
    }
}

/// Round a plain decimal literal ("-12.35") half away from zero at `decimals`
/// places. `None` for anything else (exponents, overflow), leaving the float path.
fn round_decimal_text(text: &str, decimals: u8) -> Option<f64> {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    let blank = int_part.is_empty() && frac_part.is_empty();
    if blank || !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }

    let keep = decimals as usize;
    let unit = 10u64.checked_pow(decimals as u32)?;
    let int_value: u64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let kept = &frac_part[..frac_part.len().min(keep)];
    let frac_value: u64 = if keep == 0 {
        0
    } else {
        format!("{kept:0<keep$}").parse().ok()?
    };
    let round_up = frac_part.as_bytes().get(keep).is_some_and(|d| *d >= b'5');

    let scaled = int_value
        .checked_mul(unit)?
        .checked_add(frac_value + u64::from(round_up))?;
    Some(sign * scaled as f64 / unit as f64)
}

/// Lookup table of all four metric descriptors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRegistry {
    metrics: [Metric; 4],
}

impl MetricRegistry {
    /// Descriptors may be given in any order; each key must appear exactly once.
    pub fn new(metrics: [Metric; 4]) -> Result<Self, ConfigError> {
        let mut sorted = metrics;
        sorted.sort_by_key(|m| m.key.index());
        if let Some(pair) = sorted.windows(2).find(|w| w[0].key == w[1].key) {
            return Err(ConfigError::DuplicateMetric { key: pair[0].key });
        }
        Ok(Self { metrics: sorted })
    }

    pub fn get(&self, key: MetricKey) -> &Metric {
        &self.metrics[key.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.iter()
    }

    pub fn validate(&self, key: MetricKey, raw: &str) -> Result<f64, ValidationError> {
        self.get(key).validate(raw)
    }

    pub fn baseline_keys(&self) -> impl Iterator<Item = MetricKey> + '_ {
        self.metrics
            .iter()
            .filter(|m| m.requires_baseline)
            .map(|m| m.key)
    }
}
