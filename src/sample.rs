//! Sample data model.
//!
//! A [`Sample`] is one immutable, timestamped and alarm-tagged reading of a
//! channel. Its value is either a single reading (scalar or enum index), a
//! statistical bundle produced by optimized archive queries, or something that
//! cannot be compared against a threshold (text, missing).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alarm severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmSeverity {
    #[default]
    None,
    Minor,
    Major,
    Invalid,
    Undefined,
}

impl AlarmSeverity {
    pub fn name(&self) -> &'static str {
        match self {
            AlarmSeverity::None => "NONE",
            AlarmSeverity::Minor => "MINOR",
            AlarmSeverity::Major => "MAJOR",
            AlarmSeverity::Invalid => "INVALID",
            AlarmSeverity::Undefined => "UNDEFINED",
        }
    }
}

impl fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a sample came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSource {
    Archive,
    #[default]
    Live,
    /// Any other acquisition tag (e.g. a named archive data source)
    Other(String),
}

impl fmt::Display for SampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSource::Archive => f.write_str("archive"),
            SampleSource::Live => f.write_str("live"),
            SampleSource::Other(tag) => f.write_str(tag),
        }
    }
}

/// Value payload of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SampleValue {
    /// Plain numeric reading
    Scalar { value: f64 },
    /// Enumerated reading; compared by `index`, never by label
    Enumerated { index: i32, label: String },
    /// Pre-aggregated bundle of several readings
    Statistics { average: f64, min: f64, max: f64, count: u32 },
    /// Text reading, not comparable against a threshold
    Text { value: String },
    /// Disconnected / no value
    Missing,
}

impl SampleValue {
    /// Numeric range covered by this value, or `None` when it cannot be
    /// compared against a numeric threshold.
    ///
    /// Single readings cover `[v, v]`, bundles cover `[min, max]`.
    pub fn range(&self) -> Option<(f64, f64)> {
        match self {
            SampleValue::Scalar { value } if value.is_finite() => Some((*value, *value)),
            SampleValue::Enumerated { index, .. } => Some((*index as f64, *index as f64)),
            SampleValue::Statistics { min, max, .. }
                if min.is_finite() && max.is_finite() && min <= max =>
            {
                Some((*min, *max))
            }
            _ => None,
        }
    }

    /// Single value standing for the whole reading: the value itself, the
    /// enum index, or a bundle's average.
    pub fn representative(&self) -> Option<f64> {
        let value = match self {
            SampleValue::Scalar { value } => *value,
            SampleValue::Enumerated { index, .. } => *index as f64,
            SampleValue::Statistics { average, .. } => *average,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, SampleValue::Statistics { .. })
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Scalar { value } => write!(f, "{}", value),
            SampleValue::Enumerated { index, label } => write!(f, "{} ({})", label, index),
            SampleValue::Statistics { average, min, max, count } => {
                write!(f, "{} [{} ... {}, {} samples]", average, min, max, count)
            }
            SampleValue::Text { value } => f.write_str(value),
            SampleValue::Missing => f.write_str("#N/A"),
        }
    }
}

/// One timestamped reading of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: DateTime<Utc>,
    pub value: SampleValue,
    #[serde(default)]
    pub severity: AlarmSeverity,
    /// Alarm status message ("HIHI_ALARM", "NO_ALARM", ...)
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub source: SampleSource,
}

impl Sample {
    pub fn new(time: DateTime<Utc>, value: SampleValue) -> Self {
        Sample {
            time,
            value,
            severity: AlarmSeverity::None,
            message: String::new(),
            source: SampleSource::Live,
        }
    }

    pub fn scalar(time: DateTime<Utc>, value: f64) -> Self {
        Self::new(time, SampleValue::Scalar { value })
    }

    pub fn with_alarm(mut self, severity: AlarmSeverity, message: impl Into<String>) -> Self {
        self.severity = severity;
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: SampleSource) -> Self {
        self.source = source;
        self
    }
}
