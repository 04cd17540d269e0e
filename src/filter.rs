//! Per-channel sample view filter configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Filter variant without its parameter, used for selection lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    None,
    AlarmUp,
    AlarmChanges,
    ThresholdUp,
    ThresholdChanges,
}

impl FilterKind {
    pub const ALL: [FilterKind; 5] = [
        FilterKind::None,
        FilterKind::AlarmUp,
        FilterKind::AlarmChanges,
        FilterKind::ThresholdUp,
        FilterKind::ThresholdChanges,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FilterKind::None => "None",
            FilterKind::AlarmUp => "Alarm up",
            FilterKind::AlarmChanges => "Alarm change",
            FilterKind::ThresholdUp => "Threshold up",
            FilterKind::ThresholdChanges => "Threshold change",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FilterKind {
    type Err = String;

    /// Accepts the display label ("Threshold up") or its kebab-case form
    /// ("threshold-up"), case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        FilterKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.label().to_ascii_lowercase() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown filter '{}', expected one of: {}",
                    s,
                    SampleFilter::display_names().join(", ")
                )
            })
    }
}

/// Which samples of a channel the sample view shows.
///
/// Threshold variants carry their threshold; the alarm variants compare
/// severities only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleFilter {
    /// Show every sample
    #[default]
    None,
    /// Samples whose severity is higher than the previous sample's
    AlarmUp,
    /// Samples whose severity differs from the last shown sample's
    AlarmChanges,
    /// Samples where the value rises above `threshold`
    ThresholdUp { threshold: f64 },
    /// Samples where the value crosses `threshold` in either direction
    ThresholdChanges { threshold: f64 },
}

impl SampleFilter {
    pub fn kind(&self) -> FilterKind {
        match self {
            SampleFilter::None => FilterKind::None,
            SampleFilter::AlarmUp => FilterKind::AlarmUp,
            SampleFilter::AlarmChanges => FilterKind::AlarmChanges,
            SampleFilter::ThresholdUp { .. } => FilterKind::ThresholdUp,
            SampleFilter::ThresholdChanges { .. } => FilterKind::ThresholdChanges,
        }
    }

    /// Threshold parameter, 0 for variants without one.
    pub fn threshold(&self) -> f64 {
        match self {
            SampleFilter::ThresholdUp { threshold } | SampleFilter::ThresholdChanges { threshold } => {
                *threshold
            }
            _ => 0.0,
        }
    }

    pub fn from_parts(kind: FilterKind, threshold: f64) -> Self {
        match kind {
            FilterKind::None => SampleFilter::None,
            FilterKind::AlarmUp => SampleFilter::AlarmUp,
            FilterKind::AlarmChanges => SampleFilter::AlarmChanges,
            FilterKind::ThresholdUp => SampleFilter::ThresholdUp { threshold },
            FilterKind::ThresholdChanges => SampleFilter::ThresholdChanges { threshold },
        }
    }

    /// Same filter switched to `kind`, keeping the current threshold.
    ///
    /// `fallback` is used when switching away from a variant that has no
    /// threshold of its own.
    pub fn with_kind(&self, kind: FilterKind, fallback: f64) -> Self {
        let threshold = match self {
            SampleFilter::ThresholdUp { threshold } | SampleFilter::ThresholdChanges { threshold } => {
                *threshold
            }
            _ => fallback,
        };
        Self::from_parts(kind, threshold)
    }

    /// Same variant with a new threshold. No-op for variants without one.
    pub fn with_threshold(&self, threshold: f64) -> Self {
        Self::from_parts(self.kind(), threshold)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SampleFilter::None)
    }

    /// Display names of all variants, in selection order.
    pub fn display_names() -> Vec<&'static str> {
        FilterKind::ALL.iter().map(FilterKind::label).collect()
    }
}

impl fmt::Display for SampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFilter::ThresholdUp { threshold } | SampleFilter::ThresholdChanges { threshold } => {
                write!(f, "{} ({})", self.kind().label(), threshold)
            }
            _ => f.write_str(self.kind().label()),
        }
    }
}
