use crate::snapshot::SnapshotEntry;
use serde::{Deserialize, Serialize};

/// Sample view state shared with whoever renders it
///
/// Written only by the result publisher, on the consumer thread. Readers get a
/// consistent copy through the `RwLock` it is shared in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SampleViewStatus {
    // ========================================================================
    // Request tracking
    // ========================================================================
    /// Human-readable selection ("All" or the channel name)
    pub selection: String,

    /// Sequence number of the refresh currently shown (0 = none yet)
    pub sequence: u64,

    /// Results dropped because a newer refresh had been issued
    pub stale_discarded: u64,

    /// Unix timestamp (ms) of the last applied refresh
    pub updated_ts: i64,

    // ========================================================================
    // Counts
    // ========================================================================
    /// Samples copied from the channels that could be read
    pub total_count: usize,

    /// Rows shown after filtering (and visibility, in the merged view)
    pub visible_count: usize,

    /// True when some channel could not be read in time
    pub partial: bool,

    /// Names of the channels missing from a partial result
    pub failed_channels: Vec<String>,

    /// Merged view shows which channel each row belongs to
    pub show_channel_column: bool,

    // ========================================================================
    // Rows
    // ========================================================================
    pub rows: Vec<SampleRow>,
}

impl Default for SampleViewStatus {
    fn default() -> Self {
        SampleViewStatus {
            selection: String::new(),
            sequence: 0,
            stale_discarded: 0,
            updated_ts: 0,
            total_count: 0,
            visible_count: 0,
            partial: false,
            failed_channels: Vec::new(),
            show_channel_column: false,
            rows: Vec::new(),
        }
    }
}

impl SampleViewStatus {
    /// "Count: 120 (Visible: 7)"
    pub fn count_label(&self) -> String {
        let mut label = format!("Count: {} (Visible: {})", self.total_count, self.visible_count);
        if self.partial {
            label.push_str(" [partial]");
        }
        label
    }
}

/// One formatted line of the sample table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SampleRow {
    pub time: String,
    pub value: String,
    pub severity: String,
    pub status: String,
    /// Empty unless the channel column is shown
    pub channel: String,
    pub source: String,
}

impl SampleRow {
    pub fn from_entry(entry: &SnapshotEntry, with_channel: bool) -> Self {
        let sample = &entry.sample;
        SampleRow {
            time: sample.time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            value: sample.value.to_string(),
            severity: sample.severity.to_string(),
            status: sample.message.clone(),
            channel: if with_channel { entry.channel.name.clone() } else { String::new() },
            source: sample.source.to_string(),
        }
    }
}
