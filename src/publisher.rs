//! Hands finished refreshes to the consumer, never going backwards.
//!
//! Refreshes can overlap: a selection change or live-update tick may start a
//! new one while an older one is still copying buffers. Every refresh gets a
//! sequence number when it is issued, and the publisher drops any result
//! older than the one already shown, so a slow old request can never
//! overwrite the view of a newer one. A result whose successor is still in
//! flight is shown in the meantime; with ticks faster than a refresh the view
//! would otherwise never update.

use crate::controller::Selection;
use crate::snapshot::SnapshotEntry;
use crate::status::{SampleRow, SampleViewStatus};
use crate::traits::RefreshSink;
use chrono::Utc;
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Issues monotonically increasing refresh sequence numbers. Shared between
/// the thread that issues refreshes and the publisher.
#[derive(Debug, Default)]
pub struct RefreshSequencer {
    issued: AtomicU64,
}

impl RefreshSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number; the first one is 1.
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Most recently issued number, 0 if none.
    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

/// What a background refresh produces.
#[derive(Debug, Clone)]
pub struct RefreshResult {
    pub sequence: u64,
    pub selection: Selection,
    /// Filter engine output
    pub filtered: Vec<SnapshotEntry>,
    /// Samples copied before filtering
    pub total_count: usize,
    /// Channels skipped because their buffer could not be read
    pub failed_channels: Vec<String>,
}

/// What the presentation layer receives.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleViewUpdate {
    pub sequence: u64,
    pub selection: Selection,
    pub rows: Vec<SnapshotEntry>,
    pub total_count: usize,
    pub visible_count: usize,
    pub show_channel_column: bool,
    pub partial: bool,
    pub failed_channels: Vec<String>,
}

impl SampleViewUpdate {
    /// Derive the displayed update from a refresh result.
    ///
    /// In the merged view rows of hidden channels are dropped when
    /// `hide_invisible` is set, and each row needs its channel name.
    pub fn derive(result: RefreshResult, hide_invisible: bool) -> Self {
        let merged = result.selection.is_all();
        let rows: Vec<SnapshotEntry> = if merged && hide_invisible {
            result.filtered.into_iter().filter(|e| e.channel.visible).collect()
        } else {
            result.filtered
        };
        debug_assert!(rows.len() <= result.total_count);

        SampleViewUpdate {
            sequence: result.sequence,
            selection: result.selection,
            visible_count: rows.len(),
            rows,
            total_count: result.total_count,
            show_channel_column: merged,
            partial: !result.failed_channels.is_empty(),
            failed_channels: result.failed_channels,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Applied(SampleViewUpdate),
    /// Dropped: a newer refresh was already applied
    Stale { sequence: u64, latest: u64 },
}

/// Lives on the consumer thread.
pub struct ResultPublisher {
    sequencer: Arc<RefreshSequencer>,
    last_applied: u64,
    hide_invisible_in_all: bool,
    status: Arc<RwLock<SampleViewStatus>>,
    sink: Option<Box<dyn RefreshSink>>,
}

impl ResultPublisher {
    pub fn new(
        sequencer: Arc<RefreshSequencer>,
        status: Arc<RwLock<SampleViewStatus>>,
        hide_invisible_in_all: bool,
    ) -> Self {
        ResultPublisher {
            sequencer,
            last_applied: 0,
            hide_invisible_in_all,
            status,
            sink: None,
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn RefreshSink>) {
        self.sink = Some(sink);
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    pub fn publish(&mut self, result: RefreshResult) -> PublishOutcome {
        let latest = self.sequencer.latest();
        if result.sequence <= self.last_applied {
            debug!(
                "[Publish] dropping stale refresh #{} (latest #{}, shown #{})",
                result.sequence, latest, self.last_applied
            );
            if let Ok(mut status) = self.status.write() {
                status.stale_discarded += 1;
            }
            return PublishOutcome::Stale { sequence: result.sequence, latest };
        }

        let update = SampleViewUpdate::derive(result, self.hide_invisible_in_all);
        self.last_applied = update.sequence;

        info!(
            "[Publish] #{} {}: {} of {} samples{}",
            update.sequence,
            update.selection,
            update.visible_count,
            update.total_count,
            if update.partial { " (partial)" } else { "" }
        );

        self.update_shared_status(&update);
        if let Some(sink) = self.sink.as_mut() {
            sink.on_refresh_complete(&update);
        }
        PublishOutcome::Applied(update)
    }

    fn update_shared_status(&self, update: &SampleViewUpdate) {
        if let Ok(mut status) = self.status.write() {
            status.selection = update.selection.to_string();
            status.sequence = update.sequence;
            status.updated_ts = Utc::now().timestamp_millis();
            status.total_count = update.total_count;
            status.visible_count = update.visible_count;
            status.partial = update.partial;
            status.failed_channels = update.failed_channels.clone();
            status.show_channel_column = update.show_channel_column;
            status.rows = update
                .rows
                .iter()
                .map(|e| SampleRow::from_entry(e, update.show_channel_column))
                .collect();
        }
    }
}
