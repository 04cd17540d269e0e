//! Best-effort snapshot of channel sample buffers.
//!
//! Each buffer is locked with a bounded wait and copied in buffer order. A
//! channel whose buffer cannot be locked in time (or fails positional access)
//! is skipped and reported; the other channels still contribute. A stale or
//! partial snapshot is preferred over blocking the caller or failing the
//! whole request.

use crate::channel::{Channel, ChannelTag};
use crate::error::SampleViewError;
use crate::sample::Sample;
use crate::traits::SampleBuffer;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Default bound on the wait for one buffer.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// A sample paired with its owning channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub channel: Arc<ChannelTag>,
    pub sample: Sample,
}

/// Copied buffer contents of one or more channels.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Per-channel runs in registry order, each in buffer order
    pub entries: Vec<SnapshotEntry>,
    /// Channels that were read successfully
    pub channels: Vec<Arc<ChannelTag>>,
    /// Channels skipped, with the cause
    pub failures: Vec<SampleViewError>,
}

impl Snapshot {
    /// Number of samples copied, before any filtering.
    pub fn total_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Releases the buffer lock on every exit path.
struct LockedBuffer<'a> {
    buffer: &'a dyn SampleBuffer,
}

impl<'a> LockedBuffer<'a> {
    fn acquire(buffer: &'a dyn SampleBuffer, timeout: Duration) -> Option<Self> {
        if buffer.try_lock_for(timeout) {
            Some(LockedBuffer { buffer })
        } else {
            None
        }
    }
}

impl Drop for LockedBuffer<'_> {
    fn drop(&mut self) {
        self.buffer.unlock();
    }
}

pub struct SnapshotCollector {
    lock_timeout: Duration,
}

impl Default for SnapshotCollector {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl SnapshotCollector {
    pub fn new(lock_timeout: Duration) -> Self {
        SnapshotCollector { lock_timeout }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn collect(&self, channels: &[Arc<Channel>]) -> Snapshot {
        let requests: Vec<(Arc<Channel>, bool)> =
            channels.iter().map(|c| (c.clone(), c.is_visible())).collect();
        self.collect_with_visibility(&requests)
    }

    /// Collect channels whose merged-view visibility was resolved by the caller.
    pub fn collect_with_visibility(&self, channels: &[(Arc<Channel>, bool)]) -> Snapshot {
        let mut snapshot = Snapshot::default();

        for (channel, visible) in channels {
            let tag = Arc::new(channel.tag_as(*visible));
            match self.copy_channel(channel, &tag) {
                Ok(samples) => {
                    debug!("[{}] copied {} samples", tag.name, samples.len());
                    snapshot.entries.extend(samples.into_iter().map(|sample| SnapshotEntry {
                        channel: tag.clone(),
                        sample,
                    }));
                    snapshot.channels.push(tag);
                }
                Err(e) => {
                    warn!("Cannot access samples for {}: {}", tag.name, e);
                    snapshot.failures.push(e);
                }
            }
        }

        snapshot
    }

    fn copy_channel(&self, channel: &Channel, tag: &ChannelTag) -> Result<Vec<Sample>, SampleViewError> {
        let buffer: &dyn SampleBuffer = &**channel.buffer();
        let _guard = LockedBuffer::acquire(buffer, self.lock_timeout).ok_or_else(|| {
            SampleViewError::LockTimeout {
                channel: tag.name.clone(),
                timeout: self.lock_timeout,
            }
        })?;

        let len = buffer.len();
        let mut samples = Vec::with_capacity(len);
        for index in 0..len {
            let sample = buffer.get(index).ok_or_else(|| SampleViewError::BufferAccess {
                channel: tag.name.clone(),
                index,
                len,
            })?;
            samples.push(sample);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PlotSamples;
    use crate::filter::SampleFilter;
    use crate::traits::MockSampleBuffer;
    use chrono::{TimeZone, Utc};
    use mockall::predicate::*;

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn plot_channel(name: &str, values: &[f64]) -> Arc<Channel> {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::scalar(at(i as i64), *v))
            .collect();
        let buffer = Arc::new(PlotSamples::with_samples(name, samples).unwrap());
        Arc::new(Channel::new(name, buffer))
    }

    #[test]
    fn test_copies_in_buffer_order_with_tags() {
        let _ = env_logger::builder().is_test(true).try_init();
        let a = plot_channel("a", &[1.0, 2.0]);
        let b = plot_channel("b", &[3.0]);
        b.set_filter(SampleFilter::AlarmUp);

        let snapshot = SnapshotCollector::default().collect(&[a.clone(), b.clone()]);

        assert!(!snapshot.is_partial());
        assert_eq!(snapshot.total_count(), 3);
        let values: Vec<(String, f64)> = snapshot
            .entries
            .iter()
            .map(|e| (e.channel.name.clone(), e.sample.value.range().unwrap().0))
            .collect();
        assert_eq!(
            values,
            vec![("a".to_string(), 1.0), ("a".to_string(), 2.0), ("b".to_string(), 3.0)]
        );
        assert_eq!(snapshot.entries[2].channel.filter, SampleFilter::AlarmUp);
        assert!(Arc::ptr_eq(&snapshot.entries[0].channel, &snapshot.entries[1].channel));
    }

    #[test]
    fn test_lock_timeout_skips_channel() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut stuck = MockSampleBuffer::new();
        stuck
            .expect_try_lock_for()
            .with(eq(Duration::from_millis(5)))
            .times(1)
            .returning(|_| false);
        stuck.expect_unlock().times(0);
        stuck.expect_len().times(0);

        let good = plot_channel("good", &[1.0, 2.0]);
        let stuck = Arc::new(Channel::new("stuck", Arc::new(stuck)));

        let snapshot = SnapshotCollector::new(Duration::from_millis(5)).collect(&[stuck, good]);

        assert!(snapshot.is_partial());
        assert_eq!(snapshot.total_count(), 2);
        assert_eq!(snapshot.channels.len(), 1);
        assert_eq!(snapshot.channels[0].name, "good");
        assert!(matches!(
            &snapshot.failures[0],
            SampleViewError::LockTimeout { channel, .. } if channel == "stuck"
        ));
    }

    #[test]
    fn test_access_failure_releases_lock_and_drops_channel() {
        let mut shrinking = MockSampleBuffer::new();
        shrinking.expect_try_lock_for().times(1).returning(|_| true);
        shrinking.expect_len().return_const(3usize);
        shrinking
            .expect_get()
            .with(eq(0))
            .returning(|_| Some(Sample::scalar(at(0), 1.0)));
        shrinking.expect_get().with(eq(1)).returning(|_| None);
        shrinking.expect_unlock().times(1).return_const(());

        let channel = Arc::new(Channel::new("shrinking", Arc::new(shrinking)));
        let snapshot = SnapshotCollector::default().collect(&[channel]);

        assert!(snapshot.is_partial());
        assert_eq!(snapshot.total_count(), 0);
        assert!(matches!(
            &snapshot.failures[0],
            SampleViewError::BufferAccess { index: 1, len: 3, .. }
        ));
    }

    #[test]
    fn test_buffer_unlocked_after_copy() {
        let samples = Arc::new(PlotSamples::new("x"));
        samples.append(Sample::scalar(at(0), 1.0)).unwrap();
        let channel = Arc::new(Channel::new("x", samples.clone()));

        SnapshotCollector::default().collect(&[channel]);
        assert!(!samples.is_locked());
    }

    #[test]
    fn test_visibility_override_lands_in_tag() {
        let channel = plot_channel("a", &[1.0]);
        let snapshot = SnapshotCollector::default().collect_with_visibility(&[(channel, false)]);
        assert!(!snapshot.entries[0].channel.visible);
    }

    #[test]
    fn test_empty_request() {
        let snapshot = SnapshotCollector::default().collect(&[]);
        assert_eq!(snapshot.total_count(), 0);
        assert!(!snapshot.is_partial());
    }
}
