//! Tracked channels and the in-memory channel registry.

use crate::buffer::PlotSamples;
use crate::error::{Result, SampleViewError};
use crate::filter::SampleFilter;
use crate::traits::{ChannelRegistry, SampleBuffer};
use log::info;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique channel identity. Names may repeat or change; ids do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    fn next() -> Self {
        ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One tracked source: sample buffer, visibility in the merged view and
/// sample view filter.
pub struct Channel {
    id: ChannelId,
    name: String,
    visible: AtomicBool,
    filter: RwLock<SampleFilter>,
    buffer: Arc<dyn SampleBuffer>,
}

impl Channel {
    pub fn new(name: &str, buffer: Arc<dyn SampleBuffer>) -> Self {
        Channel {
            id: ChannelId::next(),
            name: name.to_string(),
            visible: AtomicBool::new(true),
            filter: RwLock::new(SampleFilter::default()),
            buffer,
        }
    }

    /// Channel backed by a fresh, empty [`PlotSamples`] buffer.
    pub fn with_plot_samples(name: &str) -> (Self, Arc<PlotSamples>) {
        let samples = Arc::new(PlotSamples::new(name));
        (Self::new(name, samples.clone()), samples)
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &Arc<dyn SampleBuffer> {
        &self.buffer
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn filter(&self) -> SampleFilter {
        match self.filter.read() {
            Ok(f) => *f,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Replace the filter, returning the previous one.
    ///
    /// Goes through [`crate::command::ChangeFilterCommand`] when the change
    /// must be undoable.
    pub fn set_filter(&self, filter: SampleFilter) -> SampleFilter {
        let mut current = match self.filter.write() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *current, filter)
    }

    /// Immutable identity for one snapshot pass.
    pub fn tag(&self) -> ChannelTag {
        self.tag_as(self.is_visible())
    }

    /// Like [`Channel::tag`], with visibility decided by the caller (the
    /// registry may override the channel's own flag).
    pub fn tag_as(&self, visible: bool) -> ChannelTag {
        ChannelTag {
            id: self.id,
            name: self.name.clone(),
            visible,
            filter: self.filter(),
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("visible", &self.is_visible())
            .field("filter", &self.filter())
            .finish()
    }
}

/// Channel state captured when its buffer was copied. Shared by every
/// snapshot entry of that channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTag {
    pub id: ChannelId,
    pub name: String,
    pub visible: bool,
    pub filter: SampleFilter,
}

/// Ordered set of channels backing the sample view.
#[derive(Default)]
pub struct ChannelModel {
    channels: RwLock<Vec<Arc<Channel>>>,
}

impl ChannelModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, channel: Channel) -> Result<Arc<Channel>> {
        let mut channels = match self.channels.write() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        if channels.iter().any(|c| c.name() == channel.name()) {
            return Err(SampleViewError::DuplicateChannel(channel.name().to_string()));
        }
        info!("Tracking channel '{}' ({})", channel.name(), channel.id());
        let channel = Arc::new(channel);
        channels.push(channel.clone());
        Ok(channel)
    }

    pub fn remove(&self, name: &str) -> Result<Arc<Channel>> {
        let mut channels = match self.channels.write() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let pos = channels
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| SampleViewError::UnknownChannel(name.to_string()))?;
        Ok(channels.remove(pos))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.list_channels().into_iter().find(|c| c.name() == name)
    }

    pub fn len(&self) -> usize {
        self.list_channels().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChannelRegistry for ChannelModel {
    fn list_channels(&self) -> Vec<Arc<Channel>> {
        match self.channels.read() {
            Ok(c) => c.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
