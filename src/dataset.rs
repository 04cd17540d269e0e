//! JSON channel dataset used by the command-line viewer.
//!
//! Stands in for the archive/live acquisition layer: it creates one
//! [`PlotSamples`] buffer per channel and can feed newer samples into them
//! later, the way a live-update feed would.

use crate::buffer::PlotSamples;
use crate::channel::{Channel, ChannelModel};
use crate::filter::SampleFilter;
use crate::sample::Sample;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelData {
    pub name: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub filter: SampleFilter,
    #[serde(default)]
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub channels: Vec<ChannelData>,
}

/// Buffers created from a dataset, by channel name.
pub type Feeds = HashMap<String, Arc<PlotSamples>>;

impl Dataset {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid dataset {}", path.display()))
    }

    /// Build the channel model. Samples must be time-ordered per channel.
    pub fn build(&self) -> Result<(Arc<ChannelModel>, Feeds)> {
        let model = Arc::new(ChannelModel::new());
        let mut feeds = HashMap::new();

        for data in &self.channels {
            let buffer = Arc::new(
                PlotSamples::with_samples(&data.name, data.samples.clone())
                    .with_context(|| format!("Channel '{}'", data.name))?,
            );
            let channel = Channel::new(&data.name, buffer.clone());
            channel.set_visible(data.visible);
            channel.set_filter(data.filter);
            model.add(channel)?;
            feeds.insert(data.name.clone(), buffer);
        }

        Ok((model, feeds))
    }

    /// Append samples the buffers do not hold yet. Samples sharing the newest
    /// buffered timestamp count as held up to the number already buffered at
    /// that time. Channels not present in `feeds` are ignored. Returns the
    /// number of samples added.
    pub fn feed(&self, feeds: &Feeds) -> usize {
        let mut added = 0;
        for data in &self.channels {
            let Some(buffer) = feeds.get(&data.name) else {
                debug!("Dataset channel '{}' is not tracked, skipped", data.name);
                continue;
            };
            let (last, mut held_at_last) = match buffer.tail() {
                Some((time, run)) => (Some(time), run),
                None => (None, 0),
            };
            let fresh = data
                .samples
                .iter()
                .filter(|s| match last {
                    None => true,
                    Some(t) if s.time > t => true,
                    Some(t) if s.time == t && held_at_last > 0 => {
                        held_at_last -= 1;
                        false
                    }
                    Some(t) => s.time == t,
                })
                .cloned();
            match buffer.extend(fresh) {
                Ok(n) => added += n,
                Err(e) => warn!("Feeding '{}': {}", data.name, e),
            }
        }
        added
    }
}
