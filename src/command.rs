use crate::channel::Channel;
use crate::filter::SampleFilter;
use log::info;
use std::sync::Arc;

/// Reversible change of a channel's sample view filter.
///
/// Captures the filter in effect at construction time so an external
/// undo/history manager can restore it.
#[derive(Debug, Clone)]
pub struct ChangeFilterCommand {
    channel: Arc<Channel>,
    old_filter: SampleFilter,
    new_filter: SampleFilter,
}

impl ChangeFilterCommand {
    pub fn new(channel: Arc<Channel>, new_filter: SampleFilter) -> Self {
        let old_filter = channel.filter();
        ChangeFilterCommand {
            channel,
            old_filter,
            new_filter,
        }
    }

    pub fn label(&self) -> &'static str {
        "Change Sample View Filter"
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    pub fn old_filter(&self) -> SampleFilter {
        self.old_filter
    }

    pub fn new_filter(&self) -> SampleFilter {
        self.new_filter
    }

    pub fn run(&self) {
        info!("[{}] filter: {} -> {}", self.channel.name(), self.old_filter, self.new_filter);
        self.channel.set_filter(self.new_filter);
    }

    pub fn undo(&self) {
        info!("[{}] filter restored: {}", self.channel.name(), self.old_filter);
        self.channel.set_filter(self.old_filter);
    }
}
