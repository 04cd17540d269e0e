use crate::channel::Channel;
use crate::publisher::SampleViewUpdate;
use crate::sample::Sample;
use std::sync::Arc;
use std::time::Duration;

/// Append-ordered, lockable per-channel sample storage owned by the
/// acquisition layer.
///
/// Readers must pair every successful `try_lock_for` with exactly one
/// `unlock`, made by the same caller. An implementation may ignore an
/// `unlock` from a caller that does not hold the lock, but need not detect
/// it. Samples are non-decreasing by timestamp.
#[cfg_attr(test, mockall::automock)]
pub trait SampleBuffer: Send + Sync {
    /// Wait at most `timeout` for exclusive access. Returns false on timeout.
    fn try_lock_for(&self, timeout: Duration) -> bool;

    /// Release a lock taken with `try_lock_for`.
    fn unlock(&self);

    fn len(&self) -> usize;

    /// Sample at `index`, `None` if out of range.
    fn get(&self, index: usize) -> Option<Sample>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Enumerates the tracked channels.
#[cfg_attr(test, mockall::automock)]
pub trait ChannelRegistry: Send + Sync {
    fn list_channels(&self) -> Vec<Arc<Channel>>;

    fn visibility(&self, channel: &Channel) -> bool {
        channel.is_visible()
    }
}

/// Presentation layer receiving finished refreshes on the consumer thread.
#[cfg_attr(test, mockall::automock)]
pub trait RefreshSink {
    fn on_refresh_complete(&mut self, update: &SampleViewUpdate);
}

/// Boxed unit of refresh work handed to a `TaskExecutor`.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs refresh work off the consumer thread.
#[cfg_attr(test, mockall::automock)]
pub trait TaskExecutor: Send + Sync {
    fn submit(&self, task: Task);
}
