//! Sample view controller - selection, background refresh and publishing
//!
//! A refresh runs in three steps:
//! 1. **Issue** (consumer thread): resolve the selection to channels, take a
//!    sequence number and hand the work to the executor
//! 2. **Collect and filter** (worker): best-effort buffer snapshot, then one
//!    filter pass
//! 3. **Publish** (consumer thread): results come back over a channel and are
//!    applied by the [`ResultPublisher`] unless a newer refresh is already
//!    shown
//!
//! There is no cancellation. A superseded refresh runs to completion and is
//! dropped at publish time if it lost the race.

use crate::channel::Channel;
use crate::command::ChangeFilterCommand;
use crate::config::SampleViewConfig;
use crate::engine;
use crate::error::{Result, SampleViewError};
use crate::filter::SampleFilter;
use crate::publisher::{PublishOutcome, RefreshResult, RefreshSequencer, ResultPublisher, SampleViewUpdate};
use crate::snapshot::SnapshotCollector;
use crate::status::SampleViewStatus;
use crate::traits::{ChannelRegistry, RefreshSink, TaskExecutor};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

/// What the sample view shows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selection {
    /// One channel, by name
    Channel(String),
    /// Every tracked channel merged
    All,
}

impl Selection {
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Channel(name) => f.write_str(name),
            Selection::All => f.write_str("All"),
        }
    }
}

/// Spawns one named thread per refresh.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl TaskExecutor for ThreadExecutor {
    fn submit(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        if let Err(e) = thread::Builder::new()
            .name("sampleview-refresh".to_string())
            .spawn(task)
        {
            error!("Failed to start refresh worker: {}", e);
        }
    }
}

pub struct SampleViewController<R, E>
where
    R: ChannelRegistry,
    E: TaskExecutor,
{
    registry: Arc<R>,
    executor: E,
    collector: Arc<SnapshotCollector>,
    sequencer: Arc<RefreshSequencer>,
    publisher: ResultPublisher,
    selection: Option<Selection>,

    // Worker -> consumer hand-off
    results_tx: Sender<RefreshResult>,
    results_rx: Receiver<RefreshResult>,

    status_shared: Arc<RwLock<SampleViewStatus>>,
}

impl<R, E> SampleViewController<R, E>
where
    R: ChannelRegistry,
    E: TaskExecutor,
{
    pub fn new(
        registry: Arc<R>,
        executor: E,
        status_shared: Arc<RwLock<SampleViewStatus>>,
        config: &SampleViewConfig,
    ) -> Self {
        info!(
            "Sample view: lock timeout {:?}, hide invisible in All: {}",
            config.lock_timeout(),
            config.view.hide_invisible_in_all
        );

        let sequencer = Arc::new(RefreshSequencer::new());
        let publisher = ResultPublisher::new(
            sequencer.clone(),
            status_shared.clone(),
            config.view.hide_invisible_in_all,
        );
        let (results_tx, results_rx) = mpsc::channel();

        SampleViewController {
            registry,
            executor,
            collector: Arc::new(SnapshotCollector::new(config.lock_timeout())),
            sequencer,
            publisher,
            selection: None,
            results_tx,
            results_rx,
            status_shared,
        }
    }

    // ========================================================================
    // PUBLIC API
    // ========================================================================

    pub fn get_status_shared(&self) -> Arc<RwLock<SampleViewStatus>> {
        self.status_shared.clone()
    }

    pub fn set_sink(&mut self, sink: Box<dyn RefreshSink>) {
        self.publisher.set_sink(sink);
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Channel names in registry order, followed by `All` if there is any
    /// channel at all.
    pub fn selection_choices(&self) -> Vec<Selection> {
        let mut choices: Vec<Selection> = self
            .registry
            .list_channels()
            .iter()
            .map(|c| Selection::Channel(c.name().to_string()))
            .collect();
        if !choices.is_empty() {
            choices.push(Selection::All);
        }
        choices
    }

    /// Change the selection and refresh for it. Returns the refresh sequence.
    pub fn select(&mut self, selection: Selection) -> Option<u64> {
        info!("Sample view selection: {}", selection);
        self.selection = Some(selection);
        self.refresh()
    }

    /// Start a background refresh of the current selection.
    ///
    /// Explicit refreshes and live-update ticks both land here. Returns the
    /// sequence number, or `None` when nothing is selected.
    pub fn refresh(&mut self) -> Option<u64> {
        let selection = self.selection.clone()?;
        let requests = self.resolve(&selection);
        let sequence = self.sequencer.issue();
        debug!("[Refresh] #{} issued for {} ({} channels)", sequence, selection, requests.len());

        let collector = self.collector.clone();
        let results = self.results_tx.clone();
        self.executor.submit(Box::new(move || {
            let snapshot = collector.collect_with_visibility(&requests);
            let filtered = engine::apply(&snapshot.entries);
            let result = RefreshResult {
                sequence,
                selection,
                filtered,
                total_count: snapshot.total_count(),
                failed_channels: snapshot.failures.iter().map(|e| e.channel().to_string()).collect(),
            };
            if results.send(result).is_err() {
                debug!("[Refresh] #{} finished after the view closed", sequence);
            }
        }));

        Some(sequence)
    }

    /// Apply every finished refresh without blocking. Call from the consumer
    /// thread.
    pub fn pump(&mut self) -> Vec<PublishOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(result) = self.results_rx.try_recv() {
            outcomes.push(self.publisher.publish(result));
        }
        outcomes
    }

    /// Block until a refresh is applied or `timeout` passes. Stale results
    /// received meanwhile are dropped.
    /// A timeout too large to represent waits without a deadline.
    pub fn wait_for_update(&mut self, timeout: Duration) -> Option<SampleViewUpdate> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let received = match deadline {
                Some(deadline) => self
                    .results_rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => self.results_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(result) => {
                    if let PublishOutcome::Applied(update) = self.publisher.publish(result) {
                        return Some(update);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Change a channel's filter through an undoable command. The command is
    /// returned already applied so the caller can push it onto its history.
    pub fn set_filter(&self, channel: &str, filter: SampleFilter) -> Result<ChangeFilterCommand> {
        let channel = self.find(channel)?;
        let command = ChangeFilterCommand::new(channel, filter);
        command.run();
        Ok(command)
    }

    // ========================================================================
    // UTILITY METHODS
    // ========================================================================

    fn find(&self, name: &str) -> Result<Arc<Channel>> {
        self.registry
            .list_channels()
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| SampleViewError::UnknownChannel(name.to_string()))
    }

    /// Channels to snapshot, with their merged-view visibility.
    fn resolve(&self, selection: &Selection) -> Vec<(Arc<Channel>, bool)> {
        let channels = match selection {
            Selection::All => self.registry.list_channels(),
            Selection::Channel(name) => match self.find(name) {
                Ok(channel) => vec![channel],
                Err(e) => {
                    warn!("Sample view: {}", e);
                    Vec::new()
                }
            },
        };
        channels
            .into_iter()
            .map(|c| {
                let visible = self.registry.visibility(&c);
                (c, visible)
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
