//! Lockable in-memory sample buffer.
//!
//! `PlotSamples` plays the acquisition side of the contract: the archive or
//! live feed appends through it, and readers bracket their positional reads
//! with `try_lock_for` / `unlock`. The lock is a gate guarded by a mutex and
//! condvar so a reader can wait with a bound. The gate records the holding
//! thread, and an `unlock` from any other thread is ignored.

use crate::error::{Result, SampleViewError};
use crate::sample::Sample;
use crate::traits::SampleBuffer;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

pub struct PlotSamples {
    channel: String,
    holder: Mutex<Option<ThreadId>>,
    released: Condvar,
    samples: RwLock<Vec<Sample>>,
}

impl PlotSamples {
    pub fn new(channel: &str) -> Self {
        PlotSamples {
            channel: channel.to_string(),
            holder: Mutex::new(None),
            released: Condvar::new(),
            samples: RwLock::new(Vec::new()),
        }
    }

    pub fn with_samples(channel: &str, samples: Vec<Sample>) -> Result<Self> {
        let buffer = Self::new(channel);
        buffer.extend(samples)?;
        Ok(buffer)
    }

    /// Append one sample, waiting as long as needed for the lock.
    pub fn append(&self, sample: Sample) -> Result<()> {
        self.acquire(None);
        let result = self.push_locked(sample);
        self.unlock();
        result
    }

    /// Append one sample, giving up after `timeout`.
    pub fn append_within(&self, sample: Sample, timeout: Duration) -> Result<()> {
        if !self.acquire(Some(timeout)) {
            return Err(SampleViewError::LockTimeout {
                channel: self.channel.clone(),
                timeout,
            });
        }
        let result = self.push_locked(sample);
        self.unlock();
        result
    }

    /// Append a batch under one lock. Stops at the first out-of-order sample;
    /// samples before it stay appended.
    pub fn extend(&self, samples: impl IntoIterator<Item = Sample>) -> Result<usize> {
        self.acquire(None);
        let mut added = 0;
        let mut result = Ok(());
        for sample in samples {
            if let Err(e) = self.push_locked(sample) {
                result = Err(e);
                break;
            }
            added += 1;
        }
        self.unlock();
        result.map(|_| added)
    }

    /// Timestamp of the newest sample.
    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.read_samples().last().map(|s| s.time)
    }

    /// Newest timestamp and how many samples at the end carry it.
    pub fn tail(&self) -> Option<(DateTime<Utc>, usize)> {
        let samples = self.read_samples();
        let last = samples.last()?.time;
        let run = samples.iter().rev().take_while(|s| s.time == last).count();
        Some((last, run))
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_locked(&self) -> bool {
        self.gate().is_some()
    }

    fn push_locked(&self, sample: Sample) -> Result<()> {
        let mut samples = match self.samples.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(last) = samples.last() {
            if sample.time < last.time {
                return Err(SampleViewError::OutOfOrder {
                    channel: self.channel.clone(),
                    time: sample.time,
                    last: last.time,
                });
            }
        }
        samples.push(sample);
        Ok(())
    }

    fn acquire(&self, timeout: Option<Duration>) -> bool {
        let gate = self.gate();
        let mut gate = match timeout {
            Some(timeout) => {
                let (gate, wait) = match self.released.wait_timeout_while(gate, timeout, |h| h.is_some()) {
                    Ok(res) => res,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if wait.timed_out() && gate.is_some() {
                    debug!("[{}] lock wait timed out after {:?}", self.channel, timeout);
                    return false;
                }
                gate
            }
            None => match self.released.wait_while(gate, |h| h.is_some()) {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            },
        };
        *gate = Some(thread::current().id());
        true
    }

    fn gate(&self) -> MutexGuard<'_, Option<ThreadId>> {
        match self.holder.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_samples(&self) -> RwLockReadGuard<'_, Vec<Sample>> {
        match self.samples.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SampleBuffer for PlotSamples {
    fn try_lock_for(&self, timeout: Duration) -> bool {
        self.acquire(Some(timeout))
    }

    fn unlock(&self) {
        let mut gate = self.gate();
        match *gate {
            Some(holder) if holder == thread::current().id() => {
                *gate = None;
                drop(gate);
                self.released.notify_all();
            }
            Some(_) => warn!("[{}] unlock from a thread not holding the lock ignored", self.channel),
            None => debug!("[{}] unlock without lock", self.channel),
        }
    }

    fn len(&self) -> usize {
        self.read_samples().len()
    }

    fn get(&self, index: usize) -> Option<Sample> {
        self.read_samples().get(index).cloned()
    }
}
