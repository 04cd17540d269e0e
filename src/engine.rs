//! Change-detection filter over channel snapshots.
//!
//! ## The Problem
//! A channel's history can hold thousands of samples where nothing happens.
//! Operators want the few where something did: an alarm got worse or changed,
//! or the value crossed a threshold.
//!
//! ## Algorithm
//! Entries are visited in the order given. For every channel the pass keeps a
//! *reference sample*, seeded with the first sample seen for that channel. Each
//! later sample is evaluated against the reference according to the channel's
//! filter, which yields a [`Verdict`]: keep the sample or not, and whether it
//! becomes the new reference.
//!
//! | Filter            | Kept when                               | Reference advances |
//! |-------------------|-----------------------------------------|--------------------|
//! | None              | always                                  | never              |
//! | Alarm up          | severity ranks above the reference's    | always             |
//! | Alarm change      | severity differs from the reference's   | when kept          |
//! | Threshold up      | value rises above the threshold         | always             |
//! | Threshold change  | value crosses the threshold either way  | when kept          |
//!
//! Values are compared as ranges so single readings and statistical bundles
//! share one rule: a reading covers `[v, v]`, a bundle `[min, max]`. A bundle
//! whose own range straddles the threshold always counts as a crossing, even
//! though the exact crossing point inside it is unknown. When such a bundle is
//! the reference, its average decides which side it is on.
//!
//! Samples that cannot be compared (text, missing, NaN) are always kept by the
//! threshold filters and never become the reference.
//!
//! All per-channel state lives in the pass and is dropped when it returns.

use crate::channel::ChannelId;
use crate::filter::SampleFilter;
use crate::sample::Sample;
use crate::snapshot::SnapshotEntry;
use log::debug;
use std::collections::HashMap;

/// Outcome of evaluating one sample against its channel's reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Sample goes into the filtered view
    pub keep: bool,
    /// Sample replaces the channel's reference
    pub advance: bool,
}

impl Verdict {
    const fn new(keep: bool, advance: bool) -> Self {
        Verdict { keep, advance }
    }
}

/// Side of `threshold` the reference is on, true for above. A reference
/// bundle that straddles the threshold is placed by its average, or by the
/// middle of its range when the average is unusable.
fn reference_above(reference: &Sample, range: (f64, f64), threshold: f64) -> bool {
    if range.1 <= threshold {
        return false;
    }
    if range.0 > threshold {
        return true;
    }
    let representative = reference
        .value
        .representative()
        .unwrap_or((range.0 + range.1) / 2.0);
    representative > threshold
}

/// A range is "above" `threshold` when its lower bound exceeds it.
fn rises_above(from_above: bool, current: (f64, f64), threshold: f64) -> bool {
    !from_above && current.0 > threshold
}

fn falls_below(from_above: bool, current: (f64, f64), threshold: f64) -> bool {
    from_above && current.1 <= threshold
}

/// Bundle spans both sides of the threshold. Never true for single readings.
fn straddles(current: (f64, f64), threshold: f64) -> bool {
    current.0 <= threshold && current.1 > threshold
}

/// Evaluate `current` against `reference` under `filter`.
pub fn evaluate(filter: &SampleFilter, reference: &Sample, current: &Sample) -> Verdict {
    match filter {
        SampleFilter::None => Verdict::new(true, false),
        SampleFilter::AlarmUp => Verdict::new(current.severity > reference.severity, true),
        SampleFilter::AlarmChanges => {
            let changed = current.severity != reference.severity;
            Verdict::new(changed, changed)
        }
        SampleFilter::ThresholdUp { threshold } => {
            match (reference.value.range(), current.value.range()) {
                (_, None) => Verdict::new(true, false),
                (None, Some(_)) => Verdict::new(false, true),
                (Some(prev), Some(cur)) => {
                    let above = reference_above(reference, prev, *threshold);
                    let crossed = rises_above(above, cur, *threshold) || straddles(cur, *threshold);
                    Verdict::new(crossed, true)
                }
            }
        }
        SampleFilter::ThresholdChanges { threshold } => {
            match (reference.value.range(), current.value.range()) {
                (_, None) => Verdict::new(true, false),
                (None, Some(_)) => Verdict::new(false, true),
                (Some(prev), Some(cur)) => {
                    let above = reference_above(reference, prev, *threshold);
                    let crossed = rises_above(above, cur, *threshold)
                        || falls_below(above, cur, *threshold)
                        || straddles(cur, *threshold);
                    Verdict::new(crossed, crossed)
                }
            }
        }
    }
}

/// Verdict for the first sample of a channel, which has no reference.
///
/// Nothing can have crossed or changed yet, so only `None` shows it; the
/// threshold filters still show a first sample they cannot compare.
pub fn evaluate_first(filter: &SampleFilter, first: &Sample) -> Verdict {
    match filter {
        SampleFilter::None => Verdict::new(true, false),
        SampleFilter::ThresholdUp { .. } | SampleFilter::ThresholdChanges { .. }
            if first.value.range().is_none() =>
        {
            Verdict::new(true, false)
        }
        _ => Verdict::new(false, false),
    }
}

/// Run one filter pass.
///
/// `entries` must keep each channel's samples in time order; runs of
/// different channels may be interleaved arbitrarily. Each channel is filtered
/// with the filter captured in its tag.
pub fn apply(entries: &[SnapshotEntry]) -> Vec<SnapshotEntry> {
    let mut references: HashMap<ChannelId, &Sample> = HashMap::new();
    let mut kept = Vec::new();

    for entry in entries {
        let filter = &entry.channel.filter;
        let verdict = match references.get(&entry.channel.id).copied() {
            Some(reference) => evaluate(filter, reference, &entry.sample),
            None => {
                references.insert(entry.channel.id, &entry.sample);
                evaluate_first(filter, &entry.sample)
            }
        };

        if verdict.advance {
            references.insert(entry.channel.id, &entry.sample);
        }
        if verdict.keep {
            kept.push(entry.clone());
        }
    }

    debug!(
        "[Filter] {} of {} samples kept across {} channels",
        kept.len(),
        entries.len(),
        references.len()
    );
    kept
}
