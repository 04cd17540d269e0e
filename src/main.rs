use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sampleview::channel::ChannelModel;
use sampleview::config::SampleViewConfig;
use sampleview::controller::{SampleViewController, Selection, ThreadExecutor};
use sampleview::dataset::Dataset;
use sampleview::filter::{FilterKind, SampleFilter};
use sampleview::publisher::PublishOutcome;
use sampleview::status::SampleViewStatus;
use sampleview::traits::ChannelRegistry;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Channel dataset (JSON)
    #[arg(short, long)]
    data: PathBuf,

    /// Config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show one channel
    #[arg(long, conflicts_with = "all")]
    channel: Option<String>,

    /// Show all channels merged
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Filter for the shown channel(s): "None", "Alarm up", "Alarm change",
    /// "Threshold up", "Threshold change"
    #[arg(long)]
    filter: Option<FilterKind>,

    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    /// Print the view as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Keep re-reading the dataset and refreshing until Ctrl+C
    #[arg(long, default_value_t = false)]
    watch: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

type Controller = SampleViewController<ChannelModel, ThreadExecutor>;

fn print_status(status: &SampleViewStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    println!("{} - {}", status.selection, status.count_label());
    if status.partial {
        println!("  unavailable: {}", status.failed_channels.join(", "));
    }
    for row in &status.rows {
        if status.show_channel_column {
            println!(
                "{:<24} {:<20} {:<9} {:<12} {:<24} {}",
                row.time, row.value, row.severity, row.status, row.channel, row.source
            );
        } else {
            println!(
                "{:<24} {:<20} {:<9} {:<12} {}",
                row.time, row.value, row.severity, row.status, row.source
            );
        }
    }
    Ok(())
}

fn print_current(controller: &Controller, json: bool) -> Result<()> {
    let shared = controller.get_status_shared();
    let status = shared
        .read()
        .map_err(|_| anyhow!("Sample view status lock poisoned"))?
        .clone();
    print_status(&status, json)
}

/// Resolve the requested filter against the channel's current one.
fn requested_filter(current: SampleFilter, kind: Option<FilterKind>, threshold: Option<f64>) -> Option<SampleFilter> {
    match (kind, threshold) {
        (None, None) => None,
        (Some(kind), Some(t)) => Some(SampleFilter::from_parts(kind, t)),
        (Some(kind), None) => Some(current.with_kind(kind, current.threshold())),
        (None, Some(t)) => Some(current.with_threshold(t)),
    }
}

/// How long to wait for the first refresh: worst case every channel waits out
/// its lock timeout. Saturates instead of overflowing.
fn patience(lock_timeout: Duration, channels: usize) -> Duration {
    u32::try_from(channels)
        .ok()
        .and_then(|n| n.checked_add(1))
        .and_then(|n| lock_timeout.checked_mul(n))
        .and_then(|d| d.checked_add(Duration::from_secs(1)))
        .unwrap_or(Duration::MAX)
}

fn apply_filters(controller: &Controller, model: &ChannelModel, selection: &Selection, args: &Args) -> Result<()> {
    let targets: Vec<String> = match selection {
        Selection::Channel(name) => vec![name.clone()],
        Selection::All => model.list_channels().iter().map(|c| c.name().to_string()).collect(),
    };
    for name in targets {
        let current = model
            .get(&name)
            .ok_or_else(|| anyhow!("Unknown channel '{}'", name))?
            .filter();
        if let Some(filter) = requested_filter(current, args.filter, args.threshold) {
            let command = controller.set_filter(&name, filter)?;
            info!("{}: {} ({} -> {})", command.label(), name, command.old_filter(), command.new_filter());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::builder()
        .format_timestamp(None)
        .filter_level(if args.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .init();

    let mut config = match &args.config {
        Some(path) => SampleViewConfig::load(path)?,
        None => SampleViewConfig::default(),
    };
    if let Some(ms) = args.lock_timeout_ms {
        config.snapshot.lock_timeout_ms = ms;
    }

    let dataset = Dataset::load(&args.data)?;
    let (model, feeds) = dataset.build()?;
    if model.is_empty() {
        warn!("Dataset {} has no channels", args.data.display());
    }

    let selection = match (&args.channel, args.all) {
        (Some(name), _) => Selection::Channel(name.clone()),
        (None, true) => Selection::All,
        (None, false) if model.len() == 1 => Selection::Channel(model.list_channels()[0].name().to_string()),
        (None, false) => Selection::All,
    };

    let status = Arc::new(std::sync::RwLock::new(SampleViewStatus::default()));
    let mut controller = SampleViewController::new(model.clone(), ThreadExecutor, status, &config);
    apply_filters(&controller, &model, &selection, &args)?;

    let first_wait = patience(config.lock_timeout(), model.len());

    controller.select(selection);
    if controller.wait_for_update(first_wait).is_none() {
        error!("No sample view update within {:?}", first_wait);
    }
    print_current(&controller, args.json)?;

    if !args.watch {
        return Ok(());
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Stopping watch...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    info!("Watching {} every {:?}", args.data.display(), config.refresh_interval());
    let mut last_tick = Instant::now();

    while running.load(Ordering::SeqCst) {
        for outcome in controller.pump() {
            if let PublishOutcome::Applied(_) = outcome {
                print_current(&controller, args.json)?;
            }
        }

        if last_tick.elapsed() >= config.refresh_interval() {
            last_tick = Instant::now();
            match Dataset::load(&args.data) {
                Ok(latest) => {
                    let added = latest.feed(&feeds);
                    if added > 0 {
                        info!("Live update: {} new samples", added);
                    }
                }
                Err(e) => warn!("Reload failed: {:#}", e),
            }
            controller.refresh();
        }

        thread::sleep(Duration::from_millis(20));
    }

    info!("Exiting.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_filter_resolution() {
        let current = SampleFilter::ThresholdUp { threshold: 4.0 };
        assert_eq!(requested_filter(current, None, None), None);
        assert_eq!(
            requested_filter(current, Some(FilterKind::ThresholdChanges), None),
            Some(SampleFilter::ThresholdChanges { threshold: 4.0 })
        );
        assert_eq!(
            requested_filter(current, None, Some(9.0)),
            Some(SampleFilter::ThresholdUp { threshold: 9.0 })
        );
        assert_eq!(
            requested_filter(SampleFilter::None, Some(FilterKind::AlarmUp), Some(1.0)),
            Some(SampleFilter::AlarmUp)
        );
    }

    #[test]
    fn test_patience_saturates() {
        assert_eq!(patience(Duration::from_secs(2), 3), Duration::from_secs(9));
        assert_eq!(patience(Duration::from_millis(u64::MAX), 4), Duration::MAX);
        assert_eq!(patience(Duration::MAX, 0), Duration::MAX);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "sampleview", "--data", "d.json", "--channel", "a", "--filter", "threshold-up", "--threshold", "2.5",
        ])
        .unwrap();
        assert_eq!(args.filter, Some(FilterKind::ThresholdUp));
        assert_eq!(args.threshold, Some(2.5));

        assert!(Args::try_parse_from(["sampleview", "--data", "d.json", "--channel", "a", "--all"]).is_err());
    }
}
