use chrono::{DateTime, TimeZone, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use sampleview::buffer::PlotSamples;
use sampleview::channel::{Channel, ChannelModel};
use sampleview::config::SampleViewConfig;
use sampleview::controller::{SampleViewController, Selection, ThreadExecutor};
use sampleview::filter::SampleFilter;
use sampleview::publisher::PublishOutcome;
use sampleview::sample::{Sample, SampleValue};
use sampleview::status::SampleViewStatus;
use sampleview::traits::SampleBuffer;

// --- Log capture ---

static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());
static LOGGER_INIT: Once = Once::new();
static LOGGER: CaptureLogger = CaptureLogger;

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            WARNINGS.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

fn capture_warnings() {
    LOGGER_INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Warn);
    });
}

fn warned_about(needle: &str) -> bool {
    WARNINGS.lock().unwrap().iter().any(|w| w.contains(needle))
}

// --- Simulated buffers ---

/// Buffer whose lock takes `delay` to acquire, like one contended by a busy
/// archive reader.
struct SlowBuffer {
    inner: PlotSamples,
    delay: Duration,
}

impl SampleBuffer for SlowBuffer {
    fn try_lock_for(&self, timeout: Duration) -> bool {
        thread::sleep(self.delay.min(timeout));
        self.delay <= timeout && self.inner.try_lock_for(timeout)
    }

    fn unlock(&self) {
        self.inner.unlock()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, index: usize) -> Option<Sample> {
        self.inner.get(index)
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn scalars(values: &[f64]) -> Vec<Sample> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Sample::scalar(at(i as i64), *v))
        .collect()
}

fn config(lock_timeout_ms: u64) -> SampleViewConfig {
    let mut config = SampleViewConfig::default();
    config.snapshot.lock_timeout_ms = lock_timeout_ms;
    config
}

fn controller(
    model: Arc<ChannelModel>,
    config: &SampleViewConfig,
) -> (SampleViewController<ChannelModel, ThreadExecutor>, Arc<RwLock<SampleViewStatus>>) {
    let status = Arc::new(RwLock::new(SampleViewStatus::default()));
    (SampleViewController::new(model, ThreadExecutor, status.clone(), config), status)
}

#[test]
fn test_lock_timeout_on_one_of_three_channels_gives_partial_result() {
    capture_warnings();

    let model = Arc::new(ChannelModel::new());
    let a = Arc::new(PlotSamples::with_samples("press:a", scalars(&[1.0, 2.0])).unwrap());
    let stuck = Arc::new(PlotSamples::with_samples("press:stuck", scalars(&[1.0, 2.0, 3.0, 4.0])).unwrap());
    let c = Arc::new(PlotSamples::with_samples("press:c", scalars(&[5.0, 6.0, 7.0])).unwrap());
    model.add(Channel::new("press:a", a)).unwrap();
    model.add(Channel::new("press:stuck", stuck.clone())).unwrap();
    model.add(Channel::new("press:c", c)).unwrap();

    // acquisition layer holds the buffer for the whole refresh
    assert!(stuck.try_lock_for(Duration::from_millis(10)));

    let (mut ctl, status) = controller(model, &config(50));
    ctl.select(Selection::All);
    let update = ctl.wait_for_update(Duration::from_secs(5)).expect("no update");
    stuck.unlock();

    assert!(update.partial);
    assert_eq!(update.failed_channels, vec!["press:stuck".to_string()]);
    assert_eq!(update.total_count, 5);
    assert_eq!(update.visible_count, 5);
    assert!(update.rows.iter().all(|e| e.channel.name != "press:stuck"));
    assert!(warned_about("press:stuck"));

    let status = status.read().unwrap();
    assert!(status.partial);
    assert_eq!(status.count_label(), "Count: 5 (Visible: 5) [partial]");
}

#[test]
fn test_slow_older_refresh_does_not_overwrite_newer() {
    let model = Arc::new(ChannelModel::new());
    let slow = SlowBuffer {
        inner: PlotSamples::with_samples("slow", scalars(&[1.0, 2.0, 3.0, 4.0])).unwrap(),
        delay: Duration::from_millis(300),
    };
    model.add(Channel::new("slow", Arc::new(slow))).unwrap();
    let fast = PlotSamples::with_samples("fast", scalars(&[9.0])).unwrap();
    model.add(Channel::new("fast", Arc::new(fast))).unwrap();

    let (mut ctl, status) = controller(model, &config(2_000));

    let r1 = ctl.select(Selection::Channel("slow".into())).unwrap();
    let r2 = ctl.select(Selection::Channel("fast".into())).unwrap();

    let update = ctl.wait_for_update(Duration::from_secs(5)).expect("no update");
    assert_eq!(update.sequence, r2);

    // wait for r1 to arrive and be dropped
    let deadline = Instant::now() + Duration::from_secs(5);
    while status.read().unwrap().stale_discarded == 0 && Instant::now() < deadline {
        ctl.pump();
        thread::sleep(Duration::from_millis(10));
    }

    let status = status.read().unwrap();
    assert_eq!(status.stale_discarded, 1, "refresh #{} never completed", r1);
    assert_eq!(status.selection, "fast");
    assert_eq!(status.sequence, r2);
    assert_eq!(status.total_count, 1);
}

#[test]
fn test_ticks_faster_than_lock_timeout_still_publish() {
    let model = Arc::new(ChannelModel::new());
    let held = Arc::new(PlotSamples::with_samples("held", scalars(&[1.0, 2.0])).unwrap());
    let free = Arc::new(PlotSamples::with_samples("free", scalars(&[3.0, 4.0, 5.0])).unwrap());
    model.add(Channel::new("held", held.clone())).unwrap();
    model.add(Channel::new("free", free)).unwrap();
    assert!(held.try_lock_for(Duration::from_millis(10)));

    // every refresh outlives the next tick
    let (mut ctl, status) = controller(model, &config(200));
    ctl.select(Selection::All);

    let mut applied = 0;
    let deadline = Instant::now() + Duration::from_millis(1_500);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(100));
        applied += ctl
            .pump()
            .iter()
            .filter(|o| matches!(o, PublishOutcome::Applied(_)))
            .count();
        ctl.refresh();
    }
    held.unlock();

    assert!(applied > 0, "no refresh was ever published");
    let status = status.read().unwrap();
    assert!(status.sequence > 0);
    assert!(status.partial);
    assert_eq!(status.failed_channels, vec!["held".to_string()]);
    assert_eq!(status.total_count, 3);
}

#[test]
fn test_threshold_up_through_full_pipeline() {
    let t = 50.0;
    let model = Arc::new(ChannelModel::new());
    let buffer = Arc::new(PlotSamples::with_samples("temp", scalars(&[t - 1.0, t - 1.0, t + 1.0, t + 1.0])).unwrap());
    model.add(Channel::new("temp", buffer)).unwrap();

    let (mut ctl, _) = controller(model, &config(1_000));
    ctl.set_filter("temp", SampleFilter::ThresholdUp { threshold: t }).unwrap();
    ctl.select(Selection::Channel("temp".into()));

    let update = ctl.wait_for_update(Duration::from_secs(5)).expect("no update");
    assert_eq!(update.total_count, 4);
    assert_eq!(update.rows.len(), 1);
    assert_eq!(update.rows[0].sample.time, at(2));
}

#[test]
fn test_bundles_crossing_in_merged_view() {
    let t = 10.0;
    let bundle = |secs, min: f64, max: f64| {
        Sample::new(at(secs), SampleValue::Statistics { average: (min + max) / 2.0, min, max, count: 60 })
    };

    let model = Arc::new(ChannelModel::new());
    for (name, filter) in [
        ("up", SampleFilter::ThresholdUp { threshold: t }),
        ("either", SampleFilter::ThresholdChanges { threshold: t }),
    ] {
        let samples = vec![bundle(0, t - 4.0, t - 1.0), bundle(1, t + 1.0, t + 4.0)];
        let buffer = Arc::new(PlotSamples::with_samples(name, samples).unwrap());
        let channel = model.add(Channel::new(name, buffer)).unwrap();
        channel.set_filter(filter);
    }

    let (mut ctl, _) = controller(model, &config(1_000));
    ctl.select(Selection::All);
    let update = ctl.wait_for_update(Duration::from_secs(5)).expect("no update");

    assert!(update.show_channel_column);
    assert_eq!(update.total_count, 4);
    let kept: Vec<(String, DateTime<Utc>)> =
        update.rows.iter().map(|e| (e.channel.name.clone(), e.sample.time)).collect();
    assert_eq!(kept, vec![("up".to_string(), at(1)), ("either".to_string(), at(1))]);
}

#[test]
fn test_refresh_while_live_feed_appends() {
    let model = Arc::new(ChannelModel::new());
    let (channel, feed) = Channel::with_plot_samples("live");
    model.add(channel).unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let writer = {
        let feed = feed.clone();
        let running = running.clone();
        thread::spawn(move || {
            let mut i = 0;
            while running.load(Ordering::SeqCst) && i < 2_000 {
                feed.append(Sample::scalar(at(i), i as f64)).unwrap();
                i += 1;
            }
        })
    };

    let (mut ctl, _) = controller(model, &config(1_000));
    ctl.select(Selection::Channel("live".into()));

    let mut last_total = 0;
    for _ in 0..10 {
        let update = ctl.wait_for_update(Duration::from_secs(5)).expect("no update");
        assert!(!update.partial);
        assert!(update.total_count >= last_total);
        assert_eq!(update.visible_count, update.total_count);
        assert!(update.rows.windows(2).all(|w| w[0].sample.time <= w[1].sample.time));
        last_total = update.total_count;
        ctl.refresh();
    }

    running.store(false, Ordering::SeqCst);
    writer.join().unwrap();
    assert!(!feed.is_locked());
}
