use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleViewConfig {
    pub snapshot: SnapshotConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub lock_timeout_ms: u64,     // bounded wait per sample buffer
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub hide_invisible_in_all: bool,  // merged view skips channels hidden in the plot
    pub refresh_interval_ms: u64,     // live-update tick for watch mode
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            lock_timeout_ms: 2_000,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            hide_invisible_in_all: true,
            refresh_interval_ms: 1_000,
        }
    }
}

impl SampleViewConfig {
    /// Read a JSON config file. Missing sections and fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: SampleViewConfig = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot.lock_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.view.refresh_interval_ms.max(1))
    }
}
