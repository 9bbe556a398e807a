use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Upper bound on backfill when the persisted watermark is stale.
const MAX_BACKFILL_HOURS: i64 = 24;

/// Half-open `[start, end)` time range covered by one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Compute the poll window for one cycle.
///
/// `end` is always `now`. With no persisted watermark the window looks
/// back `default_lookback_minutes`; otherwise it starts at the
/// watermark, clamped to 24 hours so a long outage cannot trigger an
/// unbounded backfill.
pub fn compute_window(
    now: DateTime<Utc>,
    watermark: Option<DateTime<Utc>>,
    default_lookback_minutes: i64,
) -> Window {
    let end = now;
    let start = match watermark {
        Some(mark) => {
            if end - mark > Duration::hours(MAX_BACKFILL_HOURS) {
                end - Duration::hours(MAX_BACKFILL_HOURS)
            } else {
                mark
            }
        }
        None => end - Duration::minutes(default_lookback_minutes),
    };

    Window { start, end }
}

/// Owns watermark persistence against the configuration document.
///
/// The watermark is read once at run start (by the config loader) and
/// rewritten exactly once, after the full cycle succeeds.
pub struct WindowManager {
    config_path: PathBuf,
}

impl WindowManager {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Persist `end` as the new watermark at second precision.
    ///
    /// Reads the stored document, replaces only `last_run_timestamp`,
    /// and writes the full document to a temporary file that is then
    /// renamed over the original, so a crash mid-write leaves the
    /// previous watermark intact.
    pub fn commit(&self, end: DateTime<Utc>) -> Result<()> {
        let data = fs::read_to_string(&self.config_path).with_context(|| {
            format!(
                "reading configuration file {} for watermark commit",
                self.config_path.display()
            )
        })?;

        let mut document: serde_json::Value = serde_json::from_str(&data).with_context(|| {
            format!("parsing configuration file {}", self.config_path.display())
        })?;

        let fields = document
            .as_object_mut()
            .context("configuration root is not an object")?;
        fields.insert(
            "last_run_timestamp".to_string(),
            serde_json::Value::from(end.timestamp()),
        );

        let tmp_path = self.config_path.with_extension("tmp");
        let serialized =
            serde_json::to_vec_pretty(&document).context("serializing configuration")?;
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.config_path).with_context(|| {
            format!("replacing configuration file {}", self.config_path.display())
        })?;

        debug!(watermark = end.timestamp(), "committed watermark");

        Ok(())
    }
}
