use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::provider::MetricsProvider;
use crate::sink::Sink;
use crate::transform::MetricTransformer;
use crate::window::{compute_window, Window, WindowManager};

/// Drives one poll cycle: pagination over the descriptor listing,
/// per-descriptor transformation, emission, and the watermark commit.
pub struct Collector<P> {
    provider: P,
    transformer: MetricTransformer,
    windows: WindowManager,
    default_lookback_minutes: i64,
}

impl<P: MetricsProvider> Collector<P> {
    pub fn new(
        provider: P,
        transformer: MetricTransformer,
        windows: WindowManager,
        default_lookback_minutes: i64,
    ) -> Self {
        Self {
            provider,
            transformer,
            windows,
            default_lookback_minutes,
        }
    }

    /// Run one full poll cycle against `sink`.
    ///
    /// The watermark advances only after every page was transformed,
    /// emitted, and flushed without error; any failure leaves it
    /// untouched so the next run reprocesses the same window.
    pub async fn run<S: Sink>(
        &self,
        sink: &mut S,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<Window> {
        let window = compute_window(Utc::now(), watermark, self.default_lookback_minutes);
        info!(start = %window.start, end = %window.end, "starting poll cycle");

        let mut token: Option<String> = None;
        let mut pages = 0usize;
        let mut emitted = 0usize;

        loop {
            let page = self
                .provider
                .list_descriptors(token.as_deref())
                .await
                .context("listing metric descriptors")?;
            pages += 1;
            debug!(page = pages, descriptors = page.descriptors.len(), "processing page");

            for descriptor in &page.descriptors {
                let records = self
                    .transformer
                    .transform(&self.provider, descriptor, &window)
                    .await?;

                for record in &records {
                    sink.send(record).await?;
                }
                emitted += records.len();
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        sink.flush().await.context("flushing sink")?;
        self.windows.commit(window.end)?;

        info!(pages, records = emitted, "poll cycle complete");

        Ok(window)
    }
}
