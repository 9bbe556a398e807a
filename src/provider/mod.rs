pub mod cloudwatch;

use anyhow::Result;

use crate::metric::{Datapoint, MetricDescriptor, StatKind};
use crate::window::Window;

/// One page of the upstream descriptor listing.
#[derive(Debug, Default)]
pub struct DescriptorPage {
    pub descriptors: Vec<MetricDescriptor>,
    /// Continuation token for the next page, absent on the last page.
    pub next_token: Option<String>,
}

/// Upstream metrics provider: paginated descriptor listing plus
/// per-descriptor statistics retrieval.
pub trait MetricsProvider: Send + Sync {
    /// Fetch one page of metric descriptors.
    fn list_descriptors(
        &self,
        token: Option<&str>,
    ) -> impl std::future::Future<Output = Result<DescriptorPage>> + Send;

    /// Fetch datapoints for one descriptor over the window, restricted
    /// to the given statistics, at the given aggregation period.
    fn get_statistics(
        &self,
        descriptor: &MetricDescriptor,
        window: &Window,
        period_seconds: i32,
        stats: &[StatKind],
    ) -> impl std::future::Future<Output = Result<Vec<Datapoint>>> + Send;
}
