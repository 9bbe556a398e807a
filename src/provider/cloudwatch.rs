use std::collections::BTreeMap;

use anyhow::{Context, Result};
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::Statistic;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::metric::{Datapoint, Dimension, MetricDescriptor, StatKind};
use crate::window::Window;

use super::{DescriptorPage, MetricsProvider};

/// CloudWatch-backed metrics provider wrapping `ListMetrics` and
/// `GetMetricStatistics`.
pub struct CloudWatchProvider {
    client: aws_sdk_cloudwatch::Client,
}

impl CloudWatchProvider {
    /// Build a provider from ambient AWS configuration (environment,
    /// shared profile, instance role).
    pub async fn from_env() -> Self {
        let cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        Self {
            client: aws_sdk_cloudwatch::Client::new(&cfg),
        }
    }

    pub fn new(client: aws_sdk_cloudwatch::Client) -> Self {
        Self { client }
    }
}

fn to_aws_time(time: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_secs(time.timestamp())
}

fn to_statistic(kind: StatKind) -> Statistic {
    match kind {
        StatKind::Average => Statistic::Average,
        StatKind::Maximum => Statistic::Maximum,
        StatKind::Minimum => Statistic::Minimum,
        StatKind::Sum => Statistic::Sum,
        StatKind::SampleCount => Statistic::SampleCount,
    }
}

fn stat_value(datapoint: &aws_sdk_cloudwatch::types::Datapoint, kind: StatKind) -> Option<f64> {
    match kind {
        StatKind::Average => datapoint.average(),
        StatKind::Maximum => datapoint.maximum(),
        StatKind::Minimum => datapoint.minimum(),
        StatKind::Sum => datapoint.sum(),
        StatKind::SampleCount => datapoint.sample_count(),
    }
}

impl MetricsProvider for CloudWatchProvider {
    async fn list_descriptors(&self, token: Option<&str>) -> Result<DescriptorPage> {
        debug!(continuation = token.is_some(), "listing metrics");

        let output = self
            .client
            .list_metrics()
            .set_next_token(token.map(str::to_string))
            .send()
            .await
            .context("listing CloudWatch metrics")?;

        let descriptors = output
            .metrics()
            .iter()
            .map(|metric| MetricDescriptor {
                namespace: metric.namespace().unwrap_or_default().to_string(),
                metric_name: metric.metric_name().unwrap_or_default().to_string(),
                dimensions: metric
                    .dimensions()
                    .iter()
                    .map(|dimension| Dimension {
                        name: dimension.name().unwrap_or_default().to_string(),
                        value: dimension.value().unwrap_or_default().to_string(),
                    })
                    .collect(),
            })
            .collect();

        Ok(DescriptorPage {
            descriptors,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn get_statistics(
        &self,
        descriptor: &MetricDescriptor,
        window: &Window,
        period_seconds: i32,
        stats: &[StatKind],
    ) -> Result<Vec<Datapoint>> {
        let output = self
            .client
            .get_metric_statistics()
            .namespace(&descriptor.namespace)
            .metric_name(&descriptor.metric_name)
            .start_time(to_aws_time(window.start))
            .end_time(to_aws_time(window.end))
            .period(period_seconds)
            .set_statistics(Some(stats.iter().copied().map(to_statistic).collect()))
            .send()
            .await
            .with_context(|| {
                format!(
                    "fetching statistics for {}/{}",
                    descriptor.namespace, descriptor.metric_name
                )
            })?;

        let mut datapoints = Vec::with_capacity(output.datapoints().len());
        for raw in output.datapoints() {
            let Some(timestamp) = raw.timestamp() else {
                continue;
            };
            let Some(timestamp) =
                DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
            else {
                continue;
            };

            let mut values = BTreeMap::new();
            for kind in stats {
                if let Some(value) = stat_value(raw, *kind) {
                    values.insert(*kind, value);
                }
            }

            datapoints.push(Datapoint { timestamp, values });
        }

        Ok(datapoints)
    }
}
