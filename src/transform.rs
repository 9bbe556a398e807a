use std::collections::BTreeMap;

use anyhow::Result;
use tracing::warn;

use crate::metric::{MetricDescriptor, OutputRecord};
use crate::provider::MetricsProvider;
use crate::rule::{rule_key, RuleSet, SourceDirective};
use crate::source;
use crate::window::Window;

/// Aggregation period requested from the statistics provider.
const PERIOD_SECONDS: i32 = 60;

/// Turns metric descriptors into flat output records.
///
/// Matches each descriptor against the rule set, fetches statistics
/// for the matched rule's statistic kinds, resolves a source identity,
/// and fans out one record per (datapoint, statistic) pair.
pub struct MetricTransformer {
    rules: RuleSet,
    default_directives: Vec<SourceDirective>,
    name_prefix: String,
    suppress_single_stat_suffix: bool,
}

impl MetricTransformer {
    pub fn new(
        rules: RuleSet,
        default_directives: Vec<SourceDirective>,
        name_prefix: impl Into<String>,
        suppress_single_stat_suffix: bool,
    ) -> Self {
        Self {
            rules,
            default_directives,
            name_prefix: name_prefix.into(),
            suppress_single_stat_suffix,
        }
    }

    /// Transform one descriptor over the window.
    ///
    /// A descriptor with no matching rule produces nothing and skips
    /// the provider call entirely. A descriptor whose source cannot be
    /// resolved is dropped with a warning. Records are ordered by the
    /// provider's datapoint order, then by the rule's statistic order.
    pub async fn transform<P: MetricsProvider>(
        &self,
        provider: &P,
        descriptor: &MetricDescriptor,
        window: &Window,
    ) -> Result<Vec<OutputRecord>> {
        let Some(rule) = self
            .rules
            .match_metric(&descriptor.namespace, &descriptor.metric_name)
        else {
            return Ok(Vec::new());
        };

        let datapoints = provider
            .get_statistics(descriptor, window, PERIOD_SECONDS, &rule.stats)
            .await?;

        let mut point_tags = BTreeMap::new();
        point_tags.insert("Namespace".to_string(), descriptor.namespace.clone());
        for dimension in &descriptor.dimensions {
            point_tags.insert(dimension.name.clone(), dimension.value.clone());
        }

        let directives = rule
            .source_names
            .as_deref()
            .unwrap_or(&self.default_directives);

        let Some(src) = source::resolve(directives, &point_tags, &descriptor.dimensions) else {
            warn!(
                namespace = %descriptor.namespace,
                metric = %descriptor.metric_name,
                "no source resolved, dropping descriptor",
            );
            return Ok(Vec::new());
        };

        let base_name = format!(
            "{}{}",
            self.name_prefix,
            rule_key(&descriptor.namespace, &descriptor.metric_name)
        );
        let single_stat = rule.stats.len() == 1;

        let mut records = Vec::new();
        for datapoint in &datapoints {
            for kind in &rule.stats {
                let Some(value) = datapoint.values.get(kind) else {
                    continue;
                };

                let name = if single_stat && self.suppress_single_stat_suffix {
                    base_name.clone()
                } else {
                    format!("{}.{}", base_name, kind.short_name())
                };

                records.push(OutputRecord {
                    name,
                    value: *value,
                    timestamp_millis: datapoint.timestamp.timestamp_millis(),
                    source: src.clone(),
                    point_tags: point_tags.clone(),
                });
            }
        }

        Ok(records)
    }
}
